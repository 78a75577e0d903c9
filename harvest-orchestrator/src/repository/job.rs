//! Job Repository
//!
//! Handles all database operations related to crawl jobs.

use chrono::{DateTime, Utc};
use harvest_core::domain::job::{CrawlJob, JobStatus};
use sqlx::PgPool;
use uuid::Uuid;

/// A validated job definition ready to be persisted
#[derive(Debug, Clone, PartialEq)]
pub struct NewCrawlJob {
    pub name: String,
    pub max_depth: Option<i32>,
    pub max_time_minutes: Option<i32>,
    pub politeness_delay_ms: Option<i32>,
    pub max_urls_per_host: Option<i32>,
    pub auto_mode: bool,
    pub schedule_cron: Option<String>,
    pub seed_urls: Vec<String>,
}

impl NewCrawlJob {
    /// Materialise the pending job row this definition creates
    pub fn into_job(self, id: Uuid, created_at: DateTime<Utc>) -> (CrawlJob, Vec<String>) {
        let job = CrawlJob {
            id,
            name: self.name,
            max_depth: self.max_depth,
            max_time_minutes: self.max_time_minutes,
            politeness_delay_ms: self.politeness_delay_ms,
            max_urls_per_host: self.max_urls_per_host,
            auto_mode: self.auto_mode,
            schedule_cron: self.schedule_cron,
            status: JobStatus::Pending,
            topology_id: None,
            started_at: None,
            completed_at: None,
            urls_crawled: 0,
            urls_discovered: 0,
            created_at,
        };
        (job, self.seed_urls)
    }
}

/// Partial update of a job's lifecycle fields
///
/// `None` leaves a column untouched. `completed_at` is doubly optional so a
/// new run can clear the previous completion time. Counters only ever grow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobUpdate {
    pub status: Option<JobStatus>,
    pub topology_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<Option<DateTime<Utc>>>,
    pub urls_crawled: Option<i64>,
    pub urls_discovered: Option<i64>,
}

impl JobUpdate {
    /// Fields written when a topology has been submitted for the job
    pub fn running(topology_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Running),
            topology_id: Some(topology_id),
            started_at: Some(started_at),
            completed_at: Some(None),
            ..Default::default()
        }
    }

    /// Fields written when a run ends
    pub fn stopped(completed_at: DateTime<Utc>) -> Self {
        Self {
            status: Some(JobStatus::Stopped),
            completed_at: Some(Some(completed_at)),
            ..Default::default()
        }
    }

    /// Aggregate counters reported by a monitor tick
    pub fn counters(urls_crawled: i64, urls_discovered: i64) -> Self {
        Self {
            urls_crawled: Some(urls_crawled),
            urls_discovered: Some(urls_discovered),
            ..Default::default()
        }
    }

    /// Apply this update to an in-memory job
    pub fn apply(&self, job: &mut CrawlJob) {
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(topology_id) = &self.topology_id {
            job.topology_id = Some(topology_id.clone());
        }
        if let Some(started_at) = self.started_at {
            job.started_at = Some(started_at);
        }
        if let Some(completed_at) = self.completed_at {
            job.completed_at = completed_at;
        }
        if let Some(crawled) = self.urls_crawled {
            job.urls_crawled = job.urls_crawled.max(crawled);
        }
        if let Some(discovered) = self.urls_discovered {
            job.urls_discovered = job.urls_discovered.max(discovered);
        }
    }
}

/// Create a job and its seed URLs in a single transaction
pub async fn create(pool: &PgPool, new_job: NewCrawlJob) -> Result<CrawlJob, sqlx::Error> {
    let (job, seed_urls) = new_job.into_job(Uuid::new_v4(), Utc::now());

    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO crawl_jobs (id, name, max_depth, max_time_minutes, politeness_delay_ms,
                                max_urls_per_host, auto_mode, schedule_cron, status, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
        "#,
    )
    .bind(job.id)
    .bind(&job.name)
    .bind(job.max_depth)
    .bind(job.max_time_minutes)
    .bind(job.politeness_delay_ms)
    .bind(job.max_urls_per_host)
    .bind(job.auto_mode)
    .bind(&job.schedule_cron)
    .bind(job.status.as_str())
    .bind(job.created_at)
    .execute(&mut *tx)
    .await?;

    for url in &seed_urls {
        sqlx::query("INSERT INTO seed_urls (job_id, url) VALUES ($1, $2)")
            .bind(job.id)
            .bind(url)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(job)
}

/// Find a job by ID
pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<CrawlJob>, sqlx::Error> {
    let row = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, name, max_depth, max_time_minutes, politeness_delay_ms, max_urls_per_host,
               auto_mode, schedule_cron, status, topology_id, started_at, completed_at,
               urls_crawled, urls_discovered, created_at
        FROM crawl_jobs
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all jobs, newest first
pub async fn list_all(pool: &PgPool) -> Result<Vec<CrawlJob>, sqlx::Error> {
    let rows = sqlx::query_as::<_, JobRow>(
        r#"
        SELECT id, name, max_depth, max_time_minutes, politeness_delay_ms, max_urls_per_host,
               auto_mode, schedule_cron, status, topology_id, started_at, completed_at,
               urls_crawled, urls_discovered, created_at
        FROM crawl_jobs
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Apply a partial update to a job
pub async fn update(pool: &PgPool, id: Uuid, update: &JobUpdate) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE crawl_jobs
        SET status = COALESCE($2, status),
            topology_id = COALESCE($3, topology_id),
            started_at = COALESCE($4, started_at),
            completed_at = CASE WHEN $5 THEN $6 ELSE completed_at END,
            urls_crawled = GREATEST(urls_crawled, COALESCE($7, urls_crawled)),
            urls_discovered = GREATEST(urls_discovered, COALESCE($8, urls_discovered))
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(update.status.map(|s| s.as_str()))
    .bind(&update.topology_id)
    .bind(update.started_at)
    .bind(update.completed_at.is_some())
    .bind(update.completed_at.flatten())
    .bind(update.urls_crawled)
    .bind(update.urls_discovered)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Delete a job by ID; seeds and stats cascade
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM crawl_jobs WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    name: String,
    max_depth: Option<i32>,
    max_time_minutes: Option<i32>,
    politeness_delay_ms: Option<i32>,
    max_urls_per_host: Option<i32>,
    auto_mode: bool,
    schedule_cron: Option<String>,
    status: String,
    topology_id: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    urls_crawled: i64,
    urls_discovered: i64,
    created_at: DateTime<Utc>,
}

impl From<JobRow> for CrawlJob {
    fn from(row: JobRow) -> Self {
        let status = row.status.parse().unwrap_or_else(|e| {
            tracing::warn!("Job {} has unreadable status: {}", row.id, e);
            JobStatus::Failed
        });

        CrawlJob {
            id: row.id,
            name: row.name,
            max_depth: row.max_depth,
            max_time_minutes: row.max_time_minutes,
            politeness_delay_ms: row.politeness_delay_ms,
            max_urls_per_host: row.max_urls_per_host,
            auto_mode: row.auto_mode,
            schedule_cron: row.schedule_cron,
            status,
            topology_id: row.topology_id,
            started_at: row.started_at,
            completed_at: row.completed_at,
            urls_crawled: row.urls_crawled,
            urls_discovered: row.urls_discovered,
            created_at: row.created_at,
        }
    }
}
