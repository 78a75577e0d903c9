//! Job Store
//!
//! The persistence contract the orchestrator depends on. `PgJobStore` backs it
//! with the repository functions; tests use the in-memory store.

use async_trait::async_trait;
use harvest_core::domain::job::{CrawlJob, SeedUrl};
use harvest_core::domain::stat::CrawlStat;
use sqlx::PgPool;
use uuid::Uuid;

use crate::repository::job::{JobUpdate, NewCrawlJob};
use crate::repository::{job_repository, seed_repository, stat_repository};

/// Persistence for job definitions, seed URLs and stat snapshots
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Persist a job together with its seed set as one unit
    async fn create_job(&self, new_job: NewCrawlJob) -> Result<CrawlJob, sqlx::Error>;

    async fn find_job(&self, id: Uuid) -> Result<Option<CrawlJob>, sqlx::Error>;

    /// All jobs, newest first
    async fn list_jobs(&self) -> Result<Vec<CrawlJob>, sqlx::Error>;

    async fn find_seeds(&self, job_id: Uuid) -> Result<Vec<SeedUrl>, sqlx::Error>;

    /// Returns false when no job has this id
    async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<bool, sqlx::Error>;

    async fn append_stat(&self, stat: CrawlStat) -> Result<(), sqlx::Error>;

    /// The `limit` most recent stats, newest first
    async fn recent_stats(&self, job_id: Uuid, limit: i64) -> Result<Vec<CrawlStat>, sqlx::Error>;

    /// Remove a job with its seeds and stats; false when no job has this id
    async fn delete_job(&self, id: Uuid) -> Result<bool, sqlx::Error>;
}

/// PostgreSQL-backed job store
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn create_job(&self, new_job: NewCrawlJob) -> Result<CrawlJob, sqlx::Error> {
        job_repository::create(&self.pool, new_job).await
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<CrawlJob>, sqlx::Error> {
        job_repository::find_by_id(&self.pool, id).await
    }

    async fn list_jobs(&self) -> Result<Vec<CrawlJob>, sqlx::Error> {
        job_repository::list_all(&self.pool).await
    }

    async fn find_seeds(&self, job_id: Uuid) -> Result<Vec<SeedUrl>, sqlx::Error> {
        seed_repository::find_by_job(&self.pool, job_id).await
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<bool, sqlx::Error> {
        job_repository::update(&self.pool, id, &update).await
    }

    async fn append_stat(&self, stat: CrawlStat) -> Result<(), sqlx::Error> {
        stat_repository::insert(&self.pool, &stat).await
    }

    async fn recent_stats(&self, job_id: Uuid, limit: i64) -> Result<Vec<CrawlStat>, sqlx::Error> {
        stat_repository::find_recent(&self.pool, job_id, limit).await
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        job_repository::delete(&self.pool, id).await
    }
}
