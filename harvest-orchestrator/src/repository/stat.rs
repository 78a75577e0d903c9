//! Stat Repository
//!
//! Append-only crawl statistics recorded by the monitor loop.

use harvest_core::domain::stat::CrawlStat;
use sqlx::PgPool;
use uuid::Uuid;

/// Append a stat snapshot for a job
pub async fn insert(pool: &PgPool, stat: &CrawlStat) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO crawl_stats (job_id, recorded_at, urls_fetched, urls_failed,
                                 bytes_downloaded, avg_fetch_time_ms)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(stat.job_id)
    .bind(stat.timestamp)
    .bind(stat.urls_fetched)
    .bind(stat.urls_failed)
    .bind(stat.bytes_downloaded)
    .bind(stat.avg_fetch_time_ms)
    .execute(pool)
    .await?;

    Ok(())
}

/// Get the most recent stats for a job, newest first
pub async fn find_recent(
    pool: &PgPool,
    job_id: Uuid,
    limit: i64,
) -> Result<Vec<CrawlStat>, sqlx::Error> {
    let rows = sqlx::query_as::<_, StatRow>(
        r#"
        SELECT job_id, recorded_at, urls_fetched, urls_failed, bytes_downloaded, avg_fetch_time_ms
        FROM crawl_stats
        WHERE job_id = $1
        ORDER BY recorded_at DESC
        LIMIT $2
        "#,
    )
    .bind(job_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct StatRow {
    job_id: Uuid,
    recorded_at: chrono::DateTime<chrono::Utc>,
    urls_fetched: i64,
    urls_failed: i64,
    bytes_downloaded: i64,
    avg_fetch_time_ms: f64,
}

impl From<StatRow> for CrawlStat {
    fn from(row: StatRow) -> Self {
        CrawlStat {
            job_id: row.job_id,
            timestamp: row.recorded_at,
            urls_fetched: row.urls_fetched,
            urls_failed: row.urls_failed,
            bytes_downloaded: row.bytes_downloaded,
            avg_fetch_time_ms: row.avg_fetch_time_ms,
        }
    }
}
