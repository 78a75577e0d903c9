//! Seed URL Repository
//!
//! Seed rows are written together with their job (see `job::create`) and are
//! read-only afterwards.

use harvest_core::domain::job::SeedUrl;
use sqlx::PgPool;
use uuid::Uuid;

/// Get all seed URLs for a job
pub async fn find_by_job(pool: &PgPool, job_id: Uuid) -> Result<Vec<SeedUrl>, sqlx::Error> {
    let rows = sqlx::query_as::<_, SeedRow>(
        r#"
        SELECT job_id, url
        FROM seed_urls
        WHERE job_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

#[derive(sqlx::FromRow)]
struct SeedRow {
    job_id: Uuid,
    url: String,
}

impl From<SeedRow> for SeedUrl {
    fn from(row: SeedRow) -> Self {
        SeedUrl {
            job_id: row.job_id,
            url: row.url,
        }
    }
}
