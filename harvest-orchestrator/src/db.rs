use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create crawl jobs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_jobs (
            id UUID PRIMARY KEY,
            name VARCHAR(255) NOT NULL,
            max_depth INTEGER,
            max_time_minutes INTEGER,
            politeness_delay_ms INTEGER,
            max_urls_per_host INTEGER,
            auto_mode BOOLEAN NOT NULL DEFAULT FALSE,
            schedule_cron VARCHAR(255),
            status VARCHAR(20) NOT NULL,
            topology_id VARCHAR(255),
            started_at TIMESTAMPTZ,
            completed_at TIMESTAMPTZ,
            urls_crawled BIGINT NOT NULL DEFAULT 0,
            urls_discovered BIGINT NOT NULL DEFAULT 0,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create seed URLs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS seed_urls (
            id SERIAL PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES crawl_jobs(id) ON DELETE CASCADE,
            url TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create crawl stats table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS crawl_stats (
            id BIGSERIAL PRIMARY KEY,
            job_id UUID NOT NULL REFERENCES crawl_jobs(id) ON DELETE CASCADE,
            recorded_at TIMESTAMPTZ NOT NULL,
            urls_fetched BIGINT NOT NULL,
            urls_failed BIGINT NOT NULL,
            bytes_downloaded BIGINT NOT NULL,
            avg_fetch_time_ms DOUBLE PRECISION NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes for better query performance
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_crawl_jobs_created_at ON crawl_jobs(created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_seed_urls_job_id ON seed_urls(job_id)")
        .execute(pool)
        .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_crawl_stats_job_id ON crawl_stats(job_id, recorded_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
