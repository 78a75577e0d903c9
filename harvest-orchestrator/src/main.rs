use anyhow::Context;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod api;
pub mod clock;
pub mod cluster;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;

use crate::api::{AppState, proxy::Upstream};
use crate::clock::SystemClock;
use crate::cluster::{StormCli, StormUiMetrics};
use crate::config::Config;
use crate::repository::PgJobStore;
use crate::service::scheduler::Scheduler;
use crate::service::{Orchestrator, OrchestratorDeps};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harvest_orchestrator=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Harvest Orchestrator...");

    let config = Config::from_env();
    config.validate().context("Invalid configuration")?;

    tracing::info!("Connecting to database...");

    // Create database connection pool
    let pool = db::create_pool(&config.database_url, config.db_max_connections)
        .await
        .context("Failed to create database pool")?;

    tracing::info!("Database connection pool created");

    // Run migrations
    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to build HTTP client")?;

    let scheduler = Scheduler::start()
        .await
        .context("Failed to start cron scheduler")?;

    let orchestrator = Orchestrator::new(OrchestratorDeps {
        store: Arc::new(PgJobStore::new(pool)),
        executor: Arc::new(StormCli::new(&config.cluster)),
        metrics: Arc::new(StormUiMetrics::new(
            config.cluster.ui_url.clone(),
            http.clone(),
        )),
        clock: Arc::new(SystemClock),
        scheduler,
        services: config.services.clone(),
        scratch_dir: config.cluster.scratch_dir.clone(),
        monitor_interval: config.monitor_interval,
    });

    let state = Arc::new(AppState {
        orchestrator,
        upstream: Upstream::new(http, &config),
    });

    // Build router with all API endpoints
    let app = api::create_router(state);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    axum::serve(listener, app)
        .await
        .context("Failed to start server")?;

    Ok(())
}
