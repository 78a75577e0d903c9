//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;
pub mod proxy;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::service::orchestrator::Orchestrator;
use proxy::Upstream;

/// Shared handler state
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub upstream: Upstream,
}

/// Create the main API router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Job endpoints
        .route("/jobs", post(job::create_job).get(job::list_jobs))
        .route("/jobs/{id}", get(job::get_job).delete(job::delete_job))
        .route("/jobs/{id}/start", post(job::start_job))
        .route("/jobs/{id}/stop", post(job::stop_job))
        // Pass-through proxies
        .route("/frontier/stats", get(proxy::frontier_stats))
        .route("/cluster/status", get(proxy::cluster_status))
        .route("/search", get(proxy::search))
        .route("/suggest", get(proxy::suggest))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
