//! Job API Handlers
//!
//! HTTP endpoints for crawl job lifecycle management.

use axum::{
    Json,
    extract::{Path, State},
};
use harvest_core::domain::job::CrawlJob;
use harvest_core::dto::job::{CreateJob, CreatedJob, JobDetails, Message, StartedJob};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::AppState;
use crate::api::error::ApiResult;

/// POST /jobs
/// Create a new crawl job
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateJob>,
) -> ApiResult<Json<CreatedJob>> {
    tracing::info!("Creating job: {:?}", req.name);

    let job = state.orchestrator.create_job(req).await?;

    Ok(Json(CreatedJob { id: job.id }))
}

/// GET /jobs
/// List all jobs, newest first
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<CrawlJob>>> {
    tracing::debug!("Listing all jobs");

    let jobs = state.orchestrator.list_jobs().await?;

    Ok(Json(jobs))
}

/// GET /jobs/{id}
/// Job with its seed URLs and most recent stats
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<JobDetails>> {
    tracing::debug!("Getting job: {}", id);

    let details = state.orchestrator.job_details(id).await?;

    Ok(Json(details))
}

/// POST /jobs/{id}/start
pub async fn start_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StartedJob>> {
    tracing::info!("Starting job: {}", id);

    let topology_id = state.orchestrator.start_job(id).await?;

    Ok(Json(StartedJob { topology_id }))
}

/// POST /jobs/{id}/stop
pub async fn stop_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Message>> {
    tracing::info!("Stopping job: {}", id);

    state.orchestrator.stop_job(id).await?;

    Ok(Json(Message::new(format!("Job {} stopped", id))))
}

/// DELETE /jobs/{id}
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Message>> {
    tracing::info!("Deleting job: {}", id);

    state.orchestrator.delete_job(id).await?;

    Ok(Json(Message::new(format!("Job {} deleted", id))))
}
