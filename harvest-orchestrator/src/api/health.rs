//! Health Check API Handler

use axum::{http::StatusCode, response::IntoResponse};

/// GET /health
/// Liveness check; does not touch the database or the cluster
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
