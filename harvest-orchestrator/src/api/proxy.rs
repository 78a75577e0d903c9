//! Pass-through proxies
//!
//! Forwards status and search requests to the frontier, the cluster UI and
//! the search index. Upstream bodies and status codes are relayed as-is;
//! only transport failures become 502s.

use axum::{
    extract::{RawQuery, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::config::Config;

/// Upstream endpoints reachable through the API
#[derive(Debug, Clone)]
pub struct Upstream {
    client: reqwest::Client,
    frontier_stats_url: String,
    cluster_summary_url: String,
    search_url: String,
    suggest_url: String,
}

impl Upstream {
    pub fn new(client: reqwest::Client, config: &Config) -> Self {
        let ui_url = config.cluster.ui_url.trim_end_matches('/');
        let solr_url = config.services.solr_url.trim_end_matches('/');

        Self {
            client,
            frontier_stats_url: config.services.frontier_stats_url.clone(),
            cluster_summary_url: format!("{}/api/v1/cluster/summary", ui_url),
            search_url: format!("{}/select", solr_url),
            suggest_url: format!("{}/suggest", solr_url),
        }
    }

    async fn forward(&self, url: &str, query: Option<&str>) -> ApiResult<Response> {
        let target = match query {
            Some(q) if !q.is_empty() => format!("{}?{}", url, q),
            _ => url.to_string(),
        };
        tracing::debug!("Proxying GET {}", target);

        let response = self
            .client
            .get(&target)
            .send()
            .await
            .map_err(|e| ApiError::BadGateway(format!("{} unreachable: {}", url, e)))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/json")
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| ApiError::BadGateway(format!("{} read failed: {}", url, e)))?;

        Ok((status, [(header::CONTENT_TYPE, content_type)], body).into_response())
    }
}

/// GET /frontier/stats
pub async fn frontier_stats(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let upstream = &state.upstream;
    upstream.forward(&upstream.frontier_stats_url, None).await
}

/// GET /cluster/status
pub async fn cluster_status(State(state): State<Arc<AppState>>) -> ApiResult<Response> {
    let upstream = &state.upstream;
    upstream.forward(&upstream.cluster_summary_url, None).await
}

/// GET /search
pub async fn search(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> ApiResult<Response> {
    let upstream = &state.upstream;
    upstream.forward(&upstream.search_url, query.as_deref()).await
}

/// GET /suggest
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
) -> ApiResult<Response> {
    let upstream = &state.upstream;
    upstream.forward(&upstream.suggest_url, query.as_deref()).await
}
