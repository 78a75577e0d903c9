//! Metrics poller
//!
//! Reads runtime counters for a topology from the cluster's monitoring API
//! (`GET /api/v1/topology/{id}`). Only the first spout (source stage) and
//! the first bolt (processing stage) are read. Any failure collapses to the
//! all-zero snapshot so polling never interrupts a monitor loop.

use async_trait::async_trait;
use harvest_core::domain::stat::MetricsSnapshot;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("monitoring API returned status {0}")]
    Status(u16),

    #[error("response has no {0} entries")]
    MissingStage(&'static str),
}

/// Source of runtime metrics for running topologies
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Counters for `topology_id`; zeros when they cannot be read
    async fn fetch(&self, topology_id: &str) -> MetricsSnapshot;
}

// =============================================================================
// Monitoring Response Schema
// =============================================================================

#[derive(Debug, Deserialize)]
struct TopologyResponse {
    #[serde(default)]
    spouts: Vec<StageStats>,
    #[serde(default)]
    bolts: Vec<StageStats>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StageStats {
    #[serde(default)]
    emitted: Counter,
    #[serde(default)]
    failed: Counter,
    #[serde(default)]
    complete_latency: Counter,
}

/// Numeric field the monitoring API reports either as a number or as a
/// decimal string; anything unreadable counts as zero
#[derive(Debug, Default, Clone, Copy, PartialEq)]
struct Counter(f64);

impl<'de> Deserialize<'de> for Counter {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(f64),
            Text(String),
            Other(serde::de::IgnoredAny),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Counter(n),
            Raw::Text(s) => Counter(s.trim().parse().unwrap_or(0.0)),
            Raw::Other(_) => Counter(0.0),
        })
    }
}

impl Counter {
    fn count(self) -> i64 {
        if self.0.is_finite() && self.0 > 0.0 {
            self.0 as i64
        } else {
            0
        }
    }
}

impl TopologyResponse {
    fn into_snapshot(self) -> Result<MetricsSnapshot, MetricsError> {
        let spout = self
            .spouts
            .into_iter()
            .next()
            .ok_or(MetricsError::MissingStage("spout"))?;
        let bolt = self
            .bolts
            .into_iter()
            .next()
            .ok_or(MetricsError::MissingStage("bolt"))?;

        Ok(MetricsSnapshot {
            fetched: bolt.emitted.count(),
            failed: bolt.failed.count() + spout.failed.count(),
            discovered: spout.emitted.count(),
            bytes: 0,
            avg_time_ms: spout.complete_latency.0.max(0.0),
        })
    }
}

// =============================================================================
// HTTP Poller
// =============================================================================

/// Metrics source reading the Storm UI REST API
#[derive(Debug, Clone)]
pub struct StormUiMetrics {
    base_url: String,
    client: Client,
}

impl StormUiMetrics {
    pub fn new(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn try_fetch(&self, topology_id: &str) -> Result<MetricsSnapshot, MetricsError> {
        let url = format!("{}/api/v1/topology/{}", self.base_url, topology_id);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MetricsError::Status(status.as_u16()));
        }

        response.json::<TopologyResponse>().await?.into_snapshot()
    }
}

#[async_trait]
impl MetricsSource for StormUiMetrics {
    async fn fetch(&self, topology_id: &str) -> MetricsSnapshot {
        match self.try_fetch(topology_id).await {
            Ok(snapshot) => {
                debug!("Metrics for {}: {:?}", topology_id, snapshot);
                snapshot
            }
            Err(e) => {
                warn!("Failed to fetch metrics for topology {}: {}", topology_id, e);
                MetricsSnapshot::default()
            }
        }
    }
}
