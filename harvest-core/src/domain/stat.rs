//! Crawl statistics domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Point-in-time counters for a running topology
///
/// The default value is the all-zero snapshot reported when the
/// monitoring endpoint cannot be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub fetched: i64,
    pub failed: i64,
    pub discovered: i64,
    pub bytes: i64,
    pub avg_time_ms: f64,
}

/// Append-only stat row recorded once per monitor tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStat {
    pub job_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub urls_fetched: i64,
    pub urls_failed: i64,
    pub bytes_downloaded: i64,
    pub avg_fetch_time_ms: f64,
}

impl CrawlStat {
    pub fn from_snapshot(job_id: Uuid, timestamp: DateTime<Utc>, snapshot: &MetricsSnapshot) -> Self {
        Self {
            job_id,
            timestamp,
            urls_fetched: snapshot.fetched,
            urls_failed: snapshot.failed,
            bytes_downloaded: snapshot.bytes,
            avg_fetch_time_ms: snapshot.avg_time_ms,
        }
    }
}
