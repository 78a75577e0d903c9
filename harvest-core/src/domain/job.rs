//! Crawl job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default crawl depth when a job leaves it unset
pub const DEFAULT_MAX_DEPTH: i32 = 3;
/// Default time budget (minutes) when a job leaves it unset
pub const DEFAULT_MAX_TIME_MINUTES: i32 = 60;
/// Default per-host politeness delay (milliseconds)
pub const DEFAULT_POLITENESS_DELAY_MS: i32 = 1000;
/// Default cap on URLs fetched per host
pub const DEFAULT_MAX_URLS_PER_HOST: i32 = 100;

/// Crawl job definition and lifecycle record
///
/// Structure persisted by the orchestrator and returned over HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlJob {
    pub id: Uuid,
    pub name: String,
    pub max_depth: Option<i32>,
    pub max_time_minutes: Option<i32>,
    #[serde(rename = "politenessDelay")]
    pub politeness_delay_ms: Option<i32>,
    pub max_urls_per_host: Option<i32>,
    pub auto_mode: bool,
    pub schedule_cron: Option<String>,
    pub status: JobStatus,
    pub topology_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub urls_crawled: i64,
    pub urls_discovered: i64,
    pub created_at: DateTime<Utc>,
}

impl CrawlJob {
    pub fn effective_max_depth(&self) -> i32 {
        self.max_depth.unwrap_or(DEFAULT_MAX_DEPTH)
    }

    pub fn effective_max_time_minutes(&self) -> i32 {
        self.max_time_minutes.unwrap_or(DEFAULT_MAX_TIME_MINUTES)
    }

    pub fn effective_politeness_delay_ms(&self) -> i32 {
        self.politeness_delay_ms
            .unwrap_or(DEFAULT_POLITENESS_DELAY_MS)
    }

    pub fn effective_max_urls_per_host(&self) -> i32 {
        self.max_urls_per_host.unwrap_or(DEFAULT_MAX_URLS_PER_HOST)
    }

    /// Whether the current run has used up its time budget at `now`.
    ///
    /// A job that never started has no budget to exhaust.
    pub fn time_budget_exhausted(&self, now: DateTime<Utc>) -> bool {
        match self.started_at {
            Some(started_at) => {
                let budget = chrono::Duration::minutes(i64::from(self.effective_max_time_minutes()));
                now - started_at >= budget
            }
            None => false,
        }
    }
}

/// Crawl job lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Stopped,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Stopped => "stopped",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "stopped" => Ok(JobStatus::Stopped),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// A seed URL owned by a crawl job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedUrl {
    pub job_id: Uuid,
    pub url: String,
}
