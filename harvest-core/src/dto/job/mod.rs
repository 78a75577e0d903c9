//! Crawl job DTOs

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::job::{CrawlJob, SeedUrl};
use crate::domain::stat::CrawlStat;

/// Request to create a new crawl job
///
/// `name` is optional at the wire level so that a missing name is reported
/// as a validation failure rather than a body parse error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJob {
    pub name: Option<String>,
    pub max_depth: Option<i32>,
    pub max_time_minutes: Option<i32>,
    #[serde(rename = "politenessDelay")]
    pub politeness_delay_ms: Option<i32>,
    pub max_urls_per_host: Option<i32>,
    #[serde(default)]
    pub auto_mode: bool,
    pub schedule_cron: Option<String>,
    #[serde(default)]
    pub seed_urls: Vec<String>,
}

/// Response to job creation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedJob {
    pub id: Uuid,
}

/// Response to a successful start
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedJob {
    pub topology_id: String,
}

/// Full view of a job with its seeds and most recent stats
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDetails {
    pub job: CrawlJob,
    pub seed_urls: Vec<SeedUrl>,
    pub stats: Vec<CrawlStat>,
}

/// Plain confirmation message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message: String,
}

impl Message {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
