//! Topology configuration
//!
//! Turns a crawl job and its seeds into the configuration file the crawl
//! topology is launched with. The file format is a minimal `key: value`
//! listing; list values become a header line followed by indented `- item`
//! lines. Only scalars and flat lists are supported.

use harvest_core::domain::job::{CrawlJob, SeedUrl};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::config::ServiceConfig;

const TOPOLOGY_WORKERS: i64 = 1;
const MAX_SPOUT_PENDING: i64 = 100;
const MESSAGE_TIMEOUT_SECS: i64 = 300;
const FETCHER_THREADS: i64 = 50;
const FETCHER_QUEUE_MODE: &str = "byHost";
const HTTP_CONTENT_LIMIT: i64 = 65536;
const HTTP_TIMEOUT_MS: i64 = 10_000;
const PARTITION_MODE: &str = "byHost";
const METADATA_PERSIST: &[&str] = &["_redirTo", "error.cause", "error.source", "isSitemap", "isFeed"];
const METADATA_TRACK_DEPTH: bool = true;

/// A single configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    Int(i64),
    Bool(bool),
    Text(String),
    List(Vec<String>),
}

impl From<i64> for ConfigValue {
    fn from(v: i64) -> Self {
        ConfigValue::Int(v)
    }
}

impl From<i32> for ConfigValue {
    fn from(v: i32) -> Self {
        ConfigValue::Int(i64::from(v))
    }
}

impl From<bool> for ConfigValue {
    fn from(v: bool) -> Self {
        ConfigValue::Bool(v)
    }
}

impl From<&str> for ConfigValue {
    fn from(v: &str) -> Self {
        ConfigValue::Text(v.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(v: String) -> Self {
        ConfigValue::Text(v)
    }
}

impl From<Vec<String>> for ConfigValue {
    fn from(v: Vec<String>) -> Self {
        ConfigValue::List(v)
    }
}

/// Ordered configuration for one topology launch
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyConfig {
    job_id: Uuid,
    entries: Vec<(String, ConfigValue)>,
}

impl TopologyConfig {
    /// Build the configuration for a job run
    ///
    /// Unset job limits fall back to the crawl defaults.
    pub fn build(job: &CrawlJob, seeds: &[SeedUrl], services: &ServiceConfig) -> Self {
        let mut config = Self {
            job_id: job.id,
            entries: Vec::new(),
        };

        config
            .set("topology.name", format!("crawl-{}", job.id))
            .set("topology.workers", TOPOLOGY_WORKERS)
            .set("topology.max.spout.pending", MAX_SPOUT_PENDING)
            .set("topology.message.timeout.secs", MESSAGE_TIMEOUT_SECS)
            .set("fetcher.threads.number", FETCHER_THREADS)
            .set("fetcher.queue.mode", FETCHER_QUEUE_MODE)
            .set("http.content.limit", HTTP_CONTENT_LIMIT)
            .set("http.timeout", HTTP_TIMEOUT_MS)
            .set("partition.url.mode", PARTITION_MODE)
            .set(
                "metadata.persist",
                METADATA_PERSIST.iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            )
            .set("metadata.track.depth", METADATA_TRACK_DEPTH)
            .set("max.depth", job.effective_max_depth())
            .set("fetcher.server.delay.ms", job.effective_politeness_delay_ms())
            .set("fetcher.max.urls.per.host", job.effective_max_urls_per_host())
            .set("crawl.max.time.minutes", job.effective_max_time_minutes())
            .set("urlfrontier.host", services.frontier_host.as_str())
            .set("urlfrontier.port", i64::from(services.frontier_port))
            .set("solr.url", services.solr_url.as_str())
            .set(
                "seeds",
                seeds.iter().map(|s| s.url.clone()).collect::<Vec<_>>(),
            );

        config
    }

    fn set(&mut self, key: &str, value: impl Into<ConfigValue>) -> &mut Self {
        self.entries.push((key.to_string(), value.into()));
        self
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Where this job's configuration lives under `scratch_dir`
    pub fn path_in(&self, scratch_dir: &Path) -> PathBuf {
        scratch_dir.join(format!("crawl-{}.yaml", self.job_id))
    }

    /// Render the configuration file contents
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            match value {
                ConfigValue::Int(v) => out.push_str(&format!("{}: {}\n", key, v)),
                ConfigValue::Bool(v) => out.push_str(&format!("{}: {}\n", key, v)),
                ConfigValue::Text(v) => out.push_str(&format!("{}: {}\n", key, v)),
                ConfigValue::List(items) => {
                    out.push_str(&format!("{}:\n", key));
                    for item in items {
                        out.push_str(&format!("  - {}\n", item));
                    }
                }
            }
        }
        out
    }

    /// Write the configuration into `scratch_dir`, returning the file path
    pub async fn write_to(&self, scratch_dir: &Path) -> std::io::Result<PathBuf> {
        tokio::fs::create_dir_all(scratch_dir).await?;
        let path = self.path_in(scratch_dir);
        tokio::fs::write(&path, self.render()).await?;
        tracing::debug!("Wrote topology config for job {} to {}", self.job_id, path.display());
        Ok(path)
    }
}
