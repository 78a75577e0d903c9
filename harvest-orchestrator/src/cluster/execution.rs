//! Execution client
//!
//! Submits and kills crawl topologies through the cluster's command-line
//! client. Submission output is scanned for the topology id the cluster
//! assigned; kills are best-effort.

use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::config::ClusterConfig;

static SUBMITTED_TOPOLOGY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Submitted topology\s+`?([^\s`]+)`?").expect("topology id pattern is valid")
});

/// Errors raised while submitting a topology
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The CLI could not be started at all
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The CLI ran and reported failure
    #[error("'{program}' exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stderr: String,
    },
}

/// Submits and terminates topologies on the execution cluster
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    /// Launch a topology for `job_name` with the given config file,
    /// returning the id the cluster knows it by
    async fn submit(&self, job_name: &str, config_path: &Path) -> Result<String, ExecutionError>;

    /// Terminate a topology immediately. Failures are logged, never returned.
    async fn kill(&self, topology_id: &str);
}

/// Execution client driving the Storm command-line client
#[derive(Debug, Clone)]
pub struct StormCli {
    program: String,
    jar: String,
    main_class: String,
    working_dir: PathBuf,
}

impl StormCli {
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            program: config.storm_bin.clone(),
            jar: config.crawler_jar.clone(),
            main_class: config.main_class.clone(),
            working_dir: config.working_dir.clone(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<String, ExecutionError> {
        debug!("Running {} {}", self.program, args.join(" "));

        let output = Command::new(&self.program)
            .args(args)
            .current_dir(&self.working_dir)
            .output()
            .await
            .map_err(|source| ExecutionError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !stderr.trim().is_empty() {
            debug!("{} stderr: {}", self.program, stderr.trim());
        }

        if !output.status.success() {
            return Err(ExecutionError::Failed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(stdout)
    }
}

#[async_trait]
impl ExecutionClient for StormCli {
    async fn submit(&self, job_name: &str, config_path: &Path) -> Result<String, ExecutionError> {
        let config_path = config_path.to_string_lossy();
        let stdout = self
            .run(&[
                "jar",
                &self.jar,
                &self.main_class,
                "-conf",
                &config_path,
                "-local",
            ])
            .await?;

        let topology_id = match parse_topology_id(&stdout) {
            Some(id) => id,
            None => {
                let id = fallback_topology_id(job_name, chrono::Utc::now());
                warn!(
                    "No topology id in submit output for '{}', using {}",
                    job_name, id
                );
                id
            }
        };

        info!("Submitted topology {} for '{}'", topology_id, job_name);
        Ok(topology_id)
    }

    async fn kill(&self, topology_id: &str) {
        match self.run(&["kill", topology_id, "-w", "0"]).await {
            Ok(_) => info!("Killed topology {}", topology_id),
            Err(e) => warn!("Failed to kill topology {}: {}", topology_id, e),
        }
    }
}

/// Extract the cluster-assigned topology id from submission output
pub fn parse_topology_id(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .find_map(|line| SUBMITTED_TOPOLOGY.captures(line))
        .map(|caps| caps[1].to_string())
}

/// Id used when the cluster accepted the submission without naming it
pub fn fallback_topology_id(job_name: &str, now: chrono::DateTime<chrono::Utc>) -> String {
    format!("{}-{}", job_name, now.timestamp_millis())
}
