//! Crawl Orchestrator
//!
//! Owns the crawl job lifecycle: creation (with optional recurring
//! schedule), start (config generation, submission, monitoring), stop and
//! delete. Start/stop/delete for the same job are serialized through a
//! per-job lock so concurrent requests cannot install duplicate monitors or
//! leave one behind.

use async_trait::async_trait;
use harvest_core::domain::job::{CrawlJob, JobStatus};
use harvest_core::dto::job::{CreateJob, JobDetails};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::cluster::{ExecutionClient, ExecutionError, MetricsSource, TopologyConfig};
use crate::config::ServiceConfig;
use crate::repository::JobStore;
use crate::repository::job::{JobUpdate, NewCrawlJob};
use crate::service::monitor::{MonitorRegistry, TimeLimitHandler};
use crate::service::scheduler::{JobLauncher, ScheduleError, Scheduler};

/// Number of stat snapshots returned with a job
pub const RECENT_STATS_LIMIT: i64 = 20;

/// Service error type
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("job {0} not found")]
    NotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("topology submission failed: {0}")]
    Submit(#[from] ExecutionError),

    #[error("failed to write topology config: {0}")]
    ConfigWrite(#[source] std::io::Error),

    #[error("scheduling failed: {0}")]
    Schedule(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<ScheduleError> for OrchestratorError {
    fn from(err: ScheduleError) -> Self {
        match err {
            ScheduleError::InvalidExpression { .. } => OrchestratorError::Validation(err.to_string()),
            ScheduleError::Scheduler(msg) => OrchestratorError::Schedule(msg),
        }
    }
}

pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Collaborators the orchestrator is assembled from
pub struct OrchestratorDeps {
    pub store: Arc<dyn JobStore>,
    pub executor: Arc<dyn ExecutionClient>,
    pub metrics: Arc<dyn MetricsSource>,
    pub clock: Arc<dyn Clock>,
    pub scheduler: Scheduler,
    pub services: ServiceConfig,
    pub scratch_dir: PathBuf,
    pub monitor_interval: Duration,
}

pub struct Orchestrator {
    me: Weak<Orchestrator>,
    store: Arc<dyn JobStore>,
    executor: Arc<dyn ExecutionClient>,
    clock: Arc<dyn Clock>,
    monitors: MonitorRegistry,
    scheduler: Scheduler,
    services: ServiceConfig,
    scratch_dir: PathBuf,
    job_locks: JobLocks,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps) -> Arc<Self> {
        let monitors = MonitorRegistry::new(
            Arc::clone(&deps.store),
            deps.metrics,
            Arc::clone(&deps.clock),
            deps.monitor_interval,
        );

        Arc::new_cyclic(|me| Orchestrator {
            me: me.clone(),
            store: deps.store,
            executor: deps.executor,
            clock: deps.clock,
            monitors,
            scheduler: deps.scheduler,
            services: deps.services,
            scratch_dir: deps.scratch_dir,
            job_locks: JobLocks::default(),
        })
    }

    /// Validate and persist a new job, installing its schedule when the job
    /// is in auto mode
    pub async fn create_job(&self, req: CreateJob) -> Result<CrawlJob> {
        let new_job = validate_create_request(req)?;

        let job = self.store.create_job(new_job).await?;
        info!("Job created: {} ({})", job.id, job.name);

        if let (true, Some(expression)) = (job.auto_mode, job.schedule_cron.as_deref()) {
            let launcher: Weak<dyn JobLauncher> = self.me.clone();
            if let Err(e) = self.scheduler.schedule(job.id, expression, launcher).await {
                error!("Failed to schedule job {}: {}", job.id, e);
            }
        }

        Ok(job)
    }

    /// Get a job by ID
    pub async fn get_job(&self, id: Uuid) -> Result<CrawlJob> {
        self.store
            .find_job(id)
            .await?
            .ok_or(OrchestratorError::NotFound(id))
    }

    /// List all jobs, newest first
    pub async fn list_jobs(&self) -> Result<Vec<CrawlJob>> {
        Ok(self.store.list_jobs().await?)
    }

    /// A job with its seeds and most recent stats
    pub async fn job_details(&self, id: Uuid) -> Result<JobDetails> {
        let job = self.get_job(id).await?;
        let seed_urls = self.store.find_seeds(id).await?;
        let stats = self.store.recent_stats(id, RECENT_STATS_LIMIT).await?;

        Ok(JobDetails {
            job,
            seed_urls,
            stats,
        })
    }

    /// Submit a run of the job to the cluster and start monitoring it
    ///
    /// Returns the topology id. A job that is already running is rejected.
    pub async fn start_job(&self, id: Uuid) -> Result<String> {
        let _guard = self.job_locks.acquire(id).await;

        let job = self.get_job(id).await?;
        if job.status == JobStatus::Running {
            return Err(OrchestratorError::InvalidState(format!(
                "Job {} is already running (topology {})",
                id,
                job.topology_id.as_deref().unwrap_or("unknown")
            )));
        }

        let seeds = self.store.find_seeds(id).await?;
        let config = TopologyConfig::build(&job, &seeds, &self.services);
        let config_path = config
            .write_to(&self.scratch_dir)
            .await
            .map_err(OrchestratorError::ConfigWrite)?;

        let topology_id = self.executor.submit(&job.name, &config_path).await?;

        let started_at = self.clock.now();
        let update = JobUpdate::running(topology_id.clone(), started_at);
        if let Err(e) = self.store.update_job(id, update).await {
            error!(
                "Failed to record start of job {}, killing topology {}",
                id, topology_id
            );
            self.executor.kill(&topology_id).await;
            return Err(e.into());
        }

        let handler: Weak<dyn TimeLimitHandler> = self.me.clone();
        if let Err(e) = self.monitors.start(id, topology_id.clone(), handler) {
            // Unreachable while start/stop hold the job lock; keep the run
            warn!("{}", e);
        }

        info!("Job {} started as topology {}", id, topology_id);
        Ok(topology_id)
    }

    /// Stop the job's current run and its monitor loop
    pub async fn stop_job(&self, id: Uuid) -> Result<()> {
        let _guard = self.job_locks.acquire(id).await;
        self.stop_locked(id, None).await
    }

    /// Stop the job, then remove it together with its seeds, stats and
    /// schedule
    pub async fn delete_job(&self, id: Uuid) -> Result<()> {
        let guard = self.job_locks.acquire(id).await;

        self.stop_locked(id, None).await?;

        if let Err(e) = self.scheduler.unschedule(id).await {
            warn!("Failed to remove schedule of job {}: {}", id, e);
        }

        if !self.store.delete_job(id).await? {
            return Err(OrchestratorError::NotFound(id));
        }

        drop(guard);
        self.job_locks.forget(id);

        info!("Job {} deleted", id);
        Ok(())
    }

    /// Stop with the job lock held. When `expected_topology` is given, only a
    /// job still running that topology is stopped.
    async fn stop_locked(&self, id: Uuid, expected_topology: Option<&str>) -> Result<()> {
        let job = self.get_job(id).await?;

        if let Some(expected) = expected_topology {
            if job.status != JobStatus::Running || job.topology_id.as_deref() != Some(expected) {
                info!(
                    "Job {} is no longer running topology {}, skipping auto-stop",
                    id, expected
                );
                return Ok(());
            }
        }

        let persisted = if job.status == JobStatus::Running {
            if let Some(topology_id) = &job.topology_id {
                self.executor.kill(topology_id).await;
            }
            self.store
                .update_job(id, JobUpdate::stopped(self.clock.now()))
                .await
                .map(|_| ())
        } else {
            Ok(())
        };

        // An auto-stop that was not recorded keeps its loop so the next tick
        // retries it
        if persisted.is_ok() || expected_topology.is_none() {
            self.monitors.cancel(id).await;
        }

        persisted?;
        info!("Job {} stopped", id);
        Ok(())
    }
}

#[async_trait]
impl TimeLimitHandler for Orchestrator {
    async fn time_limit_reached(&self, job_id: Uuid, topology_id: &str) -> bool {
        let _guard = self.job_locks.acquire(job_id).await;
        match self.stop_locked(job_id, Some(topology_id)).await {
            Ok(()) | Err(OrchestratorError::NotFound(_)) => true,
            Err(e) => {
                error!("Failed to auto-stop job {}: {}", job_id, e);
                false
            }
        }
    }
}

#[async_trait]
impl JobLauncher for Orchestrator {
    async fn launch(&self, job_id: Uuid) -> anyhow::Result<String> {
        Ok(self.start_job(job_id).await?)
    }
}

// =============================================================================
// Per-job Locks
// =============================================================================

#[derive(Default)]
struct JobLocks {
    locks: Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl JobLocks {
    async fn acquire(&self, id: Uuid) -> OwnedMutexGuard<()> {
        let lock = Arc::clone(self.locks.lock().unwrap().entry(id).or_default());
        lock.lock_owned().await
    }

    fn forget(&self, id: Uuid) {
        self.locks.lock().unwrap().remove(&id);
    }
}

// =============================================================================
// Validation
// =============================================================================

fn validate_create_request(req: CreateJob) -> Result<NewCrawlJob> {
    let name = req
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| OrchestratorError::Validation("Job name is required".to_string()))?;

    if name.chars().count() > 255 {
        return Err(OrchestratorError::Validation(
            "Job name is too long (max 255 characters)".to_string(),
        ));
    }

    if req.max_depth.is_some_and(|d| d < 0) {
        return Err(OrchestratorError::Validation(
            "maxDepth cannot be negative".to_string(),
        ));
    }

    if req.max_time_minutes.is_some_and(|t| t <= 0) {
        return Err(OrchestratorError::Validation(
            "maxTimeMinutes must be greater than 0".to_string(),
        ));
    }

    if req.politeness_delay_ms.is_some_and(|d| d < 0) {
        return Err(OrchestratorError::Validation(
            "politenessDelay cannot be negative".to_string(),
        ));
    }

    if req.max_urls_per_host.is_some_and(|m| m <= 0) {
        return Err(OrchestratorError::Validation(
            "maxUrlsPerHost must be greater than 0".to_string(),
        ));
    }

    let mut seed_urls = Vec::with_capacity(req.seed_urls.len());
    for raw in req.seed_urls {
        let raw = raw.trim();
        match url::Url::parse(raw) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {
                seed_urls.push(raw.to_string())
            }
            _ => {
                return Err(OrchestratorError::Validation(format!(
                    "Invalid seed URL: {}",
                    raw
                )));
            }
        }
    }

    let schedule_cron = req
        .schedule_cron
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty());
    if let Some(expression) = &schedule_cron {
        Scheduler::validate(expression)?;
    }

    Ok(NewCrawlJob {
        name,
        max_depth: req.max_depth,
        max_time_minutes: req.max_time_minutes,
        politeness_delay_ms: req.politeness_delay_ms,
        max_urls_per_host: req.max_urls_per_host,
        auto_mode: req.auto_mode,
        schedule_cron,
        seed_urls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::TokioClock;
    use crate::repository::memory::MemoryJobStore;
    use harvest_core::domain::stat::MetricsSnapshot;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const TICK: Duration = Duration::from_secs(30);

    #[derive(Default)]
    struct FakeCluster {
        submits: AtomicUsize,
        kills: Mutex<Vec<String>>,
        fail_submit: AtomicBool,
    }

    #[async_trait]
    impl ExecutionClient for FakeCluster {
        async fn submit(
            &self,
            job_name: &str,
            config_path: &Path,
        ) -> std::result::Result<String, ExecutionError> {
            tokio::task::yield_now().await;
            assert!(config_path.exists());
            if self.fail_submit.load(Ordering::SeqCst) {
                return Err(ExecutionError::Failed {
                    program: "storm".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "nimbus unavailable".to_string(),
                });
            }
            let n = self.submits.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!("{}-{}", job_name, n))
        }

        async fn kill(&self, topology_id: &str) {
            self.kills.lock().unwrap().push(topology_id.to_string());
        }
    }

    struct FixedMetrics;

    #[async_trait]
    impl MetricsSource for FixedMetrics {
        async fn fetch(&self, _topology_id: &str) -> MetricsSnapshot {
            MetricsSnapshot {
                fetched: 10,
                failed: 0,
                discovered: 25,
                bytes: 0,
                avg_time_ms: 120.0,
            }
        }
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        store: Arc<MemoryJobStore>,
        cluster: Arc<FakeCluster>,
        _scratch: tempfile::TempDir,
    }

    async fn harness() -> Harness {
        let clock = Arc::new(TokioClock::new());
        let store = Arc::new(MemoryJobStore::with_clock(clock.clone()));
        let cluster = Arc::new(FakeCluster::default());
        let scratch = tempfile::tempdir().unwrap();

        let orchestrator = Orchestrator::new(OrchestratorDeps {
            store: store.clone(),
            executor: cluster.clone(),
            metrics: Arc::new(FixedMetrics),
            clock,
            scheduler: Scheduler::start().await.unwrap(),
            services: ServiceConfig::default(),
            scratch_dir: scratch.path().to_path_buf(),
            monitor_interval: TICK,
        });

        Harness {
            orchestrator,
            store,
            cluster,
            _scratch: scratch,
        }
    }

    fn request(name: &str) -> CreateJob {
        CreateJob {
            name: Some(name.to_string()),
            seed_urls: vec![
                "http://a.example".to_string(),
                "http://b.example".to_string(),
            ],
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_job_is_pending_with_seeds() {
        let h = harness().await;

        let job = h.orchestrator.create_job(request("docs")).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.topology_id.is_none());

        let details = h.orchestrator.job_details(job.id).await.unwrap();
        let mut urls: Vec<_> = details.seed_urls.iter().map(|s| s.url.as_str()).collect();
        urls.sort();
        assert_eq!(urls, vec!["http://a.example", "http://b.example"]);
        assert!(details.stats.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_job_validation() {
        let h = harness().await;

        let missing_name = CreateJob::default();
        assert!(matches!(
            h.orchestrator.create_job(missing_name).await,
            Err(OrchestratorError::Validation(_))
        ));

        let blank_name = CreateJob {
            name: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            h.orchestrator.create_job(blank_name).await,
            Err(OrchestratorError::Validation(_))
        ));

        let mut bad_seed = request("docs");
        bad_seed.seed_urls.push("ftp://files.example".to_string());
        assert!(matches!(
            h.orchestrator.create_job(bad_seed).await,
            Err(OrchestratorError::Validation(_))
        ));

        let mut zero_time = request("docs");
        zero_time.max_time_minutes = Some(0);
        assert!(matches!(
            h.orchestrator.create_job(zero_time).await,
            Err(OrchestratorError::Validation(_))
        ));

        let mut bad_cron = request("docs");
        bad_cron.auto_mode = true;
        bad_cron.schedule_cron = Some("whenever".to_string());
        assert!(matches!(
            h.orchestrator.create_job(bad_cron).await,
            Err(OrchestratorError::Validation(_))
        ));

        assert!(h.orchestrator.list_jobs().await.unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_mode_job_gets_schedule() {
        let h = harness().await;

        let mut scheduled = request("nightly");
        scheduled.auto_mode = true;
        scheduled.schedule_cron = Some("0 3 * * *".to_string());
        let scheduled = h.orchestrator.create_job(scheduled).await.unwrap();

        let mut manual = request("manual");
        manual.schedule_cron = Some("0 3 * * *".to_string());
        let manual = h.orchestrator.create_job(manual).await.unwrap();

        let scheduler = &h.orchestrator.scheduler;
        assert_eq!(
            scheduler.expression_for(scheduled.id).await.as_deref(),
            Some("0 3 * * *")
        );
        assert!(scheduler.expression_for(manual.id).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_job_runs_and_monitors() {
        let h = harness().await;
        let job = h.orchestrator.create_job(request("docs")).await.unwrap();

        let topology_id = h.orchestrator.start_job(job.id).await.unwrap();
        assert_eq!(topology_id, "docs-1");

        let job = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.topology_id.as_deref(), Some("docs-1"));
        assert!(job.started_at.is_some());
        assert!(h.orchestrator.monitors.is_active(job.id));
        assert_eq!(h.orchestrator.monitors.active_count(), 1);

        tokio::time::sleep(TICK + Duration::from_secs(1)).await;
        let job = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(job.urls_crawled, 10);
        assert_eq!(job.urls_discovered, 25);
        assert_eq!(h.store.stat_count(job.id), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_rejects_running_job() {
        let h = harness().await;
        let job = h.orchestrator.create_job(request("docs")).await.unwrap();

        h.orchestrator.start_job(job.id).await.unwrap();
        let again = h.orchestrator.start_job(job.id).await;

        assert!(matches!(again, Err(OrchestratorError::InvalidState(_))));
        assert_eq!(h.cluster.submits.load(Ordering::SeqCst), 1);
        assert_eq!(
            h.orchestrator.get_job(job.id).await.unwrap().topology_id.as_deref(),
            Some("docs-1")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_starts_submit_once() {
        let h = harness().await;
        let job = h.orchestrator.create_job(request("docs")).await.unwrap();

        let (a, b) = tokio::join!(
            h.orchestrator.start_job(job.id),
            h.orchestrator.start_job(job.id)
        );

        assert!(a.is_ok() != b.is_ok());
        assert_eq!(h.cluster.submits.load(Ordering::SeqCst), 1);
        assert_eq!(h.orchestrator.monitors.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_unknown_job() {
        let h = harness().await;
        let id = Uuid::new_v4();
        assert!(matches!(
            h.orchestrator.start_job(id).await,
            Err(OrchestratorError::NotFound(missing)) if missing == id
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_failure_leaves_job_pending() {
        let h = harness().await;
        let job = h.orchestrator.create_job(request("docs")).await.unwrap();
        h.cluster.fail_submit.store(true, Ordering::SeqCst);

        let result = h.orchestrator.start_job(job.id).await;

        assert!(matches!(result, Err(OrchestratorError::Submit(_))));
        let job = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(job.topology_id.is_none());
        assert_eq!(h.orchestrator.monitors.active_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_job_kills_and_halts_stats() {
        let h = harness().await;
        let job = h.orchestrator.create_job(request("docs")).await.unwrap();
        h.orchestrator.start_job(job.id).await.unwrap();

        tokio::time::sleep(TICK * 2 + Duration::from_secs(1)).await;
        assert_eq!(h.store.stat_count(job.id), 2);

        h.orchestrator.stop_job(job.id).await.unwrap();

        let stopped = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(stopped.status, JobStatus::Stopped);
        assert!(stopped.completed_at.is_some());
        assert_eq!(stopped.topology_id.as_deref(), Some("docs-1"));
        assert_eq!(*h.cluster.kills.lock().unwrap(), vec!["docs-1".to_string()]);
        assert!(!h.orchestrator.monitors.is_active(job.id));

        tokio::time::sleep(TICK * 5).await;
        assert_eq!(h.store.stat_count(job.id), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_pending_job_is_noop() {
        let h = harness().await;
        let job = h.orchestrator.create_job(request("docs")).await.unwrap();

        h.orchestrator.stop_job(job.id).await.unwrap();

        let job = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert!(h.cluster.kills.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_time_limit_auto_stops_job() {
        let h = harness().await;
        let mut req = request("short");
        req.max_time_minutes = Some(1);
        let job = h.orchestrator.create_job(req).await.unwrap();
        h.orchestrator.start_job(job.id).await.unwrap();

        tokio::time::sleep(TICK + Duration::from_secs(1)).await;
        assert_eq!(
            h.orchestrator.get_job(job.id).await.unwrap().status,
            JobStatus::Running
        );

        tokio::time::sleep(TICK).await;
        let stopped = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(stopped.status, JobStatus::Stopped);
        assert!(stopped.completed_at.is_some());
        assert_eq!(stopped.topology_id.as_deref(), Some("short-1"));
        assert_eq!(h.store.stat_count(job.id), 2);
        assert_eq!(h.cluster.kills.lock().unwrap().len(), 1);
        assert!(!h.orchestrator.monitors.is_active(job.id));

        tokio::time::sleep(TICK * 4).await;
        assert_eq!(h.store.stat_count(job.id), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_starts_new_run() {
        let h = harness().await;
        let job = h.orchestrator.create_job(request("docs")).await.unwrap();

        h.orchestrator.start_job(job.id).await.unwrap();
        h.orchestrator.stop_job(job.id).await.unwrap();
        let second = h.orchestrator.start_job(job.id).await.unwrap();

        assert_eq!(second, "docs-2");
        let job = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.completed_at.is_none());
        assert_eq!(h.orchestrator.monitors.active_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_job_removes_everything() {
        let h = harness().await;
        let mut req = request("docs");
        req.auto_mode = true;
        req.schedule_cron = Some("*/5 * * * *".to_string());
        let job = h.orchestrator.create_job(req).await.unwrap();
        h.orchestrator.start_job(job.id).await.unwrap();
        tokio::time::sleep(TICK + Duration::from_secs(1)).await;

        h.orchestrator.delete_job(job.id).await.unwrap();

        assert!(matches!(
            h.orchestrator.get_job(job.id).await,
            Err(OrchestratorError::NotFound(_))
        ));
        assert_eq!(h.store.seed_count(job.id), 0);
        assert_eq!(h.store.stat_count(job.id), 0);
        assert_eq!(*h.cluster.kills.lock().unwrap(), vec!["docs-1".to_string()]);
        assert!(!h.orchestrator.monitors.is_active(job.id));
        assert!(h.orchestrator.scheduler.expression_for(job.id).await.is_none());

        tokio::time::sleep(TICK * 3).await;
        assert_eq!(h.store.stat_count(job.id), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_unknown_job() {
        let h = harness().await;
        assert!(matches!(
            h.orchestrator.delete_job(Uuid::new_v4()).await,
            Err(OrchestratorError::NotFound(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_list_jobs_newest_first() {
        let h = harness().await;
        let first = h.orchestrator.create_job(request("first")).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        let second = h.orchestrator.create_job(request("second")).await.unwrap();

        let ids: Vec<Uuid> = h
            .orchestrator
            .list_jobs()
            .await
            .unwrap()
            .into_iter()
            .map(|j| j.id)
            .collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_long_multibyte_name_is_counted_in_characters() {
        let h = harness().await;

        let fits = request(&"é".repeat(255));
        assert!(h.orchestrator.create_job(fits).await.is_ok());

        let too_long = request(&"é".repeat(256));
        assert!(matches!(
            h.orchestrator.create_job(too_long).await,
            Err(OrchestratorError::Validation(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_stop_retries_after_store_error() {
        let h = harness().await;
        let mut req = request("short");
        req.max_time_minutes = Some(1);
        let job = h.orchestrator.create_job(req).await.unwrap();
        h.orchestrator.start_job(job.id).await.unwrap();

        tokio::time::sleep(TICK + Duration::from_secs(1)).await;
        // The tick's own read succeeds, the auto-stop re-read fails
        h.store.fail_find_job_after(1);

        tokio::time::sleep(TICK).await;
        let still_running = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(still_running.status, JobStatus::Running);
        assert!(h.orchestrator.monitors.is_active(job.id));
        assert!(h.cluster.kills.lock().unwrap().is_empty());
        assert_eq!(h.store.stat_count(job.id), 2);

        tokio::time::sleep(TICK).await;
        let stopped = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(stopped.status, JobStatus::Stopped);
        assert!(stopped.completed_at.is_some());
        assert_eq!(h.store.stat_count(job.id), 3);
        assert_eq!(*h.cluster.kills.lock().unwrap(), vec!["short-1".to_string()]);
        assert!(!h.orchestrator.monitors.is_active(job.id));

        tokio::time::sleep(TICK * 3).await;
        assert_eq!(h.store.stat_count(job.id), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_time_limit_leaves_new_run_alone() {
        let h = harness().await;
        let job = h.orchestrator.create_job(request("docs")).await.unwrap();

        h.orchestrator.start_job(job.id).await.unwrap();
        h.orchestrator.stop_job(job.id).await.unwrap();
        h.orchestrator.start_job(job.id).await.unwrap();

        assert!(h.orchestrator.time_limit_reached(job.id, "docs-1").await);

        let job = h.orchestrator.get_job(job.id).await.unwrap();
        assert_eq!(job.status, JobStatus::Running);
        assert_eq!(job.topology_id.as_deref(), Some("docs-2"));
        assert!(job.completed_at.is_none());
        assert!(h.orchestrator.monitors.is_active(job.id));
        assert_eq!(*h.cluster.kills.lock().unwrap(), vec!["docs-1".to_string()]);
    }
}
