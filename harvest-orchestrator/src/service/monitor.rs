//! Monitor loops
//!
//! One background task per running job. Every interval it polls the
//! topology's metrics, appends a stat row, raises the job's aggregate
//! counters and checks the job's time budget; when the budget is spent it
//! hands the job back to the orchestrator to be stopped.
//!
//! Each loop is registered under its job id. Cancelling takes the loop's
//! gate, which a tick holds while it persists, so once `cancel` returns no
//! further stat can be written for that job.

use async_trait::async_trait;
use harvest_core::domain::stat::CrawlStat;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::cluster::MetricsSource;
use crate::repository::JobStore;
use crate::repository::job::JobUpdate;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("a monitor loop is already active for job {0}")]
    AlreadyActive(Uuid),
}

/// Receives jobs whose run has used up its time budget
#[async_trait]
pub trait TimeLimitHandler: Send + Sync {
    /// Returns false when the stop could not be carried out; the loop keeps
    /// running and hands the job back again on its next tick.
    async fn time_limit_reached(&self, job_id: Uuid, topology_id: &str) -> bool;
}

type ActiveLoops = Arc<Mutex<HashMap<Uuid, MonitorHandle>>>;

struct MonitorHandle {
    run_id: Uuid,
    topology_id: String,
    token: CancellationToken,
    gate: Arc<tokio::sync::Mutex<()>>,
}

/// Registry of active monitor loops, keyed by job id
pub struct MonitorRegistry {
    store: Arc<dyn JobStore>,
    metrics: Arc<dyn MetricsSource>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    active: ActiveLoops,
}

impl MonitorRegistry {
    pub fn new(
        store: Arc<dyn JobStore>,
        metrics: Arc<dyn MetricsSource>,
        clock: Arc<dyn Clock>,
        interval: Duration,
    ) -> Self {
        Self {
            store,
            metrics,
            clock,
            interval,
            active: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Start monitoring `topology_id` on behalf of `job_id`
    ///
    /// Fails if the job already has an active loop; at most one loop per job
    /// may exist.
    pub fn start(
        &self,
        job_id: Uuid,
        topology_id: String,
        on_time_limit: Weak<dyn TimeLimitHandler>,
    ) -> Result<(), MonitorError> {
        let mut active = self.active.lock().unwrap();
        if active.contains_key(&job_id) {
            return Err(MonitorError::AlreadyActive(job_id));
        }

        let run_id = Uuid::new_v4();
        let token = CancellationToken::new();
        let gate = Arc::new(tokio::sync::Mutex::new(()));

        let monitor = MonitorLoop {
            run_id,
            job_id,
            topology_id: topology_id.clone(),
            store: Arc::clone(&self.store),
            metrics: Arc::clone(&self.metrics),
            clock: Arc::clone(&self.clock),
            token: token.clone(),
            gate: Arc::clone(&gate),
            on_time_limit,
            active: Arc::clone(&self.active),
        };
        tokio::spawn(monitor.run(self.interval));

        active.insert(
            job_id,
            MonitorHandle {
                run_id,
                topology_id: topology_id.clone(),
                token,
                gate,
            },
        );

        info!(
            "Monitoring job {} (topology {}) every {:?}",
            job_id, topology_id, self.interval
        );
        Ok(())
    }

    /// Stop the job's loop, waiting for any in-flight persistence to finish
    ///
    /// Returns false when the job had no active loop.
    pub async fn cancel(&self, job_id: Uuid) -> bool {
        let handle = self.active.lock().unwrap().remove(&job_id);
        let Some(handle) = handle else {
            return false;
        };

        handle.token.cancel();
        let _gate = handle.gate.lock().await;

        info!(
            "Stopped monitoring job {} (topology {})",
            job_id, handle.topology_id
        );
        true
    }

    #[cfg(test)]
    pub fn is_active(&self, job_id: Uuid) -> bool {
        self.active.lock().unwrap().contains_key(&job_id)
    }

    #[cfg(test)]
    pub fn active_count(&self) -> usize {
        self.active.lock().unwrap().len()
    }
}

enum TickOutcome {
    Continue,
    Exit,
    TimeLimitReached,
}

struct MonitorLoop {
    run_id: Uuid,
    job_id: Uuid,
    topology_id: String,
    store: Arc<dyn JobStore>,
    metrics: Arc<dyn MetricsSource>,
    clock: Arc<dyn Clock>,
    token: CancellationToken,
    gate: Arc<tokio::sync::Mutex<()>>,
    on_time_limit: Weak<dyn TimeLimitHandler>,
    active: ActiveLoops,
}

impl MonitorLoop {
    async fn run(self, period: Duration) {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                TickOutcome::Continue => {}
                TickOutcome::Exit => break,
                TickOutcome::TimeLimitReached => {
                    info!(
                        "Job {} reached its time limit, stopping topology {}",
                        self.job_id, self.topology_id
                    );
                    let Some(handler) = self.on_time_limit.upgrade() else {
                        warn!("Orchestrator gone, cannot stop job {}", self.job_id);
                        break;
                    };
                    if handler
                        .time_limit_reached(self.job_id, &self.topology_id)
                        .await
                    {
                        break;
                    }
                    warn!(
                        "Auto-stop of job {} did not complete, retrying next tick",
                        self.job_id
                    );
                }
            }
        }

        self.deregister();
        debug!("Monitor loop for job {} exited", self.job_id);
    }

    /// Drop this loop's registry entry unless it was already replaced
    fn deregister(&self) {
        let mut active = self.active.lock().unwrap();
        if active.get(&self.job_id).is_some_and(|h| h.run_id == self.run_id) {
            active.remove(&self.job_id);
        }
    }

    async fn tick(&self) -> TickOutcome {
        let snapshot = self.metrics.fetch(&self.topology_id).await;

        let _gate = self.gate.lock().await;
        if self.token.is_cancelled() {
            return TickOutcome::Exit;
        }

        let now = self.clock.now();
        let stat = CrawlStat::from_snapshot(self.job_id, now, &snapshot);
        if let Err(e) = self.store.append_stat(stat).await {
            error!("Failed to record stats for job {}: {}", self.job_id, e);
            // A stat insert also fails once the job row is gone
            return match self.store.find_job(self.job_id).await {
                Ok(None) => self.job_gone(),
                _ => TickOutcome::Continue,
            };
        }

        let counters = JobUpdate::counters(snapshot.fetched, snapshot.discovered);
        match self.store.update_job(self.job_id, counters).await {
            Ok(true) => {}
            Ok(false) => return self.job_gone(),
            Err(e) => {
                error!("Failed to update counters for job {}: {}", self.job_id, e);
                return TickOutcome::Continue;
            }
        }

        match self.store.find_job(self.job_id).await {
            Ok(Some(job)) if job.time_budget_exhausted(now) => TickOutcome::TimeLimitReached,
            Ok(Some(_)) => TickOutcome::Continue,
            Ok(None) => self.job_gone(),
            Err(e) => {
                error!("Failed to read job {} during monitor tick: {}", self.job_id, e);
                TickOutcome::Continue
            }
        }
    }

    fn job_gone(&self) -> TickOutcome {
        warn!("Job {} no longer exists, ending its monitor loop", self.job_id);
        TickOutcome::Exit
    }
}
