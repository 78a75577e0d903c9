//! Recurring job schedules
//!
//! Maps a job id to at most one cron trigger. Each firing asks the launcher
//! to start the job; failures are logged and the trigger stays installed.
//! Schedules live only as long as the process: nothing is reloaded from the
//! database on restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Weak;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    #[error("scheduler error: {0}")]
    Scheduler(String),
}

impl From<JobSchedulerError> for ScheduleError {
    fn from(err: JobSchedulerError) -> Self {
        ScheduleError::Scheduler(format!("{:?}", err))
    }
}

/// Starts jobs when their trigger fires
#[async_trait]
pub trait JobLauncher: Send + Sync {
    async fn launch(&self, job_id: Uuid) -> anyhow::Result<String>;
}

struct Trigger {
    trigger_id: Uuid,
    expression: String,
}

/// Cron triggers keyed by job id
pub struct Scheduler {
    cron: JobScheduler,
    triggers: Mutex<HashMap<Uuid, Trigger>>,
}

impl Scheduler {
    /// Create and start the underlying cron scheduler
    pub async fn start() -> Result<Self, ScheduleError> {
        let cron = JobScheduler::new().await?;
        cron.start().await?;
        Ok(Self {
            cron,
            triggers: Mutex::new(HashMap::new()),
        })
    }

    /// Check that `expression` can be scheduled
    pub fn validate(expression: &str) -> Result<(), ScheduleError> {
        let normalized = normalize_expression(expression)?;
        Job::new_async(normalized.as_str(), |_uuid, _lock| Box::pin(async {})).map_err(|e| {
            ScheduleError::InvalidExpression {
                expression: expression.to_string(),
                reason: format!("{:?}", e),
            }
        })?;
        Ok(())
    }

    /// Install a trigger for `job_id`, replacing any existing one
    pub async fn schedule(
        &self,
        job_id: Uuid,
        expression: &str,
        launcher: Weak<dyn JobLauncher>,
    ) -> Result<(), ScheduleError> {
        let normalized = normalize_expression(expression)?;

        let cron_job = Job::new_async(normalized.as_str(), move |_uuid, _lock| {
            let launcher = launcher.clone();
            Box::pin(async move {
                let Some(launcher) = launcher.upgrade() else {
                    warn!("Orchestrator gone, skipping scheduled start of job {}", job_id);
                    return;
                };
                match launcher.launch(job_id).await {
                    Ok(topology_id) => {
                        info!("Scheduled run of job {} submitted as {}", job_id, topology_id)
                    }
                    Err(e) => warn!("Scheduled start of job {} failed: {:#}", job_id, e),
                }
            })
        })
        .map_err(|e| ScheduleError::InvalidExpression {
            expression: expression.to_string(),
            reason: format!("{:?}", e),
        })?;

        let mut triggers = self.triggers.lock().await;

        if let Some(previous) = triggers.remove(&job_id) {
            self.cron.remove(&previous.trigger_id).await?;
            info!(
                "Replaced schedule '{}' of job {}",
                previous.expression, job_id
            );
        }

        let trigger_id = self.cron.add(cron_job).await?;
        triggers.insert(
            job_id,
            Trigger {
                trigger_id,
                expression: expression.to_string(),
            },
        );

        info!("Scheduled job {} with '{}'", job_id, expression);
        Ok(())
    }

    /// Remove the job's trigger; returns false when it had none
    pub async fn unschedule(&self, job_id: Uuid) -> Result<bool, ScheduleError> {
        let mut triggers = self.triggers.lock().await;
        match triggers.remove(&job_id) {
            Some(trigger) => {
                self.cron.remove(&trigger.trigger_id).await?;
                info!("Removed schedule '{}' of job {}", trigger.expression, job_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// The expression of the job's installed trigger
    #[cfg(test)]
    pub async fn expression_for(&self, job_id: Uuid) -> Option<String> {
        self.triggers
            .lock()
            .await
            .get(&job_id)
            .map(|t| t.expression.clone())
    }

    #[cfg(test)]
    pub async fn active_count(&self) -> usize {
        self.triggers.lock().await.len()
    }

    /// When the job's trigger fires next
    #[cfg(test)]
    pub async fn next_fire(&self, job_id: Uuid) -> Option<chrono::DateTime<chrono::Utc>> {
        let trigger_id = self.triggers.lock().await.get(&job_id)?.trigger_id;
        let mut cron = self.cron.clone();
        cron.next_tick_for_job(trigger_id).await.ok().flatten()
    }
}

const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// Accept classic five-field expressions by prepending a seconds field
///
/// Five-field expressions number weekdays the Unix way (0 or 7 is Sunday).
/// The cron engine counts Sunday as 1, so numeric weekdays are rewritten as
/// names. Six and seven field expressions are passed through untouched.
fn normalize_expression(expression: &str) -> Result<String, ScheduleError> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => {
            let day_of_week = unix_day_of_week(fields[4]).map_err(|reason| {
                ScheduleError::InvalidExpression {
                    expression: expression.to_string(),
                    reason,
                }
            })?;
            Ok(format!("0 {} {}", fields[..4].join(" "), day_of_week))
        }
        6 | 7 => Ok(fields.join(" ")),
        n => Err(ScheduleError::InvalidExpression {
            expression: expression.to_string(),
            reason: format!("expected 5 to 7 fields, found {}", n),
        }),
    }
}

/// Rewrite a Unix day-of-week field with day names
fn unix_day_of_week(field: &str) -> Result<String, String> {
    if field == "*" || field == "?" {
        return Ok(field.to_string());
    }

    let mut parts = Vec::new();
    for part in field.split(',') {
        if part.chars().any(|c| c.is_ascii_alphabetic()) {
            parts.push(part.to_string());
            continue;
        }

        let (range, step) = match part.split_once('/') {
            Some((range, step)) => {
                let step: usize = step
                    .parse()
                    .ok()
                    .filter(|s| *s > 0)
                    .ok_or_else(|| format!("invalid day-of-week step '{}'", step))?;
                (range, Some(step))
            }
            None => (part, None),
        };

        let (start, end) = match range {
            "*" => (0, 6),
            _ => match range.split_once('-') {
                Some((a, b)) => (day_number(a)?, day_number(b)?),
                None if step.is_some() => (day_number(range)?, 6),
                None => {
                    let day = day_number(range)?;
                    (day, day)
                }
            },
        };
        if start > end {
            return Err(format!("invalid day-of-week range '{}'", range));
        }

        let mut days: Vec<usize> = (start..=end)
            .step_by(step.unwrap_or(1))
            .map(|d| d % 7)
            .collect();
        days.sort_unstable();
        days.dedup();
        parts.extend(days.into_iter().map(|d| DAY_NAMES[d].to_string()));
    }

    Ok(parts.join(","))
}

fn day_number(token: &str) -> Result<usize, String> {
    token
        .parse::<usize>()
        .ok()
        .filter(|d| *d <= 7)
        .ok_or_else(|| format!("invalid day of week '{}'", token))
}
