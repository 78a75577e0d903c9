//! In-memory job store for tests

use async_trait::async_trait;
use chrono::Utc;
use harvest_core::domain::job::{CrawlJob, SeedUrl};
use harvest_core::domain::stat::CrawlStat;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

use crate::clock::Clock;

use crate::repository::job::{JobUpdate, NewCrawlJob};
use crate::repository::store::JobStore;

#[derive(Default)]
struct Tables {
    jobs: HashMap<Uuid, CrawlJob>,
    seeds: Vec<SeedUrl>,
    stats: Vec<CrawlStat>,
}

/// Job store keeping everything in process memory
#[derive(Default)]
pub struct MemoryJobStore {
    tables: Mutex<Tables>,
    clock: Option<Arc<dyn Clock>>,
    fail_stat_writes: AtomicBool,
    /// Successful `find_job` calls left before one fails
    find_job_failure: Mutex<Option<usize>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp `created_at` from `clock` instead of the system clock
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock: Some(clock),
            ..Self::default()
        }
    }

    /// Let `successes` more `find_job` calls through, then fail exactly one
    pub fn fail_find_job_after(&self, successes: usize) {
        *self.find_job_failure.lock().unwrap() = Some(successes);
    }

    /// Make every `append_stat` fail until switched off again
    pub fn set_fail_stat_writes(&self, fail: bool) {
        self.fail_stat_writes.store(fail, Ordering::SeqCst);
    }

    pub fn stat_count(&self, job_id: Uuid) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.stats.iter().filter(|s| s.job_id == job_id).count()
    }

    pub fn seed_count(&self, job_id: Uuid) -> usize {
        let tables = self.tables.lock().unwrap();
        tables.seeds.iter().filter(|s| s.job_id == job_id).count()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_job(&self, new_job: NewCrawlJob) -> Result<CrawlJob, sqlx::Error> {
        let created_at = self.clock.as_ref().map_or_else(Utc::now, |c| c.now());
        let (job, seed_urls) = new_job.into_job(Uuid::new_v4(), created_at);
        let mut tables = self.tables.lock().unwrap();
        tables.seeds.extend(seed_urls.into_iter().map(|url| SeedUrl { job_id: job.id, url }));
        tables.jobs.insert(job.id, job.clone());
        Ok(job)
    }

    async fn find_job(&self, id: Uuid) -> Result<Option<CrawlJob>, sqlx::Error> {
        {
            let mut failure = self.find_job_failure.lock().unwrap();
            match *failure {
                Some(0) => {
                    *failure = None;
                    return Err(sqlx::Error::PoolTimedOut);
                }
                Some(n) => *failure = Some(n - 1),
                None => {}
            }
        }
        Ok(self.tables.lock().unwrap().jobs.get(&id).cloned())
    }

    async fn list_jobs(&self) -> Result<Vec<CrawlJob>, sqlx::Error> {
        let mut jobs: Vec<CrawlJob> = self.tables.lock().unwrap().jobs.values().cloned().collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    async fn find_seeds(&self, job_id: Uuid) -> Result<Vec<SeedUrl>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.seeds.iter().filter(|s| s.job_id == job_id).cloned().collect())
    }

    async fn update_job(&self, id: Uuid, update: JobUpdate) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        match tables.jobs.get_mut(&id) {
            Some(job) => {
                update.apply(job);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn append_stat(&self, stat: CrawlStat) -> Result<(), sqlx::Error> {
        if self.fail_stat_writes.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        self.tables.lock().unwrap().stats.push(stat);
        Ok(())
    }

    async fn recent_stats(&self, job_id: Uuid, limit: i64) -> Result<Vec<CrawlStat>, sqlx::Error> {
        let tables = self.tables.lock().unwrap();
        let mut stats: Vec<CrawlStat> =
            tables.stats.iter().filter(|s| s.job_id == job_id).cloned().collect();
        stats.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        stats.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(stats)
    }

    async fn delete_job(&self, id: Uuid) -> Result<bool, sqlx::Error> {
        let mut tables = self.tables.lock().unwrap();
        let existed = tables.jobs.remove(&id).is_some();
        tables.seeds.retain(|s| s.job_id != id);
        tables.stats.retain(|s| s.job_id != id);
        Ok(existed)
    }
}
