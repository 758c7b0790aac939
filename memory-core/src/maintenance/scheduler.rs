//! # Health Scheduler (C12)
//!
//! Installs cron triggers for the three [`HealthMaintenanceJobs`] according
//! to a [`HealthScheduleConfig`] persisted at `health_schedule.json`.
//! Grounded in `original_source/src/memory/health_scheduler.py`, which wraps
//! APScheduler the way this wraps `tokio-cron-scheduler`. One deliberate
//! divergence: the original's `trigger_*_now` helpers raise if the
//! scheduler was never started; spec.md §4.C12 calls for manual triggers to
//! run "synchronously and [not] require the scheduler to be running", so
//! here they always invoke the job directly regardless of `start`/`stop`
//! state.

use crate::maintenance::jobs::{HealthMaintenanceJobs, JobResult};
use crate::types::HealthScheduleConfig;
use crate::{Error, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};

const WEEKDAY_NAMES: [&str; 7] = ["MON", "TUE", "WED", "THU", "FRI", "SAT", "SUN"];

fn weekly_cron(day: u8, time: (u8, u8)) -> String {
    let name = WEEKDAY_NAMES[(day % 7) as usize];
    format!("0 {} {} * * {name}", time.1, time.0)
}

fn monthly_cron(day: u8, time: (u8, u8)) -> String {
    format!("0 {} {} {} * *", time.1, time.0, day.clamp(1, 31))
}

pub async fn load_config_from_file(path: &std::path::Path) -> HealthScheduleConfig {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => HealthScheduleConfig::default(),
    }
}

pub async fn save_config_to_file(path: &std::path::Path, config: &HealthScheduleConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Which jobs are installed and whether the cron loop is running.
#[derive(Debug, Clone)]
pub struct ScheduleStatus {
    pub enabled: bool,
    pub running: bool,
    pub weekly_archival_enabled: bool,
    pub monthly_cleanup_enabled: bool,
    pub weekly_report_enabled: bool,
    pub last_job_results: Vec<JobResult>,
}

pub struct HealthScheduler {
    jobs: Arc<HealthMaintenanceJobs>,
    config_path: PathBuf,
    config: Arc<RwLock<HealthScheduleConfig>>,
    scheduler: Mutex<Option<JobScheduler>>,
}

impl HealthScheduler {
    pub async fn new(jobs: Arc<HealthMaintenanceJobs>, config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let config = load_config_from_file(&config_path).await;
        Self {
            jobs,
            config_path,
            config: Arc::new(RwLock::new(config)),
            scheduler: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    pub async fn config(&self) -> HealthScheduleConfig {
        *self.config.read().await
    }

    /// Installs the configured cron jobs. A no-op returning `false` if
    /// disabled or already running.
    pub async fn start(&self) -> Result<bool> {
        let snapshot = *self.config.read().await;
        if !snapshot.enabled {
            return Ok(false);
        }
        if self.is_running().await {
            return Ok(false);
        }

        let sched = JobScheduler::new().await.map_err(|e| Error::Indexing(format!("cron scheduler init failed: {e}")))?;

        if snapshot.weekly_archival.enabled {
            let jobs = self.jobs.clone();
            let expr = weekly_cron(snapshot.weekly_archival.day, snapshot.weekly_archival.time);
            let job = Job::new_async(expr.as_str(), move |_uuid, _l| {
                let jobs = jobs.clone();
                Box::pin(async move {
                    jobs.weekly_archival_job(false).await;
                })
            })
            .map_err(|e| Error::Indexing(format!("cron job creation failed: {e}")))?;
            sched.add(job).await.map_err(|e| Error::Indexing(format!("cron job registration failed: {e}")))?;
        }

        if snapshot.monthly_cleanup.enabled {
            let jobs = self.jobs.clone();
            let threshold_days = snapshot.monthly_cleanup.threshold_days;
            let expr = monthly_cron(snapshot.monthly_cleanup.day, snapshot.monthly_cleanup.time);
            let job = Job::new_async(expr.as_str(), move |_uuid, _l| {
                let jobs = jobs.clone();
                Box::pin(async move {
                    jobs.monthly_cleanup_job(false, threshold_days).await;
                })
            })
            .map_err(|e| Error::Indexing(format!("cron job creation failed: {e}")))?;
            sched.add(job).await.map_err(|e| Error::Indexing(format!("cron job registration failed: {e}")))?;
        }

        if snapshot.weekly_report.enabled {
            let jobs = self.jobs.clone();
            let expr = weekly_cron(snapshot.weekly_report.day, snapshot.weekly_report.time);
            let job = Job::new_async(expr.as_str(), move |_uuid, _l| {
                let jobs = jobs.clone();
                Box::pin(async move {
                    jobs.weekly_health_report_job().await;
                })
            })
            .map_err(|e| Error::Indexing(format!("cron job creation failed: {e}")))?;
            sched.add(job).await.map_err(|e| Error::Indexing(format!("cron job registration failed: {e}")))?;
        }

        sched.start().await.map_err(|e| Error::Indexing(format!("cron scheduler start failed: {e}")))?;
        *self.scheduler.lock().await = Some(sched);
        Ok(true)
    }

    /// Cancels all installed jobs. A no-op returning `false` if not running.
    pub async fn stop(&self) -> Result<bool> {
        let mut guard = self.scheduler.lock().await;
        let Some(sched) = guard.take() else {
            return Ok(false);
        };
        drop(sched.shutdown().await);
        Ok(true)
    }

    /// Stop-then-start so the new config's triggers replace the old ones
    /// immediately, per spec.md §4.C12.
    pub async fn update_config(&self, new_config: HealthScheduleConfig) -> Result<()> {
        let was_running = self.is_running().await;
        if was_running {
            self.stop().await?;
        }
        *self.config.write().await = new_config;
        save_config_to_file(&self.config_path, &new_config).await?;
        if was_running && new_config.enabled {
            self.start().await?;
        }
        Ok(())
    }

    /// Runs the archival job directly, regardless of whether the scheduler
    /// is running.
    pub async fn trigger_archival_now(&self, dry_run: bool) -> JobResult {
        self.jobs.weekly_archival_job(dry_run).await
    }

    /// Runs the cleanup job directly, using the configured threshold.
    pub async fn trigger_cleanup_now(&self, dry_run: bool) -> JobResult {
        let threshold_days = self.config.read().await.monthly_cleanup.threshold_days;
        self.jobs.monthly_cleanup_job(dry_run, threshold_days).await
    }

    /// Runs the health report job directly.
    pub async fn trigger_report_now(&self) -> JobResult {
        self.jobs.weekly_health_report_job().await
    }

    pub async fn get_status(&self) -> ScheduleStatus {
        let config = *self.config.read().await;
        ScheduleStatus {
            enabled: config.enabled,
            running: self.is_running().await,
            weekly_archival_enabled: config.weekly_archival.enabled,
            monthly_cleanup_enabled: config.monthly_cleanup.enabled,
            weekly_report_enabled: config.weekly_report.enabled,
            last_job_results: self.jobs.get_job_history(10),
        }
    }

    #[must_use]
    pub fn get_job_history(&self, limit: usize) -> Vec<JobResult> {
        self.jobs.get_job_history(limit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthScorer;
    use crate::storage::in_memory::InMemoryStore;
    use crate::storage::MemoryStore;
    use crate::types::{HealthThresholds, LifecycleConfig};
    use tempfile::tempdir;

    async fn scheduler() -> (HealthScheduler, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
        store.initialize().await.unwrap();
        let jobs = Arc::new(HealthMaintenanceJobs::new(
            store,
            LifecycleConfig::default(),
            HealthScorer::new(HealthThresholds::default()),
        ));
        let path = dir.path().join("health_schedule.json");
        (HealthScheduler::new(jobs, path).await, dir)
    }

    #[tokio::test]
    async fn loads_default_config_when_file_absent() {
        let (sched, _dir) = scheduler().await;
        let config = sched.config().await;
        assert!(!config.enabled);
        assert!(config.weekly_archival.enabled);
    }

    #[tokio::test]
    async fn disabled_config_start_is_a_noop() {
        let (sched, _dir) = scheduler().await;
        assert!(!sched.start().await.unwrap());
        assert!(!sched.is_running().await);
    }

    #[tokio::test]
    async fn enabling_and_starting_installs_jobs() {
        let (sched, _dir) = scheduler().await;
        let mut config = sched.config().await;
        config.enabled = true;
        sched.update_config(config).await.unwrap();
        assert!(sched.start().await.unwrap());
        assert!(sched.is_running().await);
        sched.stop().await.unwrap();
        assert!(!sched.is_running().await);
    }

    #[tokio::test]
    async fn manual_triggers_do_not_require_running_scheduler() {
        let (sched, _dir) = scheduler().await;
        assert!(!sched.is_running().await);
        let result = sched.trigger_report_now().await;
        assert!(result.success);
    }

    #[tokio::test]
    async fn update_config_persists_to_disk() {
        let (sched, dir) = scheduler().await;
        let mut config = sched.config().await;
        config.enabled = true;
        config.monthly_cleanup.threshold_days = 200;
        sched.update_config(config).await.unwrap();

        let path = dir.path().join("health_schedule.json");
        let reloaded = load_config_from_file(&path).await;
        assert!(reloaded.enabled);
        assert_eq!(reloaded.monthly_cleanup.threshold_days, 200);
    }

    #[test]
    fn weekly_cron_maps_day_to_weekday_name() {
        assert_eq!(weekly_cron(0, (9, 0)), "0 0 9 * * MON");
        assert_eq!(weekly_cron(6, (1, 0)), "0 0 1 * * SUN");
    }

    #[test]
    fn monthly_cron_uses_day_of_month() {
        assert_eq!(monthly_cron(1, (2, 0)), "0 0 2 1 * *");
    }
}
