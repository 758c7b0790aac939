//! # Bulk Archival + Auto-Archival Scheduler (C16)
//!
//! [`BulkArchiver`] drives [`super::project::ProjectArchivalManager`] over
//! many projects in one call — sequential, capped, dry-run aware, with a
//! per-item progress callback. [`AutoArchiveScheduler`] wraps it in a
//! `tokio-cron-scheduler` job that periodically calls `auto_archive_inactive`
//! on its own cadence, independent of the health scheduler (C12). Grounded
//! in `original_source/src/memory/bulk_archival.py` and
//! `original_source/src/memory/archival_scheduler.py`.

use crate::archival::project::{ArchivalOutcome, ProjectArchivalManager};
use crate::types::{ArchivalScheduleConfig, AutoArchiveSchedule, ProjectLifecycleState};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};

/// Per-project result of a [`BulkArchiver`] batch operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BulkOutcome {
    WouldArchive,
    Archived,
    WouldReactivate,
    Reactivated,
    Skipped,
    Failed,
    Error,
}

#[derive(Debug, Clone)]
pub struct ProjectOutcome {
    pub project_name: String,
    pub outcome: BulkOutcome,
    pub detail: Option<String>,
}

/// Aggregate result of one bulk archive/reactivate/auto-archive call.
#[derive(Debug, Clone)]
pub struct BulkArchivalResult {
    pub dry_run: bool,
    pub total_projects: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub execution_time_seconds: f64,
    pub results: Vec<ProjectOutcome>,
    pub errors: Vec<String>,
}

impl BulkArchivalResult {
    #[must_use]
    pub fn success_rate(&self) -> f64 {
        if self.total_projects == 0 {
            0.0
        } else {
            (self.successful as f64 / self.total_projects as f64) * 100.0
        }
    }

    fn capacity_rejected(dry_run: bool, total: usize, max: usize) -> Self {
        Self {
            dry_run,
            total_projects: total,
            successful: 0,
            failed: 0,
            skipped: total,
            execution_time_seconds: 0.0,
            results: Vec::new(),
            errors: vec![format!("exceeded max projects limit: {total} > {max}")],
        }
    }

    fn empty(dry_run: bool) -> Self {
        Self {
            dry_run,
            total_projects: 0,
            successful: 0,
            failed: 0,
            skipped: 0,
            execution_time_seconds: 0.0,
            results: Vec::new(),
            errors: Vec::new(),
        }
    }
}

/// Invoked as `(project_name, current, total)` before each item is processed.
pub type ProgressCallback<'a> = dyn Fn(&str, usize, usize) + Send + Sync + 'a;

pub struct BulkArchiver {
    archival: Arc<ProjectArchivalManager>,
    max_projects_per_operation: usize,
}

impl BulkArchiver {
    #[must_use]
    pub fn new(archival: Arc<ProjectArchivalManager>, max_projects_per_operation: usize) -> Self {
        Self {
            archival,
            max_projects_per_operation,
        }
    }

    pub async fn bulk_archive_projects(
        &self,
        project_names: &[String],
        dry_run: bool,
        progress_cb: Option<&ProgressCallback<'_>>,
    ) -> Result<BulkArchivalResult> {
        if project_names.len() > self.max_projects_per_operation {
            return Ok(BulkArchivalResult::capacity_rejected(dry_run, project_names.len(), self.max_projects_per_operation));
        }

        let start = Utc::now();
        let mut results = Vec::with_capacity(project_names.len());
        let mut successful = 0usize;
        let mut failed = 0usize;
        let mut skipped = 0usize;
        let mut errors = Vec::new();

        for (idx, name) in project_names.iter().enumerate() {
            if let Some(cb) = progress_cb {
                cb(name, idx + 1, project_names.len());
            }

            let current = match self.archival.get_project_state(name).await {
                Ok(state) => state,
                Err(e) => {
                    failed += 1;
                    errors.push(format!("error archiving {name}: {e}"));
                    results.push(ProjectOutcome {
                        project_name: name.clone(),
                        outcome: BulkOutcome::Error,
                        detail: Some(e.to_string()),
                    });
                    continue;
                }
            };

            if current.state == ProjectLifecycleState::Archived {
                skipped += 1;
                results.push(ProjectOutcome {
                    project_name: name.clone(),
                    outcome: BulkOutcome::Skipped,
                    detail: Some("already archived".to_string()),
                });
                continue;
            }

            if dry_run {
                successful += 1;
                results.push(ProjectOutcome {
                    project_name: name.clone(),
                    outcome: BulkOutcome::WouldArchive,
                    detail: None,
                });
                continue;
            }

            match self.archival.archive_project(name).await {
                Ok(ArchivalOutcome { success: true, .. }) => {
                    successful += 1;
                    results.push(ProjectOutcome {
                        project_name: name.clone(),
                        outcome: BulkOutcome::Archived,
                        detail: None,
                    });
                }
                Ok(ArchivalOutcome { success: false, message }) => {
                    failed += 1;
                    errors.push(format!("failed to archive {name}: {message}"));
                    results.push(ProjectOutcome {
                        project_name: name.clone(),
                        outcome: BulkOutcome::Failed,
                        detail: Some(message),
                    });
                }
                Err(e) => {
                    failed += 1;
                    errors.push(format!("error archiving {name}: {e}"));
                    results.push(ProjectOutcome {
                        project_name: name.clone(),
                        outcome: BulkOutcome::Error,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }

        let execution_time_seconds = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        Ok(BulkArchivalResult {
            dry_run,
            total_projects: project_names.len(),
            successful,
            failed,
            skipped,
            execution_time_seconds,
            results,
            errors,
        })
    }

    pub async fn bulk_reactivate_projects(
        &self,
        project_names: &[String],
        dry_run: bool,
        progress_cb: Option<&ProgressCallback<'_>>,
    ) -> Result<BulkArchivalResult> {
        if project_names.len() > self.max_projects_per_operation {
            return Ok(BulkArchivalResult::capacity_rejected(dry_run, project_names.len(), self.max_projects_per_operation));
        }

        let start = Utc::now();
        let mut results = Vec::with_capacity(project_names.len());
        let mut successful = 0usize;
        let mut failed = 0usize;
        let mut skipped = 0usize;
        let mut errors = Vec::new();

        for (idx, name) in project_names.iter().enumerate() {
            if let Some(cb) = progress_cb {
                cb(name, idx + 1, project_names.len());
            }

            let current = match self.archival.get_project_state(name).await {
                Ok(state) => state,
                Err(e) => {
                    failed += 1;
                    errors.push(format!("error reactivating {name}: {e}"));
                    results.push(ProjectOutcome {
                        project_name: name.clone(),
                        outcome: BulkOutcome::Error,
                        detail: Some(e.to_string()),
                    });
                    continue;
                }
            };

            if current.state != ProjectLifecycleState::Archived {
                skipped += 1;
                results.push(ProjectOutcome {
                    project_name: name.clone(),
                    outcome: BulkOutcome::Skipped,
                    detail: Some(format!("not archived (current state: {:?})", current.state)),
                });
                continue;
            }

            if dry_run {
                successful += 1;
                results.push(ProjectOutcome {
                    project_name: name.clone(),
                    outcome: BulkOutcome::WouldReactivate,
                    detail: None,
                });
                continue;
            }

            match self.archival.reactivate_project(name).await {
                Ok(ArchivalOutcome { success: true, .. }) => {
                    successful += 1;
                    results.push(ProjectOutcome {
                        project_name: name.clone(),
                        outcome: BulkOutcome::Reactivated,
                        detail: None,
                    });
                }
                Ok(ArchivalOutcome { success: false, message }) => {
                    failed += 1;
                    errors.push(format!("failed to reactivate {name}: {message}"));
                    results.push(ProjectOutcome {
                        project_name: name.clone(),
                        outcome: BulkOutcome::Failed,
                        detail: Some(message),
                    });
                }
                Err(e) => {
                    failed += 1;
                    errors.push(format!("error reactivating {name}: {e}"));
                    results.push(ProjectOutcome {
                        project_name: name.clone(),
                        outcome: BulkOutcome::Error,
                        detail: Some(e.to_string()),
                    });
                }
            }
        }

        let execution_time_seconds = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        Ok(BulkArchivalResult {
            dry_run,
            total_projects: project_names.len(),
            successful,
            failed,
            skipped,
            execution_time_seconds,
            results,
            errors,
        })
    }

    /// Archives projects that have been inactive for at least
    /// `days_threshold` (default: the manager's own configured threshold),
    /// capped at `max_projects` (default: this archiver's own cap). Only
    /// `ACTIVE`/`PAUSED` projects are candidates; already-archived/deleted
    /// projects are never re-selected.
    pub async fn auto_archive_inactive(
        &self,
        days_threshold: Option<i64>,
        dry_run: bool,
        max_projects: Option<usize>,
        progress_cb: Option<&ProgressCallback<'_>>,
    ) -> Result<BulkArchivalResult> {
        let threshold = days_threshold.unwrap_or_else(|| self.archival.inactivity_threshold_days());
        let all = self.archival.get_all_projects().await?;
        let now = Utc::now();

        let mut candidates: Vec<String> = all
            .into_iter()
            .filter(|(_, state)| {
                matches!(state.state, ProjectLifecycleState::Active | ProjectLifecycleState::Paused)
                    && (now - state.last_activity).num_seconds() as f64 / 86_400.0 >= threshold as f64
            })
            .map(|(name, _)| name)
            .collect();
        candidates.sort();

        if candidates.is_empty() {
            return Ok(BulkArchivalResult::empty(dry_run));
        }

        let limit = max_projects.unwrap_or(self.max_projects_per_operation);
        if candidates.len() > limit {
            candidates.truncate(limit);
        }

        self.bulk_archive_projects(&candidates, dry_run, progress_cb).await
    }
}

fn cron_expr(schedule: AutoArchiveSchedule) -> &'static str {
    match schedule {
        AutoArchiveSchedule::Daily => "0 0 2 * * *",
        AutoArchiveSchedule::Weekly => "0 0 2 * * SUN",
        AutoArchiveSchedule::Monthly => "0 0 2 1 * *",
    }
}

async fn load_config(path: &std::path::Path) -> ArchivalScheduleConfig {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_default(),
        Err(_) => ArchivalScheduleConfig::default(),
    }
}

async fn save_config(path: &std::path::Path, config: &ArchivalScheduleConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(config)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &json).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Runs `auto_archive_inactive` once with the scheduler's current config and
/// records the outcome; swallows its own errors into `last_result` rather
/// than letting a bad run take the cron job down.
async fn run_scheduled(
    bulk: Arc<BulkArchiver>,
    config: Arc<RwLock<ArchivalScheduleConfig>>,
    last_run: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_result: Arc<RwLock<Option<BulkArchivalResult>>>,
) {
    let snapshot = *config.read().await;
    if !snapshot.enabled {
        return;
    }
    let result = bulk
        .auto_archive_inactive(Some(snapshot.inactivity_days), snapshot.dry_run, Some(snapshot.max_projects_per_run), None)
        .await;
    *last_run.write().await = Some(Utc::now());
    if let Ok(result) = result {
        *last_result.write().await = Some(result);
    }
}

/// Cron-driven wrapper around `BulkArchiver::auto_archive_inactive`,
/// independent of the health scheduler's (C12) own cron jobs.
pub struct AutoArchiveScheduler {
    bulk: Arc<BulkArchiver>,
    config_path: PathBuf,
    config: Arc<RwLock<ArchivalScheduleConfig>>,
    scheduler: Mutex<Option<JobScheduler>>,
    last_run: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_result: Arc<RwLock<Option<BulkArchivalResult>>>,
}

impl AutoArchiveScheduler {
    pub async fn new(bulk: Arc<BulkArchiver>, config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let config = load_config(&config_path).await;
        Self {
            bulk,
            config_path,
            config: Arc::new(RwLock::new(config)),
            scheduler: Mutex::new(None),
            last_run: Arc::new(RwLock::new(None)),
            last_result: Arc::new(RwLock::new(None)),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.scheduler.lock().await.is_some()
    }

    pub async fn config(&self) -> ArchivalScheduleConfig {
        *self.config.read().await
    }

    /// Installs the cron job matching the current config. A no-op returning
    /// `false` if disabled or already running.
    pub async fn start(&self) -> Result<bool> {
        let snapshot = *self.config.read().await;
        if !snapshot.enabled {
            return Ok(false);
        }
        if self.is_running().await {
            return Ok(false);
        }

        let sched = JobScheduler::new().await.map_err(|e| Error::Indexing(format!("cron scheduler init failed: {e}")))?;

        let bulk = self.bulk.clone();
        let config = self.config.clone();
        let last_run = self.last_run.clone();
        let last_result = self.last_result.clone();
        let job = Job::new_async(cron_expr(snapshot.schedule), move |_uuid, _l| {
            let bulk = bulk.clone();
            let config = config.clone();
            let last_run = last_run.clone();
            let last_result = last_result.clone();
            Box::pin(async move {
                run_scheduled(bulk, config, last_run, last_result).await;
            })
        })
        .map_err(|e| Error::Indexing(format!("cron job creation failed: {e}")))?;

        sched.add(job).await.map_err(|e| Error::Indexing(format!("cron job registration failed: {e}")))?;
        sched.start().await.map_err(|e| Error::Indexing(format!("cron scheduler start failed: {e}")))?;
        *self.scheduler.lock().await = Some(sched);
        Ok(true)
    }

    /// Cancels the cron job, if running. A no-op returning `false` otherwise.
    pub async fn stop(&self) -> Result<bool> {
        let mut guard = self.scheduler.lock().await;
        let Some(sched) = guard.take() else {
            return Ok(false);
        };
        drop(sched.shutdown().await);
        Ok(true)
    }

    /// Stop-then-start so a schedule or `enabled` change takes effect
    /// immediately, matching `HealthScheduler::update_config`.
    pub async fn update_config(&self, new_config: ArchivalScheduleConfig) -> Result<()> {
        let was_running = self.is_running().await;
        if was_running {
            self.stop().await?;
        }
        *self.config.write().await = new_config;
        save_config(&self.config_path, &new_config).await?;
        if was_running && new_config.enabled {
            self.start().await?;
        }
        Ok(())
    }

    /// Runs `auto_archive_inactive` immediately with the current config,
    /// independent of whether the cron job is installed.
    pub async fn trigger_now(&self) -> Result<BulkArchivalResult> {
        let snapshot = *self.config.read().await;
        let result = self
            .bulk
            .auto_archive_inactive(Some(snapshot.inactivity_days), snapshot.dry_run, Some(snapshot.max_projects_per_run), None)
            .await?;
        *self.last_run.write().await = Some(Utc::now());
        *self.last_result.write().await = Some(result.clone());
        Ok(result)
    }

    pub async fn last_run(&self) -> Option<DateTime<Utc>> {
        *self.last_run.read().await
    }

    pub async fn last_result(&self) -> Option<BulkArchivalResult> {
        self.last_result.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ActivityKind;
    use tempfile::tempdir;

    async fn archiver(max: usize) -> (Arc<BulkArchiver>, Arc<ProjectArchivalManager>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let mgr = Arc::new(ProjectArchivalManager::new(dir.path().join("project_states.json"), None).await.unwrap());
        (Arc::new(BulkArchiver::new(mgr.clone(), max)), mgr, dir)
    }

    #[tokio::test]
    async fn bulk_archive_over_cap_is_rejected_without_touching_state() {
        let (bulk, mgr, _dir) = archiver(1).await;
        mgr.get_project_state("a").await.unwrap();
        mgr.get_project_state("b").await.unwrap();
        let result = bulk
            .bulk_archive_projects(&["a".to_string(), "b".to_string()], false, None)
            .await
            .unwrap();
        assert_eq!(result.skipped, 2);
        assert!(!result.errors.is_empty());
        let state = mgr.get_project_state("a").await.unwrap();
        assert_eq!(state.state, ProjectLifecycleState::Active);
    }

    #[tokio::test]
    async fn bulk_archive_dry_run_does_not_mutate() {
        let (bulk, mgr, _dir) = archiver(20).await;
        mgr.get_project_state("demo").await.unwrap();
        let result = bulk.bulk_archive_projects(&["demo".to_string()], true, None).await.unwrap();
        assert_eq!(result.successful, 1);
        assert_eq!(result.results[0].outcome, BulkOutcome::WouldArchive);
        let state = mgr.get_project_state("demo").await.unwrap();
        assert_eq!(state.state, ProjectLifecycleState::Active);
    }

    #[tokio::test]
    async fn bulk_archive_skips_already_archived() {
        let (bulk, mgr, _dir) = archiver(20).await;
        mgr.get_project_state("demo").await.unwrap();
        mgr.archive_project("demo").await.unwrap();
        let result = bulk.bulk_archive_projects(&["demo".to_string()], false, None).await.unwrap();
        assert_eq!(result.skipped, 1);
        assert_eq!(result.results[0].outcome, BulkOutcome::Skipped);
    }

    #[tokio::test]
    async fn bulk_reactivate_skips_non_archived() {
        let (bulk, mgr, _dir) = archiver(20).await;
        mgr.get_project_state("demo").await.unwrap();
        let result = bulk.bulk_reactivate_projects(&["demo".to_string()], false, None).await.unwrap();
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn auto_archive_inactive_ignores_recently_active_projects() {
        let (bulk, mgr, _dir) = archiver(20).await;
        mgr.record_activity("demo", ActivityKind::Search, 1).await.unwrap();
        let result = bulk.auto_archive_inactive(Some(30), true, None, None).await.unwrap();
        assert_eq!(result.total_projects, 0);
    }

    #[tokio::test]
    async fn progress_callback_invoked_per_item() {
        let (bulk, mgr, _dir) = archiver(20).await;
        mgr.get_project_state("a").await.unwrap();
        mgr.get_project_state("b").await.unwrap();
        let calls = std::sync::Mutex::new(Vec::new());
        let cb = |name: &str, current: usize, total: usize| {
            calls.lock().unwrap().push((name.to_string(), current, total));
        };
        bulk.bulk_archive_projects(&["a".to_string(), "b".to_string()], true, Some(&cb))
            .await
            .unwrap();
        assert_eq!(calls.lock().unwrap().len(), 2);
    }
}
