//! # Project Index Tracker (C6)
//!
//! Thin persistence layer over `storage::relational`'s
//! `project_index_metadata` table. Grounded in
//! `original_source/src/memory/project_index_tracker.py`. Every method is a
//! single atomic call against the relational store; there are no
//! multi-statement transactions to expose.

use crate::storage::relational::RelationalStore;
use crate::types::ProjectIndexMetadata;
use crate::{Error, Result};
use std::path::Path;
use std::sync::Arc;

pub struct ProjectIndexTracker {
    relational: Arc<RelationalStore>,
}

impl ProjectIndexTracker {
    #[must_use]
    pub fn new(relational: Arc<RelationalStore>) -> Self {
        Self { relational }
    }

    pub async fn is_indexed(&self, project_name: &str) -> Result<bool> {
        Ok(self
            .relational
            .get_project_index_metadata(project_name)
            .await?
            .is_some())
    }

    pub async fn get_metadata(&self, project_name: &str) -> Result<Option<ProjectIndexMetadata>> {
        self.relational.get_project_index_metadata(project_name).await
    }

    /// Create-or-update. Idempotent: calling this twice with the same
    /// arguments leaves the record equal to one call, aside from
    /// `last_indexed_at` moving forward.
    pub async fn update_metadata(
        &self,
        project_name: &str,
        total_files: u64,
        total_units: u64,
        is_watching: bool,
    ) -> Result<ProjectIndexMetadata> {
        self.relational
            .upsert_project_index_metadata(project_name, total_files, total_units, is_watching)
            .await
    }

    pub async fn set_watching(&self, project_name: &str, watching: bool) -> Result<()> {
        self.relational.set_watching(project_name, watching).await
    }

    pub async fn delete_metadata(&self, project_name: &str) -> Result<()> {
        self.relational.delete_project_index_metadata(project_name).await
    }

    /// A project is stale when some file under `path` was modified after
    /// `last_indexed_at`. Unreadable files are skipped rather than failing
    /// the whole check.
    pub async fn is_stale(&self, project_name: &str, path: &Path) -> Result<bool> {
        let Some(metadata) = self.get_metadata(project_name).await? else {
            return Ok(true);
        };
        let last_indexed = metadata.last_indexed_at;
        let max_mtime = max_mtime_under(path)
            .map_err(|e| Error::Indexing(format!("failed to scan {}: {e}", path.display())))?;
        Ok(max_mtime.is_some_and(|mtime| mtime > last_indexed))
    }
}

fn max_mtime_under(root: &Path) -> std::io::Result<Option<chrono::DateTime<chrono::Utc>>> {
    let mut latest: Option<chrono::DateTime<chrono::Utc>> = None;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue, // unreadable directory: skip
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                stack.push(path);
                continue;
            }
            let Ok(meta) = entry.metadata() else {
                continue; // unreadable file: skip
            };
            let Ok(modified) = meta.modified() else {
                continue;
            };
            let modified: chrono::DateTime<chrono::Utc> = modified.into();
            if latest.is_none_or(|l| modified > l) {
                latest = Some(modified);
            }
        }
    }
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn tracker() -> ProjectIndexTracker {
        let relational = Arc::new(RelationalStore::open_in_memory().await.unwrap());
        ProjectIndexTracker::new(relational)
    }

    #[tokio::test]
    async fn unindexed_project_is_not_indexed() {
        let tracker = tracker().await;
        assert!(!tracker.is_indexed("demo").await.unwrap());
    }

    #[tokio::test]
    async fn update_metadata_is_idempotent_modulo_timestamp() {
        let tracker = tracker().await;
        let first = tracker.update_metadata("demo", 10, 20, true).await.unwrap();
        let second = tracker.update_metadata("demo", 10, 20, true).await.unwrap();
        assert_eq!(first.project_name, second.project_name);
        assert_eq!(first.total_files, second.total_files);
        assert_eq!(first.first_indexed_at, second.first_indexed_at);
        assert!(second.last_indexed_at >= first.last_indexed_at);
    }

    #[tokio::test]
    async fn unindexed_project_is_stale() {
        let tracker = tracker().await;
        let dir = tempfile::tempdir().unwrap();
        assert!(tracker.is_stale("demo", dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn project_with_no_newer_files_is_not_stale() {
        let tracker = tracker().await;
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello").unwrap();
        tracker.update_metadata("demo", 1, 1, false).await.unwrap();
        assert!(!tracker.is_stale("demo", dir.path()).await.unwrap());
    }

    #[tokio::test]
    async fn editing_a_file_after_indexing_makes_project_stale() {
        let tracker = tracker().await;
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, "hello").unwrap();
        tracker.update_metadata("demo", 1, 1, false).await.unwrap();
        // Force a visibly later mtime than "now" captured by update_metadata.
        let future = std::time::SystemTime::now() + std::time::Duration::from_secs(5);
        let file_handle = std::fs::File::open(&file).unwrap();
        file_handle.set_modified(future).unwrap();
        assert!(tracker.is_stale("demo", dir.path()).await.unwrap());
    }
}
