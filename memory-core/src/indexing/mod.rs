//! # Incremental Indexer (C4)
//!
//! Applies parse → embed → store for one file or a directory tree.
//! Grounded in `original_source/src/memory/indexing_service.py`. Stable ids
//! are derived from `(project_name, file_path, unit_name, start_line)` via
//! UUIDv5, so re-indexing unchanged units is a no-op upsert rather than a
//! delete-then-recreate, and a concurrent reader never observes a window
//! where a still-existing unit is missing (upsert happens-before delete,
//! per spec.md §4.C4).

use crate::embeddings::EmbeddingPipeline;
use crate::parsing;
use crate::storage::MemoryStore;
use crate::types::{Category, ContextLevel, LifecycleState, MemoryUnit, SemanticUnit};
use crate::{Error, Result};
use chrono::Utc;
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

/// Fixed namespace for deriving stable unit ids; any stable value works,
/// this one simply avoids colliding with the standard namespaces.
const UNIT_ID_NAMESPACE: Uuid = Uuid::from_bytes([
    0x4d, 0x65, 0x6d, 0x6f, 0x72, 0x79, 0x55, 0x6e, 0x69, 0x74, 0x4e, 0x53, 0x70, 0x61, 0x63, 0x65,
]);

/// Deterministic id for a code unit, stable across re-indexing runs as long
/// as its `(project, file, name, start_line)` identity doesn't change.
#[must_use]
pub fn stable_unit_id(project_name: &str, file_path: &str, unit_name: &str, start_line: usize) -> Uuid {
    let key = format!("{project_name}\u{0}{file_path}\u{0}{unit_name}\u{0}{start_line}");
    Uuid::new_v5(&UNIT_ID_NAMESPACE, key.as_bytes())
}

/// Outcome of indexing a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexFileResult {
    pub units_indexed: usize,
    pub parse_time_ms: u64,
    pub skipped: bool,
}

/// Aggregate counters from `index_directory`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexDirectoryResult {
    pub files_indexed: usize,
    pub files_skipped: usize,
    pub units_indexed: usize,
    pub files_failed: usize,
}

pub struct IncrementalIndexer {
    store: Arc<dyn MemoryStore>,
    pipeline: EmbeddingPipeline,
    project_name: String,
    max_concurrency: usize,
}

impl IncrementalIndexer {
    #[must_use]
    pub fn new(
        store: Arc<dyn MemoryStore>,
        pipeline: EmbeddingPipeline,
        project_name: String,
        max_concurrency: usize,
    ) -> Self {
        Self {
            store,
            pipeline,
            project_name,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Parse, embed, and upsert one file's units; then delete any
    /// previously-stored units for the same path whose id fell out of the
    /// new set. Files with no registered parser are reported `skipped`.
    pub async fn index_file(&self, path: &Path) -> Result<IndexFileResult> {
        if !parsing::can_parse(path) {
            return Ok(IndexFileResult {
                units_indexed: 0,
                parse_time_ms: 0,
                skipped: true,
            });
        }
        let started = std::time::Instant::now();
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Indexing(format!("failed to read {}: {e}", path.display())))?;
        let semantic_units = {
            let path = path.to_path_buf();
            tokio::task::spawn_blocking(move || parsing::parse_file(&path, &content))
                .await
                .map_err(|e| Error::Indexing(format!("parser task panicked: {e}")))??
        };
        let parse_time_ms = started.elapsed().as_millis() as u64;

        let file_path = path.to_string_lossy().to_string();
        let new_ids: Vec<Uuid> = semantic_units
            .iter()
            .map(|u| stable_unit_id(&self.project_name, &file_path, &u.unit_name, u.start_line))
            .collect();

        if !semantic_units.is_empty() {
            let texts: Vec<String> = semantic_units.iter().map(|u| u.content.clone()).collect();
            let embeddings = self.pipeline.embed_batch(&texts).await?;
            let units: Vec<MemoryUnit> = semantic_units
                .iter()
                .zip(new_ids.iter())
                .zip(embeddings.into_iter())
                .map(|((unit, id), embedding)| to_memory_unit(*id, unit, &self.project_name, embedding))
                .collect();
            // Upsert before delete: a concurrent query never observes a
            // moment where a still-current unit is absent.
            self.store.upsert_many(units).await?;
        }

        let removed_ids = self.stale_ids_for_file(&file_path, &new_ids).await?;
        for id in removed_ids {
            self.store.delete(id).await?;
        }

        Ok(IndexFileResult {
            units_indexed: semantic_units.len(),
            parse_time_ms,
            skipped: false,
        })
    }

    async fn stale_ids_for_file(&self, file_path: &str, keep: &[Uuid]) -> Result<Vec<Uuid>> {
        let existing = self
            .store
            .list_indexed_units(
                Some(&self.project_name),
                None,
                None,
                crate::storage::Page::default(),
            )
            .await?;
        Ok(existing
            .into_iter()
            .filter(|u| u.file_path() == Some(file_path) && !keep.contains(&u.id))
            .map(|u| u.id)
            .collect())
    }

    /// Remove every stored unit whose `file_path` metadata equals `path`.
    /// A no-op (returns 0) when nothing is stored for that path.
    pub async fn delete_file_index(&self, path: &Path) -> Result<usize> {
        let file_path = path.to_string_lossy().to_string();
        let existing = self
            .store
            .list_indexed_units(
                Some(&self.project_name),
                None,
                None,
                crate::storage::Page::default(),
            )
            .await?;
        let mut removed = 0usize;
        for unit in existing {
            if unit.file_path() == Some(file_path.as_str()) {
                self.store.delete(unit.id).await?;
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Enumerate files under `root` (optionally recursive), index each with
    /// bounded concurrency, and report aggregate counters. `progress_cb` is
    /// called after every file completes (success, skip, or failure).
    pub async fn index_directory<F>(
        &self,
        root: &Path,
        recursive: bool,
        progress_cb: F,
    ) -> Result<IndexDirectoryResult>
    where
        F: Fn(usize, usize) + Send + Sync + 'static,
    {
        let files = enumerate_files(root, recursive)?;
        let total = files.len();
        let progress_cb = Arc::new(progress_cb);
        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.max_concurrency));
        let completed = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut tasks = Vec::with_capacity(files.len());
        for file in files {
            let permit = Arc::clone(&semaphore);
            let progress_cb = Arc::clone(&progress_cb);
            let completed = Arc::clone(&completed);
            let store = Arc::clone(&self.store);
            let pipeline = self.pipeline.clone();
            let project_name = self.project_name.clone();
            let max_concurrency = self.max_concurrency;
            tasks.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let indexer = IncrementalIndexer::new(store, pipeline, project_name, max_concurrency);
                let result = indexer.index_file(&file).await;
                let done = completed.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                progress_cb(done, total);
                result
            }));
        }

        let mut aggregate = IndexDirectoryResult::default();
        for task in tasks {
            match task.await {
                Ok(Ok(result)) => {
                    if result.skipped {
                        aggregate.files_skipped += 1;
                    } else {
                        aggregate.files_indexed += 1;
                        aggregate.units_indexed += result.units_indexed;
                    }
                }
                Ok(Err(_)) | Err(_) => aggregate.files_failed += 1,
            }
        }
        Ok(aggregate)
    }
}

fn to_memory_unit(id: Uuid, unit: &SemanticUnit, project_name: &str, embedding: Vec<f32>) -> MemoryUnit {
    let now = Utc::now();
    let mut metadata = std::collections::HashMap::new();
    metadata.insert("file_path".to_string(), json!(unit.file_path));
    metadata.insert("language".to_string(), json!(unit.language));
    metadata.insert("unit_name".to_string(), json!(unit.unit_name));
    metadata.insert("unit_type".to_string(), json!(unit.unit_type));
    metadata.insert("start_line".to_string(), json!(unit.start_line));
    metadata.insert("end_line".to_string(), json!(unit.end_line));
    if let Some(signature) = &unit.signature {
        metadata.insert("signature".to_string(), json!(signature));
    }
    MemoryUnit {
        id,
        content: unit.content.clone(),
        embedding,
        category: Category::CodeUnit,
        context_level: ContextLevel::ProjectContext,
        lifecycle_state: LifecycleState::Active,
        project_name: Some(project_name.to_string()),
        created_at: now,
        last_accessed: now,
        use_count: 0,
        metadata,
    }
}

fn enumerate_files(root: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
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
                if recursive {
                    stack.push(path);
                }
                continue;
            }
            if parsing::can_parse(&path) {
                out.push(path);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::provider::HashingEmbeddingProvider;
    use crate::storage::in_memory::InMemoryStore;

    fn indexer(store: Arc<dyn MemoryStore>) -> IncrementalIndexer {
        let pipeline = EmbeddingPipeline::new(Arc::new(HashingEmbeddingProvider::new(32)), None);
        IncrementalIndexer::new(store, pipeline, "demo".to_string(), 4)
    }

    #[tokio::test]
    async fn scenario_s1_single_file_index_round_trip() {
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
        let indexer = indexer(Arc::clone(&store));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("auth.py");
        std::fs::write(&file, "def authenticate(user):\n    return validate(user)\n").unwrap();

        let result = indexer.index_file(&file).await.unwrap();
        assert_eq!(result.units_indexed, 1);
        assert!(!result.skipped);

        let units = store.get_all_memories().await.unwrap();
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].metadata.get("unit_name").unwrap(), "authenticate");
        assert_eq!(units[0].metadata.get("start_line").unwrap(), 1);
        let first_id = units[0].id;

        std::fs::write(
            &file,
            "def authenticate(user, password):\n    return validate(user, password)\n",
        )
        .unwrap();
        let result2 = indexer.index_file(&file).await.unwrap();
        assert_eq!(result2.units_indexed, 1);

        let units2 = store.get_all_memories().await.unwrap();
        assert_eq!(units2.len(), 1);
        assert_eq!(units2[0].id, first_id);
        let signature = units2[0].metadata.get("signature").unwrap().as_str().unwrap();
        assert!(signature.contains("password"));
    }

    #[tokio::test]
    async fn unparseable_extension_is_skipped() {
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
        let indexer = indexer(store);
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("readme.md");
        std::fs::write(&file, "# hi").unwrap();
        let result = indexer.index_file(&file).await.unwrap();
        assert!(result.skipped);
        assert_eq!(result.units_indexed, 0);
    }

    #[tokio::test]
    async fn removing_a_unit_from_source_deletes_it_from_the_store() {
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
        let indexer = indexer(Arc::clone(&store));
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.py");
        std::fs::write(&file, "def a():\n    pass\n\ndef b():\n    pass\n").unwrap();
        indexer.index_file(&file).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 2);

        std::fs::write(&file, "def a():\n    pass\n").unwrap();
        indexer.index_file(&file).await.unwrap();
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn delete_file_index_on_unindexed_path_is_a_no_op() {
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
        let indexer = indexer(store);
        let removed = indexer.delete_file_index(Path::new("/nope.py")).await.unwrap();
        assert_eq!(removed, 0);
    }

    #[tokio::test]
    async fn index_directory_aggregates_counts_and_skips_non_recursive_subdirs() {
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
        let indexer = indexer(Arc::clone(&store));
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.py"), "def a():\n    pass\n").unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("b.py"), "def b():\n    pass\n").unwrap();

        let result = indexer.index_directory(dir.path(), false, |_, _| {}).await.unwrap();
        assert_eq!(result.files_indexed, 1);
        assert_eq!(result.units_indexed, 1);

        let result_recursive = indexer.index_directory(dir.path(), true, |_, _| {}).await.unwrap();
        assert_eq!(result_recursive.files_indexed, 2);
    }

    #[tokio::test]
    async fn empty_directory_indexes_nothing() {
        let store: Arc<dyn MemoryStore> = Arc::new(InMemoryStore::new());
        let indexer = indexer(store);
        let dir = tempfile::tempdir().unwrap();
        let result = indexer.index_directory(dir.path(), true, |_, _| {}).await.unwrap();
        assert_eq!(result.files_indexed, 0);
        assert_eq!(result.units_indexed, 0);
    }
}
