#![allow(clippy::excessive_nesting)]

//! # Memory Storage - redb
//!
//! The one concrete [`MemoryStore`] this system ships: a brute-force
//! cosine-similarity scan over a single redb table. redb is an embedded,
//! single-file, ACID key-value store, which is enough for an index that is
//! always rebuildable from the filesystem — this is deliberately framed as
//! a cache layer, not a source of truth.
//!
//! Every redb call is synchronous, so each operation here is dispatched
//! through [`tokio::task::spawn_blocking`] with a timeout, matching the
//! teacher crate's `with_db_timeout` pattern.

use async_trait::async_trait;
use memory_core::embeddings::similarity::cosine_similarity;
use memory_core::storage::{IndexedFile, KeywordHit, KeywordIndex, MemoryFilters, MemoryStore, Page};
use memory_core::types::{LifecycleState, MemoryUnit};
use memory_core::{Error, Result};
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

const UNITS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("memory_units");

const DB_OPERATION_TIMEOUT: Duration = Duration::from_secs(10);

async fn with_db_timeout<T, F>(operation: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(DB_OPERATION_TIMEOUT, tokio::task::spawn_blocking(operation)).await {
        Ok(Ok(result)) => result,
        Ok(Err(join_err)) => Err(Error::Storage(format!("task join error: {join_err}"))),
        Err(_) => Err(Error::Storage(format!(
            "database operation timed out after {DB_OPERATION_TIMEOUT:?}"
        ))),
    }
}

fn decode(bytes: &[u8]) -> Result<MemoryUnit> {
    serde_json::from_slice(bytes).map_err(|e| Error::Storage(format!("corrupt memory unit record: {e}")))
}

fn encode(unit: &MemoryUnit) -> Result<Vec<u8>> {
    serde_json::to_vec(unit).map_err(Error::Serialization)
}

/// A `MemoryStore` backed by a single redb table, keyed by unit id.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Opens (creating if absent) the redb database file at `path`.
    pub async fn new(path: &Path) -> Result<Self> {
        info!("opening redb memory store at {}", path.display());
        let path_buf = path.to_path_buf();
        let db = with_db_timeout(move || {
            Database::create(&path_buf).map_err(|e| Error::Storage(format!("failed to open redb database: {e}")))
        })
        .await?;
        let store = Self { db: Arc::new(db) };
        store.ensure_table().await?;
        Ok(store)
    }

    async fn ensure_table(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            {
                write_txn
                    .open_table(UNITS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open memory_units table: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }

    fn read_all(db: &Database) -> Result<Vec<MemoryUnit>> {
        let read_txn = db
            .begin_read()
            .map_err(|e| Error::Storage(format!("failed to begin read transaction: {e}")))?;
        let table = read_txn
            .open_table(UNITS_TABLE)
            .map_err(|e| Error::Storage(format!("failed to open memory_units table: {e}")))?;
        let mut units = Vec::new();
        for entry in table
            .iter()
            .map_err(|e| Error::Storage(format!("failed to iterate memory_units: {e}")))?
        {
            let (_, value) = entry.map_err(|e| Error::Storage(format!("failed to read memory_units entry: {e}")))?;
            units.push(decode(value.value())?);
        }
        Ok(units)
    }
}

#[async_trait]
impl MemoryStore for RedbStore {
    async fn initialize(&self) -> Result<()> {
        self.ensure_table().await
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn store(&self, unit: MemoryUnit) -> Result<Uuid> {
        let db = Arc::clone(&self.db);
        let id = unit.id;
        let bytes = encode(&unit)?;
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(UNITS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open memory_units table: {e}")))?;
                table
                    .insert(id.to_string().as_str(), bytes.as_slice())
                    .map_err(|e| Error::Storage(format!("failed to insert memory unit: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await?;
        Ok(id)
    }

    async fn retrieve(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filters: &MemoryFilters,
    ) -> Result<Vec<(MemoryUnit, f32)>> {
        let db = Arc::clone(&self.db);
        let query_embedding = query_embedding.to_vec();
        let filters = filters.clone();
        with_db_timeout(move || {
            let units = Self::read_all(&db)?;
            let mut scored: Vec<(MemoryUnit, f32)> = units
                .into_iter()
                .filter(|u| filters.matches(u))
                .map(|u| {
                    let score = cosine_similarity(&query_embedding, &u.embedding);
                    (u, score)
                })
                .collect();
            scored.sort_by(|a, b| b.1.total_cmp(&a.1));
            scored.truncate(limit);
            Ok(scored)
        })
        .await
    }

    async fn get(&self, id: Uuid) -> Result<Option<MemoryUnit>> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("failed to begin read transaction: {e}")))?;
            let table = read_txn
                .open_table(UNITS_TABLE)
                .map_err(|e| Error::Storage(format!("failed to open memory_units table: {e}")))?;
            match table
                .get(id.to_string().as_str())
                .map_err(|e| Error::Storage(format!("failed to read memory unit: {e}")))?
            {
                Some(bytes) => Ok(Some(decode(bytes.value())?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(UNITS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open memory_units table: {e}")))?;
                table
                    .remove(id.to_string().as_str())
                    .map_err(|e| Error::Storage(format!("failed to remove memory unit: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn delete_code_units_by_project(&self, project_name: &str) -> Result<usize> {
        let db = Arc::clone(&self.db);
        let project_name = project_name.to_string();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            let removed;
            {
                let mut table = write_txn
                    .open_table(UNITS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open memory_units table: {e}")))?;
                let mut doomed = Vec::new();
                for entry in table
                    .iter()
                    .map_err(|e| Error::Storage(format!("failed to iterate memory_units: {e}")))?
                {
                    let (key, value) =
                        entry.map_err(|e| Error::Storage(format!("failed to read memory_units entry: {e}")))?;
                    let unit = decode(value.value())?;
                    if unit.category == memory_core::types::Category::CodeUnit
                        && unit.project_name.as_deref() == Some(project_name.as_str())
                    {
                        doomed.push(key.value().to_string());
                    }
                }
                removed = doomed.len();
                for key in doomed {
                    table
                        .remove(key.as_str())
                        .map_err(|e| Error::Storage(format!("failed to remove memory unit: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(removed)
        })
        .await
    }

    async fn update_lifecycle_state(&self, id: Uuid, state: LifecycleState) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(UNITS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open memory_units table: {e}")))?;
                let key = id.to_string();
                let mut unit = match table
                    .get(key.as_str())
                    .map_err(|e| Error::Storage(format!("failed to read memory unit: {e}")))?
                {
                    Some(bytes) => decode(bytes.value())?,
                    None => return Err(Error::NotFound(format!("memory unit {id}"))),
                };
                unit.lifecycle_state = state;
                let bytes = encode(&unit)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| Error::Storage(format!("failed to update memory unit: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn record_access(&self, id: Uuid) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(UNITS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open memory_units table: {e}")))?;
                let key = id.to_string();
                let mut unit = match table
                    .get(key.as_str())
                    .map_err(|e| Error::Storage(format!("failed to read memory unit: {e}")))?
                {
                    Some(bytes) => decode(bytes.value())?,
                    None => return Err(Error::NotFound(format!("memory unit {id}"))),
                };
                unit.record_access();
                let bytes = encode(&unit)?;
                table
                    .insert(key.as_str(), bytes.as_slice())
                    .map_err(|e| Error::Storage(format!("failed to update memory unit: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn get_all_memories(&self) -> Result<Vec<MemoryUnit>> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || Self::read_all(&db)).await
    }

    async fn count(&self) -> Result<usize> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || Ok(Self::read_all(&db)?.len())).await
    }

    async fn count_by_lifecycle(&self, state: LifecycleState) -> Result<usize> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || Ok(Self::read_all(&db)?.into_iter().filter(|u| u.lifecycle_state == state).count()))
            .await
    }

    async fn get_indexed_files(&self, project_name: Option<&str>, page: Page) -> Result<Vec<IndexedFile>> {
        let db = Arc::clone(&self.db);
        let project_name = project_name.map(str::to_string);
        with_db_timeout(move || {
            let units = Self::read_all(&db)?;
            let mut by_file: std::collections::HashMap<String, (Option<String>, usize)> = std::collections::HashMap::new();
            for unit in &units {
                if let Some(project) = &project_name {
                    if unit.project_name.as_deref() != Some(project.as_str()) {
                        continue;
                    }
                }
                if let Some(path) = unit.file_path() {
                    let entry = by_file.entry(path.to_string()).or_insert_with(|| (unit.project_name.clone(), 0));
                    entry.1 += 1;
                }
            }
            let mut files: Vec<IndexedFile> = by_file
                .into_iter()
                .map(|(file_path, (project_name, unit_count))| IndexedFile { file_path, project_name, unit_count })
                .collect();
            files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
            let limit = if page.limit == 0 { files.len() } else { page.limit };
            Ok(files.into_iter().skip(page.offset).take(limit).collect())
        })
        .await
    }

    async fn list_indexed_units(
        &self,
        project_name: Option<&str>,
        language: Option<&str>,
        unit_type: Option<&str>,
        page: Page,
    ) -> Result<Vec<MemoryUnit>> {
        let db = Arc::clone(&self.db);
        let project_name = project_name.map(str::to_string);
        let language = language.map(str::to_string);
        let unit_type = unit_type.map(str::to_string);
        with_db_timeout(move || {
            let mut matched: Vec<MemoryUnit> = Self::read_all(&db)?
                .into_iter()
                .filter(|u| {
                    project_name.as_deref().is_none_or(|p| u.project_name.as_deref() == Some(p))
                        && language
                            .as_deref()
                            .is_none_or(|l| u.metadata.get("language").and_then(|v| v.as_str()) == Some(l))
                        && unit_type
                            .as_deref()
                            .is_none_or(|t| u.metadata.get("unit_type").and_then(|v| v.as_str()) == Some(t))
                })
                .collect();
            matched.sort_by(|a, b| a.id.cmp(&b.id));
            let limit = if page.limit == 0 { matched.len() } else { page.limit };
            Ok(matched.into_iter().skip(page.offset).take(limit).collect())
        })
        .await
    }

    async fn upsert_many(&self, units: Vec<MemoryUnit>) -> Result<Vec<Uuid>> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            let mut ids = Vec::with_capacity(units.len());
            {
                let mut table = write_txn
                    .open_table(UNITS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open memory_units table: {e}")))?;
                for unit in &units {
                    let bytes = encode(unit)?;
                    table
                        .insert(unit.id.to_string().as_str(), bytes.as_slice())
                        .map_err(|e| Error::Storage(format!("failed to upsert memory unit: {e}")))?;
                    ids.push(unit.id);
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(ids)
        })
        .await
    }
}

/// A fuzzy-substring `KeywordIndex` sharing the same redb file, in its own
/// table so hybrid search can run against persisted content rather than the
/// purely in-process index.
pub struct RedbKeywordIndex {
    db: Arc<Database>,
}

const DOCS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("keyword_documents");

impl RedbKeywordIndex {
    pub async fn new(path: &Path) -> Result<Self> {
        let path_buf = path.to_path_buf();
        let db = with_db_timeout(move || {
            Database::create(&path_buf).map_err(|e| Error::Storage(format!("failed to open redb database: {e}")))
        })
        .await?;
        let index = Self { db: Arc::new(db) };
        index.ensure_table().await?;
        Ok(index)
    }

    async fn ensure_table(&self) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            {
                write_txn
                    .open_table(DOCS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open keyword_documents table: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl KeywordIndex for RedbKeywordIndex {
    async fn index_documents(&self, docs: &[MemoryUnit]) -> Result<()> {
        let db = Arc::clone(&self.db);
        let docs = docs.to_vec();
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(DOCS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open keyword_documents table: {e}")))?;
                for doc in &docs {
                    let bytes = encode(doc)?;
                    table
                        .insert(doc.id.to_string().as_str(), bytes.as_slice())
                        .map_err(|e| Error::Storage(format!("failed to index document: {e}")))?;
                }
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }

    async fn hybrid_search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let db = Arc::clone(&self.db);
        let query = query.to_string();
        with_db_timeout(move || {
            let read_txn = db
                .begin_read()
                .map_err(|e| Error::Storage(format!("failed to begin read transaction: {e}")))?;
            let table = read_txn
                .open_table(DOCS_TABLE)
                .map_err(|e| Error::Storage(format!("failed to open keyword_documents table: {e}")))?;
            let mut hits = Vec::new();
            for entry in table
                .iter()
                .map_err(|e| Error::Storage(format!("failed to iterate keyword_documents: {e}")))?
            {
                let (_, value) =
                    entry.map_err(|e| Error::Storage(format!("failed to read keyword_documents entry: {e}")))?;
                let doc = decode(value.value())?;
                if let Some(score) = memory_core::search::fuzzy::fuzzy_match(&doc.content, &query, 0.3) {
                    hits.push(KeywordHit { memory: doc, total_score: score as f32 });
                }
            }
            hits.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
            hits.truncate(limit);
            Ok(hits)
        })
        .await
    }

    async fn remove_document(&self, id: Uuid) -> Result<()> {
        let db = Arc::clone(&self.db);
        with_db_timeout(move || {
            let write_txn = db
                .begin_write()
                .map_err(|e| Error::Storage(format!("failed to begin write transaction: {e}")))?;
            {
                let mut table = write_txn
                    .open_table(DOCS_TABLE)
                    .map_err(|e| Error::Storage(format!("failed to open keyword_documents table: {e}")))?;
                table
                    .remove(id.to_string().as_str())
                    .map_err(|e| Error::Storage(format!("failed to remove document: {e}")))?;
            }
            write_txn
                .commit()
                .map_err(|e| Error::Storage(format!("failed to commit transaction: {e}")))?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory_core::types::{Category, ContextLevel};
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn unit(content: &str, project: &str) -> MemoryUnit {
        MemoryUnit {
            id: Uuid::new_v4(),
            content: content.to_string(),
            embedding: vec![1.0, 0.0, 0.0],
            category: Category::CodeUnit,
            context_level: ContextLevel::ProjectContext,
            lifecycle_state: LifecycleState::Active,
            project_name: Some(project.to_string()),
            created_at: chrono::Utc::now(),
            last_accessed: chrono::Utc::now(),
            use_count: 0,
            metadata: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn store_and_get_round_trips() {
        let dir = tempdir().unwrap();
        let store = RedbStore::new(&dir.path().join("memory.redb")).await.unwrap();
        let u = unit("fn main() {}", "proj");
        let id = store.store(u.clone()).await.unwrap();
        let fetched = store.get(id).await.unwrap().unwrap();
        assert_eq!(fetched.content, u.content);
    }

    #[tokio::test]
    async fn retrieve_ranks_by_cosine_similarity() {
        let dir = tempdir().unwrap();
        let store = RedbStore::new(&dir.path().join("memory.redb")).await.unwrap();
        let mut a = unit("a", "p");
        a.embedding = vec![1.0, 0.0, 0.0];
        let mut b = unit("b", "p");
        b.embedding = vec![0.0, 1.0, 0.0];
        store.store(a.clone()).await.unwrap();
        store.store(b).await.unwrap();

        let results = store.retrieve(&[1.0, 0.0, 0.0], 10, &MemoryFilters::default()).await.unwrap();
        assert_eq!(results[0].0.id, a.id);
    }

    #[tokio::test]
    async fn delete_code_units_by_project_scopes_to_project_and_category() {
        let dir = tempdir().unwrap();
        let store = RedbStore::new(&dir.path().join("memory.redb")).await.unwrap();
        store.store(unit("a", "p1")).await.unwrap();
        store.store(unit("b", "p2")).await.unwrap();
        let removed = store.delete_code_units_by_project("p1").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_lifecycle_state_persists() {
        let dir = tempdir().unwrap();
        let store = RedbStore::new(&dir.path().join("memory.redb")).await.unwrap();
        let u = unit("a", "p");
        let id = store.store(u).await.unwrap();
        store.update_lifecycle_state(id, LifecycleState::Stale).await.unwrap();
        assert_eq!(store.get(id).await.unwrap().unwrap().lifecycle_state, LifecycleState::Stale);
    }

    #[tokio::test]
    async fn update_lifecycle_state_missing_id_not_found() {
        let dir = tempdir().unwrap();
        let store = RedbStore::new(&dir.path().join("memory.redb")).await.unwrap();
        let err = store.update_lifecycle_state(Uuid::new_v4(), LifecycleState::Stale).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn keyword_index_empty_query_returns_nothing() {
        let dir = tempdir().unwrap();
        let index = RedbKeywordIndex::new(&dir.path().join("keywords.redb")).await.unwrap();
        index.index_documents(&[unit("hello world", "p")]).await.unwrap();
        let hits = index.hybrid_search("", 10).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn keyword_index_matches_fuzzy_substring() {
        let dir = tempdir().unwrap();
        let index = RedbKeywordIndex::new(&dir.path().join("keywords.redb")).await.unwrap();
        index.index_documents(&[unit("parse the manifest", "p")]).await.unwrap();
        let hits = index.hybrid_search("manifest", 10).await.unwrap();
        assert_eq!(hits.len(), 1);
    }
}
