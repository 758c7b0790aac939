//! # Storage Capabilities
//!
//! `MemoryStore` and `KeywordIndex` are the two opaque backend capabilities
//! spec.md §6 describes: a vector store and an optional lexical index.
//! Neither is owned by this crate — `memory-storage-redb` is the one
//! concrete `MemoryStore` shipped alongside it, chosen because a brute-force
//! cosine scan over a redb table is adequate at the scale this system
//! targets and keeps the index "a cache that can always be rebuilt from the
//! filesystem" rather than a source of truth.

pub mod in_memory;
pub mod relational;

use crate::types::{Category, MemoryUnit};
use crate::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Filters pushed down to `MemoryStore::retrieve`/`get_all_memories` where
/// the backend supports it; anything left unapplied by the backend is
/// re-applied by the caller (see `search::engine` post-filter step).
#[derive(Debug, Clone, Default)]
pub struct MemoryFilters {
    pub project_name: Option<String>,
    pub language: Option<String>,
    pub category: Option<Category>,
    pub min_importance: Option<f32>,
    pub file_path_contains: Option<String>,
}

impl MemoryFilters {
    /// Whether a stored unit passes every filter that is set.
    #[must_use]
    pub fn matches(&self, unit: &MemoryUnit) -> bool {
        if let Some(project) = &self.project_name {
            if unit.project_name.as_deref() != Some(project.as_str()) {
                return false;
            }
        }
        if let Some(language) = &self.language {
            let matches_language = unit
                .metadata
                .get("language")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|l| l == language);
            if !matches_language {
                return false;
            }
        }
        if let Some(category) = self.category {
            if unit.category != category {
                return false;
            }
        }
        if let Some(file_pattern) = &self.file_path_contains {
            let matches_path = unit.file_path().is_some_and(|p| p.contains(file_pattern));
            if !matches_path {
                return false;
            }
        }
        true
    }
}

/// Pagination window shared by the listing-style store methods.
#[derive(Debug, Clone, Copy, Default)]
pub struct Page {
    pub limit: usize,
    pub offset: usize,
}

/// A distinct indexed file, as reported by `get_indexed_files`.
#[derive(Debug, Clone)]
pub struct IndexedFile {
    pub file_path: String,
    pub project_name: Option<String>,
    pub unit_count: usize,
}

/// The opaque vector store capability. All operations are async so both a
/// truly async backend and a `spawn_blocking`-wrapped embedded database can
/// implement it uniformly.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn initialize(&self) -> Result<()>;
    async fn close(&self) -> Result<()>;

    /// Persist a new unit and return its id.
    async fn store(&self, unit: MemoryUnit) -> Result<Uuid>;

    /// Top-k nearest neighbours of `query_embedding` with filters pushed
    /// down where supported. Returned in descending score order.
    async fn retrieve(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filters: &MemoryFilters,
    ) -> Result<Vec<(MemoryUnit, f32)>>;

    async fn get(&self, id: Uuid) -> Result<Option<MemoryUnit>>;
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Delete every `CodeUnit` belonging to one project; returns the count
    /// removed.
    async fn delete_code_units_by_project(&self, project_name: &str) -> Result<usize>;

    async fn update_lifecycle_state(
        &self,
        id: Uuid,
        state: crate::types::LifecycleState,
    ) -> Result<()>;

    /// Record a use: bump `use_count`, set `last_accessed` to now.
    async fn record_access(&self, id: Uuid) -> Result<()>;

    async fn get_all_memories(&self) -> Result<Vec<MemoryUnit>>;
    async fn count(&self) -> Result<usize>;
    async fn count_by_lifecycle(&self, state: crate::types::LifecycleState) -> Result<usize>;

    async fn get_indexed_files(
        &self,
        project_name: Option<&str>,
        page: Page,
    ) -> Result<Vec<IndexedFile>>;

    async fn list_indexed_units(
        &self,
        project_name: Option<&str>,
        language: Option<&str>,
        unit_type: Option<&str>,
        page: Page,
    ) -> Result<Vec<MemoryUnit>>;

    /// Upsert: units whose id already exists are replaced in place (used by
    /// the incremental indexer's upsert-before-delete ordering).
    async fn upsert_many(&self, units: Vec<MemoryUnit>) -> Result<Vec<Uuid>>;
}

/// A keyword hit from a `KeywordIndex`, paired with its lexical score.
#[derive(Debug, Clone)]
pub struct KeywordHit {
    pub memory: MemoryUnit,
    pub total_score: f32,
}

/// The optional lexical/full-text index capability. Hybrid search falls
/// back to semantic-only when no `KeywordIndex` is configured.
#[async_trait]
pub trait KeywordIndex: Send + Sync {
    /// Idempotent by id: re-indexing a document already present updates it
    /// in place rather than duplicating.
    async fn index_documents(&self, docs: &[MemoryUnit]) -> Result<()>;

    async fn hybrid_search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>>;

    async fn remove_document(&self, id: Uuid) -> Result<()>;
}
