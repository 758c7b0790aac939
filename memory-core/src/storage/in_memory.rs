//! An in-process `MemoryStore` and `KeywordIndex`, used by unit/integration
//! tests and as a minimal default `KeywordIndex` for `memory-cli` when no
//! dedicated lexical index is configured.

use super::{IndexedFile, KeywordHit, KeywordIndex, MemoryFilters, MemoryStore, Page};
use crate::embeddings::similarity::cosine_similarity;
use crate::search::fuzzy::fuzzy_match;
use crate::types::{LifecycleState, MemoryUnit};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use uuid::Uuid;

/// A brute-force, in-memory `MemoryStore`. Not meant for production use —
/// `memory-storage-redb` is the persisted equivalent — but it implements the
/// exact same trait, so it is useful both in tests and as a document of the
/// contract a real backend must honour.
#[derive(Default)]
pub struct InMemoryStore {
    units: RwLock<HashMap<Uuid, MemoryUnit>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MemoryStore for InMemoryStore {
    async fn initialize(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    async fn store(&self, unit: MemoryUnit) -> Result<Uuid> {
        let id = unit.id;
        self.units.write().insert(id, unit);
        Ok(id)
    }

    async fn retrieve(
        &self,
        query_embedding: &[f32],
        limit: usize,
        filters: &MemoryFilters,
    ) -> Result<Vec<(MemoryUnit, f32)>> {
        let units = self.units.read();
        let mut scored: Vec<(MemoryUnit, f32)> = units
            .values()
            .filter(|u| filters.matches(u))
            .map(|u| (u.clone(), cosine_similarity(query_embedding, &u.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(limit);
        Ok(scored)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MemoryUnit>> {
        Ok(self.units.read().get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        self.units.write().remove(&id);
        Ok(())
    }

    async fn delete_code_units_by_project(&self, project_name: &str) -> Result<usize> {
        let mut units = self.units.write();
        let before = units.len();
        units.retain(|_, u| {
            !(u.category == crate::types::Category::CodeUnit
                && u.project_name.as_deref() == Some(project_name))
        });
        Ok(before - units.len())
    }

    async fn update_lifecycle_state(&self, id: Uuid, state: LifecycleState) -> Result<()> {
        let mut units = self.units.write();
        match units.get_mut(&id) {
            Some(unit) => {
                unit.lifecycle_state = state;
                Ok(())
            }
            None => Err(Error::NotFound(format!("memory unit {id}"))),
        }
    }

    async fn record_access(&self, id: Uuid) -> Result<()> {
        let mut units = self.units.write();
        match units.get_mut(&id) {
            Some(unit) => {
                unit.record_access();
                Ok(())
            }
            None => Err(Error::NotFound(format!("memory unit {id}"))),
        }
    }

    async fn get_all_memories(&self) -> Result<Vec<MemoryUnit>> {
        Ok(self.units.read().values().cloned().collect())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.units.read().len())
    }

    async fn count_by_lifecycle(&self, state: LifecycleState) -> Result<usize> {
        Ok(self
            .units
            .read()
            .values()
            .filter(|u| u.lifecycle_state == state)
            .count())
    }

    async fn get_indexed_files(
        &self,
        project_name: Option<&str>,
        page: Page,
    ) -> Result<Vec<IndexedFile>> {
        let units = self.units.read();
        let mut by_file: HashMap<String, (Option<String>, usize)> = HashMap::new();
        for unit in units.values() {
            if let Some(project) = project_name {
                if unit.project_name.as_deref() != Some(project) {
                    continue;
                }
            }
            if let Some(path) = unit.file_path() {
                let entry = by_file
                    .entry(path.to_string())
                    .or_insert((unit.project_name.clone(), 0));
                entry.1 += 1;
            }
        }
        let mut files: Vec<IndexedFile> = by_file
            .into_iter()
            .map(|(file_path, (project_name, unit_count))| IndexedFile {
                file_path,
                project_name,
                unit_count,
            })
            .collect();
        files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        let limit = if page.limit == 0 {
            files.len()
        } else {
            page.limit
        };
        Ok(files.into_iter().skip(page.offset).take(limit).collect())
    }

    async fn list_indexed_units(
        &self,
        project_name: Option<&str>,
        language: Option<&str>,
        unit_type: Option<&str>,
        page: Page,
    ) -> Result<Vec<MemoryUnit>> {
        let units = self.units.read();
        let mut matched: Vec<MemoryUnit> = units
            .values()
            .filter(|u| {
                project_name.is_none_or(|p| u.project_name.as_deref() == Some(p))
                    && language.is_none_or(|l| {
                        u.metadata.get("language").and_then(|v| v.as_str()) == Some(l)
                    })
                    && unit_type.is_none_or(|t| {
                        u.metadata.get("unit_type").and_then(|v| v.as_str()) == Some(t)
                    })
            })
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.id.cmp(&b.id));
        let limit = if page.limit == 0 {
            matched.len()
        } else {
            page.limit
        };
        Ok(matched.into_iter().skip(page.offset).take(limit).collect())
    }

    async fn upsert_many(&self, units: Vec<MemoryUnit>) -> Result<Vec<Uuid>> {
        let mut store = self.units.write();
        let mut ids = Vec::with_capacity(units.len());
        for unit in units {
            ids.push(unit.id);
            store.insert(unit.id, unit);
        }
        Ok(ids)
    }
}

/// A minimal fuzzy-substring `KeywordIndex`, adequate for hybrid search's
/// lexical half without pulling in a full-text-search dependency.
#[derive(Default)]
pub struct InMemoryKeywordIndex {
    docs: RwLock<HashMap<Uuid, MemoryUnit>>,
}

impl InMemoryKeywordIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeywordIndex for InMemoryKeywordIndex {
    async fn index_documents(&self, docs: &[MemoryUnit]) -> Result<()> {
        let mut store = self.docs.write();
        for doc in docs {
            store.insert(doc.id, doc.clone());
        }
        Ok(())
    }

    async fn hybrid_search(&self, query: &str, limit: usize) -> Result<Vec<KeywordHit>> {
        if query.trim().is_empty() {
            return Ok(Vec::new());
        }
        let docs = self.docs.read();
        let mut hits: Vec<KeywordHit> = docs
            .values()
            .filter_map(|doc| {
                fuzzy_match(&doc.content, query, 0.3).map(|score| KeywordHit {
                    memory: doc.clone(),
                    total_score: score as f32,
                })
            })
            .collect();
        hits.sort_by(|a, b| b.total_score.total_cmp(&a.total_score));
        hits.truncate(limit);
        Ok(hits)
    }

    async fn remove_document(&self, id: Uuid) -> Result<()> {
        self.docs.write().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, ContextLevel};
    use std::collections::HashMap as StdHashMap;

    fn unit(content: &str, project: &str) -> MemoryUnit {
        MemoryUnit {
            id: Uuid::new_v4(),
            content: content.to_string(),
            embedding: vec![1.0, 0.0, 0.0],
            category: Category::CodeUnit,
            context_level: ContextLevel::ProjectContext,
            lifecycle_state: LifecycleState::Active,
            project_name: Some(project.to_string()),
            created_at: Utc::now(),
            last_accessed: Utc::now(),
            use_count: 0,
            metadata: StdHashMap::new(),
        }
    }

    #[tokio::test]
    async fn retrieve_ranks_by_cosine_similarity() {
        let store = InMemoryStore::new();
        let mut a = unit("a", "p");
        a.embedding = vec![1.0, 0.0, 0.0];
        let mut b = unit("b", "p");
        b.embedding = vec![0.0, 1.0, 0.0];
        store.store(a.clone()).await.unwrap();
        store.store(b).await.unwrap();

        let results = store
            .retrieve(&[1.0, 0.0, 0.0], 10, &MemoryFilters::default())
            .await
            .unwrap();
        assert_eq!(results[0].0.id, a.id);
    }

    #[tokio::test]
    async fn delete_code_units_by_project_scopes_to_project_and_category() {
        let store = InMemoryStore::new();
        store.store(unit("a", "p1")).await.unwrap();
        store.store(unit("b", "p2")).await.unwrap();
        let removed = store.delete_code_units_by_project("p1").await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn keyword_index_empty_query_returns_nothing() {
        let index = InMemoryKeywordIndex::new();
        index.index_documents(&[unit("hello world", "p")]).await.unwrap();
        let hits = index.hybrid_search("", 10).await.unwrap();
        assert!(hits.is_empty());
    }
}
