//! # Cross-Project Gateway (C8)
//!
//! Consent-guarded fan-out of a query across opted-in projects, merge +
//! re-rank. Grounded in `original_source/src/memory/cross_project_search.py`.
//! The consent manager is a narrow trait (spec.md §9 "dynamic dispatch":
//! a capability interface, not type-erased branching) so `memory-cli` can
//! swap in a persisted implementation without this module knowing about
//! storage.

use crate::search::engine::{SearchEngine, SearchFilters, SearchMode, SearchResult};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Per-project opt-in/opt-out bookkeeping for cross-project search.
#[async_trait]
pub trait ConsentManager: Send + Sync {
    async fn opt_in(&self, project_name: &str) -> Result<()>;
    async fn opt_out(&self, project_name: &str) -> Result<()>;
    async fn list_opted_in(&self) -> Result<Vec<String>>;
}

/// An in-process `ConsentManager`, the default when no persisted store is
/// configured.
#[derive(Default)]
pub struct InMemoryConsentManager {
    opted_in: parking_lot::RwLock<HashSet<String>>,
}

impl InMemoryConsentManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConsentManager for InMemoryConsentManager {
    async fn opt_in(&self, project_name: &str) -> Result<()> {
        self.opted_in.write().insert(project_name.to_string());
        Ok(())
    }

    async fn opt_out(&self, project_name: &str) -> Result<()> {
        self.opted_in.write().remove(project_name);
        Ok(())
    }

    async fn list_opted_in(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.opted_in.read().iter().cloned().collect();
        names.sort();
        Ok(names)
    }
}

/// Gateway-level counters, bumped on every opt-in/opt-out call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GatewayStats {
    pub opt_ins: u64,
    pub opt_outs: u64,
}

/// Outcome of `search_all_projects`.
#[derive(Debug, Clone)]
pub struct CrossProjectResponse {
    pub status: &'static str,
    pub results: Vec<(String, SearchResult)>,
    pub projects_searched: Vec<String>,
    pub projects_failed: Vec<String>,
}

pub struct CrossProjectGateway {
    consent: Option<Arc<dyn ConsentManager>>,
    stats: parking_lot::Mutex<GatewayStats>,
    max_concurrency: usize,
}

impl CrossProjectGateway {
    #[must_use]
    pub fn new(consent: Option<Arc<dyn ConsentManager>>, max_concurrency: usize) -> Self {
        Self {
            consent,
            stats: parking_lot::Mutex::new(GatewayStats::default()),
            max_concurrency: max_concurrency.max(1),
        }
    }

    #[must_use]
    pub fn stats(&self) -> GatewayStats {
        *self.stats.lock()
    }

    pub async fn opt_in_cross_project(&self, project_name: &str) -> Result<()> {
        if let Some(consent) = &self.consent {
            consent.opt_in(project_name).await?;
        }
        self.stats.lock().opt_ins += 1;
        Ok(())
    }

    pub async fn opt_out_cross_project(&self, project_name: &str) -> Result<()> {
        if let Some(consent) = &self.consent {
            consent.opt_out(project_name).await?;
        }
        self.stats.lock().opt_outs += 1;
        Ok(())
    }

    pub async fn list_opted_in_projects(&self) -> Result<Vec<String>> {
        match &self.consent {
            Some(consent) => consent.list_opted_in().await,
            None => Ok(Vec::new()),
        }
    }

    /// Fan out `query` to every opted-in project's `SearchEngine`, merge
    /// and re-rank. Refuses with `status = "disabled"` if no consent
    /// manager is configured at all. A per-project search failure is
    /// logged and skipped; the whole call only fails if every project
    /// failed.
    pub async fn search_all_projects(
        &self,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
        project_engines: &std::collections::HashMap<String, Arc<SearchEngine>>,
    ) -> Result<CrossProjectResponse> {
        let Some(consent) = &self.consent else {
            return Ok(CrossProjectResponse {
                status: "disabled",
                results: Vec::new(),
                projects_searched: Vec::new(),
                projects_failed: Vec::new(),
            });
        };
        let opted_in = consent.list_opted_in().await?;

        let semaphore = Arc::new(tokio::sync::Semaphore::new(self.max_concurrency));
        let mut tasks = Vec::new();
        for project in opted_in {
            let Some(engine) = project_engines.get(&project).cloned() else {
                continue;
            };
            let permit = Arc::clone(&semaphore);
            let query = query.to_string();
            let filters = filters.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit.acquire_owned().await.expect("semaphore not closed");
                let result = engine
                    .search_code(SearchMode::Semantic, &query, limit, &filters, false)
                    .await;
                (project, result)
            }));
        }

        let mut merged = Vec::new();
        let mut searched = Vec::new();
        let mut failed = Vec::new();
        for task in tasks {
            match task.await {
                Ok((project, Ok(response))) => {
                    searched.push(project.clone());
                    for result in response.results {
                        merged.push((project.clone(), result));
                    }
                }
                Ok((project, Err(e))) => {
                    tracing::warn!(project, error = %e, "cross-project search failed for project");
                    failed.push(project);
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cross-project search task panicked");
                }
            }
        }

        if searched.is_empty() && !failed.is_empty() {
            return Err(crate::Error::Retrieval(
                "cross-project search failed for every opted-in project".to_string(),
            ));
        }

        if let Some(pattern) = &filters.file_pattern {
            merged.retain(|(_, r)| r.unit.file_path().is_some_and(|p| p.contains(pattern.as_str())));
        }
        if let Some(language) = &filters.language {
            merged.retain(|(_, r)| {
                r.unit.metadata.get("language").and_then(|v| v.as_str()) == Some(language.as_str())
            });
        }
        merged.sort_by(|a, b| b.1.final_score.total_cmp(&a.1.final_score));
        merged.truncate(limit);

        Ok(CrossProjectResponse {
            status: "success",
            results: merged,
            projects_searched: searched,
            projects_failed: failed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_without_consent_manager() {
        let gateway = CrossProjectGateway::new(None, 4);
        let response = gateway
            .search_all_projects("x", 10, &SearchFilters::default(), &std::collections::HashMap::new())
            .await
            .unwrap();
        assert_eq!(response.status, "disabled");
    }

    #[tokio::test]
    async fn opt_in_and_list() {
        let gateway = CrossProjectGateway::new(Some(Arc::new(InMemoryConsentManager::new())), 4);
        gateway.opt_in_cross_project("proj-a").await.unwrap();
        gateway.opt_in_cross_project("proj-b").await.unwrap();
        let projects = gateway.list_opted_in_projects().await.unwrap();
        assert_eq!(projects, vec!["proj-a".to_string(), "proj-b".to_string()]);
        assert_eq!(gateway.stats().opt_ins, 2);
    }

    #[tokio::test]
    async fn opt_out_removes_project() {
        let gateway = CrossProjectGateway::new(Some(Arc::new(InMemoryConsentManager::new())), 4);
        gateway.opt_in_cross_project("proj-a").await.unwrap();
        gateway.opt_out_cross_project("proj-a").await.unwrap();
        assert!(gateway.list_opted_in_projects().await.unwrap().is_empty());
        assert_eq!(gateway.stats().opt_outs, 1);
    }
}
