//! # Search Engine (C7)
//!
//! Semantic + hybrid retrieval, filtering, quality scoring, deduplication,
//! and facets. Grounded in `original_source/src/memory/search_engine.py`
//! and `original_source/src/memory/code_search.py`; the lexical half reuses
//! the teacher's own `search::fuzzy` scorer rather than a new dependency.

use crate::constants::defaults;
use crate::embeddings::EmbeddingPipeline;
use crate::lifecycle;
use crate::storage::{KeywordIndex, MemoryFilters, MemoryStore};
use crate::types::config::{LifecycleConfig, SearchConfig};
use crate::types::MemoryUnit;
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Which half of the pipeline produced a result's score, for fusion math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Hybrid,
}

impl std::str::FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "semantic" => Ok(SearchMode::Semantic),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(Error::Validation(format!("unknown search mode: {other}"))),
        }
    }
}

/// Caller-supplied filters, pre-pushdown. `file_pattern` is always
/// post-filtered (a substring match on `file_path`, not pushed down to
/// `MemoryFilters`).
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub file_pattern: Option<String>,
    pub language: Option<String>,
    pub category: Option<crate::types::Category>,
    pub min_importance: Option<f32>,
    pub project_name: Option<String>,
}

impl SearchFilters {
    fn pushdown(&self) -> MemoryFilters {
        MemoryFilters {
            project_name: self.project_name.clone(),
            language: self.language.clone(),
            category: self.category,
            min_importance: self.min_importance,
            file_path_contains: None,
        }
    }
}

/// A ranked search hit.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub unit: MemoryUnit,
    pub semantic_score: f32,
    pub lexical_score: f32,
    pub final_score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    Excellent,
    Good,
    Fair,
    Poor,
    NoResults,
}

impl std::fmt::Display for Quality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Quality::Excellent => "excellent",
            Quality::Good => "good",
            Quality::Fair => "fair",
            Quality::Poor => "poor",
            Quality::NoResults => "no_results",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
    VeryLow,
    None,
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
            Confidence::VeryLow => "very_low",
            Confidence::None => "none",
        };
        write!(f, "{s}")
    }
}

/// Per-result/per-source-document faceting over the result set.
#[derive(Debug, Clone, Default)]
pub struct Facets {
    pub languages: HashMap<String, usize>,
    pub unit_types: HashMap<String, usize>,
    pub files: HashMap<String, usize>,
    pub directories: HashMap<String, usize>,
}

/// Quality assessment returned alongside a result list.
#[derive(Debug, Clone)]
pub struct QualityReport {
    pub quality: Quality,
    pub confidence_per_result: Vec<Confidence>,
    pub matched_keywords: Vec<String>,
    pub suggestions: Vec<String>,
    pub summary: String,
    pub facets: Facets,
    pub refinement_hints: Vec<String>,
    pub did_you_mean: Vec<String>,
}

/// Full response of a `search_code`/`find_similar_code` call.
#[derive(Debug, Clone)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
    pub total_found: usize,
    pub quality_report: QualityReport,
}

pub struct SearchEngine {
    store: Arc<dyn MemoryStore>,
    keyword_index: Option<Arc<dyn KeywordIndex>>,
    embeddings: EmbeddingPipeline,
    lifecycle_config: LifecycleConfig,
    search_config: SearchConfig,
}

impl SearchEngine {
    #[must_use]
    pub fn new(
        store: Arc<dyn MemoryStore>,
        keyword_index: Option<Arc<dyn KeywordIndex>>,
        embeddings: EmbeddingPipeline,
        lifecycle_config: LifecycleConfig,
        search_config: SearchConfig,
    ) -> Self {
        Self {
            store,
            keyword_index,
            embeddings,
            lifecycle_config,
            search_config,
        }
    }

    /// `search_code`: semantic or hybrid retrieval over the store. An empty
    /// query short-circuits with `quality = poor`/`total_found = 0` and no
    /// store call at all (spec.md §4.C7).
    pub async fn search_code(
        &self,
        mode: SearchMode,
        query: &str,
        limit: usize,
        filters: &SearchFilters,
        include_quality_metrics: bool,
    ) -> Result<SearchResponse> {
        if query.trim().is_empty() {
            return Ok(SearchResponse {
                results: Vec::new(),
                total_found: 0,
                quality_report: empty_quality_report(),
            });
        }

        let query_embedding = self.embeddings.embed(query).await?;
        let headroom = limit.saturating_add(limit / 2).max(limit + 5);
        let pushdown = filters.pushdown();

        let semantic_hits = self.store.retrieve(&query_embedding, headroom, &pushdown).await?;
        let mut by_id: HashMap<uuid::Uuid, SearchResult> = semantic_hits
            .into_iter()
            .map(|(unit, score)| {
                (
                    unit.id,
                    SearchResult {
                        unit,
                        semantic_score: score,
                        lexical_score: 0.0,
                        final_score: score,
                    },
                )
            })
            .collect();

        let mut matched_keywords = Vec::new();
        let effective_mode = if matches!(mode, SearchMode::Hybrid) && self.keyword_index.is_some() {
            SearchMode::Hybrid
        } else {
            SearchMode::Semantic
        };

        if effective_mode == SearchMode::Hybrid {
            if let Some(index) = &self.keyword_index {
                let lexical_hits = index.hybrid_search(query, headroom).await?;
                let (sem_min, sem_max) = min_max(by_id.values().map(|r| r.semantic_score));
                let (lex_min, lex_max) =
                    min_max(lexical_hits.iter().map(|h| h.total_score));

                for entry in by_id.values_mut() {
                    entry.semantic_score = normalize(entry.semantic_score, sem_min, sem_max);
                }
                for hit in &lexical_hits {
                    let normalized_lex = normalize(hit.total_score, lex_min, lex_max);
                    matched_keywords.push(hit.memory.content.clone());
                    by_id
                        .entry(hit.memory.id)
                        .and_modify(|entry| entry.lexical_score = normalized_lex)
                        .or_insert_with(|| SearchResult {
                            unit: hit.memory.clone(),
                            semantic_score: 0.0,
                            lexical_score: normalized_lex,
                            final_score: 0.0,
                        });
                }
                matched_keywords.truncate(10);

                for entry in by_id.values_mut() {
                    entry.final_score = self.search_config.semantic_weight * entry.semantic_score
                        + self.search_config.lexical_weight * entry.lexical_score;
                }
            }
        }

        // Lifecycle weighting, then post-filter, then dedup, then truncate.
        let mut results: Vec<SearchResult> = by_id.into_values().collect();
        for result in &mut results {
            let weight = lifecycle::lifecycle_weight(&self.lifecycle_config, result.unit.lifecycle_state);
            result.final_score *= weight;
        }

        if let Some(pattern) = &filters.file_pattern {
            results.retain(|r| r.unit.file_path().is_some_and(|p| p.contains(pattern.as_str())));
        }

        results = sort_and_dedupe(results);
        let total_found = results.len();
        results.truncate(limit);

        let _ = include_quality_metrics; // quality report is cheap; always computed per spec.md §4.C7
        let quality_report = build_quality_report(&results, &matched_keywords);

        Ok(SearchResponse {
            results,
            total_found,
            quality_report,
        })
    }

    /// `find_similar_code`: identical to `search_code` with the snippet as
    /// the query, except an empty snippet is a validation error (not an
    /// empty-result short-circuit) and scores >= 0.95 are flagged as a
    /// likely duplicate in the interpretation string.
    pub async fn find_similar_code(
        &self,
        snippet: &str,
        limit: usize,
        filters: &SearchFilters,
    ) -> Result<(SearchResponse, Vec<String>)> {
        if snippet.trim().is_empty() {
            return Err(Error::Validation(crate::constants::errors::EMPTY_QUERY.to_string()));
        }
        let response = self
            .search_code(SearchMode::Semantic, snippet, limit, filters, true)
            .await?;
        let interpretations = response
            .results
            .iter()
            .map(|r| {
                if r.final_score >= defaults::LIKELY_DUPLICATE_SCORE {
                    "likely duplicate".to_string()
                } else {
                    "related".to_string()
                }
            })
            .collect();
        Ok((response, interpretations))
    }
}

fn min_max(values: impl Iterator<Item = f32>) -> (f32, f32) {
    values.fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

fn normalize(value: f32, min: f32, max: f32) -> f32 {
    if !min.is_finite() || !max.is_finite() || (max - min).abs() < f32::EPSILON {
        return if value > 0.0 { 1.0 } else { 0.0 };
    }
    ((value - min) / (max - min)).clamp(0.0, 1.0)
}

/// Sort by final_score desc, tie-break by semantic then lexical then stable
/// id order; dedup by `(file_path, start_line)` keeping the highest score.
fn sort_and_dedupe(mut results: Vec<SearchResult>) -> Vec<SearchResult> {
    results.sort_by(|a, b| {
        b.final_score
            .total_cmp(&a.final_score)
            .then_with(|| b.semantic_score.total_cmp(&a.semantic_score))
            .then_with(|| b.lexical_score.total_cmp(&a.lexical_score))
            .then_with(|| a.unit.id.cmp(&b.unit.id))
    });

    let mut seen: HashSet<(String, i64)> = HashSet::new();
    let mut deduped = Vec::with_capacity(results.len());
    for result in results {
        let start_line = result
            .unit
            .metadata
            .get("start_line")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(-1);
        let key = (result.unit.file_path().unwrap_or_default().to_string(), start_line);
        if seen.insert(key) {
            deduped.push(result);
        }
    }
    deduped
}

fn empty_quality_report() -> QualityReport {
    QualityReport {
        quality: Quality::NoResults,
        confidence_per_result: Vec::new(),
        matched_keywords: Vec::new(),
        suggestions: vec!["try a broader query".to_string()],
        summary: "no results".to_string(),
        facets: Facets::default(),
        refinement_hints: Vec::new(),
        did_you_mean: Vec::new(),
    }
}

fn confidence_for(score: f32) -> Confidence {
    if score >= defaults::CONFIDENCE_HIGH_MIN {
        Confidence::High
    } else if score >= defaults::CONFIDENCE_MEDIUM_MIN {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

fn build_quality_report(results: &[SearchResult], matched_keywords: &[String]) -> QualityReport {
    if results.is_empty() {
        return empty_quality_report();
    }
    let top_score = results[0].final_score;
    let quality = if top_score >= defaults::QUALITY_EXCELLENT_MIN {
        Quality::Excellent
    } else if top_score >= defaults::QUALITY_GOOD_MIN {
        Quality::Good
    } else if top_score >= defaults::QUALITY_FAIR_MIN {
        Quality::Fair
    } else {
        Quality::Poor
    };

    let mut facets = Facets::default();
    for result in results {
        if let Some(language) = result.unit.metadata.get("language").and_then(|v| v.as_str()) {
            *facets.languages.entry(language.to_string()).or_insert(0) += 1;
        }
        if let Some(unit_type) = result.unit.metadata.get("unit_type").and_then(|v| v.as_str()) {
            *facets.unit_types.entry(unit_type.to_string()).or_insert(0) += 1;
        }
        if let Some(path) = result.unit.file_path() {
            *facets.files.entry(path.to_string()).or_insert(0) += 1;
            if let Some(dir) = std::path::Path::new(path).parent().and_then(|p| p.to_str()) {
                *facets.directories.entry(dir.to_string()).or_insert(0) += 1;
            }
        }
    }

    let mut suggestions = Vec::new();
    if matches!(quality, Quality::Poor | Quality::Fair) {
        suggestions.push("try a more specific query or add a file_pattern filter".to_string());
    }
    if results.len() < 3 {
        suggestions.push("broaden the query to surface more candidates".to_string());
    }

    QualityReport {
        quality,
        confidence_per_result: results.iter().map(|r| confidence_for(r.final_score)).collect(),
        matched_keywords: matched_keywords.to_vec(),
        suggestions,
        summary: format!("{} result(s), top score {:.2}", results.len(), top_score),
        facets,
        refinement_hints: Vec::new(),
        did_you_mean: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::provider::HashingEmbeddingProvider;
    use crate::storage::in_memory::{InMemoryKeywordIndex, InMemoryStore};
    use crate::types::{Category, ContextLevel, LifecycleState};
    use chrono::Utc;
    use std::collections::HashMap as StdHashMap;

    fn unit(content: &str, file_path: &str, start_line: i64) -> MemoryUnit {
        let mut metadata = StdHashMap::new();
        metadata.insert("file_path".to_string(), serde_json::json!(file_path));
        metadata.insert("language".to_string(), serde_json::json!("python"));
        metadata.insert("unit_type".to_string(), serde_json::json!("function"));
        metadata.insert("start_line".to_string(), serde_json::json!(start_line));
        MemoryUnit {
            id: uuid::Uuid::new_v4(),
            content: content.to_string(),
            embedding: vec![],
            category: Category::CodeUnit,
            context_level: ContextLevel::ProjectContext,
            lifecycle_state: LifecycleState::Active,
            project_name: Some("demo".to_string()),
            created_at: Utc::now(),
            last_accessed: Utc::now(),
            use_count: 0,
            metadata,
        }
    }

    async fn engine() -> (SearchEngine, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        let pipeline = EmbeddingPipeline::new(Arc::new(HashingEmbeddingProvider::new(32)), None);
        let engine = SearchEngine::new(
            store.clone(),
            None,
            pipeline,
            LifecycleConfig::default(),
            SearchConfig::default(),
        );
        (engine, store)
    }

    #[tokio::test]
    async fn empty_query_short_circuits_without_store_call() {
        let (engine, _store) = engine().await;
        let response = engine
            .search_code(SearchMode::Semantic, "", 10, &SearchFilters::default(), false)
            .await
            .unwrap();
        assert_eq!(response.total_found, 0);
        assert_eq!(response.quality_report.quality, Quality::NoResults);
    }

    #[tokio::test]
    async fn results_respect_limit_and_are_non_increasing() {
        let (engine, store) = engine().await;
        let pipeline = EmbeddingPipeline::new(Arc::new(HashingEmbeddingProvider::new(32)), None);
        for i in 0..5 {
            let text = format!("def handler_{i}(): pass");
            let embedding = pipeline.embed(&text).await.unwrap();
            let mut u = unit(&text, &format!("f{i}.py"), 1);
            u.embedding = embedding;
            store.store(u).await.unwrap();
        }
        let response = engine
            .search_code(SearchMode::Semantic, "handler", 3, &SearchFilters::default(), false)
            .await
            .unwrap();
        assert!(response.results.len() <= 3);
        for pair in response.results.windows(2) {
            assert!(pair[0].final_score >= pair[1].final_score);
        }
    }

    #[tokio::test]
    async fn dedup_keeps_highest_scored_copy_per_file_and_line() {
        let (engine, store) = engine().await;
        let pipeline = EmbeddingPipeline::new(Arc::new(HashingEmbeddingProvider::new(32)), None);
        let mut a = unit("authenticate user", "auth.py", 1);
        a.embedding = pipeline.embed("authenticate user one").await.unwrap();
        let mut b = unit("authenticate user duplicate", "auth.py", 1);
        b.embedding = pipeline.embed("authenticate user two").await.unwrap();
        store.store(a).await.unwrap();
        store.store(b).await.unwrap();

        let response = engine
            .search_code(SearchMode::Semantic, "authenticate", 10, &SearchFilters::default(), false)
            .await
            .unwrap();
        let at_location: Vec<_> = response
            .results
            .iter()
            .filter(|r| r.unit.file_path() == Some("auth.py"))
            .collect();
        assert_eq!(at_location.len(), 1);
    }

    #[tokio::test]
    async fn hybrid_falls_back_to_semantic_without_keyword_index() {
        let (engine, store) = engine().await;
        let mut u = unit("fn parse(x)", "p.rs", 1);
        u.embedding = engine.embeddings.embed("fn parse(x)").await.unwrap();
        store.store(u).await.unwrap();
        let response = engine
            .search_code(SearchMode::Hybrid, "parse", 10, &SearchFilters::default(), false)
            .await
            .unwrap();
        assert_eq!(response.total_found, 1);
    }

    #[tokio::test]
    async fn find_similar_code_rejects_empty_snippet() {
        let (engine, _store) = engine().await;
        let err = engine
            .find_similar_code("   ", 10, &SearchFilters::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn hybrid_merges_keyword_hits_not_found_semantically() {
        let store = Arc::new(InMemoryStore::new());
        let keyword_index = Arc::new(InMemoryKeywordIndex::new());
        let pipeline = EmbeddingPipeline::new(Arc::new(HashingEmbeddingProvider::new(32)), None);
        let engine = SearchEngine::new(
            store.clone(),
            Some(keyword_index.clone()),
            pipeline,
            LifecycleConfig::default(),
            SearchConfig::default(),
        );
        let u = unit("special lexical needle", "needle.py", 1);
        keyword_index.index_documents(std::slice::from_ref(&u)).await.unwrap();

        let response = engine
            .search_code(SearchMode::Hybrid, "needle", 10, &SearchFilters::default(), false)
            .await
            .unwrap();
        assert_eq!(response.total_found, 1);
    }
}
