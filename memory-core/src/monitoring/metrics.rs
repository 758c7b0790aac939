//! # Metrics Collector (C17)
//!
//! Composes a [`crate::types::HealthMetrics`] snapshot from a store count
//! plus rolling windows over the `query_log` table, and appends it to the
//! append-only `health_metrics` table. Grounded in
//! `original_source/src/monitoring/metrics_collector.py`; persistence lives
//! in [`crate::storage::relational::RelationalStore`].

use crate::storage::relational::RelationalStore;
use crate::storage::MemoryStore;
use crate::types::{HealthMetrics, LifecycleState};
use crate::Result;
use std::sync::Arc;

/// Inputs the collector cannot derive from the query log alone: a store
/// snapshot and whatever disk-usage figure the caller already knows.
#[derive(Debug, Clone, Copy, Default)]
pub struct StoreSnapshot {
    pub total_memories: i64,
    pub active_memories: i64,
    pub recent_memories: i64,
    pub archived_memories: i64,
    pub stale_memories: i64,
    pub active_projects: i64,
    pub archived_projects: i64,
    pub database_size_mb: f64,
    pub cache_hit_rate: f64,
    pub index_staleness_ratio: f64,
}

pub struct MetricsCollector {
    relational: Arc<RelationalStore>,
}

impl MetricsCollector {
    #[must_use]
    pub fn new(relational: Arc<RelationalStore>) -> Self {
        Self { relational }
    }

    /// Record one query's outcome in the `query_log` table.
    pub async fn log_query(
        &self,
        query: &str,
        latency_ms: f64,
        result_count: usize,
        avg_relevance: Option<f64>,
    ) -> Result<()> {
        self.relational
            .log_query(query, latency_ms, result_count, avg_relevance)
            .await
    }

    /// Compose and persist a fresh [`HealthMetrics`] snapshot from `snapshot`
    /// plus the 1-day/7-day query-log windows, and a health score from the
    /// already-computed `health_score` (C10 is a separate pure calculator;
    /// the caller passes its `overall`, `noise_ratio`, `duplicate_rate`,
    /// `contradiction_rate` in).
    pub async fn collect_metrics(
        &self,
        snapshot: StoreSnapshot,
        noise_ratio: f64,
        duplicate_rate: f64,
        contradiction_rate: f64,
        health_score: f64,
    ) -> Result<HealthMetrics> {
        let (avg_latency, p95_latency, avg_relevance, _, _) =
            self.relational.query_log_window_stats(1).await?;
        let (_, _, _, queries_per_day, avg_results_per_query) =
            self.relational.query_log_window_stats(7).await?;

        let metrics = HealthMetrics {
            timestamp: chrono::Utc::now(),
            avg_search_latency_ms: avg_latency,
            p95_search_latency_ms: p95_latency,
            cache_hit_rate: snapshot.cache_hit_rate,
            index_staleness_ratio: snapshot.index_staleness_ratio,
            avg_result_relevance: avg_relevance,
            noise_ratio,
            duplicate_rate,
            contradiction_rate,
            total_memories: snapshot.total_memories,
            active_memories: snapshot.active_memories,
            recent_memories: snapshot.recent_memories,
            archived_memories: snapshot.archived_memories,
            stale_memories: snapshot.stale_memories,
            active_projects: snapshot.active_projects,
            archived_projects: snapshot.archived_projects,
            database_size_mb: snapshot.database_size_mb,
            queries_per_day,
            memories_created_per_day: 0.0,
            avg_results_per_query,
            health_score,
        };
        self.relational.insert_health_metrics(&metrics).await?;
        Ok(metrics)
    }

    pub async fn store_metrics(&self, metrics: &HealthMetrics) -> Result<()> {
        self.relational.insert_health_metrics(metrics).await
    }

    pub async fn get_latest_metrics(&self) -> Result<Option<HealthMetrics>> {
        self.relational.get_latest_health_metrics().await
    }

    pub async fn get_metrics_history(&self, days: i64) -> Result<Vec<HealthMetrics>> {
        self.relational.get_health_metrics_history(days).await
    }

    /// Day-bucketed `(timestamp, avg_latency_ms, avg_result_count)` over the
    /// `query_log` table.
    pub async fn get_daily_aggregate(&self, days: i64) -> Result<Vec<(chrono::DateTime<chrono::Utc>, f64, f64)>> {
        self.relational.get_daily_aggregate(days).await
    }

    pub async fn cleanup_old_metrics(&self, retention_days: i64) -> Result<usize> {
        self.relational.cleanup_old_health_metrics(retention_days).await
    }
}

/// Build a [`StoreSnapshot`] from a `MemoryStore`'s per-lifecycle counts.
/// `database_size_mb`/`cache_hit_rate`/`index_staleness_ratio` are not
/// derivable from the trait alone; callers fill them in afterward if they
/// have a more precise source (e.g. a file-size check on the backing db).
pub async fn snapshot_from_store(store: &dyn MemoryStore, active_projects: i64, archived_projects: i64) -> Result<StoreSnapshot> {
    let total = store.count().await? as i64;
    let active = store.count_by_lifecycle(LifecycleState::Active).await? as i64;
    let recent = store.count_by_lifecycle(LifecycleState::Recent).await? as i64;
    let archived = store.count_by_lifecycle(LifecycleState::Archived).await? as i64;
    let stale = store.count_by_lifecycle(LifecycleState::Stale).await? as i64;
    Ok(StoreSnapshot {
        total_memories: total,
        active_memories: active,
        recent_memories: recent,
        archived_memories: archived,
        stale_memories: stale,
        active_projects,
        archived_projects,
        database_size_mb: 0.0,
        cache_hit_rate: 0.0,
        index_staleness_ratio: 0.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::in_memory::InMemoryStore;

    async fn collector() -> MetricsCollector {
        let relational = Arc::new(RelationalStore::open_in_memory().await.unwrap());
        MetricsCollector::new(relational)
    }

    #[tokio::test]
    async fn collect_metrics_persists_and_round_trips() {
        let collector = collector().await;
        collector.log_query("auth", 12.0, 3, Some(0.8)).await.unwrap();
        let metrics = collector
            .collect_metrics(StoreSnapshot::default(), 0.1, 0.0, 0.0, 92.0)
            .await
            .unwrap();
        assert!((metrics.avg_search_latency_ms - 12.0).abs() < 1e-9);

        let latest = collector.get_latest_metrics().await.unwrap().unwrap();
        assert_eq!(latest.health_score, 92.0);
    }

    #[tokio::test]
    async fn snapshot_from_store_counts_by_lifecycle() {
        let store = InMemoryStore::new();
        let snapshot = snapshot_from_store(&store, 1, 0).await.unwrap();
        assert_eq!(snapshot.total_memories, 0);
    }

    #[tokio::test]
    async fn cleanup_removes_old_metrics_only() {
        let collector = collector().await;
        collector
            .collect_metrics(StoreSnapshot::default(), 0.0, 0.0, 0.0, 100.0)
            .await
            .unwrap();
        let removed = collector.cleanup_old_metrics(90).await.unwrap();
        assert_eq!(removed, 0);
    }
}
