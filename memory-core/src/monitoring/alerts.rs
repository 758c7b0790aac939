//! # Alert Engine (C18)
//!
//! Evaluates a configurable allow-list of [`HealthMetrics`] fields against
//! threshold comparisons, producing [`Alert`]s with deterministic ids so a
//! still-firing condition updates rather than duplicates. Grounded in
//! `original_source/src/monitoring/alert_engine.py`; persistence lives in
//! [`crate::storage::relational::RelationalStore`].

use crate::storage::relational::RelationalStore;
use crate::types::{Alert, AlertComparison, AlertConfig, AlertSeverity, AlertThreshold, HealthMetrics};
use crate::Result;
use std::sync::Arc;

pub struct AlertEngine {
    relational: Arc<RelationalStore>,
    config: AlertConfig,
}

impl AlertEngine {
    #[must_use]
    pub fn new(relational: Arc<RelationalStore>, config: AlertConfig) -> Self {
        Self { relational, config }
    }

    #[must_use]
    pub fn with_default_config(relational: Arc<RelationalStore>) -> Self {
        Self::new(relational, AlertConfig::default())
    }

    /// Pure: evaluate `metrics` against every configured threshold and
    /// return the alerts that would fire, without touching storage.
    #[must_use]
    pub fn evaluate_metrics(&self, metrics: &HealthMetrics) -> Vec<Alert> {
        let now = metrics.timestamp;
        self.config
            .thresholds
            .iter()
            .filter_map(|threshold| evaluate_one(threshold, metrics, now))
            .collect()
    }

    /// Persist `alerts` via upsert-on-`(metric_name, date_bucket)` semantics.
    pub async fn store_alerts(&self, alerts: &[Alert]) -> Result<()> {
        for alert in alerts {
            self.relational.store_alert(alert).await?;
        }
        Ok(())
    }

    /// Evaluate `metrics` and persist whatever fires; returns the fired set.
    pub async fn evaluate_and_store(&self, metrics: &HealthMetrics) -> Result<Vec<Alert>> {
        let fired = self.evaluate_metrics(metrics);
        self.store_alerts(&fired).await?;
        Ok(fired)
    }

    pub async fn resolve_alert(&self, id: &str) -> Result<bool> {
        self.relational.resolve_alert(id).await
    }

    pub async fn snooze_alert(&self, id: &str, hours: i64) -> Result<bool> {
        let until = chrono::Utc::now() + chrono::Duration::hours(hours);
        self.relational.snooze_alert(id, until).await
    }

    pub async fn get_alert(&self, id: &str) -> Result<Option<Alert>> {
        self.relational.get_alert(id).await
    }

    pub async fn list_alerts(&self) -> Result<Vec<Alert>> {
        self.relational.list_alerts().await
    }

    /// Active alerts: unresolved and either never snoozed or past their
    /// snooze window, evaluated as of now.
    pub async fn list_active_alerts(&self) -> Result<Vec<Alert>> {
        let now = chrono::Utc::now();
        Ok(self
            .relational
            .list_alerts()
            .await?
            .into_iter()
            .filter(|a| a.is_active(now))
            .collect())
    }

    /// Counts of active alerts by severity, for a dashboard summary.
    pub async fn summary(&self) -> Result<AlertSummary> {
        let active = self.list_active_alerts().await?;
        let mut summary = AlertSummary::default();
        for alert in &active {
            match alert.severity {
                AlertSeverity::Critical => summary.critical += 1,
                AlertSeverity::Warning => summary.warning += 1,
                AlertSeverity::Info => summary.info += 1,
            }
        }
        summary.total = active.len();
        Ok(summary)
    }

    pub async fn cleanup_old_alerts(&self) -> Result<usize> {
        self.relational.cleanup_old_alerts(self.config.retention_days).await
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AlertSummary {
    pub total: usize,
    pub critical: usize,
    pub warning: usize,
    pub info: usize,
}

fn evaluate_one(threshold: &AlertThreshold, metrics: &HealthMetrics, now: chrono::DateTime<chrono::Utc>) -> Option<Alert> {
    let value = extract_metric(metrics, threshold.metric_name)?;
    let severity = if breaches(threshold.comparison, value, threshold.critical) {
        AlertSeverity::Critical
    } else if breaches(threshold.comparison, value, threshold.warning) {
        AlertSeverity::Warning
    } else {
        return None;
    };
    let threshold_value = match severity {
        AlertSeverity::Critical => threshold.critical,
        _ => threshold.warning,
    };
    Some(Alert {
        id: Alert::deterministic_id(threshold.metric_name, now),
        severity,
        metric_name: threshold.metric_name.to_string(),
        current_value: value,
        threshold_value,
        message: format!(
            "{} is {value:.3} ({severity:?} threshold {threshold_value:.3})",
            threshold.metric_name
        ),
        recommendations: recommend(threshold.metric_name, severity),
        timestamp: now,
        resolved: false,
        resolved_at: None,
        snoozed_until: None,
    })
}

fn breaches(comparison: AlertComparison, value: f64, threshold: f64) -> bool {
    match comparison {
        AlertComparison::LessThan => value < threshold,
        AlertComparison::LessOrEqual => value <= threshold,
        AlertComparison::Equal => (value - threshold).abs() < f64::EPSILON,
        AlertComparison::GreaterOrEqual => value >= threshold,
        AlertComparison::GreaterThan => value > threshold,
    }
}

fn extract_metric(metrics: &HealthMetrics, name: &str) -> Option<f64> {
    Some(match name {
        "avg_search_latency_ms" => metrics.avg_search_latency_ms,
        "p95_search_latency_ms" => metrics.p95_search_latency_ms,
        "cache_hit_rate" => metrics.cache_hit_rate,
        "index_staleness_ratio" => metrics.index_staleness_ratio,
        "avg_result_relevance" => metrics.avg_result_relevance,
        "noise_ratio" => metrics.noise_ratio,
        "duplicate_rate" => metrics.duplicate_rate,
        "contradiction_rate" => metrics.contradiction_rate,
        "database_size_mb" => metrics.database_size_mb,
        "queries_per_day" => metrics.queries_per_day,
        "health_score" => metrics.health_score,
        _ => return None,
    })
}

fn recommend(metric_name: &str, severity: AlertSeverity) -> Vec<String> {
    let action = match metric_name {
        "avg_search_latency_ms" | "p95_search_latency_ms" => {
            "check embedding cache hit rate and store index health"
        }
        "cache_hit_rate" => "warm the embedding cache or increase its capacity",
        "index_staleness_ratio" => "run a maintenance reindex pass",
        "avg_result_relevance" => "review lifecycle weighting and hybrid fusion weights",
        "noise_ratio" | "duplicate_rate" => "run deduplication maintenance",
        "database_size_mb" => "archive inactive projects to reclaim space",
        "health_score" => "run the full maintenance job suite",
        _ => "investigate the underlying metric",
    };
    let mut recs = vec![action.to_string()];
    if severity == AlertSeverity::Critical {
        recs.push("escalate: this metric is past its critical threshold".to_string());
    }
    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics_with_latency(ms: f64) -> HealthMetrics {
        HealthMetrics {
            timestamp: chrono::Utc::now(),
            avg_search_latency_ms: ms,
            p95_search_latency_ms: ms,
            cache_hit_rate: 0.9,
            index_staleness_ratio: 0.0,
            avg_result_relevance: 0.8,
            noise_ratio: 0.0,
            duplicate_rate: 0.0,
            contradiction_rate: 0.0,
            total_memories: 0,
            active_memories: 0,
            recent_memories: 0,
            archived_memories: 0,
            stale_memories: 0,
            active_projects: 0,
            archived_projects: 0,
            database_size_mb: 10.0,
            queries_per_day: 1.0,
            memories_created_per_day: 0.0,
            avg_results_per_query: 1.0,
            health_score: 95.0,
        }
    }

    async fn engine() -> AlertEngine {
        let relational = Arc::new(RelationalStore::open_in_memory().await.unwrap());
        AlertEngine::with_default_config(relational)
    }

    #[tokio::test]
    async fn evaluate_metrics_is_pure_and_produces_deterministic_id() {
        let engine = engine().await;
        let metrics = metrics_with_latency(3000.0);
        let fired = engine.evaluate_metrics(&metrics);
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].severity, AlertSeverity::Critical);
        assert_eq!(fired[0].id, Alert::deterministic_id("avg_search_latency_ms", metrics.timestamp));
    }

    #[tokio::test]
    async fn evaluate_and_store_round_trips_and_upserts() {
        let engine = engine().await;
        let metrics = metrics_with_latency(600.0);
        let fired = engine.evaluate_and_store(&metrics).await.unwrap();
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].severity, AlertSeverity::Warning);

        let fired_again = engine.evaluate_and_store(&metrics_with_latency(3000.0)).await.unwrap();
        assert_eq!(fired_again[0].severity, AlertSeverity::Critical);
        assert_eq!(engine.list_alerts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_and_summary() {
        let engine = engine().await;
        let metrics = metrics_with_latency(3000.0);
        let fired = engine.evaluate_and_store(&metrics).await.unwrap();
        let id = &fired[0].id;

        let summary = engine.summary().await.unwrap();
        assert_eq!(summary.critical, 1);

        assert!(engine.resolve_alert(id).await.unwrap());
        let summary = engine.summary().await.unwrap();
        assert_eq!(summary.total, 0);
    }

    #[tokio::test]
    async fn healthy_metrics_fire_nothing() {
        let engine = engine().await;
        let fired = engine.evaluate_and_store(&metrics_with_latency(50.0)).await.unwrap();
        assert!(fired.is_empty());
    }
}
