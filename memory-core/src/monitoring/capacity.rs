//! # Capacity Planner (C19)
//!
//! Ordinary-least-squares slope per tracked metric over recent
//! [`HealthMetrics`] history, turned into a days-until-limit projection and
//! a status/trend/recommendation summary. Grounded in
//! `original_source/src/monitoring/capacity_planner.py`; reads history via
//! [`crate::storage::relational::RelationalStore`].

use crate::constants::defaults::{
    CAPACITY_DB_SIZE_CRITICAL_MB, CAPACITY_DB_SIZE_EPSILON, CAPACITY_DB_SIZE_WARN_MB,
    CAPACITY_MEMORY_COUNT_CRITICAL, CAPACITY_MEMORY_COUNT_EPSILON, CAPACITY_MEMORY_COUNT_WARN,
    CAPACITY_PROJECT_COUNT_CRITICAL, CAPACITY_PROJECT_COUNT_EPSILON, CAPACITY_PROJECT_COUNT_WARN,
};
use crate::storage::relational::RelationalStore;
use crate::types::{CapacityStatus, HealthMetrics, Trend};
use crate::Result;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct MetricForecast {
    pub metric_name: &'static str,
    pub current_value: f64,
    pub slope_per_day: f64,
    pub trend: Trend,
    pub status: CapacityStatus,
    pub days_until_limit: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct CapacityReport {
    pub overall_status: CapacityStatus,
    pub forecasts: Vec<MetricForecast>,
    pub recommendations: Vec<String>,
}

struct TrackedMetric {
    name: &'static str,
    warn: f64,
    critical: f64,
    stable_epsilon: f64,
    extract: fn(&HealthMetrics) -> f64,
}

const TRACKED: &[TrackedMetric] = &[
    TrackedMetric {
        name: "database_size_mb",
        warn: CAPACITY_DB_SIZE_WARN_MB,
        critical: CAPACITY_DB_SIZE_CRITICAL_MB,
        stable_epsilon: CAPACITY_DB_SIZE_EPSILON,
        extract: |m| m.database_size_mb,
    },
    TrackedMetric {
        name: "total_memories",
        warn: CAPACITY_MEMORY_COUNT_WARN,
        critical: CAPACITY_MEMORY_COUNT_CRITICAL,
        stable_epsilon: CAPACITY_MEMORY_COUNT_EPSILON,
        extract: |m| m.total_memories as f64,
    },
    TrackedMetric {
        name: "active_projects",
        warn: CAPACITY_PROJECT_COUNT_WARN,
        critical: CAPACITY_PROJECT_COUNT_CRITICAL,
        stable_epsilon: CAPACITY_PROJECT_COUNT_EPSILON,
        extract: |m| m.active_projects as f64,
    },
];

pub struct CapacityPlanner {
    relational: Arc<RelationalStore>,
}

impl CapacityPlanner {
    #[must_use]
    pub fn new(relational: Arc<RelationalStore>) -> Self {
        Self { relational }
    }

    pub async fn forecast(&self, history_days: i64) -> Result<CapacityReport> {
        let history = self.relational.get_health_metrics_history(history_days).await?;
        Ok(build_report(&history))
    }
}

/// Pure projection over an already-fetched history slice, oldest-first or
/// any order — sorted internally by timestamp.
#[must_use]
pub fn build_report(history: &[HealthMetrics]) -> CapacityReport {
    let mut sorted: Vec<&HealthMetrics> = history.iter().collect();
    sorted.sort_by_key(|m| m.timestamp);

    if sorted.is_empty() {
        return CapacityReport {
            overall_status: CapacityStatus::Healthy,
            forecasts: TRACKED
                .iter()
                .map(|t| MetricForecast {
                    metric_name: t.name,
                    current_value: 0.0,
                    slope_per_day: 0.0,
                    trend: Trend::Stable,
                    status: CapacityStatus::Healthy,
                    days_until_limit: None,
                })
                .collect(),
            recommendations: vec!["no history yet; capacity looks healthy by default".to_string()],
        };
    }

    let first_ts = sorted[0].timestamp;
    let points: Vec<f64> = sorted
        .iter()
        .map(|m| (m.timestamp - first_ts).num_seconds() as f64 / 86_400.0)
        .collect();

    let forecasts: Vec<MetricForecast> = TRACKED
        .iter()
        .map(|tracked| {
            let values: Vec<f64> = sorted.iter().map(|m| (tracked.extract)(m)).collect();
            let current = *values.last().expect("non-empty history");
            let slope = ols_slope(&points, &values);
            let trend = if slope.abs() < tracked.stable_epsilon {
                Trend::Stable
            } else if slope > 0.0 {
                Trend::Growing
            } else {
                Trend::Shrinking
            };
            let status = if current >= tracked.critical {
                CapacityStatus::Critical
            } else if current >= tracked.warn {
                CapacityStatus::Warning
            } else {
                CapacityStatus::Healthy
            };
            let days_until_limit = (slope > 0.0).then(|| ((tracked.critical - current) / slope).max(0.0));
            MetricForecast {
                metric_name: tracked.name,
                current_value: current,
                slope_per_day: slope,
                trend,
                status,
                days_until_limit,
            }
        })
        .collect();

    let overall_status = forecasts
        .iter()
        .map(|f| f.status)
        .max()
        .unwrap_or(CapacityStatus::Healthy);

    let recommendations = forecasts
        .iter()
        .filter(|f| f.status != CapacityStatus::Healthy)
        .map(|f| match f.status {
            CapacityStatus::Critical => format!(
                "{} is critical ({:.1}); archive or prune to bring it back under {:.1}",
                f.metric_name, f.current_value, f.slope_per_day
            ),
            CapacityStatus::Warning => format!(
                "{} is trending {:?} and approaching its limit; plan capacity work soon",
                f.metric_name, f.trend
            ),
            CapacityStatus::Healthy => unreachable!("filtered above"),
        })
        .collect();

    CapacityReport {
        overall_status,
        forecasts,
        recommendations,
    }
}

/// Simple OLS slope of `y` against `x`; zero slope if `x` has no spread
/// (a single data point, or all points at the same timestamp).
fn ols_slope(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    if n < 2.0 {
        return 0.0;
    }
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for (xi, yi) in x.iter().zip(y) {
        numerator += (xi - mean_x) * (yi - mean_y);
        denominator += (xi - mean_x).powi(2);
    }
    if denominator.abs() < f64::EPSILON {
        0.0
    } else {
        numerator / denominator
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn metrics_at(day: i64, db_size: f64, total_memories: i64) -> HealthMetrics {
        HealthMetrics {
            timestamp: Utc::now() + Duration::days(day),
            avg_search_latency_ms: 0.0,
            p95_search_latency_ms: 0.0,
            cache_hit_rate: 1.0,
            index_staleness_ratio: 0.0,
            avg_result_relevance: 1.0,
            noise_ratio: 0.0,
            duplicate_rate: 0.0,
            contradiction_rate: 0.0,
            total_memories,
            active_memories: 0,
            recent_memories: 0,
            archived_memories: 0,
            stale_memories: 0,
            active_projects: 1,
            archived_projects: 0,
            database_size_mb: db_size,
            queries_per_day: 0.0,
            memories_created_per_day: 0.0,
            avg_results_per_query: 0.0,
            health_score: 100.0,
        }
    }

    #[test]
    fn empty_history_returns_healthy_placeholder() {
        let report = build_report(&[]);
        assert_eq!(report.overall_status, CapacityStatus::Healthy);
        assert!(report.forecasts.iter().all(|f| f.days_until_limit.is_none()));
    }

    #[test]
    fn single_snapshot_has_zero_slope_projection() {
        let report = build_report(&[metrics_at(0, 100.0, 100)]);
        assert!(report.forecasts.iter().all(|f| f.slope_per_day == 0.0));
        assert_eq!(report.overall_status, CapacityStatus::Healthy);
    }

    #[test]
    fn growing_database_size_flags_warning_or_critical() {
        let history = vec![
            metrics_at(0, 100.0, 100),
            metrics_at(1, 1600.0, 100),
            metrics_at(2, 2100.0, 100),
        ];
        let report = build_report(&history);
        let db = report
            .forecasts
            .iter()
            .find(|f| f.metric_name == "database_size_mb")
            .unwrap();
        assert_eq!(db.status, CapacityStatus::Critical);
        assert_eq!(db.trend, Trend::Growing);
        assert_eq!(report.overall_status, CapacityStatus::Critical);
        assert!(!report.recommendations.is_empty());
    }

    #[test]
    fn stable_metric_is_not_growing_or_shrinking() {
        let history = vec![metrics_at(0, 100.0, 100), metrics_at(1, 100.0, 100), metrics_at(2, 100.1, 100)];
        let report = build_report(&history);
        let db = report
            .forecasts
            .iter()
            .find(|f| f.metric_name == "database_size_mb")
            .unwrap();
        assert_eq!(db.trend, Trend::Stable);
    }
}
