//! # Monitoring (C17, C18, C19)
//!
//! Observability over the indexing/retrieval pipeline: rolling-window
//! [`metrics::MetricsCollector`] snapshots, threshold-driven
//! [`alerts::AlertEngine`] notifications, and linear-regression
//! [`capacity::CapacityPlanner`] forecasts. All three read/write the
//! `health_metrics`/`query_log`/`alert_history` tables owned by
//! [`crate::storage::relational::RelationalStore`].

pub mod alerts;
pub mod capacity;
pub mod metrics;

pub use alerts::{AlertEngine, AlertSummary};
pub use capacity::{CapacityPlanner, CapacityReport, MetricForecast};
pub use metrics::{MetricsCollector, StoreSnapshot};
