use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::enums::{
    AlertSeverity, Category, ContextLevel, LifecycleState, ProjectLifecycleState,
};

// ============================================================================
// Structs
// ============================================================================

/// The unit of storage and retrieval. Owned exclusively by whichever
/// `MemoryStore` implementation persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryUnit {
    /// Opaque, stable identifier.
    pub id: Uuid,
    /// The stored text.
    pub content: String,
    /// Fixed-dimension embedding; dimension is a property of the model used
    /// to produce it and must be consistent within one store.
    pub embedding: Vec<f32>,
    pub category: Category,
    pub context_level: ContextLevel,
    /// Cached copy of the value `lifecycle::calculate_state` would derive;
    /// reconciled by maintenance jobs, never the sole source of truth.
    pub lifecycle_state: LifecycleState,
    pub project_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub use_count: u64,
    /// Free-form metadata. For `Category::CodeUnit` this MUST contain
    /// `file_path`, `language`, `unit_name`, `unit_type`, `start_line`,
    /// `end_line`, and optionally `signature`.
    pub metadata: HashMap<String, Value>,
}

impl MemoryUnit {
    /// Record a retrieval "use": bump `use_count` and set `last_accessed` to
    /// now. Every successful retrieval that counts as a use calls this.
    pub fn record_access(&mut self) {
        self.use_count += 1;
        self.last_accessed = Utc::now();
    }

    /// Convenience accessor for the `file_path` metadata field code units
    /// are required to carry.
    #[must_use]
    pub fn file_path(&self) -> Option<&str> {
        self.metadata.get("file_path").and_then(Value::as_str)
    }
}

/// A named, contiguous region of source text produced by the code parser.
/// Transient: passed by value from parser to indexer, never persisted under
/// this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticUnit {
    pub file_path: String,
    pub language: String,
    pub unit_type: String,
    pub unit_name: String,
    pub content: String,
    /// 1-indexed, inclusive.
    pub start_line: usize,
    /// 1-indexed, inclusive; `end_line >= start_line`.
    pub end_line: usize,
    pub signature: Option<String>,
}

/// Per-project archival lifecycle state, persisted as a single JSON document
/// keyed by project name and rewritten atomically on each change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectState {
    pub state: ProjectLifecycleState,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub searches_count: u64,
    pub index_updates_count: u64,
    pub files_indexed: u64,
    pub archived_at: Option<DateTime<Utc>>,
    pub reactivated_at: Option<DateTime<Utc>>,
}

impl ProjectState {
    /// A freshly auto-initialized state: `ACTIVE`, all counters zero,
    /// `last_activity = now`.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            state: ProjectLifecycleState::Active,
            created_at: now,
            last_activity: now,
            searches_count: 0,
            index_updates_count: 0,
            files_indexed: 0,
            archived_at: None,
            reactivated_at: None,
        }
    }
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::new()
    }
}

/// Durable per-project indexing metadata, owned by the project index
/// tracker (C6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectIndexMetadata {
    pub project_name: String,
    pub first_indexed_at: DateTime<Utc>,
    pub last_indexed_at: DateTime<Utc>,
    pub total_files: u64,
    pub total_units: u64,
    pub is_watching: bool,
    pub index_version: u32,
}

/// Stats about one original-archive compression pass (payload vs. disk
/// footprint).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompressionInfo {
    pub original_size_mb: f64,
    pub compressed_size_mb: f64,
    pub compression_ratio: f64,
    pub savings_percent: f64,
}

/// Restore-time estimate and any restore-time caveats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RestoreInfo {
    pub estimated_restore_time_seconds: u64,
    pub warnings: Vec<String>,
}

/// JSON sidecar describing an archive's identity, statistics, and restore
/// hints. Round-trips bit-for-bit through `to_dict`/`from_dict` (i.e. serde).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub project_name: String,
    pub archive_version: String,
    pub archived_at: DateTime<Utc>,
    pub archived_by: String,
    pub statistics: HashMap<String, Value>,
    pub compression_info: CompressionInfo,
    pub restore_info: RestoreInfo,
    pub last_activity: Option<DateTime<Utc>>,
    /// Set only after an import that renamed the project.
    pub imported_from: Option<String>,
    pub imported_at: Option<DateTime<Utc>>,
}

impl ArchiveManifest {
    pub const CURRENT_VERSION: &'static str = "1.0";
}

/// One timestamped health snapshot. Append-only; the schema mirrors the
/// bit-exact `health_metrics` table column list in spec.md §6.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthMetrics {
    pub timestamp: DateTime<Utc>,
    pub avg_search_latency_ms: f64,
    pub p95_search_latency_ms: f64,
    pub cache_hit_rate: f64,
    pub index_staleness_ratio: f64,
    pub avg_result_relevance: f64,
    pub noise_ratio: f64,
    pub duplicate_rate: f64,
    pub contradiction_rate: f64,
    pub total_memories: i64,
    pub active_memories: i64,
    pub recent_memories: i64,
    pub archived_memories: i64,
    pub stale_memories: i64,
    pub active_projects: i64,
    pub archived_projects: i64,
    pub database_size_mb: f64,
    pub queries_per_day: f64,
    pub memories_created_per_day: f64,
    pub avg_results_per_query: f64,
    pub health_score: f64,
}

/// A threshold-triggered notification. `id` is deterministic from
/// `(metric_name, date_bucket)` so a still-firing condition updates rather
/// than duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub severity: AlertSeverity,
    pub metric_name: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub message: String,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub resolved: bool,
    pub resolved_at: Option<DateTime<Utc>>,
    pub snoozed_until: Option<DateTime<Utc>>,
}

impl Alert {
    /// Deterministic id: `alert_{metric}_{YYYYMMDD}`.
    #[must_use]
    pub fn deterministic_id(metric_name: &str, at: DateTime<Utc>) -> String {
        format!("alert_{metric_name}_{}", at.format("%Y%m%d"))
    }

    /// Active alerts are unresolved and either never snoozed or past their
    /// snooze.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.resolved && self.snoozed_until.is_none_or(|until| until <= now)
    }
}
