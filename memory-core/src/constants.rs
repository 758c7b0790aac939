//! Global constants for memory-core
//!
//! Centralizes the numeric defaults and fixed strings that the spec pins down,
//! so components reference one source of truth instead of inline magic numbers.

/// Default configuration values
pub mod defaults {
    // Lifecycle day thresholds (PROJECT_CONTEXT, the default context level).
    pub const ACTIVE_DAYS: i64 = 7;
    pub const RECENT_DAYS: i64 = 30;
    pub const ARCHIVED_DAYS: i64 = 180;
    pub const HIGH_ACCESS_THRESHOLD: u64 = 10;

    pub const LIFECYCLE_WEIGHT_ACTIVE: f32 = 1.0;
    pub const LIFECYCLE_WEIGHT_RECENT: f32 = 0.7;
    pub const LIFECYCLE_WEIGHT_ARCHIVED: f32 = 0.3;
    pub const LIFECYCLE_WEIGHT_STALE: f32 = 0.1;

    // Health scorer scale bounds.
    pub const MAX_MEMORIES_PER_OPERATION: usize = 50_000;
    pub const WARN_THRESHOLD_MEMORIES: usize = 25_000;
    pub const PAGINATION_PAGE_SIZE: usize = 5_000;
    pub const MAX_DUPLICATE_CHECK_MEMORIES: usize = 10_000;

    // Health scorer ideal distribution and grade cutoffs.
    pub const IDEAL_ACTIVE_FRACTION: f64 = 0.60;
    pub const IDEAL_RECENT_FRACTION: f64 = 0.25;
    pub const IDEAL_ARCHIVED_FRACTION: f64 = 0.10;
    pub const IDEAL_STALE_FRACTION: f64 = 0.05;
    pub const GRADE_EXCELLENT_MIN: f64 = 90.0;
    pub const GRADE_GOOD_MIN: f64 = 75.0;
    pub const GRADE_FAIR_MIN: f64 = 60.0;

    // Maintenance jobs.
    pub const CLEANUP_MIN_AGE_DAYS: i64 = 180;
    pub const CLEANUP_MAX_USE_COUNT: u64 = 5;
    pub const JOB_HISTORY_CAPACITY: usize = 100;
    pub const MAX_SURFACED_ERRORS: usize = 10;

    // Embedding pipeline.
    pub const EMBEDDING_BATCH_PARALLEL_THRESHOLD: usize = 10;
    pub const EMBEDDING_CACHE_SIZE: usize = 10_000;

    // File watcher.
    pub const DEFAULT_DEBOUNCE_MS: u64 = 1000;

    // Auto-indexing service (Open Question, pinned by spec.md §9).
    pub const DEFAULT_AUTO_INDEX_SIZE_THRESHOLD: usize = 500;
    pub const CLOSE_TIMEOUT_SECS: u64 = 5;

    // Project archival.
    pub const DEFAULT_INACTIVITY_THRESHOLD_DAYS: i64 = 30;
    pub const DEFAULT_MAX_PROJECTS_PER_OPERATION: usize = 20;
    pub const SEARCH_WEIGHT_ACTIVE: f32 = 1.0;
    pub const SEARCH_WEIGHT_PAUSED: f32 = 0.5;
    pub const SEARCH_WEIGHT_ARCHIVED: f32 = 0.1;
    pub const SEARCH_WEIGHT_DELETED: f32 = 0.0;

    // Archive compression.
    pub const DEFAULT_COMPRESSION_LEVEL: u32 = 6;
    pub const MIN_COMPRESSION_LEVEL: u32 = 1;
    pub const MAX_COMPRESSION_LEVEL: u32 = 9;

    // Capacity planner thresholds (distinct from alert engine's own table).
    pub const CAPACITY_DB_SIZE_WARN_MB: f64 = 1500.0;
    pub const CAPACITY_DB_SIZE_CRITICAL_MB: f64 = 2000.0;
    pub const CAPACITY_MEMORY_COUNT_WARN: f64 = 40_000.0;
    pub const CAPACITY_MEMORY_COUNT_CRITICAL: f64 = 50_000.0;
    pub const CAPACITY_PROJECT_COUNT_WARN: f64 = 15.0;
    pub const CAPACITY_PROJECT_COUNT_CRITICAL: f64 = 20.0;
    pub const CAPACITY_DB_SIZE_EPSILON: f64 = 0.5;
    pub const CAPACITY_MEMORY_COUNT_EPSILON: f64 = 10.0;
    pub const CAPACITY_PROJECT_COUNT_EPSILON: f64 = 0.05;

    // Search engine quality buckets.
    pub const QUALITY_EXCELLENT_MIN: f32 = 0.8;
    pub const QUALITY_GOOD_MIN: f32 = 0.6;
    pub const QUALITY_FAIR_MIN: f32 = 0.4;
    pub const CONFIDENCE_HIGH_MIN: f32 = 0.8;
    pub const CONFIDENCE_MEDIUM_MIN: f32 = 0.6;
    pub const LIKELY_DUPLICATE_SCORE: f32 = 0.95;
    pub const HYBRID_SEMANTIC_WEIGHT: f32 = 0.6;
    pub const HYBRID_LEXICAL_WEIGHT: f32 = 0.4;
}

/// Error messages shared across components.
pub mod errors {
    pub const STORAGE_NOT_INITIALIZED: &str = "storage backend is not initialized";
    pub const EMPTY_QUERY: &str = "query must not be empty";
    pub const READ_ONLY_MODE: &str = "operation rejected: read-only mode is active";
}

/// Log prefixes kept for parity with the original implementation's log lines.
pub mod logging {
    pub const LOG_PREFIX_WATCHER: &str = "[watcher]";
    pub const LOG_PREFIX_INDEXER: &str = "[indexer]";
    pub const LOG_PREFIX_HEALTH: &str = "[health]";
    pub const LOG_PREFIX_ARCHIVAL: &str = "[archival]";
    pub const LOG_PREFIX_ALERTS: &str = "[alerts]";
}

/// Default filesystem layout rooted at the configured data directory.
pub mod paths {
    pub const PROJECT_STATES_FILE: &str = "project_states.json";
    pub const HEALTH_SCHEDULE_FILE: &str = "health_schedule.json";
    pub const ARCHIVAL_SCHEDULE_FILE: &str = "archival_schedule.json";
    pub const METRICS_DB_FILE: &str = "metrics.db";
    pub const ARCHIVES_DIR: &str = "archives";
    pub const ARCHIVE_MANIFEST_FILE: &str = "manifest.json";
    pub const EMBEDDINGS_CACHE_FILE: &str = "embeddings_cache.db";
    /// `redb`-backed `MemoryStore` file, owned by `memory-storage-redb`.
    pub const MEMORY_STORE_FILE: &str = "memory.redb";
    /// `redb`-backed `KeywordIndex` file, owned by `memory-storage-redb`.
    pub const KEYWORD_INDEX_FILE: &str = "keywords.redb";
}

/// Code parser language extensions recognized by `can_parse`.
pub mod languages {
    pub const SUPPORTED_EXTENSIONS: &[&str] = &[
        "py", "js", "jsx", "mjs", "ts", "tsx", "java", "go", "rs", "rb", "kt", "swift",
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_day_thresholds_increase() {
        assert!(defaults::ACTIVE_DAYS < defaults::RECENT_DAYS);
        assert!(defaults::RECENT_DAYS < defaults::ARCHIVED_DAYS);
    }

    #[test]
    fn health_scale_bounds_ordered() {
        assert!(defaults::WARN_THRESHOLD_MEMORIES < defaults::MAX_MEMORIES_PER_OPERATION);
        assert!(defaults::PAGINATION_PAGE_SIZE <= defaults::WARN_THRESHOLD_MEMORIES);
    }

    #[test]
    fn ideal_distribution_sums_to_one() {
        let sum = defaults::IDEAL_ACTIVE_FRACTION
            + defaults::IDEAL_RECENT_FRACTION
            + defaults::IDEAL_ARCHIVED_FRACTION
            + defaults::IDEAL_STALE_FRACTION;
        assert!((sum - 1.0).abs() < 1e-9);
    }

    #[test]
    fn capacity_thresholds_ordered() {
        assert!(defaults::CAPACITY_DB_SIZE_WARN_MB < defaults::CAPACITY_DB_SIZE_CRITICAL_MB);
        assert!(defaults::CAPACITY_MEMORY_COUNT_WARN < defaults::CAPACITY_MEMORY_COUNT_CRITICAL);
        assert!(defaults::CAPACITY_PROJECT_COUNT_WARN < defaults::CAPACITY_PROJECT_COUNT_CRITICAL);
    }
}
