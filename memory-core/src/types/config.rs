// ============================================================================
// Configuration
// ============================================================================

use crate::constants::defaults;

/// Lifecycle day thresholds and weights for one [`crate::types::ContextLevel`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifecycleThresholds {
    pub active_days: i64,
    pub recent_days: i64,
    pub archived_days: i64,
}

/// Full lifecycle configuration: per-context-level thresholds plus the
/// shared promotion/weighting knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LifecycleConfig {
    pub user_preference: LifecycleThresholds,
    pub project_context: LifecycleThresholds,
    pub session_state: LifecycleThresholds,
    pub high_access_threshold: u64,
    pub weight_active: f32,
    pub weight_recent: f32,
    pub weight_archived: f32,
    pub weight_stale: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        let project_context = LifecycleThresholds {
            active_days: defaults::ACTIVE_DAYS,
            recent_days: defaults::RECENT_DAYS,
            archived_days: defaults::ARCHIVED_DAYS,
        };
        Self {
            user_preference: LifecycleThresholds {
                active_days: defaults::ACTIVE_DAYS * 2,
                recent_days: defaults::RECENT_DAYS * 2,
                archived_days: defaults::ARCHIVED_DAYS * 2,
            },
            project_context,
            session_state: LifecycleThresholds {
                active_days: defaults::ACTIVE_DAYS / 2,
                recent_days: defaults::RECENT_DAYS / 2,
                archived_days: defaults::ARCHIVED_DAYS / 2,
            },
            high_access_threshold: defaults::HIGH_ACCESS_THRESHOLD,
            weight_active: defaults::LIFECYCLE_WEIGHT_ACTIVE,
            weight_recent: defaults::LIFECYCLE_WEIGHT_RECENT,
            weight_archived: defaults::LIFECYCLE_WEIGHT_ARCHIVED,
            weight_stale: defaults::LIFECYCLE_WEIGHT_STALE,
        }
    }
}

/// Health scorer scale bounds and grade cutoffs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthThresholds {
    pub max_memories_per_operation: usize,
    pub warn_threshold_memories: usize,
    pub pagination_page_size: usize,
    pub max_duplicate_check_memories: usize,
    pub grade_excellent_min: f64,
    pub grade_good_min: f64,
    pub grade_fair_min: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        Self {
            max_memories_per_operation: defaults::MAX_MEMORIES_PER_OPERATION,
            warn_threshold_memories: defaults::WARN_THRESHOLD_MEMORIES,
            pagination_page_size: defaults::PAGINATION_PAGE_SIZE,
            max_duplicate_check_memories: defaults::MAX_DUPLICATE_CHECK_MEMORIES,
            grade_excellent_min: defaults::GRADE_EXCELLENT_MIN,
            grade_good_min: defaults::GRADE_GOOD_MIN,
            grade_fair_min: defaults::GRADE_FAIR_MIN,
        }
    }
}

/// Auto-indexing service configuration (C5).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AutoIndexConfig {
    pub enabled: bool,
    pub index_on_startup: bool,
    /// Projects with at most this many indexable files index in the
    /// foreground; above it, indexing runs in the background.
    pub size_threshold: usize,
    pub max_concurrency: usize,
    pub close_timeout_secs: u64,
}

impl Default for AutoIndexConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            index_on_startup: false,
            size_threshold: defaults::DEFAULT_AUTO_INDEX_SIZE_THRESHOLD,
            max_concurrency: std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4),
            close_timeout_secs: defaults::CLOSE_TIMEOUT_SECS,
        }
    }
}

/// File watcher configuration (C3).
#[derive(Debug, Clone, PartialEq)]
pub struct WatcherConfig {
    pub debounce_ms: u64,
    pub allowed_extensions: Vec<String>,
    pub exclude_patterns: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: defaults::DEFAULT_DEBOUNCE_MS,
            allowed_extensions: crate::constants::languages::SUPPORTED_EXTENSIONS
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            exclude_patterns: vec![
                ".git/**".to_string(),
                "node_modules/**".to_string(),
                "target/**".to_string(),
                "**/__pycache__/**".to_string(),
            ],
        }
    }
}

/// Project archival configuration (C13, C16).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArchivalConfig {
    pub inactivity_threshold_days: i64,
    pub max_projects_per_operation: usize,
    pub compression_level: u32,
}

impl Default for ArchivalConfig {
    fn default() -> Self {
        Self {
            inactivity_threshold_days: defaults::DEFAULT_INACTIVITY_THRESHOLD_DAYS,
            max_projects_per_operation: defaults::DEFAULT_MAX_PROJECTS_PER_OPERATION,
            compression_level: defaults::DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

/// One metric's alert thresholds and comparison direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlertComparison {
    LessThan,
    LessOrEqual,
    Equal,
    GreaterOrEqual,
    GreaterThan,
}

/// A single entry in the alert engine's threshold table.
#[derive(Debug, Clone)]
pub struct AlertThreshold {
    pub metric_name: &'static str,
    pub comparison: AlertComparison,
    pub warning: f64,
    pub critical: f64,
}

/// Alert engine configuration (C18): an allow-list of evaluated metrics.
#[derive(Debug, Clone)]
pub struct AlertConfig {
    pub thresholds: Vec<AlertThreshold>,
    pub retention_days: i64,
}

impl Default for AlertConfig {
    fn default() -> Self {
        use AlertComparison::{GreaterOrEqual, LessOrEqual};
        Self {
            thresholds: vec![
                AlertThreshold {
                    metric_name: "avg_search_latency_ms",
                    comparison: GreaterOrEqual,
                    warning: 500.0,
                    critical: 2000.0,
                },
                AlertThreshold {
                    metric_name: "p95_search_latency_ms",
                    comparison: GreaterOrEqual,
                    warning: 1500.0,
                    critical: 5000.0,
                },
                AlertThreshold {
                    metric_name: "cache_hit_rate",
                    comparison: LessOrEqual,
                    warning: 0.5,
                    critical: 0.2,
                },
                AlertThreshold {
                    metric_name: "index_staleness_ratio",
                    comparison: GreaterOrEqual,
                    warning: 0.2,
                    critical: 0.5,
                },
                AlertThreshold {
                    metric_name: "avg_result_relevance",
                    comparison: LessOrEqual,
                    warning: 0.5,
                    critical: 0.3,
                },
                AlertThreshold {
                    metric_name: "noise_ratio",
                    comparison: GreaterOrEqual,
                    warning: 0.3,
                    critical: 0.5,
                },
                AlertThreshold {
                    metric_name: "duplicate_rate",
                    comparison: GreaterOrEqual,
                    warning: 0.1,
                    critical: 0.25,
                },
                AlertThreshold {
                    metric_name: "database_size_mb",
                    comparison: GreaterOrEqual,
                    warning: 1500.0,
                    critical: 2000.0,
                },
                AlertThreshold {
                    metric_name: "health_score",
                    comparison: LessOrEqual,
                    warning: 60.0,
                    critical: 40.0,
                },
            ],
            retention_days: 90,
        }
    }
}

/// Hybrid search score-fusion configuration (C7).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchConfig {
    pub semantic_weight: f32,
    pub lexical_weight: f32,
    pub default_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: defaults::HYBRID_SEMANTIC_WEIGHT,
            lexical_weight: defaults::HYBRID_LEXICAL_WEIGHT,
            default_limit: 10,
        }
    }
}

/// One cron-style day+time trigger shared by the weekly jobs in
/// [`HealthScheduleConfig`]. `day` follows ISO weekday numbering used
/// throughout this config: `0 = Monday` .. `6 = Sunday`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WeeklyTrigger {
    pub enabled: bool,
    pub day: u8,
    /// `(hour, minute)`, 24-hour, matching the "HH:MM" the config file
    /// shows this as in the original Python implementation.
    pub time: (u8, u8),
    pub threshold_days: i64,
}

/// Monthly cleanup trigger: `day` is a day-of-month, `1..=31`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MonthlyTrigger {
    pub enabled: bool,
    pub day: u8,
    /// `(hour, minute)`, 24-hour, matching the "HH:MM" the config file
    /// shows this as in the original Python implementation.
    pub time: (u8, u8),
    pub threshold_days: i64,
}

/// Weekly health-report trigger; no threshold, it only reads and logs.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReportTrigger {
    pub enabled: bool,
    pub day: u8,
    /// `(hour, minute)`, 24-hour.
    pub time: (u8, u8),
}

/// Persisted schedule for the health scheduler (C12), round-tripped through
/// `health_schedule.json`.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HealthScheduleConfig {
    pub enabled: bool,
    pub weekly_archival: WeeklyTrigger,
    pub monthly_cleanup: MonthlyTrigger,
    pub weekly_report: ReportTrigger,
}

impl Default for HealthScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            weekly_archival: WeeklyTrigger {
                enabled: true,
                day: 6, // Sunday
                time: (1, 0),
                threshold_days: 90,
            },
            monthly_cleanup: MonthlyTrigger {
                enabled: true,
                day: 1,
                time: (2, 0),
                threshold_days: defaults::CLEANUP_MIN_AGE_DAYS,
            },
            weekly_report: ReportTrigger {
                enabled: true,
                day: 0, // Monday
                time: (9, 0),
            },
        }
    }
}

/// How often [`crate::archival::bulk::AutoArchiveScheduler`] runs
/// `auto_archive_inactive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum AutoArchiveSchedule {
    Daily,
    Weekly,
    Monthly,
}

/// Configuration for the automatic archival scheduler (C16).
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ArchivalScheduleConfig {
    pub enabled: bool,
    pub schedule: AutoArchiveSchedule,
    pub inactivity_days: i64,
    pub dry_run: bool,
    pub max_projects_per_run: usize,
}

impl Default for ArchivalScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            schedule: AutoArchiveSchedule::Weekly,
            inactivity_days: 45,
            dry_run: true,
            max_projects_per_run: 10,
        }
    }
}

/// Top-level configuration aggregating every component's config. Loaded by
/// `memory_core::config` from an optional TOML file layered with
/// `CLAUDE_RAG_*` environment variables; internal services only ever see
/// the typed structs below, never the raw file/env layer.
#[derive(Debug, Clone)]
pub struct RagConfig {
    pub data_dir: std::path::PathBuf,
    pub read_only: bool,
    pub lifecycle: LifecycleConfig,
    pub health: HealthThresholds,
    pub auto_index: AutoIndexConfig,
    pub watcher: WatcherConfig,
    pub archival: ArchivalConfig,
    pub alerts: AlertConfig,
    pub search: SearchConfig,
    pub health_schedule: HealthScheduleConfig,
    pub archival_schedule: ArchivalScheduleConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .unwrap_or_else(|| std::path::PathBuf::from("."))
            .join(".claude-rag");
        Self {
            data_dir,
            read_only: false,
            lifecycle: LifecycleConfig::default(),
            health: HealthThresholds::default(),
            auto_index: AutoIndexConfig::default(),
            watcher: WatcherConfig::default(),
            archival: ArchivalConfig::default(),
            alerts: AlertConfig::default(),
            search: SearchConfig::default(),
            health_schedule: HealthScheduleConfig::default(),
            archival_schedule: ArchivalScheduleConfig::default(),
        }
    }
}
