// ============================================================================
// Type Definitions
//
// Split into submodules by concern: `enums` (closed classifications),
// `structs` (the data model of spec.md §3), `config` (typed configuration
// consumed by every component, assembled by `crate::config`).
// ============================================================================

pub mod config;
pub mod enums;
pub mod structs;

pub use config::{
    AlertComparison, AlertConfig, AlertThreshold, ArchivalConfig, ArchivalScheduleConfig,
    AutoArchiveSchedule, AutoIndexConfig, HealthScheduleConfig, HealthThresholds, LifecycleConfig,
    LifecycleThresholds, MonthlyTrigger, RagConfig, ReportTrigger, SearchConfig, WatcherConfig,
    WeeklyTrigger,
};
pub use enums::{
    ActivityKind, AlertSeverity, CapacityStatus, Category, ConflictPolicy, ContextLevel,
    HealthGrade, LifecycleState, OperationStatus, ProjectLifecycleState, Trend,
};
pub use structs::{
    Alert, ArchiveManifest, CompressionInfo, HealthMetrics, MemoryUnit, ProjectIndexMetadata,
    ProjectState, RestoreInfo, SemanticUnit,
};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[test]
    fn memory_unit_record_access_bumps_use_count_and_timestamp() {
        let mut unit = MemoryUnit {
            id: Uuid::new_v4(),
            content: "fn foo() {}".into(),
            embedding: vec![0.0; 4],
            category: Category::CodeUnit,
            context_level: ContextLevel::ProjectContext,
            lifecycle_state: LifecycleState::Active,
            project_name: Some("demo".into()),
            created_at: Utc::now(),
            last_accessed: Utc::now() - chrono::Duration::days(1),
            use_count: 0,
            metadata: HashMap::new(),
        };
        let before = unit.last_accessed;
        unit.record_access();
        assert_eq!(unit.use_count, 1);
        assert!(unit.last_accessed > before);
    }

    #[test]
    fn rag_config_default_data_dir_ends_in_claude_rag() {
        let config = RagConfig::default();
        assert!(config.data_dir.ends_with(".claude-rag"));
    }
}
