//! Loads [`memory_core::types::RagConfig`] from an optional TOML file layered
//! with `CLAUDE_RAG_*` environment variables, then wires up every component
//! the CLI dispatches into: the redb memory store, the relational bookkeeping
//! store, the archival stack, and the health/monitoring stack.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use do_memory_core::archival::bulk::AutoArchiveScheduler;
use do_memory_core::maintenance::HealthScheduler;
use do_memory_core::storage::relational::RelationalStore;
use do_memory_core::types::config::RagConfig;
use do_memory_core::{
    AlertEngine, ArchiveCompressor, ArchiveExporter, ArchiveImporter, BulkArchiver, CapacityPlanner,
    HealthMaintenanceJobs, HealthScorer, MemoryStore, MetricsCollector, ProjectArchivalManager,
};
use do_memory_storage_redb::RedbStore;

/// On-disk layer, TOML file shape. Every field is optional: the layer is
/// merged onto [`RagConfig::default`], never replaces it outright.
#[derive(Debug, Default, serde::Deserialize)]
struct FileConfig {
    data_dir: Option<PathBuf>,
    read_only: Option<bool>,
    #[serde(default)]
    auto_index: FileAutoIndex,
}

#[derive(Debug, Default, serde::Deserialize)]
struct FileAutoIndex {
    enabled: Option<bool>,
    index_on_startup: Option<bool>,
}

fn load_file_config(path: &Path) -> anyhow::Result<FileConfig> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&raw)?)
}

fn env_bool(name: &str, current: bool) -> bool {
    match std::env::var(name) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => current,
    }
}

/// Builds a [`RagConfig`] from defaults, an optional TOML file, and
/// `CLAUDE_RAG_*` environment overrides, in that increasing order of
/// precedence.
pub fn load_rag_config(config_path: Option<&Path>) -> anyhow::Result<RagConfig> {
    let mut config = RagConfig::default();

    let file_path = config_path.map(Path::to_path_buf).unwrap_or_else(default_config_file);
    let file = load_file_config(&file_path)?;
    if let Some(data_dir) = file.data_dir {
        config.data_dir = data_dir;
    }
    if let Some(read_only) = file.read_only {
        config.read_only = read_only;
    }
    if let Some(enabled) = file.auto_index.enabled {
        config.auto_index.enabled = enabled;
    }
    if let Some(on_startup) = file.auto_index.index_on_startup {
        config.auto_index.index_on_startup = on_startup;
    }

    if let Ok(data_dir) = std::env::var("CLAUDE_RAG_DATA_DIR") {
        config.data_dir = PathBuf::from(data_dir);
    }
    config.read_only = env_bool("CLAUDE_RAG_READ_ONLY", config.read_only);
    config.auto_index.enabled = env_bool("CLAUDE_RAG_AUTO_INDEX_ENABLED", config.auto_index.enabled);
    config.auto_index.index_on_startup =
        env_bool("CLAUDE_RAG_AUTO_INDEX_ON_STARTUP", config.auto_index.index_on_startup);

    Ok(config)
}

fn default_config_file() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".claude-rag")
        .join("config.toml")
}

/// Every component a CLI command might dispatch into, built once at startup
/// and passed by reference to each command handler.
pub struct CliContext {
    pub config: RagConfig,
    pub store: Arc<dyn MemoryStore>,
    pub relational: Arc<RelationalStore>,
    pub archival: Arc<ProjectArchivalManager>,
    pub compressor: Arc<ArchiveCompressor>,
    pub exporter: ArchiveExporter,
    pub importer: ArchiveImporter,
    pub bulk: Arc<BulkArchiver>,
    pub auto_archive_scheduler: AutoArchiveScheduler,
    pub health_scorer: HealthScorer,
    pub health_jobs: Arc<HealthMaintenanceJobs>,
    pub health_scheduler: HealthScheduler,
    pub metrics: MetricsCollector,
    pub alerts: AlertEngine,
    pub capacity: CapacityPlanner,
}

impl CliContext {
    pub async fn new(config: RagConfig) -> anyhow::Result<Self> {
        use do_memory_core::constants::paths;

        tokio::fs::create_dir_all(&config.data_dir).await?;

        let store: Arc<dyn MemoryStore> =
            Arc::new(RedbStore::new(&config.data_dir.join(paths::MEMORY_STORE_FILE)).await?);
        store.initialize().await?;

        let relational = Arc::new(RelationalStore::open(&config.data_dir.join(paths::METRICS_DB_FILE)).await?);

        let archival = Arc::new(
            ProjectArchivalManager::new(
                config.data_dir.join(paths::PROJECT_STATES_FILE),
                Some(config.archival.inactivity_threshold_days),
            )
            .await?,
        );

        let archive_root = config.data_dir.join(paths::ARCHIVES_DIR);
        let compressor = Arc::new(ArchiveCompressor::new(&archive_root, Some(config.archival.compression_level)).await?);
        let exporter = ArchiveExporter::new(compressor.clone(), config.archival.compression_level);
        let importer = ArchiveImporter::new(compressor.clone());

        let bulk = Arc::new(BulkArchiver::new(archival.clone(), config.archival.max_projects_per_operation));
        let auto_archive_scheduler =
            AutoArchiveScheduler::new(bulk.clone(), config.data_dir.join(paths::ARCHIVAL_SCHEDULE_FILE)).await;

        let health_scorer = HealthScorer::new(config.health);
        let health_jobs = Arc::new(HealthMaintenanceJobs::new(
            store.clone(),
            config.lifecycle,
            HealthScorer::new(config.health),
        ));
        let health_scheduler =
            HealthScheduler::new(health_jobs.clone(), config.data_dir.join(paths::HEALTH_SCHEDULE_FILE)).await;

        let metrics = MetricsCollector::new(relational.clone());
        let alerts = AlertEngine::new(relational.clone(), config.alerts.clone());
        let capacity = CapacityPlanner::new(relational.clone());

        Ok(Self {
            config,
            store,
            relational,
            archival,
            compressor,
            exporter,
            importer,
            bulk,
            auto_archive_scheduler,
            health_scorer,
            health_jobs,
            health_scheduler,
            metrics,
            alerts,
            capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_missing_file_uses_defaults() {
        let config = load_file_config(Path::new("/nonexistent/do-memory-cli-test.toml")).unwrap();
        assert!(config.data_dir.is_none());
    }

    #[test]
    fn env_bool_parses_common_truthy_values() {
        std::env::set_var("DO_MEMORY_CLI_TEST_FLAG", "true");
        assert!(env_bool("DO_MEMORY_CLI_TEST_FLAG", false));
        std::env::set_var("DO_MEMORY_CLI_TEST_FLAG", "0");
        assert!(!env_bool("DO_MEMORY_CLI_TEST_FLAG", true));
        std::env::remove_var("DO_MEMORY_CLI_TEST_FLAG");
    }

    #[tokio::test]
    async fn cli_context_builds_against_a_fresh_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RagConfig::default();
        config.data_dir = dir.path().to_path_buf();
        let ctx = CliContext::new(config).await.unwrap();
        assert_eq!(ctx.store.count().await.unwrap(), 0);
    }
}
