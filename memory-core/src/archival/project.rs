//! # Project Archival Manager (C13)
//!
//! All project lifecycle state lives in one JSON document keyed by project
//! name, rewritten atomically (write to a temp file, then rename) on every
//! mutation. Grounded in `original_source/src/memory/project_archival.py`;
//! the atomic-rewrite discipline itself is grounded in the same pattern
//! `storage::relational` uses for its own on-disk file.

use crate::constants::defaults::DEFAULT_INACTIVITY_THRESHOLD_DAYS;
use crate::types::{ActivityKind, ProjectLifecycleState, ProjectState};
use crate::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct StateFile {
    projects: HashMap<String, ProjectState>,
    last_updated: chrono::DateTime<Utc>,
}

pub struct ProjectArchivalManager {
    state_file: PathBuf,
    inactivity_threshold_days: i64,
    states: RwLock<HashMap<String, ProjectState>>,
}

/// Outcome of [`ProjectArchivalManager::archive_project`]/`reactivate_project`.
#[derive(Debug, Clone)]
pub struct ArchivalOutcome {
    pub success: bool,
    pub message: String,
}

impl ProjectArchivalManager {
    /// Loads `state_file` if it exists; an unreadable or absent file starts
    /// from an empty map rather than failing, matching the original's
    /// "start fresh on load failure" behavior.
    pub async fn new(state_file: impl AsRef<Path>, inactivity_threshold_days: Option<i64>) -> Result<Self> {
        let state_file = state_file.as_ref().to_path_buf();
        if let Some(parent) = state_file.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let states = match tokio::fs::read(&state_file).await {
            Ok(bytes) => serde_json::from_slice::<StateFile>(&bytes)
                .map(|f| f.projects)
                .unwrap_or_default(),
            Err(_) => HashMap::new(),
        };
        Ok(Self {
            state_file,
            inactivity_threshold_days: inactivity_threshold_days.unwrap_or(DEFAULT_INACTIVITY_THRESHOLD_DAYS),
            states: RwLock::new(states),
        })
    }

    async fn save(&self, states: &HashMap<String, ProjectState>) -> Result<()> {
        let payload = StateFile {
            projects: states.clone(),
            last_updated: Utc::now(),
        };
        let json = serde_json::to_vec_pretty(&payload)?;
        let tmp = self.state_file.with_extension("json.tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.state_file).await?;
        Ok(())
    }

    /// Auto-initializes a fresh `ACTIVE` entry on first access.
    pub async fn get_project_state(&self, project_name: &str) -> Result<ProjectState> {
        {
            let states = self.states.read().await;
            if let Some(state) = states.get(project_name) {
                return Ok(state.clone());
            }
        }
        let mut states = self.states.write().await;
        let state = states.entry(project_name.to_string()).or_insert_with(ProjectState::new).clone();
        self.save(&states).await?;
        Ok(state)
    }

    pub async fn record_activity(&self, project_name: &str, kind: ActivityKind, count: u64) -> Result<()> {
        let mut states = self.states.write().await;
        let state = states.entry(project_name.to_string()).or_insert_with(ProjectState::new);
        state.last_activity = Utc::now();
        match kind {
            ActivityKind::Search => state.searches_count += count,
            ActivityKind::IndexUpdate => state.index_updates_count += count,
            ActivityKind::FilesIndexed => state.files_indexed += count,
        }
        self.save(&states).await
    }

    /// `* -> ARCHIVED`, except `ARCHIVED` itself which is a no-op failure.
    pub async fn archive_project(&self, project_name: &str) -> Result<ArchivalOutcome> {
        let mut states = self.states.write().await;
        let Some(state) = states.get_mut(project_name) else {
            return Ok(ArchivalOutcome {
                success: false,
                message: format!("project '{project_name}' not found"),
            });
        };
        if state.state == ProjectLifecycleState::Archived {
            return Ok(ArchivalOutcome {
                success: false,
                message: format!("project '{project_name}' is already archived"),
            });
        }
        state.state = ProjectLifecycleState::Archived;
        state.archived_at = Some(Utc::now());
        self.save(&states).await?;
        Ok(ArchivalOutcome {
            success: true,
            message: format!("project '{project_name}' archived successfully"),
        })
    }

    /// `ARCHIVED -> ACTIVE`, updating `reactivated_at` and `last_activity`.
    pub async fn reactivate_project(&self, project_name: &str) -> Result<ArchivalOutcome> {
        let mut states = self.states.write().await;
        let Some(state) = states.get_mut(project_name) else {
            return Ok(ArchivalOutcome {
                success: false,
                message: format!("project '{project_name}' not found"),
            });
        };
        if state.state == ProjectLifecycleState::Active {
            return Ok(ArchivalOutcome {
                success: false,
                message: format!("project '{project_name}' is already active"),
            });
        }
        let now = Utc::now();
        state.state = ProjectLifecycleState::Active;
        state.reactivated_at = Some(now);
        state.last_activity = now;
        self.save(&states).await?;
        Ok(ArchivalOutcome {
            success: true,
            message: format!("project '{project_name}' reactivated successfully"),
        })
    }

    /// `ACTIVE` projects whose `days_since(last_activity) >= inactivity_threshold_days`.
    pub async fn get_inactive_projects(&self) -> Result<Vec<String>> {
        let states = self.states.read().await;
        let now = Utc::now();
        Ok(states
            .iter()
            .filter(|(_, state)| {
                state.state == ProjectLifecycleState::Active
                    && (now - state.last_activity).num_seconds() as f64 / 86_400.0 >= self.inactivity_threshold_days as f64
            })
            .map(|(name, _)| name.clone())
            .collect())
    }

    pub async fn get_all_projects(&self) -> Result<HashMap<String, ProjectState>> {
        Ok(self.states.read().await.clone())
    }

    /// The threshold `get_inactive_projects` uses when no per-call override
    /// is supplied.
    #[must_use]
    pub fn inactivity_threshold_days(&self) -> i64 {
        self.inactivity_threshold_days
    }

    pub async fn get_projects_by_state(&self, state: ProjectLifecycleState) -> Result<Vec<String>> {
        Ok(self
            .states
            .read()
            .await
            .iter()
            .filter(|(_, s)| s.state == state)
            .map(|(name, _)| name.clone())
            .collect())
    }

    /// `ACTIVE=1.0, PAUSED=0.5, ARCHIVED=0.1, DELETED=0.0`. Unknown projects
    /// are treated as `ACTIVE` (weight 1.0), matching `get_project_state`'s
    /// auto-initialize default.
    pub async fn get_search_weight(&self, project_name: &str) -> Result<f32> {
        use crate::constants::defaults::{
            SEARCH_WEIGHT_ACTIVE, SEARCH_WEIGHT_ARCHIVED, SEARCH_WEIGHT_DELETED, SEARCH_WEIGHT_PAUSED,
        };
        let state = self.get_project_state(project_name).await?.state;
        Ok(match state {
            ProjectLifecycleState::Active => SEARCH_WEIGHT_ACTIVE,
            ProjectLifecycleState::Paused => SEARCH_WEIGHT_PAUSED,
            ProjectLifecycleState::Archived => SEARCH_WEIGHT_ARCHIVED,
            ProjectLifecycleState::Deleted => SEARCH_WEIGHT_DELETED,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn manager() -> (ProjectArchivalManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("project_states.json");
        (ProjectArchivalManager::new(&path, None).await.unwrap(), dir)
    }

    #[tokio::test]
    async fn get_project_state_auto_initializes_active() {
        let (mgr, _dir) = manager().await;
        let state = mgr.get_project_state("demo").await.unwrap();
        assert_eq!(state.state, ProjectLifecycleState::Active);
        assert_eq!(state.searches_count, 0);
    }

    #[tokio::test]
    async fn record_activity_updates_counters_and_persists() {
        let (mgr, dir) = manager().await;
        mgr.record_activity("demo", ActivityKind::Search, 3).await.unwrap();
        let state = mgr.get_project_state("demo").await.unwrap();
        assert_eq!(state.searches_count, 3);

        let reloaded = ProjectArchivalManager::new(dir.path().join("project_states.json"), None)
            .await
            .unwrap();
        let state = reloaded.get_project_state("demo").await.unwrap();
        assert_eq!(state.searches_count, 3);
    }

    #[tokio::test]
    async fn archive_then_archive_again_fails() {
        let (mgr, _dir) = manager().await;
        mgr.get_project_state("demo").await.unwrap();
        let first = mgr.archive_project("demo").await.unwrap();
        assert!(first.success);
        let second = mgr.archive_project("demo").await.unwrap();
        assert!(!second.success);
    }

    #[tokio::test]
    async fn reactivate_updates_state_and_timestamps() {
        let (mgr, _dir) = manager().await;
        mgr.get_project_state("demo").await.unwrap();
        mgr.archive_project("demo").await.unwrap();
        let outcome = mgr.reactivate_project("demo").await.unwrap();
        assert!(outcome.success);
        let state = mgr.get_project_state("demo").await.unwrap();
        assert_eq!(state.state, ProjectLifecycleState::Active);
        assert!(state.reactivated_at.is_some());
    }

    #[tokio::test]
    async fn search_weight_matches_state() {
        let (mgr, _dir) = manager().await;
        mgr.get_project_state("demo").await.unwrap();
        assert_eq!(mgr.get_search_weight("demo").await.unwrap(), 1.0);
        mgr.archive_project("demo").await.unwrap();
        assert_eq!(mgr.get_search_weight("demo").await.unwrap(), 0.1);
    }

    #[tokio::test]
    async fn unknown_project_not_in_inactive_list_after_creation() {
        let (mgr, _dir) = manager().await;
        mgr.get_project_state("demo").await.unwrap();
        let inactive = mgr.get_inactive_projects().await.unwrap();
        assert!(inactive.is_empty());
    }
}
