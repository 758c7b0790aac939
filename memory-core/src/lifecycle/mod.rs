//! # Lifecycle Manager (C9)
//!
//! Pure calculator: `(created_at, last_accessed, use_count, context_level) ->
//! LifecycleState`, plus the search-weight decay curve that lets expired
//! memories still surface, just ranked lower. Grounded in
//! `original_source/src/memory/lifecycle_manager.py`; nothing here touches
//! storage, so it has no async surface at all.

use crate::types::config::LifecycleConfig;
use crate::types::{ContextLevel, LifecycleState};
use chrono::{DateTime, Utc};

fn thresholds_for(config: &LifecycleConfig, context_level: ContextLevel) -> crate::types::config::LifecycleThresholds {
    match context_level {
        ContextLevel::UserPreference => config.user_preference,
        ContextLevel::ProjectContext => config.project_context,
        ContextLevel::SessionState => config.session_state,
    }
}

/// Derive the lifecycle state a memory with these aging fields should be in
/// right now, per spec.md §4.C9's table. High-access memories (`use_count >=
/// high_access_threshold`) get a grace window: they stay `ACTIVE`/`RECENT`
/// for longer than the plain day-threshold table would allow.
#[must_use]
pub fn calculate_state(
    config: &LifecycleConfig,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
    use_count: u64,
    context_level: ContextLevel,
) -> LifecycleState {
    let _ = created_at; // part of the signature per spec.md; state depends only on last_accessed/use_count
    let thresholds = thresholds_for(config, context_level);
    let days_since = (Utc::now() - last_accessed).num_days().max(0);

    if use_count >= config.high_access_threshold {
        if days_since < thresholds.recent_days {
            return LifecycleState::Active;
        }
        if days_since < thresholds.archived_days {
            return LifecycleState::Recent;
        }
    }

    if days_since < thresholds.active_days {
        LifecycleState::Active
    } else if days_since < thresholds.recent_days {
        LifecycleState::Recent
    } else if days_since < thresholds.archived_days {
        LifecycleState::Archived
    } else {
        LifecycleState::Stale
    }
}

/// Multiplier applied to a search result's score before final ranking.
#[must_use]
pub fn lifecycle_weight(config: &LifecycleConfig, state: LifecycleState) -> f32 {
    match state {
        LifecycleState::Active => config.weight_active,
        LifecycleState::Recent => config.weight_recent,
        LifecycleState::Archived => config.weight_archived,
        LifecycleState::Stale => config.weight_stale,
    }
}

/// Whether a recomputed state differs from the persisted one. Both aging
/// (state decays) and promotion (a burst of use_count lifts it back up) are
/// allowed transitions.
#[must_use]
pub fn should_transition(old: LifecycleState, new: LifecycleState) -> bool {
    old != new
}

/// One row of a `bulk_update_states` pass: what a memory's state was before
/// and what it is now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub id: uuid::Uuid,
    pub old: LifecycleState,
    pub new: LifecycleState,
}

/// Recompute every memory's state against `config` and return only the ones
/// that changed. Callers (the weekly archival job, a maintenance CLI verb)
/// are responsible for persisting the new states via `MemoryStore`.
#[must_use]
pub fn bulk_update_states(
    config: &LifecycleConfig,
    memories: &[crate::types::MemoryUnit],
) -> Vec<StateTransition> {
    memories
        .iter()
        .filter_map(|unit| {
            let new = calculate_state(
                config,
                unit.created_at,
                unit.last_accessed,
                unit.use_count,
                unit.context_level,
            );
            if should_transition(unit.lifecycle_state, new) {
                Some(StateTransition {
                    id: unit.id,
                    old: unit.lifecycle_state,
                    new,
                })
            } else {
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn memory_aged(days: i64, use_count: u64) -> (DateTime<Utc>, DateTime<Utc>, u64) {
        let now = Utc::now();
        (now - Duration::days(days + 30), now - Duration::days(days), use_count)
    }

    #[test]
    fn scenario_s3_lifecycle_aging() {
        let config = LifecycleConfig::default();
        let cases = [
            (2, LifecycleState::Active),
            (15, LifecycleState::Recent),
            (60, LifecycleState::Archived),
            (200, LifecycleState::Stale),
        ];
        for (days, expected) in cases {
            let (created, accessed, use_count) = memory_aged(days, 1);
            let state = calculate_state(&config, created, accessed, use_count, ContextLevel::ProjectContext);
            assert_eq!(state, expected, "day {days} should map to {expected:?}");
        }
    }

    #[test]
    fn high_access_count_extends_active_window() {
        let config = LifecycleConfig::default();
        let (created, accessed, use_count) = memory_aged(20, 15);
        // 20 days would normally be RECENT (>= active_days=7, < recent_days=30),
        // but high use_count keeps it ACTIVE while within recent_days.
        let state = calculate_state(&config, created, accessed, use_count, ContextLevel::ProjectContext);
        assert_eq!(state, LifecycleState::Active);
    }

    #[test]
    fn user_preference_ages_slower_than_project_context() {
        let config = LifecycleConfig::default();
        let (created, accessed, use_count) = memory_aged(200, 1);
        let project = calculate_state(&config, created, accessed, use_count, ContextLevel::ProjectContext);
        let user_pref = calculate_state(&config, created, accessed, use_count, ContextLevel::UserPreference);
        assert_eq!(project, LifecycleState::Stale);
        assert_ne!(user_pref, LifecycleState::Stale);
    }

    #[test]
    fn lifecycle_weights_match_spec_table() {
        let config = LifecycleConfig::default();
        assert_eq!(lifecycle_weight(&config, LifecycleState::Active), 1.0);
        assert_eq!(lifecycle_weight(&config, LifecycleState::Recent), 0.7);
        assert_eq!(lifecycle_weight(&config, LifecycleState::Archived), 0.3);
        assert_eq!(lifecycle_weight(&config, LifecycleState::Stale), 0.1);
    }

    #[test]
    fn bulk_update_states_only_returns_changes() {
        use crate::types::{Category, MemoryUnit};
        use std::collections::HashMap;

        let config = LifecycleConfig::default();
        let now = Utc::now();
        let mut unchanged = MemoryUnit {
            id: uuid::Uuid::new_v4(),
            content: "x".into(),
            embedding: vec![],
            category: Category::CodeUnit,
            context_level: ContextLevel::ProjectContext,
            lifecycle_state: LifecycleState::Active,
            project_name: None,
            created_at: now,
            last_accessed: now,
            use_count: 0,
            metadata: HashMap::new(),
        };
        let mut changed = unchanged.clone();
        changed.id = uuid::Uuid::new_v4();
        changed.last_accessed = now - Duration::days(200);
        unchanged.lifecycle_state = LifecycleState::Active;

        let transitions = bulk_update_states(&config, &[unchanged, changed.clone()]);
        assert_eq!(transitions.len(), 1);
        assert_eq!(transitions[0].id, changed.id);
        assert_eq!(transitions[0].new, LifecycleState::Stale);
    }
}
