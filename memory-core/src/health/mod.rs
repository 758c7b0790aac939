//! # Health Scorer (C10)
//!
//! Derives noise/duplicate/distribution metrics and an overall grade from a
//! snapshot of stored memories. Grounded in
//! `original_source/src/memory/health_scorer.py`. Pure with respect to
//! storage — callers fetch memories (paginated above
//! `WARN_THRESHOLD_MEMORIES`) and hand them to [`HealthScorer`].

use crate::constants::defaults;
use crate::types::config::HealthThresholds;
use crate::types::{HealthGrade, LifecycleState, MemoryUnit};
use chrono::Utc;
use std::collections::HashMap;

/// Per-state counts plus the derived scores and a plain-English grade.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthScore {
    pub overall: f64,
    pub noise_ratio: f64,
    pub duplicate_rate: f64,
    pub contradiction_rate: f64,
    pub distribution_score: f64,
    pub active_count: usize,
    pub recent_count: usize,
    pub archived_count: usize,
    pub stale_count: usize,
    pub total: usize,
    pub grade: HealthGrade,
    pub recommendations: Vec<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

pub struct HealthScorer {
    thresholds: HealthThresholds,
}

impl HealthScorer {
    #[must_use]
    pub fn new(thresholds: HealthThresholds) -> Self {
        Self { thresholds }
    }

    /// Compute the overall health of the dataset described by `memories`.
    /// `total_count` is the actual store-wide count; when it exceeds
    /// `MAX_MEMORIES_PER_OPERATION` the scorer logs and returns an empty
    /// distribution rather than attempting to hold the whole set in memory.
    #[must_use]
    pub fn calculate_overall_health(&self, memories: &[MemoryUnit], total_count: usize) -> HealthScore {
        if total_count > self.thresholds.max_memories_per_operation {
            tracing::error!(
                total_count,
                cap = self.thresholds.max_memories_per_operation,
                "health scorer: dataset exceeds MAX_MEMORIES_PER_OPERATION, returning empty distribution"
            );
            return HealthScore {
                overall: 0.0,
                noise_ratio: 0.0,
                duplicate_rate: 0.0,
                contradiction_rate: 0.0,
                distribution_score: 0.0,
                active_count: 0,
                recent_count: 0,
                archived_count: 0,
                stale_count: 0,
                total: total_count,
                grade: HealthGrade::Poor,
                recommendations: vec!["dataset too large for a single health pass".to_string()],
                timestamp: Utc::now(),
            };
        }
        if total_count > self.thresholds.warn_threshold_memories {
            tracing::warn!(
                total_count,
                warn_at = self.thresholds.warn_threshold_memories,
                "health scorer: dataset is large, scoring proceeds in pages"
            );
        }

        let total = memories.len();
        let mut counts: HashMap<LifecycleState, usize> = HashMap::new();
        for unit in memories {
            *counts.entry(unit.lifecycle_state).or_insert(0) += 1;
        }
        let active_count = *counts.get(&LifecycleState::Active).unwrap_or(&0);
        let recent_count = *counts.get(&LifecycleState::Recent).unwrap_or(&0);
        let archived_count = *counts.get(&LifecycleState::Archived).unwrap_or(&0);
        let stale_count = *counts.get(&LifecycleState::Stale).unwrap_or(&0);

        let distribution_score = Self::distribution_score(total, active_count, recent_count, archived_count, stale_count);
        let noise_ratio = Self::noise_ratio(total, archived_count, stale_count);
        let duplicate_rate = self.duplicate_rate(memories);
        let contradiction_rate = 0.0; // stubbed per spec.md §9 Open Questions

        let overall = 0.4 * (1.0 - noise_ratio) * 100.0
            + 0.2 * (1.0 - duplicate_rate) * 100.0
            + 0.2 * (1.0 - contradiction_rate) * 100.0
            + 0.2 * distribution_score;

        let grade = if overall >= self.thresholds.grade_excellent_min {
            HealthGrade::Excellent
        } else if overall >= self.thresholds.grade_good_min {
            HealthGrade::Good
        } else if overall >= self.thresholds.grade_fair_min {
            HealthGrade::Fair
        } else {
            HealthGrade::Poor
        };

        HealthScore {
            overall,
            noise_ratio,
            duplicate_rate,
            contradiction_rate,
            distribution_score,
            active_count,
            recent_count,
            archived_count,
            stale_count,
            total,
            recommendations: Self::recommendations(noise_ratio, duplicate_rate, distribution_score, grade),
            grade,
            timestamp: Utc::now(),
        }
    }

    fn distribution_score(
        total: usize,
        active: usize,
        recent: usize,
        archived: usize,
        stale: usize,
    ) -> f64 {
        if total == 0 {
            return 100.0;
        }
        let total = total as f64;
        let deviations = (active as f64 / total - defaults::IDEAL_ACTIVE_FRACTION).abs()
            + (recent as f64 / total - defaults::IDEAL_RECENT_FRACTION).abs()
            + (archived as f64 / total - defaults::IDEAL_ARCHIVED_FRACTION).abs()
            + (stale as f64 / total - defaults::IDEAL_STALE_FRACTION).abs();
        100.0 * (1.0 - deviations.min(2.0) / 2.0)
    }

    fn noise_ratio(total: usize, archived: usize, stale: usize) -> f64 {
        if total == 0 {
            return 0.0;
        }
        ((stale as f64 + 0.5 * archived as f64) / total as f64).clamp(0.0, 1.0)
    }

    /// Exact-content (case-insensitive, trimmed) duplicate rate. Above
    /// `MAX_DUPLICATE_CHECK_MEMORIES` a full detector is out of scope, so we
    /// log a warning and return 0 rather than scan an unbounded set.
    fn duplicate_rate(&self, memories: &[MemoryUnit]) -> f64 {
        if memories.len() > self.thresholds.max_duplicate_check_memories {
            tracing::warn!(
                count = memories.len(),
                cap = self.thresholds.max_duplicate_check_memories,
                "health scorer: skipping duplicate detection above MAX_DUPLICATE_CHECK_MEMORIES"
            );
            return 0.0;
        }
        if memories.is_empty() {
            return 0.0;
        }
        let mut seen: HashMap<String, usize> = HashMap::new();
        for unit in memories {
            let key = unit.content.trim().to_lowercase();
            *seen.entry(key).or_insert(0) += 1;
        }
        let duplicates: usize = seen.values().filter(|&&c| c > 1).map(|&c| c - 1).sum();
        duplicates as f64 / memories.len() as f64
    }

    fn recommendations(
        noise_ratio: f64,
        duplicate_rate: f64,
        distribution_score: f64,
        grade: HealthGrade,
    ) -> Vec<String> {
        let mut out = Vec::new();
        if noise_ratio > 0.3 {
            out.push("run weekly archival to move aging memories out of ACTIVE".to_string());
        }
        if duplicate_rate > 0.1 {
            out.push("deduplicate near-identical memory content".to_string());
        }
        if distribution_score < 70.0 {
            out.push("lifecycle distribution is skewed; check decay thresholds".to_string());
        }
        if matches!(grade, HealthGrade::Poor) {
            out.push("overall health is poor; consider a monthly cleanup pass".to_string());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Category, ContextLevel};
    use std::collections::HashMap as StdHashMap;

    fn unit(state: LifecycleState, content: &str) -> MemoryUnit {
        MemoryUnit {
            id: uuid::Uuid::new_v4(),
            content: content.to_string(),
            embedding: vec![],
            category: Category::CodeUnit,
            context_level: ContextLevel::ProjectContext,
            lifecycle_state: state,
            project_name: None,
            created_at: Utc::now(),
            last_accessed: Utc::now(),
            use_count: 0,
            metadata: StdHashMap::new(),
        }
    }

    #[test]
    fn empty_dataset_scores_perfect_distribution() {
        let scorer = HealthScorer::new(HealthThresholds::default());
        let score = scorer.calculate_overall_health(&[], 0);
        assert_eq!(score.distribution_score, 100.0);
        assert_eq!(score.noise_ratio, 0.0);
    }

    #[test]
    fn duplicate_content_is_case_and_whitespace_insensitive() {
        let scorer = HealthScorer::new(HealthThresholds::default());
        let memories = vec![
            unit(LifecycleState::Active, "  Hello World  "),
            unit(LifecycleState::Active, "hello world"),
            unit(LifecycleState::Active, "something else"),
        ];
        let score = scorer.calculate_overall_health(&memories, memories.len());
        assert!((score.duplicate_rate - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn dataset_above_cap_returns_empty_distribution() {
        let mut thresholds = HealthThresholds::default();
        thresholds.max_memories_per_operation = 2;
        let scorer = HealthScorer::new(thresholds);
        let score = scorer.calculate_overall_health(&[], 5);
        assert_eq!(score.total, 5);
        assert_eq!(score.overall, 0.0);
    }

    #[test]
    fn grade_buckets_follow_spec_cutoffs() {
        let scorer = HealthScorer::new(HealthThresholds::default());
        let memories: Vec<MemoryUnit> = (0..60)
            .map(|_| unit(LifecycleState::Active, "unique"))
            .chain((0..25).map(|_| unit(LifecycleState::Recent, "unique")))
            .chain((0..10).map(|_| unit(LifecycleState::Archived, "unique")))
            .chain((0..5).map(|_| unit(LifecycleState::Stale, "unique")))
            .enumerate()
            .map(|(i, mut u)| {
                u.content = format!("unique-{i}");
                u
            })
            .collect();
        let score = scorer.calculate_overall_health(&memories, memories.len());
        assert_eq!(score.grade, HealthGrade::Excellent);
    }
}
