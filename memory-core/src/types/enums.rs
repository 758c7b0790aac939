use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// Classification of a [`crate::types::MemoryUnit`]'s content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Category {
    /// A discrete fact supplied or derived.
    Fact,
    /// A standing user preference.
    Preference,
    /// Contextual information about a project or task.
    Context,
    /// A parsed source-code unit (function, class, module, ...).
    CodeUnit,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Category::Fact => "FACT",
            Category::Preference => "PREFERENCE",
            Category::Context => "CONTEXT",
            Category::CodeUnit => "CODE_UNIT",
        };
        write!(f, "{s}")
    }
}

/// A memory's lifetime class, governing the day thresholds used by
/// [`crate::lifecycle::calculate_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ContextLevel {
    /// Long-lived: user preferences age out slowest.
    UserPreference,
    /// The default lifetime class.
    ProjectContext,
    /// Short-lived session-scoped state, ages out fastest.
    SessionState,
}

impl Default for ContextLevel {
    fn default() -> Self {
        ContextLevel::ProjectContext
    }
}

/// Derived aging/usage state of a memory, used to weight search results
/// and drive maintenance jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleState {
    Active,
    Recent,
    Archived,
    Stale,
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LifecycleState::Active => "ACTIVE",
            LifecycleState::Recent => "RECENT",
            LifecycleState::Archived => "ARCHIVED",
            LifecycleState::Stale => "STALE",
        };
        write!(f, "{s}")
    }
}

/// A project's own archival lifecycle state (distinct from the per-memory
/// [`LifecycleState`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProjectLifecycleState {
    Active,
    Paused,
    Archived,
    Deleted,
}

impl std::fmt::Display for ProjectLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProjectLifecycleState::Active => "ACTIVE",
            ProjectLifecycleState::Paused => "PAUSED",
            ProjectLifecycleState::Archived => "ARCHIVED",
            ProjectLifecycleState::Deleted => "DELETED",
        };
        write!(f, "{s}")
    }
}

/// The kind of activity recorded against a [`crate::types::ProjectState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Search,
    IndexUpdate,
    FilesIndexed,
}

/// Conflict resolution policy for importing a portable archive onto an
/// existing archive of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    Skip,
    Overwrite,
    Merge,
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        ConflictPolicy::Skip
    }
}

impl std::str::FromStr for ConflictPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "skip" => Ok(ConflictPolicy::Skip),
            "overwrite" => Ok(ConflictPolicy::Overwrite),
            "merge" => Ok(ConflictPolicy::Merge),
            other => Err(format!("unknown conflict policy: {other}")),
        }
    }
}

/// Severity of an [`crate::types::Alert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

/// Health grade bucket, from [`crate::health::HealthScore::overall`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthGrade {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl std::fmt::Display for HealthGrade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HealthGrade::Excellent => "Excellent",
            HealthGrade::Good => "Good",
            HealthGrade::Fair => "Fair",
            HealthGrade::Poor => "Poor",
        };
        write!(f, "{s}")
    }
}

/// Trend direction reported by the capacity planner for a single metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Stable,
    Growing,
    Shrinking,
}

/// Overall or per-metric capacity status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CapacityStatus {
    Healthy,
    Warning,
    Critical,
}

/// Structured status of a CLI or service-level operation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Error,
    Disabled,
    Skipped,
}
