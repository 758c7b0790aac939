//! Error types for the indexing and retrieval core.
//!
//! One `thiserror` enum per spec.md §7: each variant is an error *kind*,
//! not a type hierarchy. CLI-level code maps these to exit codes (0/1/2)
//! per spec.md §6.

/// Result type alias used throughout `memory-core`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Bad input: empty query snippet, unknown search mode, invalid conflict
    /// policy. Reported to the caller, never retried.
    #[error("validation error: {0}")]
    Validation(String),

    /// Store/DB initialization, I/O, or schema failure.
    #[error("storage error: {0}")]
    Storage(String),

    /// Embedding model or worker failure; aborts the enclosing batch.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Orchestration or precondition failure (e.g. service not initialized).
    #[error("indexing error: {0}")]
    Indexing(String),

    /// Failure within the search pipeline after inputs have been validated.
    #[error("retrieval error: {0}")]
    Retrieval(String),

    /// Mutating call attempted while read-only mode is active.
    #[error("read-only mode: {0}")]
    ReadOnly(String),

    /// Archive import against an existing archive under the `skip` policy.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Archive, project, or alert looked up by id/name does not exist.
    /// Most call sites prefer a structured `{success: false}` result over
    /// this variant; it exists for the few contexts with no result struct
    /// to carry the outcome.
    #[error("not found: {0}")]
    NotFound(String),

    /// A bulk operation's item count exceeds its per-call cap; the whole
    /// batch is rejected, nothing is applied.
    #[error("capacity exceeded: {0}")]
    Capacity(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error class is worth retrying with backoff. Storage and
    /// embedding failures are generally transient; validation and conflict
    /// failures are not.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Storage(_) | Error::Embedding(_) | Error::Io(_)
        )
    }

    /// The `§6` exit code a CLI command should map this error to.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Validation(_)
            | Error::ReadOnly(_)
            | Error::Conflict(_)
            | Error::NotFound(_)
            | Error::Capacity(_) => 1,
            Error::Storage(_)
            | Error::Embedding(_)
            | Error::Indexing(_)
            | Error::Retrieval(_)
            | Error::Io(_)
            | Error::Serialization(_) => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_errors_are_recoverable() {
        assert!(Error::Storage("db locked".into()).is_recoverable());
        assert!(!Error::Validation("empty query".into()).is_recoverable());
    }

    #[test]
    fn exit_codes_match_spec_table() {
        assert_eq!(Error::Validation("x".into()).exit_code(), 1);
        assert_eq!(Error::Conflict("x".into()).exit_code(), 1);
        assert_eq!(Error::Storage("x".into()).exit_code(), 2);
        assert_eq!(Error::Retrieval("x".into()).exit_code(), 2);
    }
}
