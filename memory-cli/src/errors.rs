//! Enhanced error handling: wraps a `do_memory_core::Error`-rooted failure
//! with a short, actionable suggestion list before it reaches the terminal.

use anyhow::Result;

/// Adds a suggestion list to an error without discarding its source message.
pub trait EnhancedError<T> {
    fn context_with_help(self, msg: &str, help: &[&str]) -> Result<T>;
}

impl<T, E: std::error::Error + Send + Sync + 'static> EnhancedError<T> for Result<T, E> {
    fn context_with_help(self, msg: &str, help: &[&str]) -> Result<T> {
        self.map_err(|e| anyhow::anyhow!(helpers::format_error_message(&e.to_string(), msg, help)))
    }
}

/// Suggestion lists for the failure modes the archival/health CLI surface
/// can hit.
pub mod helpers {
    pub const PROJECT_NOT_FOUND_HELP: &[&str] = &[
        "Check the project name with 'do-memory-cli archival status'",
        "The project may never have been indexed, or may already be deleted",
    ];

    pub const ARCHIVE_NOT_FOUND_HELP: &[&str] = &[
        "List archived projects with 'do-memory-cli archival list-exportable'",
        "The project may not be archived yet — run 'do-memory-cli archival archive <name>' first",
    ];

    pub const IMPORT_CONFLICT_HELP: &[&str] = &[
        "Pass --conflict overwrite to replace the existing archive",
        "Pass --name to import under a different project name",
    ];

    pub const CONFIG_ERROR_HELP: &[&str] = &[
        "Check the config file at ~/.claude-rag/config.toml",
        "Verify CLAUDE_RAG_* environment variables are well-formed",
    ];

    pub const STORAGE_ERROR_HELP: &[&str] = &[
        "Check that the data directory is writable",
        "Verify no other process holds the memory store file locked",
    ];

    pub fn format_error_message(error: &str, context: &str, help: &[&str]) -> String {
        let mut msg = format!("{context}\n\n{error}");
        if !help.is_empty() {
            msg.push_str("\n\nPossible solutions:");
            for (i, h) in help.iter().enumerate() {
                msg.push_str(&format!("\n  {}. {h}", i + 1));
            }
        }
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_with_help_appends_suggestions() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));
        let enhanced = result.context_with_help("Operation failed", &["Solution 1", "Solution 2"]);
        let error_str = enhanced.unwrap_err().to_string();
        assert!(error_str.contains("Possible solutions:"));
        assert!(error_str.contains("Solution 1"));
        assert!(error_str.contains("Solution 2"));
    }

    #[test]
    fn context_with_help_omits_section_when_empty() {
        let result: Result<(), std::io::Error> =
            Err(std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"));
        let enhanced = result.context_with_help("Operation failed", &[]);
        let error_str = enhanced.unwrap_err().to_string();
        assert!(error_str.contains("Operation failed"));
        assert!(!error_str.contains("Possible solutions:"));
    }

    #[test]
    fn format_error_message_numbers_suggestions() {
        let formatted = helpers::format_error_message("Test error", "Operation failed", &["Solution 1", "Solution 2"]);
        assert!(formatted.contains("1. Solution 1"));
        assert!(formatted.contains("2. Solution 2"));
    }
}
