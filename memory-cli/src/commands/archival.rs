//! `do-memory-cli archival ...` — project lifecycle status, archive/reactivate,
//! and portable export/import, over [`crate::config::CliContext`]'s
//! [`do_memory_core::archival`] stack.

use std::path::PathBuf;

use clap::Subcommand;
use do_memory_core::types::ConflictPolicy;
use serde::Serialize;

use crate::config::CliContext;
use crate::errors::{helpers, EnhancedError};
use crate::output::{Output, OutputFormat};

#[derive(Subcommand)]
pub enum ArchivalCommands {
    /// Show every project's lifecycle state and activity counters
    Status,
    /// Archive a project (marks it `ARCHIVED`, drops its search weight)
    Archive {
        /// Project name
        name: String,
    },
    /// Reactivate a previously archived or paused project
    Reactivate {
        /// Project name
        name: String,
    },
    /// Export a project's archive as a portable, self-contained tarball
    Export {
        /// Project name
        name: String,
        /// Output file path (defaults to `<project>-archive-<date>.tar.gz` in the cwd)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Omit the human-readable README.txt from the export
        #[arg(long)]
        no_readme: bool,
    },
    /// Import a portable project archive produced by `export`
    Import {
        /// Path to the exported `.tar.gz` archive
        path: PathBuf,
        /// Import under a different project name than the one recorded in the archive
        #[arg(long)]
        name: Option<String>,
        /// How to resolve a project-name collision
        #[arg(long, default_value = "skip")]
        conflict: ConflictPolicy,
    },
    /// List projects with an exportable archive
    ListExportable,
}

#[derive(Serialize)]
struct ProjectStatusEntry {
    name: String,
    state: String,
    last_activity: chrono::DateTime<chrono::Utc>,
    searches_count: u64,
    index_updates_count: u64,
    files_indexed: u64,
    archived_at: Option<chrono::DateTime<chrono::Utc>>,
}

#[derive(Serialize)]
struct StatusReport {
    projects: Vec<ProjectStatusEntry>,
}

impl Output for StatusReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        if self.projects.is_empty() {
            writeln!(writer, "No projects tracked yet.")?;
            return Ok(());
        }
        writeln!(writer, "{:<30} {:<10} {:<12} {:>8} {:>8} {:>8}", "PROJECT", "STATE", "LAST ACTIVITY", "SEARCH", "IDXUPD", "FILES")?;
        for p in &self.projects {
            writeln!(
                writer,
                "{:<30} {:<10} {:<12} {:>8} {:>8} {:>8}",
                p.name,
                p.state,
                p.last_activity.format("%Y-%m-%d"),
                p.searches_count,
                p.index_updates_count,
                p.files_indexed,
            )?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct OutcomeReport {
    project_name: String,
    success: bool,
    message: String,
}

impl Output for OutcomeReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        let verb = if self.success { "ok" } else { "failed" };
        writeln!(writer, "[{verb}] {}: {}", self.project_name, self.message)?;
        Ok(())
    }
}

#[derive(Serialize)]
struct ExportReport {
    project_name: String,
    success: bool,
    export_file: Option<PathBuf>,
    export_size_mb: f64,
    error: Option<String>,
}

impl Output for ExportReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        if self.success {
            writeln!(
                writer,
                "Exported {} -> {} ({:.2} MB)",
                self.project_name,
                self.export_file.as_ref().map(|p| p.display().to_string()).unwrap_or_default(),
                self.export_size_mb,
            )?;
        } else {
            writeln!(writer, "Export of {} failed: {}", self.project_name, self.error.as_deref().unwrap_or("unknown error"))?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ImportReport {
    success: bool,
    project_name: Option<String>,
    original_name: Option<String>,
    conflict: bool,
    error: Option<String>,
}

impl Output for ImportReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        if self.success {
            let name = self.project_name.as_deref().unwrap_or("?");
            if self.conflict {
                writeln!(writer, "Imported as '{name}' (renamed from '{}' to resolve a conflict)", self.original_name.as_deref().unwrap_or("?"))?;
            } else {
                writeln!(writer, "Imported '{name}'")?;
            }
        } else {
            writeln!(writer, "Import failed: {}", self.error.as_deref().unwrap_or("unknown error"))?;
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ExportableEntry {
    project_name: String,
    archived_at: chrono::DateTime<chrono::Utc>,
    size_mb: f64,
    compression_ratio: f64,
}

#[derive(Serialize)]
struct ExportableReport {
    projects: Vec<ExportableEntry>,
}

impl Output for ExportableReport {
    fn write_human<W: std::io::Write>(&self, mut writer: W) -> anyhow::Result<()> {
        if self.projects.is_empty() {
            writeln!(writer, "No archived projects available to export.")?;
            return Ok(());
        }
        writeln!(writer, "{:<30} {:<12} {:>10} {:>10}", "PROJECT", "ARCHIVED", "SIZE (MB)", "RATIO")?;
        for p in &self.projects {
            writeln!(writer, "{:<30} {:<12} {:>10.2} {:>10.2}", p.project_name, p.archived_at.format("%Y-%m-%d"), p.size_mb, p.compression_ratio)?;
        }
        Ok(())
    }
}

pub async fn dispatch(command: ArchivalCommands, ctx: &CliContext, format: OutputFormat) -> anyhow::Result<()> {
    match command {
        ArchivalCommands::Status => {
            let projects = ctx
                .archival
                .get_all_projects()
                .await
                .context_with_help("Failed to load project states", helpers::STORAGE_ERROR_HELP)?;
            let mut entries: Vec<ProjectStatusEntry> = projects
                .into_iter()
                .map(|(name, state)| ProjectStatusEntry {
                    name,
                    state: state.state.to_string(),
                    last_activity: state.last_activity,
                    searches_count: state.searches_count,
                    index_updates_count: state.index_updates_count,
                    files_indexed: state.files_indexed,
                    archived_at: state.archived_at,
                })
                .collect();
            entries.sort_by(|a, b| a.name.cmp(&b.name));
            format.print_output(&StatusReport { projects: entries })?;
        }
        ArchivalCommands::Archive { name } => {
            let outcome = ctx
                .archival
                .archive_project(&name)
                .await
                .context_with_help(&format!("Failed to archive '{name}'"), helpers::PROJECT_NOT_FOUND_HELP)?;
            format.print_output(&OutcomeReport { project_name: name, success: outcome.success, message: outcome.message })?;
        }
        ArchivalCommands::Reactivate { name } => {
            let outcome = ctx
                .archival
                .reactivate_project(&name)
                .await
                .context_with_help(&format!("Failed to reactivate '{name}'"), helpers::PROJECT_NOT_FOUND_HELP)?;
            format.print_output(&OutcomeReport { project_name: name, success: outcome.success, message: outcome.message })?;
        }
        ArchivalCommands::Export { name, output, no_readme } => {
            let result = ctx
                .exporter
                .export_project_archive(&name, output, !no_readme)
                .await
                .context_with_help(&format!("Failed to export '{name}'"), helpers::ARCHIVE_NOT_FOUND_HELP)?;
            format.print_output(&ExportReport {
                project_name: name,
                success: result.success,
                export_file: result.export_file,
                export_size_mb: result.export_size_mb,
                error: result.error,
            })?;
        }
        ArchivalCommands::Import { path, name, conflict } => {
            let result = ctx
                .importer
                .import_project_archive(&path, name, conflict)
                .await
                .context_with_help("Failed to import archive", helpers::IMPORT_CONFLICT_HELP)?;
            format.print_output(&ImportReport {
                success: result.success,
                project_name: result.project_name,
                original_name: result.original_name,
                conflict: result.conflict,
                error: result.error,
            })?;
        }
        ArchivalCommands::ListExportable => {
            let projects = ctx
                .exporter
                .list_exportable_projects()
                .into_iter()
                .map(|p| ExportableEntry {
                    project_name: p.project_name,
                    archived_at: p.archived_at,
                    size_mb: p.size_mb,
                    compression_ratio: p.compression_ratio,
                })
                .collect();
            format.print_output(&ExportableReport { projects })?;
        }
    }
    Ok(())
}
