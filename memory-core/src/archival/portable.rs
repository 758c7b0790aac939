//! # Archive Exporter / Importer (C15)
//!
//! A portable, self-contained export format — `{<project>/archive.tar.gz,
//! <project>/manifest.json, <project>/README.txt}` inside one outer
//! gzipped tar — for backup, migration, and sharing. Grounded in
//! `original_source/src/memory/archive_exporter.py` and
//! `archive_importer.py`; reuses [`super::compressor::ArchiveCompressor`]
//! for the underlying per-project archive directory.

use crate::archival::compressor::ArchiveCompressor;
use crate::constants::paths::ARCHIVE_MANIFEST_FILE;
use crate::types::{ArchiveManifest, ConflictPolicy};
use crate::{Error, Result};
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct ArchiveExporter {
    compressor: Arc<ArchiveCompressor>,
    compression_level: u32,
}

#[derive(Debug, Clone)]
pub struct ExportResult {
    pub success: bool,
    pub export_file: Option<PathBuf>,
    pub export_size_mb: f64,
    pub error: Option<String>,
}

impl ArchiveExporter {
    #[must_use]
    pub fn new(compressor: Arc<ArchiveCompressor>, compression_level: u32) -> Self {
        Self { compressor, compression_level }
    }

    pub async fn export_project_archive(
        &self,
        project_name: &str,
        output_path: Option<PathBuf>,
        include_readme: bool,
    ) -> Result<ExportResult> {
        let Some(manifest) = self.compressor.get_archive_info(project_name) else {
            return Ok(ExportResult {
                success: false,
                export_file: None,
                export_size_mb: 0.0,
                error: Some(format!("archive not found for project: {project_name}")),
            });
        };

        let archive_dir = self.compressor.project_archive_dir(project_name);
        let source_archive = archive_dir.join(format!("{project_name}_index.tar.gz"));
        if !source_archive.exists() {
            return Ok(ExportResult {
                success: false,
                export_file: None,
                export_size_mb: 0.0,
                error: Some(format!("source archive file not found: {}", source_archive.display())),
            });
        }
        let manifest_file = archive_dir.join(ARCHIVE_MANIFEST_FILE);

        let output_path = output_path.unwrap_or_else(|| {
            let timestamp = Utc::now().format("%Y%m%d_%H%M%S");
            PathBuf::from(format!("{project_name}_archive_{timestamp}.tar.gz"))
        });

        let project_name = project_name.to_string();
        let compression_level = self.compression_level;
        let readme = include_readme.then(|| generate_readme(&project_name, &manifest));
        let output_path_clone = output_path.clone();
        let export = tokio::task::spawn_blocking(move || {
            export_blocking(&project_name, &source_archive, &manifest_file, &output_path_clone, compression_level, readme)
        })
        .await
        .map_err(|e| Error::Storage(format!("export task panicked: {e}")))?;

        match export {
            Ok(size_mb) => Ok(ExportResult {
                success: true,
                export_file: Some(output_path),
                export_size_mb: size_mb,
                error: None,
            }),
            Err(e) => Ok(ExportResult {
                success: false,
                export_file: None,
                export_size_mb: 0.0,
                error: Some(e.to_string()),
            }),
        }
    }

    /// All archived projects with export-relevant summary fields.
    #[must_use]
    pub fn list_exportable_projects(&self) -> Vec<ExportableProject> {
        self.compressor
            .list_archives()
            .into_iter()
            .filter_map(|name| {
                let manifest = self.compressor.get_archive_info(&name)?;
                Some(ExportableProject {
                    project_name: name,
                    archived_at: manifest.archived_at,
                    size_mb: manifest.compression_info.compressed_size_mb,
                    compression_ratio: manifest.compression_info.compression_ratio,
                })
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct ExportableProject {
    pub project_name: String,
    pub archived_at: chrono::DateTime<Utc>,
    pub size_mb: f64,
    pub compression_ratio: f64,
}

fn generate_readme(project_name: &str, manifest: &ArchiveManifest) -> String {
    let mut lines = vec![
        format!("# {project_name} archive"),
        String::new(),
        "## Archive Information".to_string(),
        String::new(),
        format!("Project Name: {project_name}"),
        format!("Archive Version: {}", manifest.archive_version),
        format!("Archived At: {}", manifest.archived_at),
        format!("Archived By: {}", manifest.archived_by),
        String::new(),
        "## Compression".to_string(),
        String::new(),
        format!("Original Size: {:.2} MB", manifest.compression_info.original_size_mb),
        format!("Compressed Size: {:.2} MB", manifest.compression_info.compressed_size_mb),
        format!("Savings: {:.1}%", manifest.compression_info.savings_percent),
        String::new(),
        "## How to Import".to_string(),
        String::new(),
        format!("archival import {project_name}_archive_*.tar.gz"),
        String::new(),
        "## Contents".to_string(),
        String::new(),
        "- archive.tar.gz: compressed project index and embedding cache".to_string(),
        "- manifest.json: archive metadata and statistics".to_string(),
        "- README.txt: this file".to_string(),
    ];
    lines.push(String::new());
    lines
}

fn export_blocking(
    project_name: &str,
    source_archive: &Path,
    manifest_file: &Path,
    output_path: &Path,
    compression_level: u32,
    readme: Option<Vec<String>>,
) -> anyhow::Result<f64> {
    let file = File::create(output_path)?;
    let encoder = GzEncoder::new(file, Compression::new(compression_level));
    let mut builder = tar::Builder::new(encoder);

    let mut source = File::open(source_archive)?;
    builder.append_file(format!("{project_name}/archive.tar.gz"), &mut source)?;

    if manifest_file.exists() {
        let mut manifest_handle = File::open(manifest_file)?;
        builder.append_file(format!("{project_name}/manifest.json"), &mut manifest_handle)?;
    }

    if let Some(lines) = readme {
        let content = lines.join("\n");
        let bytes = content.as_bytes();
        let mut header = tar::Header::new_gnu();
        header.set_size(bytes.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, format!("{project_name}/README.txt"), bytes)?;
    }

    builder.finish()?;
    Ok(std::fs::metadata(output_path)?.len() as f64 / (1024.0 * 1024.0))
}

pub struct ArchiveImporter {
    compressor: Arc<ArchiveCompressor>,
}

#[derive(Debug, Clone)]
pub struct ImportResult {
    pub success: bool,
    pub project_name: Option<String>,
    pub original_name: Option<String>,
    pub conflict: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub valid: bool,
    pub project_name: Option<String>,
    pub manifest: Option<ArchiveManifest>,
    pub error: Option<String>,
}

impl ArchiveImporter {
    #[must_use]
    pub fn new(compressor: Arc<ArchiveCompressor>) -> Self {
        Self { compressor }
    }

    pub async fn import_project_archive(
        &self,
        archive_path: &Path,
        project_name: Option<String>,
        conflict_resolution: ConflictPolicy,
    ) -> Result<ImportResult> {
        if !archive_path.exists() {
            return Ok(ImportResult {
                success: false,
                project_name: None,
                original_name: None,
                conflict: false,
                error: Some(format!("archive file not found: {}", archive_path.display())),
            });
        }

        let temp_dir = tempfile::tempdir()?;
        let temp_path = temp_dir.path().to_path_buf();
        let archive_path_owned = archive_path.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_and_inspect(&archive_path_owned, &temp_path))
            .await
            .map_err(|e| Error::Storage(format!("import extraction task panicked: {e}")))?;

        let (extracted_project_dir, extracted_project_name, manifest) = match extracted {
            Ok(inspected) => inspected,
            Err(e) => {
                return Ok(ImportResult {
                    success: false,
                    project_name: None,
                    original_name: None,
                    conflict: false,
                    error: Some(e.to_string()),
                })
            }
        };

        let target_name = project_name.clone().unwrap_or_else(|| extracted_project_name.clone());
        drop(manifest); // required-field check already enforced by extract_and_inspect

        let existing = self.compressor.get_archive_info(&target_name);
        if existing.is_some() {
            match conflict_resolution {
                ConflictPolicy::Skip => {
                    return Ok(ImportResult {
                        success: false,
                        project_name: Some(target_name),
                        original_name: None,
                        conflict: true,
                        error: Some("archive already exists (use overwrite or merge)".to_string()),
                    });
                }
                ConflictPolicy::Overwrite => {
                    self.compressor.delete_archive(&target_name).await?;
                }
                ConflictPolicy::Merge => {
                    return Err(Error::Validation("merge conflict resolution is not yet implemented".to_string()));
                }
            }
        }

        let source_archive = extracted_project_dir.join("archive.tar.gz");
        let dest_dir = self.compressor.project_archive_dir(&target_name);
        tokio::fs::create_dir_all(&dest_dir).await?;
        let dest_archive_file = dest_dir.join(format!("{target_name}_index.tar.gz"));
        tokio::fs::copy(&source_archive, &dest_archive_file).await?;

        let source_manifest_path = extracted_project_dir.join(ARCHIVE_MANIFEST_FILE);
        if source_manifest_path.exists() {
            let bytes = tokio::fs::read(&source_manifest_path).await?;
            let mut manifest: ArchiveManifest = serde_json::from_slice(&bytes)?;
            if target_name != extracted_project_name {
                manifest.project_name = target_name.clone();
                manifest.imported_from = Some(extracted_project_name.clone());
                manifest.imported_at = Some(Utc::now());
            }
            tokio::fs::write(dest_dir.join(ARCHIVE_MANIFEST_FILE), serde_json::to_vec_pretty(&manifest)?).await?;
        }

        let original_name = (target_name != extracted_project_name).then_some(extracted_project_name);

        Ok(ImportResult {
            success: true,
            project_name: Some(target_name),
            original_name,
            conflict: false,
            error: None,
        })
    }

    pub async fn validate_archive_file(&self, archive_path: &Path) -> Result<ValidationResult> {
        if !archive_path.exists() {
            return Ok(ValidationResult {
                valid: false,
                project_name: None,
                manifest: None,
                error: Some(format!("archive file not found: {}", archive_path.display())),
            });
        }
        let temp_dir = tempfile::tempdir()?;
        let temp_path = temp_dir.path().to_path_buf();
        let archive_path_owned = archive_path.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || extract_and_inspect(&archive_path_owned, &temp_path))
            .await
            .map_err(|e| Error::Storage(format!("validation extraction task panicked: {e}")))?;

        match extracted {
            Ok((_, name, manifest)) => Ok(ValidationResult {
                valid: true,
                project_name: Some(name),
                manifest,
                error: None,
            }),
            Err(e) => Ok(ValidationResult {
                valid: false,
                project_name: None,
                manifest: None,
                error: Some(e.to_string()),
            }),
        }
    }
}

/// Extract `archive_path` into `temp_path`, confirm exactly one top-level
/// project directory exists, that it contains `archive.tar.gz` opening as
/// gzip-tar, and (if present) that its manifest carries the required
/// fields. Returns `(project_dir, project_name, manifest)`.
fn extract_and_inspect(archive_path: &Path, temp_path: &Path) -> anyhow::Result<(PathBuf, String, Option<ArchiveManifest>)> {
    let file = File::open(archive_path)?;
    let decoder = GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(temp_path)?;

    let project_dirs: Vec<PathBuf> = std::fs::read_dir(temp_path)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    if project_dirs.len() != 1 {
        anyhow::bail!("invalid archive structure: expected 1 project directory, found {}", project_dirs.len());
    }
    let project_dir = project_dirs.into_iter().next().expect("checked len == 1");
    let project_name = project_dir
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("project directory has no valid name"))?
        .to_string();

    let inner_archive = project_dir.join("archive.tar.gz");
    if !inner_archive.exists() {
        anyhow::bail!("missing required file: archive.tar.gz");
    }
    {
        let inner_file = File::open(&inner_archive)?;
        let inner_decoder = GzDecoder::new(inner_file);
        let mut inner = tar::Archive::new(inner_decoder);
        // Opening entries validates the gzip/tar framing without extracting.
        for entry in inner.entries()? {
            entry?;
        }
    }

    let manifest_path = project_dir.join(ARCHIVE_MANIFEST_FILE);
    let manifest = if manifest_path.exists() {
        let bytes = std::fs::read(&manifest_path)?;
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        let missing: Vec<&str> = ["project_name", "archive_version"]
            .into_iter()
            .filter(|field| value.get(field).is_none())
            .collect();
        if !missing.is_empty() {
            anyhow::bail!("manifest missing required fields: {}", missing.join(", "));
        }
        Some(serde_json::from_value(value)?)
    } else {
        None
    };

    Ok((project_dir, project_name, manifest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    async fn setup() -> (Arc<ArchiveCompressor>, tempfile::TempDir) {
        let archive_root = tempdir().unwrap();
        let index_dir = tempdir().unwrap();
        tokio::fs::write(index_dir.path().join("a.txt"), b"payload").await.unwrap();
        let compressor = Arc::new(ArchiveCompressor::new(archive_root.path(), None).await.unwrap());
        compressor
            .compress_project_index("demo", index_dir.path().to_path_buf(), None, HashMap::new())
            .await
            .unwrap();
        (compressor, archive_root)
    }

    #[tokio::test]
    async fn export_then_import_round_trips() {
        let (compressor, _archive_root) = setup().await;
        let exporter = ArchiveExporter::new(Arc::clone(&compressor), 6);
        let export_dir = tempdir().unwrap();
        let export_path = export_dir.path().join("demo_export.tar.gz");
        let export = exporter
            .export_project_archive("demo", Some(export_path.clone()), true)
            .await
            .unwrap();
        assert!(export.success);
        assert!(export_path.exists());

        let import_root = tempdir().unwrap();
        let import_compressor = Arc::new(ArchiveCompressor::new(import_root.path(), None).await.unwrap());
        let importer = ArchiveImporter::new(Arc::clone(&import_compressor));
        let result = importer
            .import_project_archive(&export_path, None, ConflictPolicy::Skip)
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.project_name.as_deref(), Some("demo"));
    }

    #[tokio::test]
    async fn import_conflict_skip_reports_conflict() {
        let (compressor, _archive_root) = setup().await;
        let exporter = ArchiveExporter::new(Arc::clone(&compressor), 6);
        let export_path = tempdir().unwrap().path().join("demo_export.tar.gz");
        exporter.export_project_archive("demo", Some(export_path.clone()), false).await.unwrap();

        let importer = ArchiveImporter::new(Arc::clone(&compressor));
        let result = importer
            .import_project_archive(&export_path, None, ConflictPolicy::Skip)
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.conflict);
    }

    #[tokio::test]
    async fn merge_conflict_policy_is_unimplemented() {
        let (compressor, _archive_root) = setup().await;
        let exporter = ArchiveExporter::new(Arc::clone(&compressor), 6);
        let export_path = tempdir().unwrap().path().join("demo_export.tar.gz");
        exporter.export_project_archive("demo", Some(export_path.clone()), false).await.unwrap();

        let importer = ArchiveImporter::new(Arc::clone(&compressor));
        let result = importer
            .import_project_archive(&export_path, None, ConflictPolicy::Merge)
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn validate_archive_file_checks_structure() {
        let (compressor, _archive_root) = setup().await;
        let exporter = ArchiveExporter::new(Arc::clone(&compressor), 6);
        let export_path = tempdir().unwrap().path().join("demo_export.tar.gz");
        exporter.export_project_archive("demo", Some(export_path.clone()), false).await.unwrap();

        let importer = ArchiveImporter::new(Arc::clone(&compressor));
        let result = importer.validate_archive_file(&export_path).await.unwrap();
        assert!(result.valid);
        assert_eq!(result.project_name.as_deref(), Some("demo"));
    }

    #[tokio::test]
    async fn validate_missing_file_is_invalid_not_panic() {
        let (compressor, _archive_root) = setup().await;
        let importer = ArchiveImporter::new(Arc::clone(&compressor));
        let result = importer
            .validate_archive_file(Path::new("/nonexistent/archive.tar.gz"))
            .await
            .unwrap();
        assert!(!result.valid);
    }
}
