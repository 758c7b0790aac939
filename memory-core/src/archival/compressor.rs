//! # Archive Compressor (C14)
//!
//! Gzip-tars a project's index directory (and optional embedding cache
//! file) into `<archive_root>/<project>/<project>_index.tar.gz`, alongside
//! a `manifest.json` sidecar. Grounded in
//! `original_source/src/memory/archive_compressor.py`. `tar`/`flate2` are
//! synchronous crates, so the actual compress/decompress work runs inside
//! `spawn_blocking`, matching the teacher's own pattern of isolating
//! CPU-bound work from the async runtime.

use crate::constants::defaults::DEFAULT_COMPRESSION_LEVEL;
use crate::constants::paths::ARCHIVE_MANIFEST_FILE;
use crate::types::{ArchiveManifest, CompressionInfo, RestoreInfo};
use crate::{Error, Result};
use chrono::Utc;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};

pub struct ArchiveCompressor {
    archive_root: PathBuf,
    compression_level: u32,
}

/// Outcome of [`ArchiveCompressor::compress_project_index`].
#[derive(Debug, Clone)]
pub struct CompressResult {
    pub success: bool,
    pub archive_file: Option<PathBuf>,
    pub manifest_file: Option<PathBuf>,
    pub compression_info: Option<CompressionInfo>,
    pub error: Option<String>,
}

/// Outcome of [`ArchiveCompressor::decompress_project_index`].
#[derive(Debug, Clone)]
pub struct DecompressResult {
    pub success: bool,
    pub restored_path: Option<PathBuf>,
    pub manifest: Option<ArchiveManifest>,
    pub extraction_time_seconds: f64,
    pub error: Option<String>,
}

impl ArchiveCompressor {
    pub async fn new(archive_root: impl AsRef<Path>, compression_level: Option<u32>) -> Result<Self> {
        let archive_root = archive_root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&archive_root).await?;
        Ok(Self {
            archive_root,
            compression_level: compression_level.unwrap_or(DEFAULT_COMPRESSION_LEVEL),
        })
    }

    pub(crate) fn project_archive_dir(&self, project_name: &str) -> PathBuf {
        self.archive_root.join(project_name)
    }

    pub async fn compress_project_index(
        &self,
        project_name: &str,
        index_path: PathBuf,
        cache_path: Option<PathBuf>,
        stats: HashMap<String, serde_json::Value>,
    ) -> Result<CompressResult> {
        let archive_dir = self.project_archive_dir(project_name);
        tokio::fs::create_dir_all(&archive_dir).await?;

        let project_name = project_name.to_string();
        let compression_level = self.compression_level;
        let result = tokio::task::spawn_blocking(move || {
            compress_blocking(&archive_dir, &project_name, &index_path, cache_path.as_deref(), compression_level, stats)
        })
        .await
        .map_err(|e| Error::Storage(format!("compression task panicked: {e}")))?;

        match result {
            Ok((archive_file, manifest_file, compression_info)) => Ok(CompressResult {
                success: true,
                archive_file: Some(archive_file),
                manifest_file: Some(manifest_file),
                compression_info: Some(compression_info),
                error: None,
            }),
            Err(e) => Ok(CompressResult {
                success: false,
                archive_file: None,
                manifest_file: None,
                compression_info: None,
                error: Some(e.to_string()),
            }),
        }
    }

    pub async fn decompress_project_index(&self, project_name: &str, restore_path: PathBuf) -> Result<DecompressResult> {
        let archive_dir = self.project_archive_dir(project_name);
        let archive_file = archive_dir.join(format!("{project_name}_index.tar.gz"));
        let manifest_file = archive_dir.join(ARCHIVE_MANIFEST_FILE);

        if !archive_file.exists() {
            return Ok(DecompressResult {
                success: false,
                restored_path: None,
                manifest: None,
                extraction_time_seconds: 0.0,
                error: Some(format!("archive not found for project: {project_name}")),
            });
        }

        tokio::fs::create_dir_all(&restore_path).await?;
        let result = tokio::task::spawn_blocking(move || decompress_blocking(&archive_file, &manifest_file, &restore_path))
            .await
            .map_err(|e| Error::Storage(format!("decompression task panicked: {e}")))?;

        match result {
            Ok((restored_path, manifest, elapsed)) => Ok(DecompressResult {
                success: true,
                restored_path: Some(restored_path),
                manifest,
                extraction_time_seconds: elapsed,
                error: None,
            }),
            Err(e) => Ok(DecompressResult {
                success: false,
                restored_path: None,
                manifest: None,
                extraction_time_seconds: 0.0,
                error: Some(e.to_string()),
            }),
        }
    }

    pub fn get_archive_info(&self, project_name: &str) -> Option<ArchiveManifest> {
        let manifest_file = self.project_archive_dir(project_name).join(ARCHIVE_MANIFEST_FILE);
        let bytes = std::fs::read(manifest_file).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    pub fn list_archives(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.archive_root) else {
            return Vec::new();
        };
        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter(|entry| entry.path().join(ARCHIVE_MANIFEST_FILE).is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .collect();
        names.sort();
        names
    }

    pub async fn delete_archive(&self, project_name: &str) -> Result<bool> {
        let archive_dir = self.project_archive_dir(project_name);
        if !archive_dir.exists() {
            return Ok(false);
        }
        tokio::fs::remove_dir_all(&archive_dir).await?;
        Ok(true)
    }

    /// Sums `compression_info` across every archive with a readable
    /// manifest; unreadable archives are skipped, not errored.
    #[must_use]
    pub fn get_total_storage_savings(&self) -> StorageSavings {
        let mut savings = StorageSavings::default();
        for name in self.list_archives() {
            let Some(manifest) = self.get_archive_info(&name) else {
                continue;
            };
            savings.archive_count += 1;
            savings.total_original_mb += manifest.compression_info.original_size_mb;
            savings.total_compressed_mb += manifest.compression_info.compressed_size_mb;
        }
        savings.total_savings_mb = savings.total_original_mb - savings.total_compressed_mb;
        savings.savings_percent = if savings.total_original_mb > 0.0 {
            (1.0 - savings.total_compressed_mb / savings.total_original_mb) * 100.0
        } else {
            0.0
        };
        savings
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StorageSavings {
    pub archive_count: usize,
    pub total_original_mb: f64,
    pub total_compressed_mb: f64,
    pub total_savings_mb: f64,
    pub savings_percent: f64,
}

fn dir_size(path: &Path) -> u64 {
    let Ok(entries) = std::fs::read_dir(path) else {
        return std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| {
            let p = entry.path();
            if p.is_dir() {
                dir_size(&p)
            } else {
                std::fs::metadata(&p).map(|m| m.len()).unwrap_or(0)
            }
        })
        .sum()
}

fn compress_blocking(
    archive_dir: &Path,
    project_name: &str,
    index_path: &Path,
    cache_path: Option<&Path>,
    compression_level: u32,
    stats: HashMap<String, serde_json::Value>,
) -> anyhow::Result<(PathBuf, PathBuf, CompressionInfo)> {
    let index_size = if index_path.exists() {
        if index_path.is_dir() {
            dir_size(index_path)
        } else {
            std::fs::metadata(index_path)?.len()
        }
    } else {
        0
    };
    let cache_size = cache_path
        .filter(|p| p.exists())
        .map(|p| std::fs::metadata(p).map(|m| m.len()).unwrap_or(0))
        .unwrap_or(0);
    let original_bytes = index_size + cache_size;
    let original_size_mb = original_bytes as f64 / (1024.0 * 1024.0);

    let archive_file = archive_dir.join(format!("{project_name}_index.tar.gz"));
    {
        let file = File::create(&archive_file)?;
        let encoder = GzEncoder::new(file, Compression::new(compression_level));
        let mut builder = tar::Builder::new(encoder);
        if index_path.exists() {
            if index_path.is_dir() {
                builder.append_dir_all("index", index_path)?;
            } else {
                let mut f = File::open(index_path)?;
                builder.append_file("index", &mut f)?;
            }
        }
        if let Some(cache_path) = cache_path.filter(|p| p.exists()) {
            let mut f = File::open(cache_path)?;
            builder.append_file("embeddings_cache.db", &mut f)?;
        }
        builder.finish()?;
    }

    let compressed_bytes = std::fs::metadata(&archive_file)?.len();
    let compressed_size_mb = compressed_bytes as f64 / (1024.0 * 1024.0);
    let compression_ratio = if original_bytes > 0 {
        compressed_bytes as f64 / original_bytes as f64
    } else {
        0.0
    };
    let savings_percent = if original_bytes > 0 {
        (1.0 - compression_ratio) * 100.0
    } else {
        0.0
    };

    let compression_info = CompressionInfo {
        original_size_mb,
        compressed_size_mb,
        compression_ratio,
        savings_percent,
    };

    let manifest = ArchiveManifest {
        project_name: project_name.to_string(),
        archive_version: ArchiveManifest::CURRENT_VERSION.to_string(),
        archived_at: Utc::now(),
        archived_by: "manual".to_string(),
        statistics: stats,
        compression_info,
        restore_info: RestoreInfo {
            estimated_restore_time_seconds: (compressed_size_mb / 2.0).max(5.0) as u64,
            warnings: Vec::new(),
        },
        last_activity: None,
        imported_from: None,
        imported_at: None,
    };

    let manifest_file = archive_dir.join(ARCHIVE_MANIFEST_FILE);
    std::fs::write(&manifest_file, serde_json::to_vec_pretty(&manifest)?)?;

    Ok((archive_file, manifest_file, compression_info))
}

fn decompress_blocking(
    archive_file: &Path,
    manifest_file: &Path,
    restore_path: &Path,
) -> anyhow::Result<(PathBuf, Option<ArchiveManifest>, f64)> {
    let manifest = std::fs::read(manifest_file)
        .ok()
        .and_then(|bytes| serde_json::from_slice(&bytes).ok());

    let start = std::time::Instant::now();
    let file = File::open(archive_file)?;
    let decoder = GzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);
    archive.unpack(restore_path)?;
    let elapsed = start.elapsed().as_secs_f64();

    Ok((restore_path.to_path_buf(), manifest, elapsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn compress_then_decompress_round_trips_content() {
        let archive_root = tempdir().unwrap();
        let index_dir = tempdir().unwrap();
        tokio::fs::write(index_dir.path().join("a.txt"), b"hello world").await.unwrap();

        let compressor = ArchiveCompressor::new(archive_root.path(), None).await.unwrap();
        let result = compressor
            .compress_project_index("demo", index_dir.path().to_path_buf(), None, HashMap::new())
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.compression_info.unwrap().original_size_mb >= 0.0);

        let restore_dir = tempdir().unwrap();
        let decompressed = compressor
            .decompress_project_index("demo", restore_dir.path().to_path_buf())
            .await
            .unwrap();
        assert!(decompressed.success);
        let restored_content = tokio::fs::read_to_string(restore_dir.path().join("index").join("a.txt"))
            .await
            .unwrap();
        assert_eq!(restored_content, "hello world");
    }

    #[tokio::test]
    async fn decompress_missing_archive_is_a_result_not_a_panic() {
        let archive_root = tempdir().unwrap();
        let compressor = ArchiveCompressor::new(archive_root.path(), None).await.unwrap();
        let result = compressor
            .decompress_project_index("missing", tempdir().unwrap().path().to_path_buf())
            .await
            .unwrap();
        assert!(!result.success);
        assert!(result.error.is_some());
    }

    #[tokio::test]
    async fn list_archives_only_returns_dirs_with_manifest() {
        let archive_root = tempdir().unwrap();
        let index_dir = tempdir().unwrap();
        tokio::fs::write(index_dir.path().join("a.txt"), b"x").await.unwrap();
        let compressor = ArchiveCompressor::new(archive_root.path(), None).await.unwrap();
        compressor
            .compress_project_index("demo", index_dir.path().to_path_buf(), None, HashMap::new())
            .await
            .unwrap();
        tokio::fs::create_dir_all(archive_root.path().join("not-an-archive")).await.unwrap();

        let archives = compressor.list_archives();
        assert_eq!(archives, vec!["demo".to_string()]);
    }

    #[tokio::test]
    async fn total_storage_savings_aggregates_across_archives() {
        let archive_root = tempdir().unwrap();
        let index_dir = tempdir().unwrap();
        tokio::fs::write(index_dir.path().join("a.txt"), vec![0u8; 1024]).await.unwrap();
        let compressor = ArchiveCompressor::new(archive_root.path(), None).await.unwrap();
        compressor
            .compress_project_index("demo", index_dir.path().to_path_buf(), None, HashMap::new())
            .await
            .unwrap();

        let savings = compressor.get_total_storage_savings();
        assert_eq!(savings.archive_count, 1);
    }
}
