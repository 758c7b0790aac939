//! # Project Archival (C13, C14, C15, C16)
//!
//! Four cooperating pieces around one idea — a project that stops being
//! actively worked on should shrink on disk and fall out of search by
//! default, without losing anything: [`project::ProjectArchivalManager`]
//! tracks per-project lifecycle state, [`compressor::ArchiveCompressor`]
//! turns an index directory into a gzip-tar archive and back,
//! [`portable::ArchiveExporter`]/[`portable::ArchiveImporter`] wrap that
//! archive for transport between machines, and [`bulk::BulkArchiver`] /
//! [`bulk::AutoArchiveScheduler`] drive the first three over many projects
//! at once, by hand or on a cron.

pub mod bulk;
pub mod compressor;
pub mod portable;
pub mod project;

pub use bulk::{AutoArchiveScheduler, BulkArchivalResult, BulkArchiver, BulkOutcome, ProjectOutcome};
pub use compressor::{ArchiveCompressor, CompressResult, DecompressResult, StorageSavings};
pub use portable::{ArchiveExporter, ArchiveImporter, ExportResult, ExportableProject, ImportResult, ValidationResult};
pub use project::{ArchivalOutcome, ProjectArchivalManager};
