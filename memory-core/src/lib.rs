#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::unused_self)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::borrowed_box)]
#![allow(clippy::float_cmp)]
#![allow(clippy::ref_option)]

//! # Memory Core
//!
//! Core engine for a local source-code and memory indexing/retrieval
//! system: parse source files into semantic units, embed and store them,
//! watch projects for changes, serve semantic/hybrid/cross-project search,
//! age memories through a lifecycle, and archive inactive projects —
//! plus the health/alerting/capacity-planning stack that watches all of
//! the above.
//!
//! ## Module Organization
//!
//! ### Indexing pipeline
//! - [`parsing`]: Code Parser (C1) — regex/line-scan extraction of semantic units
//! - [`embeddings`]: Embedding Pipeline (C2) — text-to-vector + caching
//! - [`watcher`]: File Watcher (C3) — debounced filesystem change notifications
//! - [`indexing`]: Incremental Indexer (C4) — parse → embed → store
//! - [`autoindex`]: Auto-Indexing Service (C5) — watcher+indexer orchestration
//! - [`project_index`]: Project Index Tracker (C6) — per-project indexing metadata
//!
//! ### Retrieval
//! - [`search`]: Search Engine (C7) and Cross-Project Gateway (C8)
//!
//! ### Lifecycle & health
//! - [`lifecycle`]: Lifecycle Manager (C9) — aging state machine
//! - [`health`]: Health Scorer (C10) — noise/duplicate/distribution grading
//! - [`maintenance`]: Maintenance Jobs + Health Scheduler (C11, C12)
//!
//! ### Archival
//! - [`archival`]: Project Archival Manager, Archive Compressor, portable
//!   export/import, and bulk archival + scheduler (C13-C16)
//!
//! ### Observability
//! - [`monitoring`]: Metrics Collector, Alert Engine, Capacity Planner (C17-C19)
//!
//! ### Support
//! - [`types`]: Data model and configuration shared across every component
//! - [`storage`]: `MemoryStore`/`KeywordIndex` backend capability traits,
//!   plus the in-crate `relational` bookkeeping store
//! - [`error`]: The crate-wide error enum and exit-code mapping
//! - [`constants`]: Named thresholds and defaults pulled out of the
//!   component descriptions so no magic number appears twice
//!
//! ## Error Handling
//!
//! Nearly every public function returns [`Result<T>`]:
//!
//! ```no_run
//! use memory_core::{Error, Result};
//!
//! async fn example() -> Result<()> {
//!     // Operations that can fail
//!     // .await?
//!     Ok(())
//! }
//! ```

pub mod archival;
pub mod autoindex;
pub mod constants;
pub mod embeddings;
pub mod error;
pub mod health;
pub mod indexing;
pub mod lifecycle;
pub mod maintenance;
pub mod monitoring;
pub mod parsing;
pub mod project_index;
pub mod search;
pub mod storage;
pub mod types;
pub mod watcher;

pub use archival::{ArchiveCompressor, ArchiveExporter, ArchiveImporter, AutoArchiveScheduler, BulkArchiver, ProjectArchivalManager};
pub use autoindex::AutoIndexingService;
pub use embeddings::{EmbeddingPipeline, EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{Error, Result};
pub use health::{HealthScore, HealthScorer};
pub use indexing::{IncrementalIndexer, IndexDirectoryResult, IndexFileResult};
pub use maintenance::{HealthMaintenanceJobs, HealthScheduler, JobResult};
pub use monitoring::{AlertEngine, CapacityPlanner, MetricsCollector};
pub use project_index::ProjectIndexTracker;
pub use search::{CrossProjectGateway, SearchEngine};
pub use storage::{KeywordIndex, MemoryStore};
pub use types::{
    Category, ContextLevel, HealthGrade, LifecycleState, MemoryUnit, ProjectIndexMetadata,
    ProjectState, SemanticUnit,
};
pub use watcher::FileWatcher;
