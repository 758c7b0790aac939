//! # Search (C7, C8)
//!
//! Semantic + hybrid retrieval ([`engine`]) and consent-guarded
//! cross-project fan-out ([`cross_project`]). `fuzzy` is a lower-level
//! lexical-matching utility the engine and the default `KeywordIndex`
//! build on, kept from the teacher's own search module.

pub mod cross_project;
pub mod engine;
pub mod fuzzy;

pub use cross_project::{ConsentManager, CrossProjectGateway, CrossProjectResponse, InMemoryConsentManager};
pub use engine::{SearchEngine, SearchFilters, SearchMode, SearchResponse, SearchResult};
