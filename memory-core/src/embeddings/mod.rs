//! # Embeddings (C2)
//!
//! Text-to-vector conversion: the opaque [`provider::EmbeddingProvider`]
//! contract, a dependency-free [`provider::HashingEmbeddingProvider`] stand-in
//! for a real model, vector [`similarity`] math, and the [`pipeline`] that
//! wraps a provider with caching and batch parallelism.

pub mod pipeline;
pub mod provider;
pub mod similarity;
pub mod utils;

pub use pipeline::EmbeddingPipeline;
pub use provider::{EmbeddingProvider, HashingEmbeddingProvider};
pub use similarity::cosine_similarity;
