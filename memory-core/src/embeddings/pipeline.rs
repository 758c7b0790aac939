//! Batch embedding with an in-memory LRU front and an optional persistent
//! cache (C2). Mirrors the original Python implementation's
//! `rust_bridge`/`parallel_generator` split: small batches embed serially on
//! the calling task, batches at or above
//! [`crate::constants::defaults::EMBEDDING_BATCH_PARALLEL_THRESHOLD`] fan out
//! across `spawn_blocking` worker shards (the `EmbeddingProvider` here is pure
//! CPU work, so a blocking-pool shard stands in for the original's worker
//! processes). A whole batch fails if any shard fails — callers never get a
//! partially-embedded result.

use crate::constants::defaults::{EMBEDDING_BATCH_PARALLEL_THRESHOLD, EMBEDDING_CACHE_SIZE};
use crate::embeddings::utils::cache_key_hash;
use crate::embeddings::EmbeddingProvider;
use crate::storage::relational::RelationalStore;
use crate::{Error, Result};
use lru::LruCache;
use parking_lot::Mutex;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Wraps an [`EmbeddingProvider`] with caching and batch parallelism.
/// `Clone` is cheap: the provider, cache, and relational handle are all
/// reference-counted.
#[derive(Clone)]
pub struct EmbeddingPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    cache: Arc<Mutex<LruCache<String, Vec<f32>>>>,
    relational: Option<Arc<RelationalStore>>,
}

impl EmbeddingPipeline {
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>, relational: Option<Arc<RelationalStore>>) -> Self {
        let capacity = NonZeroUsize::new(EMBEDDING_CACHE_SIZE).unwrap_or(NonZeroUsize::MIN);
        Self {
            provider,
            cache: Arc::new(Mutex::new(LruCache::new(capacity))),
            relational,
        }
    }

    #[must_use]
    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    async fn cache_lookup(&self, key: &str) -> Result<Option<Vec<f32>>> {
        if let Some(hit) = self.cache.lock().get(key) {
            return Ok(Some(hit.clone()));
        }
        if let Some(relational) = &self.relational {
            if let Some(vector) = relational
                .get_cached_embedding(key, self.provider.model_name())
                .await?
            {
                self.cache.lock().put(key.to_string(), vector.clone());
                return Ok(Some(vector));
            }
        }
        Ok(None)
    }

    async fn cache_store(&self, key: &str, vector: &[f32]) -> Result<()> {
        self.cache.lock().put(key.to_string(), vector.to_vec());
        if let Some(relational) = &self.relational {
            relational
                .put_cached_embedding(key, self.provider.model_name(), vector)
                .await?;
        }
        Ok(())
    }

    /// Embed one piece of text, consulting the cache first.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let key = cache_key_hash(text);
        if let Some(cached) = self.cache_lookup(&key).await? {
            return Ok(cached);
        }
        let vector = self.provider.embed(text).await?;
        self.cache_store(&key, &vector).await?;
        Ok(vector)
    }

    /// Embed a batch of texts, preserving input order. Cached texts are
    /// served from the cache; the remainder are dispatched to the provider,
    /// in parallel shards once the uncached count reaches the parallel
    /// threshold.
    pub async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = texts.iter().map(|t| cache_key_hash(t)).collect();
        let mut results: Vec<Option<Vec<f32>>> = Vec::with_capacity(texts.len());
        let mut misses: Vec<(usize, String)> = Vec::new();
        for (i, key) in keys.iter().enumerate() {
            match self.cache_lookup(key).await? {
                Some(vector) => results.push(Some(vector)),
                None => {
                    results.push(None);
                    misses.push((i, texts[i].clone()));
                }
            }
        }

        if !misses.is_empty() {
            let miss_texts: Vec<String> = misses.iter().map(|(_, t)| t.clone()).collect();
            let embedded = if miss_texts.len() >= EMBEDDING_BATCH_PARALLEL_THRESHOLD {
                self.embed_parallel(&miss_texts).await?
            } else {
                self.provider.embed_batch(&miss_texts).await?
            };
            for ((index, _), vector) in misses.iter().zip(embedded.into_iter()) {
                self.cache_store(&keys[*index], &vector).await?;
                results[*index] = Some(vector);
            }
        }

        Ok(results
            .into_iter()
            .map(|v| v.expect("every index is filled by cache hit or embed dispatch"))
            .collect())
    }

    /// Splits `texts` into `available_parallelism()` shards, embeds each on
    /// a blocking-pool worker, and concatenates the results back in input
    /// order. Any shard failure fails the whole batch.
    async fn embed_parallel(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let worker_count = std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(1)
            .min(texts.len())
            .max(1);
        let shard_size = texts.len().div_ceil(worker_count);

        let handle = tokio::runtime::Handle::current();
        let mut tasks = Vec::new();
        for shard in texts.chunks(shard_size) {
            let provider = Arc::clone(&self.provider);
            let shard = shard.to_vec();
            let handle = handle.clone();
            tasks.push(tokio::task::spawn_blocking(move || {
                handle.block_on(provider.embed_batch(&shard))
            }));
        }

        let mut out = Vec::with_capacity(texts.len());
        for task in tasks {
            let shard_result = task
                .await
                .map_err(|e| Error::Embedding(format!("embedding worker panicked: {e}")))??;
            out.extend(shard_result);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::provider::HashingEmbeddingProvider;

    fn pipeline() -> EmbeddingPipeline {
        EmbeddingPipeline::new(Arc::new(HashingEmbeddingProvider::new(32)), None)
    }

    #[tokio::test]
    async fn embed_caches_repeated_text() {
        let pipeline = pipeline();
        let a = pipeline.embed("hello world").await.unwrap();
        let b = pipeline.embed("hello world").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn embed_batch_preserves_order_below_threshold() {
        let pipeline = pipeline();
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();
        let batch = pipeline.embed_batch(&texts).await.unwrap();
        for (text, vector) in texts.iter().zip(batch.iter()) {
            assert_eq!(*vector, pipeline.embed(text).await.unwrap());
        }
    }

    #[tokio::test]
    async fn embed_batch_preserves_order_above_threshold() {
        let pipeline = pipeline();
        let texts: Vec<String> = (0..25).map(|i| format!("text number {i}")).collect();
        let batch = pipeline.embed_batch(&texts).await.unwrap();
        assert_eq!(batch.len(), 25);
        for (text, vector) in texts.iter().zip(batch.iter()) {
            assert_eq!(*vector, pipeline.embed(text).await.unwrap());
        }
    }

    #[tokio::test]
    async fn embed_batch_empty_returns_empty() {
        let pipeline = pipeline();
        assert!(pipeline.embed_batch(&[]).await.unwrap().is_empty());
    }
}
