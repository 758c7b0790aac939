//! The opaque embedding model contract (spec.md §6): `embed`, `embed_batch`,
//! `dim`, `model_name`. Everything about the model itself — weights,
//! tokenizer, inference backend — is out of scope; this crate only needs
//! something implementing the trait.

use crate::{Error, Result};
use async_trait::async_trait;

/// Converts text to fixed-dimension vectors. Implementations MUST return
/// `dim()`-length vectors from every `embed`/`embed_batch` call.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Default batch implementation calls `embed` sequentially; providers
    /// with a genuine batch API should override this. MUST preserve input
    /// order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dim(&self) -> usize;
    fn model_name(&self) -> &str;
}

/// Validates that every caller-supplied text is non-empty before it reaches
/// a real model; empty/whitespace-only input is a typed error per
/// spec.md §4.C2, not a zero vector.
pub(crate) fn reject_blank(texts: &[String]) -> Result<()> {
    if texts.iter().any(|t| t.trim().is_empty()) {
        return Err(Error::Embedding(
            "embedding input must not be empty or whitespace-only".into(),
        ));
    }
    Ok(())
}

/// A deterministic, dependency-free stand-in for a real embedding model.
/// Hashes overlapping word n-grams into a fixed-width feature vector
/// (a seeded feature-hashing embedder), then L2-normalizes it. Used as the
/// default provider and in every test that does not need real semantic
/// similarity, only a stable, queryable vector space.
pub struct HashingEmbeddingProvider {
    dim: usize,
    model_name: String,
}

impl HashingEmbeddingProvider {
    #[must_use]
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            model_name: format!("hashing-embedder-{dim}"),
        }
    }
}

impl Default for HashingEmbeddingProvider {
    fn default() -> Self {
        Self::new(256)
    }
}

fn hash_token(token: &str) -> u64 {
    // FNV-1a: small, stable across process restarts, no external crate.
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in token.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01B3);
    }
    hash
}

fn hash_embed(text: &str, dim: usize) -> Vec<f32> {
    let mut vector = vec![0.0f32; dim];
    let words: Vec<&str> = text.split_whitespace().collect();
    for window in 1..=2 {
        for gram in words.windows(window) {
            let token = gram.join(" ");
            let hash = hash_token(&token);
            let index = (hash % dim as u64) as usize;
            let sign = if (hash >> 63) & 1 == 0 { 1.0 } else { -1.0 };
            vector[index] += sign;
        }
    }
    crate::embeddings::utils::normalize_vector(vector)
}

#[async_trait]
impl EmbeddingProvider for HashingEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        reject_blank(std::slice::from_ref(&text.to_string()))?;
        Ok(hash_embed(text, self.dim))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        reject_blank(texts)?;
        Ok(texts.iter().map(|t| hash_embed(t, self.dim)).collect())
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn model_name(&self) -> &str {
        &self.model_name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embed_is_deterministic_and_normalized() {
        let provider = HashingEmbeddingProvider::new(64);
        let a = provider.embed("fn authenticate(user)").await.unwrap();
        let b = provider.embed("fn authenticate(user)").await.unwrap();
        assert_eq!(a, b);
        let magnitude: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5 || magnitude == 0.0);
    }

    #[tokio::test]
    async fn embed_rejects_blank_input() {
        let provider = HashingEmbeddingProvider::default();
        assert!(provider.embed("   ").await.is_err());
    }

    #[tokio::test]
    async fn embed_batch_preserves_order() {
        let provider = HashingEmbeddingProvider::new(32);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()];
        let batch = provider.embed_batch(&texts).await.unwrap();
        for (text, vector) in texts.iter().zip(batch.iter()) {
            assert_eq!(*vector, provider.embed(text).await.unwrap());
        }
    }
}
