//! External AI capability traits and vector utilities.
//!
//! The pipeline never talks to a model directly. It goes through two
//! narrow traits:
//!
//! - [`TextGenerator`]: prompt in, completion text out.
//! - [`Embedder`]: texts in, one vector per text out.
//!
//! Concrete HTTP/local implementations live in the `query-fanout` app
//! crate; tests drive the pipeline with deterministic fakes.
//!
//! Embedding failures are isolated per text: [`embed_all`] substitutes an
//! empty vector for anything that could not be embedded, and
//! [`cosine_similarity`] treats empty or zero-norm vectors as `0.0`.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::warn;

/// Sampling knobs passed through to the generative backend.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GenerationOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// A generative text backend.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Returns the model identifier (e.g. `"gpt-4o-mini"`).
    fn model_name(&self) -> &str;

    /// Produce a completion for `prompt`.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;
}

/// An embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality, or `0` when the backend does not declare it.
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning vectors in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        (**self).generate(prompt, options).await
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Box<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn dims(&self) -> usize {
        (**self).dims()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts).await
    }
}

#[async_trait]
impl<T: TextGenerator + ?Sized> TextGenerator for Arc<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        (**self).generate(prompt, options).await
    }
}

#[async_trait]
impl<T: Embedder + ?Sized> Embedder for Arc<T> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn dims(&self) -> usize {
        (**self).dims()
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        (**self).embed(texts).await
    }
}

/// Per-run embedding cache keyed by the SHA-256 of the text.
///
/// Scoped to a single analysis; never shared between runs.
#[derive(Debug, Default)]
pub struct EmbeddingCache {
    vectors: HashMap<String, Vec<f32>>,
}

impl EmbeddingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, text: &str) -> Option<&Vec<f32>> {
        self.vectors.get(&content_hash(text))
    }

    pub fn insert(&mut self, text: &str, vector: Vec<f32>) {
        self.vectors.insert(content_hash(text), vector);
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

/// SHA-256 hex digest of a text.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Embed every text, never failing.
///
/// Texts already in `cache` are not sent again, and duplicates are sent
/// once. The missing texts go out as one batch; if the batch errors or
/// returns the wrong number of vectors, each text is retried on its own.
/// A text that still fails maps to an empty vector.
pub async fn embed_all(
    embedder: &dyn Embedder,
    texts: &[String],
    cache: &mut EmbeddingCache,
) -> Vec<Vec<f32>> {
    let mut missing: Vec<String> = Vec::new();
    for text in texts {
        if cache.get(text).is_none() && !missing.contains(text) {
            missing.push(text.clone());
        }
    }

    if !missing.is_empty() {
        match embedder.embed(&missing).await {
            Ok(vectors) if vectors.len() == missing.len() => {
                for (text, vector) in missing.iter().zip(vectors) {
                    cache.insert(text, vector);
                }
            }
            Ok(vectors) => {
                warn!(
                    expected = missing.len(),
                    got = vectors.len(),
                    "embedding batch size mismatch, embedding individually"
                );
                embed_individually(embedder, &missing, cache).await;
            }
            Err(e) => {
                warn!(error = %e, count = missing.len(), "embedding batch failed, embedding individually");
                embed_individually(embedder, &missing, cache).await;
            }
        }
    }

    texts
        .iter()
        .map(|t| cache.get(t).cloned().unwrap_or_default())
        .collect()
}

async fn embed_individually(embedder: &dyn Embedder, texts: &[String], cache: &mut EmbeddingCache) {
    for text in texts {
        let vector = match embedder.embed(std::slice::from_ref(text)).await {
            Ok(mut vectors) if vectors.len() == 1 => vectors.pop().unwrap_or_default(),
            Ok(_) => {
                warn!("embedding returned no vector for text");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "embedding failed for text");
                Vec::new()
            }
        };
        cache.insert(text, vector);
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors, vectors of different lengths, or a
/// zero-norm vector on either side.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
