#[cfg(test)]
mod tests;

use std::sync::{Arc, OnceLock};

use tracing::debug;

use crate::{LogQaError, Result};

/// A text embedding provider
///
/// Implementations return one vector per input, in input order. Dimension
/// checks are left to [`EmbeddingGateway`].
pub trait Embedder: Send + Sync {
    /// Identifier of the embedding model
    fn model_name(&self) -> &str;

    /// Encode a batch of texts
    fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Adapter in front of an [`Embedder`] that guarantees a stable output shape
///
/// Every vector returned over the gateway's lifetime has the same dimension.
/// The dimension is either fixed up front or locked in by the first
/// successful call.
pub struct EmbeddingGateway {
    embedder: Arc<dyn Embedder>,
    dimension: OnceLock<usize>,
}

impl EmbeddingGateway {
    #[inline]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            dimension: OnceLock::new(),
        }
    }

    /// Create a gateway that only accepts vectors of `dimension` entries
    #[inline]
    pub fn with_dimension(embedder: Arc<dyn Embedder>, dimension: usize) -> Self {
        let lock = OnceLock::new();
        let _ = lock.set(dimension);
        Self {
            embedder,
            dimension: lock,
        }
    }

    /// Dimension of produced vectors, if known yet
    #[inline]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    #[inline]
    pub fn model_name(&self) -> &str {
        self.embedder.model_name()
    }

    /// Embed many texts, one vector per text in the same order
    #[inline]
    pub fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.encode(texts)?;

        if vectors.len() != texts.len() {
            return Err(LogQaError::EmbeddingUnavailable(format!(
                "model '{}' returned {} vectors for {} inputs",
                self.embedder.model_name(),
                vectors.len(),
                texts.len()
            )));
        }

        let expected = match self.dimension.get() {
            Some(dim) => *dim,
            None => vectors.first().map_or(0, Vec::len),
        };
        if expected == 0 {
            return Err(LogQaError::EmbeddingUnavailable(format!(
                "model '{}' returned empty vectors",
                self.embedder.model_name()
            )));
        }

        if let Some(position) = vectors.iter().position(|v| v.len() != expected) {
            return Err(LogQaError::EmbeddingUnavailable(format!(
                "model '{}' returned a {}-dimensional vector for input {}, expected {}",
                self.embedder.model_name(),
                vectors[position].len(),
                position,
                expected
            )));
        }

        if self.dimension.set(expected).is_ok() {
            debug!(
                "Embedding dimension locked to {} for model '{}'",
                expected,
                self.embedder.model_name()
            );
        }

        Ok(vectors)
    }

    /// Embed a single text
    #[inline]
    pub fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                LogQaError::EmbeddingUnavailable(format!(
                    "model '{}' returned no vector",
                    self.embedder.model_name()
                ))
            })
    }
}
