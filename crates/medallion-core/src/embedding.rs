//! The [`Embedder`] seam. Concrete providers (OpenAI, Ollama, fastembed)
//! live in the `medallion` app crate.

use async_trait::async_trait;

use crate::error::Result;

/// Produces dense vectors for text.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier recorded in lineage (e.g. `"all-minilm-l6-v2"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `384`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts, returning one vector per input in order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
