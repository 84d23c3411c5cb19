//! Vector index abstraction.
//!
//! The gold stage hands each file's chunks to a [`VectorIndex`] in a single
//! call. From the pipeline's point of view that call is atomic: it either
//! registers every entry of the batch or fails.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::{PipelineError, Result};
use crate::models::Chunk;

/// One indexed chunk: text, vector, identifier and string metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub metadata: BTreeMap<String, String>,
}

/// Pair chunks with their vectors, tagging each with `{source: source_file}`.
///
/// Fails when the embedder returned a different number of vectors than
/// chunks submitted.
pub fn entries_for_chunks(chunks: &[Chunk], vectors: Vec<Vec<f32>>) -> Result<Vec<IndexEntry>> {
    if chunks.len() != vectors.len() {
        return Err(PipelineError::external(
            "embedding",
            format!(
                "expected {} vectors, received {}",
                chunks.len(),
                vectors.len()
            ),
        ));
    }

    Ok(chunks
        .iter()
        .zip(vectors)
        .map(|(chunk, vector)| IndexEntry {
            id: chunk.id.clone(),
            text: chunk.text.clone(),
            vector,
            metadata: BTreeMap::from([("source".to_string(), chunk.source_file.clone())]),
        })
        .collect())
}

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Append entries. Identifiers are expected to be new.
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Insert or replace entries by identifier.
    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()>;

    /// Number of entries currently indexed.
    async fn count(&self) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_text, ChunkIdPolicy};

    #[test]
    fn test_entries_carry_source_metadata() {
        let chunks = chunk_text("raw/a.txt", "hello world", 5, ChunkIdPolicy::Random);
        let vectors = vec![vec![1.0]; chunks.len()];
        let entries = entries_for_chunks(&chunks, vectors).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.metadata["source"] == "raw/a.txt"));
        assert_eq!(entries[0].id, chunks[0].id);
    }

    #[test]
    fn test_vector_count_mismatch_is_external_error() {
        let chunks = chunk_text("raw/a.txt", "hello world", 5, ChunkIdPolicy::Random);
        let err = entries_for_chunks(&chunks, vec![vec![1.0]]).unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService { .. }));
    }
}
