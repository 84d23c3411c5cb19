//! In-memory [`BlobStore`] implementation for tests and dry runs.
//!
//! Uses a `BTreeMap` behind `std::sync::RwLock`, so listing is naturally
//! lexicographic. Content types are kept alongside the bytes for
//! inspection in tests.

use std::collections::BTreeMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{PipelineError, Result};

use super::BlobStore;

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory blob store.
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<BTreeMap<String, StoredBlob>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content type recorded for `name`, if the blob exists.
    pub fn content_type(&self, name: &str) -> Option<String> {
        self.blobs
            .read()
            .ok()?
            .get(name)
            .map(|b| b.content_type.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(name: &str) -> PipelineError {
    PipelineError::storage(name, "in-memory store lock poisoned")
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>> {
        let blobs = self.blobs.read().map_err(|_| poisoned(prefix))?;
        Ok(blobs
            .range(prefix.to_string()..)
            .take_while(|(name, _)| name.starts_with(prefix))
            .filter(|(name, _)| name.ends_with(suffix))
            .map(|(name, _)| name.clone())
            .collect())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let blobs = self.blobs.read().map_err(|_| poisoned(name))?;
        blobs
            .get(name)
            .map(|b| b.bytes.clone())
            .ok_or_else(|| PipelineError::storage(name, "not found"))
    }

    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        let mut blobs = self.blobs.write().map_err(|_| poisoned(name))?;
        blobs.insert(
            name.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}
