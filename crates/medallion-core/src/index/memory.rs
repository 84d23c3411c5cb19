//! In-memory [`VectorIndex`] for testing and local runs.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::{PipelineError, Result};

use super::{IndexEntry, VectorIndex};

#[derive(Debug, Default)]
pub struct InMemoryIndex {
    entries: RwLock<Vec<IndexEntry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Identifiers in insertion order.
    pub fn ids(&self) -> Vec<String> {
        self.entries
            .read()
            .map(|e| e.iter().map(|entry| entry.id.clone()).collect())
            .unwrap_or_default()
    }

    /// Entries whose `source` metadata equals `source_file`.
    pub fn entries_for_source(&self, source_file: &str) -> Vec<IndexEntry> {
        self.entries
            .read()
            .map(|e| {
                e.iter()
                    .filter(|entry| {
                        entry.metadata.get("source").map(String::as_str) == Some(source_file)
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn poisoned() -> PipelineError {
    PipelineError::external("index", "in-memory index lock poisoned")
}

#[async_trait]
impl VectorIndex for InMemoryIndex {
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut stored = self.entries.write().map_err(|_| poisoned())?;
        stored.extend(entries);
        Ok(())
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        let mut stored = self.entries.write().map_err(|_| poisoned())?;
        for entry in entries {
            match stored.iter_mut().find(|e| e.id == entry.id) {
                Some(existing) => *existing = entry,
                None => stored.push(entry),
            }
        }
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.entries.read().map_err(|_| poisoned())?.len())
    }
}
