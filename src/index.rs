//! Vector index backends.
//!
//! [`create_index`] picks the backend named by `[index].provider`:
//! `memory` uses [`InMemoryIndex`] from the core crate, `chroma` uses
//! [`ChromaIndex`], a thin client for Chroma's REST API. The Chroma
//! collection is resolved (get-or-create) on first use and cached.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::OnceCell;

use medallion_core::index::memory::InMemoryIndex;
use medallion_core::index::{IndexEntry, VectorIndex};
use medallion_core::{PipelineError, Result};

use crate::config::IndexConfig;

pub struct ChromaIndex {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    collection_id: OnceCell<String>,
}

#[derive(Deserialize)]
struct CollectionResponse {
    id: String,
}

fn chroma_err(message: impl ToString) -> PipelineError {
    PipelineError::external("chroma", message)
}

impl ChromaIndex {
    pub fn new(base_url: &str, collection: &str, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            collection_id: OnceCell::new(),
        })
    }

    async fn collection_id(&self) -> Result<&str> {
        let id = self
            .collection_id
            .get_or_try_init(|| async {
                let body = json!({ "name": self.collection, "get_or_create": true });
                let response: CollectionResponse = self
                    .send(self.client.post(format!("{}/api/v1/collections", self.base_url)).json(&body))
                    .await?
                    .json()
                    .await
                    .map_err(chroma_err)?;
                tracing::info!(
                    "Using Chroma collection '{}' ({})",
                    self.collection,
                    response.id
                );
                Ok::<_, PipelineError>(response.id)
            })
            .await?;
        Ok(id.as_str())
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await.map_err(chroma_err)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(chroma_err(format!("HTTP {}: {}", status, text)));
        }
        Ok(response)
    }

    async fn submit(&self, operation: &str, entries: Vec<IndexEntry>) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let id = self.collection_id().await?;
        let count = entries.len();

        let mut ids = Vec::with_capacity(count);
        let mut embeddings = Vec::with_capacity(count);
        let mut documents = Vec::with_capacity(count);
        let mut metadatas = Vec::with_capacity(count);
        for entry in entries {
            ids.push(entry.id);
            embeddings.push(entry.vector);
            documents.push(entry.text);
            metadatas.push(entry.metadata);
        }
        let body = json!({
            "ids": ids,
            "embeddings": embeddings,
            "documents": documents,
            "metadatas": metadatas,
        });

        self.send(
            self.client
                .post(format!("{}/api/v1/collections/{}/{}", self.base_url, id, operation))
                .json(&body),
        )
        .await?;
        tracing::debug!("Chroma {} of {} entries", operation, count);
        Ok(())
    }
}

#[async_trait]
impl VectorIndex for ChromaIndex {
    async fn add(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.submit("add", entries).await
    }

    async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<()> {
        self.submit("upsert", entries).await
    }

    async fn count(&self) -> Result<usize> {
        let id = self.collection_id().await?;
        let count: usize = self
            .send(
                self.client
                    .get(format!("{}/api/v1/collections/{}/count", self.base_url, id)),
            )
            .await?
            .json()
            .await
            .map_err(chroma_err)?;
        Ok(count)
    }
}

/// Create the [`VectorIndex`] named by `config.provider`.
pub fn create_index(config: &IndexConfig) -> anyhow::Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "memory" => Ok(Arc::new(InMemoryIndex::new())),
        "chroma" => {
            let Some(url) = config.url.as_deref() else {
                bail!("index.url must be set when provider is 'chroma'");
            };
            Ok(Arc::new(ChromaIndex::new(
                url,
                &config.collection,
                Duration::from_secs(config.timeout_secs),
            )?))
        }
        other => bail!("Unknown index provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Path, State};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::Value;

    #[derive(Default)]
    struct MockChroma {
        collections_created: AtomicUsize,
        stored: AtomicUsize,
    }

    async fn mock_chroma() -> (String, Arc<MockChroma>) {
        let state = Arc::new(MockChroma::default());
        let app = Router::new()
            .route(
                "/api/v1/collections",
                post(|State(s): State<Arc<MockChroma>>, Json(body): Json<Value>| async move {
                    s.collections_created.fetch_add(1, Ordering::SeqCst);
                    assert_eq!(body["get_or_create"], true);
                    Json(json!({ "id": "c-1", "name": body["name"] }))
                }),
            )
            .route(
                "/api/v1/collections/{id}/{op}",
                post(
                    |State(s): State<Arc<MockChroma>>,
                     Path((id, op)): Path<(String, String)>,
                     Json(body): Json<Value>| async move {
                        assert_eq!(id, "c-1");
                        assert!(op == "add" || op == "upsert");
                        let n = body["ids"].as_array().map(|a| a.len()).unwrap_or(0);
                        s.stored.fetch_add(n, Ordering::SeqCst);
                        Json(json!(true))
                    },
                ),
            )
            .route(
                "/api/v1/collections/{id}/count",
                get(|State(s): State<Arc<MockChroma>>| async move {
                    Json(json!(s.stored.load(Ordering::SeqCst)))
                }),
            )
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{}", addr), state)
    }

    fn entry(id: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            text: "text".to_string(),
            vector: vec![0.5, 0.5],
            metadata: BTreeMap::from([("source".to_string(), "raw/a.txt".to_string())]),
        }
    }

    #[tokio::test]
    async fn test_chroma_resolves_collection_once() {
        let (url, state) = mock_chroma().await;
        let index = ChromaIndex::new(&url, "rag_docs", Duration::from_secs(5)).unwrap();

        index.add(vec![entry("1"), entry("2")]).await.unwrap();
        index.upsert(vec![entry("3")]).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 3);
        assert_eq!(state.collections_created.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chroma_unreachable_is_external_error() {
        let index = ChromaIndex::new("http://127.0.0.1:9", "rag_docs", Duration::from_secs(1)).unwrap();
        let err = index.add(vec![entry("1")]).await.unwrap_err();
        assert!(matches!(err, PipelineError::ExternalService { .. }));
    }

    #[test]
    fn test_create_index_requires_url_for_chroma() {
        let config = IndexConfig {
            provider: "chroma".to_string(),
            ..IndexConfig::default()
        };
        assert!(create_index(&config).is_err());
        assert!(create_index(&IndexConfig::default()).is_ok());
    }
}
