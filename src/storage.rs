//! Object store backend for the [`BlobStore`] gateway.
//!
//! Wraps any [`ObjectStore`] (S3/MinIO via `AmazonS3Builder`, local
//! filesystem, or in-memory) behind the pipeline's list/get/put surface.
//! The client is built once from [`StorageConfig`] and shared by handle;
//! there is no module-level client.
//!
//! # Configuration
//!
//! ```toml
//! [storage]
//! backend = "s3"
//! bucket = "mydata"
//! endpoint_url = "http://localhost:9000"   # MinIO
//! allow_http = true
//! ```
//!
//! Credentials are read from `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`
//! (and optionally `AWS_SESSION_TOKEN`).
//!
//! # Retries
//!
//! The S3 client is built with retries disabled. Storage failures surface
//! to the stage that issued them.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{
    Attribute, AttributeValue, Attributes, ClientOptions, ObjectStore, PutOptions, PutPayload,
    RetryConfig,
};

use medallion_core::store::BlobStore;
use medallion_core::PipelineError;

use crate::config::StorageConfig;

/// [`BlobStore`] over an `object_store` backend.
pub struct ObjectStoreBlobStore {
    inner: Arc<dyn ObjectStore>,
    /// Whether the backend accepts a content-type attribute on put.
    content_types: bool,
}

impl ObjectStoreBlobStore {
    pub fn new(inner: Arc<dyn ObjectStore>, content_types: bool) -> Self {
        Self {
            inner,
            content_types,
        }
    }

    /// Ephemeral store backed by `object_store`'s in-memory implementation.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemory::new()), true)
    }

    /// Store rooted at a local directory, created if missing.
    pub fn local(root: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(root)
            .with_context(|| format!("Failed to create storage root: {}", root.display()))?;
        let fs = LocalFileSystem::new_with_prefix(root)
            .with_context(|| format!("Failed to open storage root: {}", root.display()))?;
        Ok(Self::new(Arc::new(fs), false))
    }
}

fn client_options() -> ClientOptions {
    ClientOptions::new()
        .with_connect_timeout(Duration::from_secs(5))
        .with_timeout(Duration::from_secs(60))
}

fn no_retry() -> RetryConfig {
    RetryConfig {
        max_retries: 0,
        ..RetryConfig::default()
    }
}

/// Build the configured blob store.
pub fn build_store(config: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match config.backend.as_str() {
        "memory" => Ok(Arc::new(ObjectStoreBlobStore::in_memory())),
        "local" => {
            let Some(root) = config.local_path.as_deref() else {
                bail!("storage.local_path must be set when backend is 'local'");
            };
            tracing::info!("Opening local blob store at {}", root.display());
            Ok(Arc::new(ObjectStoreBlobStore::local(root)?))
        }
        "s3" => {
            let Some(bucket) = config.bucket.as_deref() else {
                bail!("storage.bucket must be set when backend is 's3'");
            };
            tracing::info!("Creating S3 client for bucket: {}", bucket);

            let mut builder = AmazonS3Builder::from_env()
                .with_bucket_name(bucket)
                .with_region(&config.region)
                .with_allow_http(config.allow_http)
                .with_client_options(client_options())
                .with_retry(no_retry());
            if let Some(endpoint) = &config.endpoint_url {
                // MinIO and LocalStack expect path-style requests.
                builder = builder
                    .with_endpoint(endpoint)
                    .with_virtual_hosted_style_request(false);
            }
            let s3 = builder.build().context("Failed to build S3 client")?;
            Ok(Arc::new(ObjectStoreBlobStore::new(Arc::new(s3), true)))
        }
        other => bail!("Unknown storage backend: '{}'", other),
    }
}

/// Blob names are used verbatim as object keys. `ObjectPath::from` would
/// percent-encode reserved characters and break the list/get round trip.
fn object_path(name: &str) -> medallion_core::Result<ObjectPath> {
    ObjectPath::parse(name).map_err(|e| PipelineError::storage(name, e))
}

#[async_trait]
impl BlobStore for ObjectStoreBlobStore {
    async fn list(&self, prefix: &str, suffix: &str) -> medallion_core::Result<Vec<String>> {
        // object_store prefixes match whole path segments, so list the
        // enclosing folder and filter on the raw prefix.
        let folder = prefix.rfind('/').map(|pos| &prefix[..pos]).unwrap_or("");
        let location = if folder.is_empty() {
            None
        } else {
            Some(object_path(folder)?)
        };
        let objects: Vec<_> = self
            .inner
            .list(location.as_ref())
            .try_collect()
            .await
            .map_err(|e| PipelineError::storage(prefix, e))?;

        let mut names: Vec<String> = objects
            .into_iter()
            .map(|meta| meta.location.as_ref().to_string())
            .filter(|name| name.starts_with(prefix) && name.ends_with(suffix))
            .collect();
        names.sort();
        Ok(names)
    }

    async fn get(&self, name: &str) -> medallion_core::Result<Vec<u8>> {
        let location = object_path(name)?;
        let result = self
            .inner
            .get(&location)
            .await
            .map_err(|e| PipelineError::storage(name, e))?;
        let bytes = result
            .bytes()
            .await
            .map_err(|e| PipelineError::storage(name, e))?;
        Ok(bytes.to_vec())
    }

    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> medallion_core::Result<()> {
        let location = object_path(name)?;
        let mut opts = PutOptions::default();
        if self.content_types {
            let mut attributes = Attributes::new();
            attributes.insert(
                Attribute::ContentType,
                AttributeValue::from(content_type.to_string()),
            );
            opts.attributes = attributes;
        }
        self.inner
            .put_opts(&location, PutPayload::from(bytes), opts)
            .await
            .map_err(|e| PipelineError::storage(name, e))?;
        tracing::debug!("Uploaded {}", name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medallion_core::store::{CONTENT_TYPE_JSON, CONTENT_TYPE_TEXT};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_list_get_put() {
        let store = ObjectStoreBlobStore::in_memory();
        store.put("raw/b.txt", b"B".to_vec(), CONTENT_TYPE_TEXT).await.unwrap();
        store.put("raw/a.txt", b"A".to_vec(), CONTENT_TYPE_TEXT).await.unwrap();
        store.put("raw/notes.md", b"M".to_vec(), CONTENT_TYPE_TEXT).await.unwrap();
        store.put("bronze/a.parquet", b"P".to_vec(), CONTENT_TYPE_TEXT).await.unwrap();

        let names = store.list("raw/", ".txt").await.unwrap();
        assert_eq!(names, vec!["raw/a.txt", "raw/b.txt"]);
        assert_eq!(store.list("raw/a", ".txt").await.unwrap(), vec!["raw/a.txt"]);
        assert_eq!(store.get("raw/a.txt").await.unwrap(), b"A");
    }

    #[tokio::test]
    async fn test_local_backend_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStoreBlobStore::local(tmp.path()).unwrap();
        store
            .put("lineage/x_20240101T000000Z.json", b"{}".to_vec(), CONTENT_TYPE_JSON)
            .await
            .unwrap();
        store
            .put("lineage/x_20240101T000000Z.json", b"{}".to_vec(), CONTENT_TYPE_JSON)
            .await
            .unwrap();

        assert!(tmp.path().join("lineage/x_20240101T000000Z.json").exists());
        let names = store.list("lineage/", ".json").await.unwrap();
        assert_eq!(names.len(), 1);
    }

    #[tokio::test]
    async fn test_reserved_characters_survive_listing() {
        let store = ObjectStoreBlobStore::in_memory();
        store
            .put("raw/notes [draft].txt", b"draft".to_vec(), CONTENT_TYPE_TEXT)
            .await
            .unwrap();
        store.put("raw/50% off.txt", b"sale".to_vec(), CONTENT_TYPE_TEXT).await.unwrap();

        let names = store.list("raw/", ".txt").await.unwrap();
        assert_eq!(names, vec!["raw/50% off.txt", "raw/notes [draft].txt"]);
        assert_eq!(store.get(&names[0]).await.unwrap(), b"sale");
        assert_eq!(store.get(&names[1]).await.unwrap(), b"draft");
    }

    #[tokio::test]
    async fn test_local_backend_reserved_characters() {
        let tmp = TempDir::new().unwrap();
        let store = ObjectStoreBlobStore::local(tmp.path()).unwrap();
        store
            .put("raw/notes [draft].txt", b"draft".to_vec(), CONTENT_TYPE_TEXT)
            .await
            .unwrap();

        let names = store.list("raw/", ".txt").await.unwrap();
        assert_eq!(names, vec!["raw/notes [draft].txt"]);
        assert_eq!(store.get(&names[0]).await.unwrap(), b"draft");
    }

    #[tokio::test]
    async fn test_invalid_name_is_storage_error() {
        let store = ObjectStoreBlobStore::in_memory();
        let err = store.get("raw/../escape.txt").await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_missing_object_is_storage_error() {
        let store = ObjectStoreBlobStore::in_memory();
        let err = store.get("silver/none.parquet").await.unwrap_err();
        assert!(matches!(err, PipelineError::Storage { .. }));
    }

    #[tokio::test]
    async fn test_list_empty_tier() {
        let store = ObjectStoreBlobStore::in_memory();
        assert!(store.list("silver/", ".parquet").await.unwrap().is_empty());
    }

    #[test]
    fn test_build_store_requires_bucket() {
        let config = StorageConfig {
            backend: "s3".to_string(),
            ..StorageConfig::default()
        };
        assert!(build_store(&config).is_err());
    }
}
