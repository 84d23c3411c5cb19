//! Blob storage abstraction for Medallion.
//!
//! The [`BlobStore`] trait is the narrow list/get/put surface every stage
//! uses to read one tier and write the next. Names are tier-qualified
//! (`"{tier}/{relative}"`). Implementations never retry internally; retry
//! policy belongs to callers that need it.
//!
//! Implementations must be `Send + Sync`: a single handle is shared
//! read-only across concurrent file workers, and workers never write the
//! same destination name.

pub mod memory;

use async_trait::async_trait;

use crate::error::Result;

pub const CONTENT_TYPE_OCTET_STREAM: &str = "application/octet-stream";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const CONTENT_TYPE_TEXT: &str = "text/plain";

/// Abstract key/blob store.
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`list`](BlobStore::list) | Names under a prefix ending in a suffix, sorted |
/// | [`get`](BlobStore::get) | Read a blob's bytes |
/// | [`put`](BlobStore::put) | Write (or overwrite) a blob |
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// List names starting with `prefix` and ending with `suffix`, in
    /// lexicographic order.
    async fn list(&self, prefix: &str, suffix: &str) -> Result<Vec<String>>;

    async fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// Write `bytes` under `name`. Writing identical bytes twice is
    /// observably a no-op; otherwise last write wins.
    async fn put(&self, name: &str, bytes: Vec<u8>, content_type: &str) -> Result<()>;
}
