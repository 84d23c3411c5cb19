//! Error taxonomy shared by every pipeline component.
//!
//! Variants map onto the failure classes the pipeline treats differently:
//! transient fetch failures are retried and then skipped, decode and storage
//! failures halt the owning stage, external service failures abort a single
//! file, and report persistence failures are logged and swallowed.

use thiserror::Error;

/// Result alias used across `medallion-core`.
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// Network GET failed after every allowed attempt.
    #[error("fetch failed for {url} after {attempts} attempt(s): {message}")]
    Fetch {
        url: String,
        attempts: u32,
        message: String,
    },

    /// An input blob could not be decoded (bad UTF-8, bad Parquet, unknown column type).
    #[error("decode error in {name}: {message}")]
    Decode { name: String, message: String },

    /// Object store get/put/list failed.
    #[error("storage error on {name}: {message}")]
    Storage { name: String, message: String },

    /// Embedding or index submission failed.
    #[error("{service} error: {message}")]
    ExternalService { service: String, message: String },

    /// Lineage or quality report could not be written.
    #[error("failed to persist report {name}: {message}")]
    ReportPersist { name: String, message: String },

    /// Two tables with incompatible column kinds were combined.
    #[error("schema mismatch on column '{column}': {message}")]
    Schema { column: String, message: String },

    #[error("configuration error: {0}")]
    Config(String),

    /// The orchestrator was driven out of order.
    #[error("invalid pipeline state: {0}")]
    InvalidState(String),
}

impl PipelineError {
    pub fn decode(name: impl Into<String>, message: impl ToString) -> Self {
        PipelineError::Decode {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn storage(name: impl Into<String>, message: impl ToString) -> Self {
        PipelineError::Storage {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn external(service: impl Into<String>, message: impl ToString) -> Self {
        PipelineError::ExternalService {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Whether the failure only affects the file being processed, leaving
    /// the rest of the stage free to continue.
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            PipelineError::Fetch { .. } | PipelineError::ExternalService { .. }
        )
    }
}
