//! # Medallion Core
//!
//! Runtime-agnostic logic for Medallion: tier naming and data models, the
//! tagged tabular model, the quality gate, fixed-width chunking, the
//! bounded-retry combinator, lineage records, and the storage, embedding,
//! and index traits with in-memory implementations.
//!
//! This crate contains no tokio, network, or filesystem dependencies.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod lineage;
pub mod models;
pub mod quality;
pub mod retry;
pub mod store;
pub mod table;

pub use error::{PipelineError, Result};
