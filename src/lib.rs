//! # Medallion
//!
//! A staged document pipeline that moves text through raw, bronze, silver
//! and gold tiers in an object store, audits the silver tier with a quality
//! gate, and records lineage for every stage run.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │ raw/*.txt│──▶│  bronze  │──▶│  silver  │──▶│   gold   │
//! │ (scrape) │   │ normalize│   │word_count│   │  embed   │
//! └──────────┘   └────┬─────┘   └────┬─────┘   └────┬─────┘
//!                     │              │ quality gate  │
//!                     ▼              ▼              ▼
//!                ┌──────────────────────────────────────┐
//!                │ lineage/*.json   data_quality/*.json │
//!                └──────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`storage`] | `object_store` backend for the blob gateway |
//! | [`tabular`] | Parquet codec for bronze/silver tables |
//! | [`fetch`] | Retrying HTTP GET |
//! | [`embedding`] | Embedding providers |
//! | [`index`] | Vector index backends |
//! | [`stages`] | The stage transforms and the quality task |
//! | [`lineage`] | Lineage recorder |
//! | [`pipeline`] | Context and orchestrator state machine |
//! | [`scrape`] | Scrape pages into the raw tier |
//! | [`commands`] | CLI command implementations |
//!
//! Runtime-agnostic pieces (models, table, quality checks, chunking, retry,
//! traits) live in the `medallion-core` crate.

pub mod commands;
pub mod config;
pub mod embedding;
pub mod fetch;
pub mod index;
pub mod lineage;
pub mod pipeline;
pub mod scrape;
pub mod stages;
pub mod storage;
pub mod tabular;
