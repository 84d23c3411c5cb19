//! Pipeline orchestration.
//!
//! [`PipelineContext`] bundles the handles every stage needs: blob store,
//! embedder, vector index, settings and the lineage recorder. It is built
//! once (usually by [`PipelineContext::from_config`]) and passed by
//! reference into each stage.
//!
//! [`Pipeline`] sequences the stages as a one-shot state machine:
//!
//! ```text
//! Idle ──▶ Bronze ──▶ Silver ──▶ Gold ──▶ QualityCheck ──▶ Done
//! ```
//!
//! A fatal stage error stops the machine in the failing state and is
//! returned to the caller. Nothing is rolled back; partially written tiers
//! stay in place. A pipeline that has left `Idle` cannot be run again.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use medallion_core::chunk::{ChunkIdPolicy, DEFAULT_CHUNK_WIDTH};
use medallion_core::embedding::Embedder;
use medallion_core::index::VectorIndex;
use medallion_core::quality::QualityReport;
use medallion_core::store::BlobStore;
use medallion_core::{PipelineError, Result};

use crate::config::{Config, PipelineConfig};
use crate::embedding::create_embedder;
use crate::index::create_index;
use crate::lineage::LineageRecorder;
use crate::stages::{
    bronze_to_silver, raw_to_bronze, run_quality_task, silver_to_gold, BronzeMetrics,
    GoldMetrics, SilverMetrics, StageOutcome,
};
use crate::storage::build_store;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub chunk_width: usize,
    pub chunk_ids: ChunkIdPolicy,
    /// Files processed in parallel within the bronze and silver stages.
    pub concurrency: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            chunk_width: DEFAULT_CHUNK_WIDTH,
            chunk_ids: ChunkIdPolicy::default(),
            concurrency: 1,
        }
    }
}

impl From<&PipelineConfig> for PipelineSettings {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            chunk_width: config.chunk_width,
            chunk_ids: config.chunk_ids,
            concurrency: config.concurrency,
        }
    }
}

pub struct PipelineContext {
    pub store: Arc<dyn BlobStore>,
    pub embedder: Arc<dyn Embedder>,
    pub index: Arc<dyn VectorIndex>,
    pub settings: PipelineSettings,
    pub lineage: LineageRecorder,
}

impl PipelineContext {
    pub fn new(
        store: Arc<dyn BlobStore>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        settings: PipelineSettings,
    ) -> Self {
        let lineage = LineageRecorder::new(Arc::clone(&store));
        Self {
            store,
            embedder,
            index,
            settings,
            lineage,
        }
    }

    /// Build the store, embedder and index named in `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let store = build_store(&config.storage)?;
        let embedder = create_embedder(&config.embedding)?;
        let index = create_index(&config.index)?;
        if !config.embedding.is_enabled() {
            tracing::warn!("Embedding provider is disabled; the gold stage will skip every file");
        }
        Ok(Self::new(
            store,
            embedder,
            index,
            PipelineSettings::from(&config.pipeline),
        ))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Bronze,
    Silver,
    Gold,
    QualityCheck,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineState::Idle => "idle",
            PipelineState::Bronze => "bronze",
            PipelineState::Silver => "silver",
            PipelineState::Gold => "gold",
            PipelineState::QualityCheck => "quality_check",
            PipelineState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Outcomes of the stages a pipeline has completed so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PipelineSummary {
    pub bronze: Option<StageOutcome<BronzeMetrics>>,
    pub silver: Option<StageOutcome<SilverMetrics>>,
    pub gold: Option<StageOutcome<GoldMetrics>>,
    pub quality: Option<QualityReport>,
}

pub struct Pipeline {
    ctx: PipelineContext,
    state: PipelineState,
    summary: PipelineSummary,
}

impl Pipeline {
    pub fn new(ctx: PipelineContext) -> Self {
        Self {
            ctx,
            state: PipelineState::Idle,
            summary: PipelineSummary::default(),
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn summary(&self) -> &PipelineSummary {
        &self.summary
    }

    pub fn context(&self) -> &PipelineContext {
        &self.ctx
    }

    /// Run bronze, silver, gold and the quality task in order and return
    /// the quality report.
    pub async fn run(&mut self) -> Result<QualityReport> {
        if self.state != PipelineState::Idle {
            return Err(PipelineError::InvalidState(format!(
                "pipeline already started (state: {})",
                self.state
            )));
        }

        self.enter(PipelineState::Bronze);
        self.summary.bronze = Some(raw_to_bronze(&self.ctx).await?);

        self.enter(PipelineState::Silver);
        self.summary.silver = Some(bronze_to_silver(&self.ctx).await?);

        self.enter(PipelineState::Gold);
        self.summary.gold = Some(silver_to_gold(&self.ctx).await?);

        self.enter(PipelineState::QualityCheck);
        let report = run_quality_task(&self.ctx).await?;
        self.summary.quality = Some(report.clone());

        self.enter(PipelineState::Done);
        Ok(report)
    }

    fn enter(&mut self, next: PipelineState) {
        tracing::info!("Pipeline {} → {}", self.state, next);
        self.state = next;
    }
}
