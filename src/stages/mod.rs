//! Stage transforms: raw→bronze, bronze→silver, silver→gold, and the
//! quality task over silver.
//!
//! Every stage reads its input tier through the [`BlobStore`] held by the
//! [`PipelineContext`], writes its outputs under tier-qualified names, and
//! emits exactly one lineage record when it completes.
//!
//! [`BlobStore`]: medallion_core::store::BlobStore
//! [`PipelineContext`]: crate::pipeline::PipelineContext

pub mod bronze;
pub mod gold;
pub mod quality;
pub mod silver;

use serde::Serialize;
use serde_json::Value;

pub use bronze::{normalize_lines, raw_to_bronze, BronzeMetrics};
pub use gold::{silver_to_gold, GoldMetrics};
pub use quality::{run_quality_task, REPORT_BLOB};
pub use silver::{bronze_to_silver, word_count, SilverMetrics};

/// Names of the artifacts a stage produced, plus its aggregate metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageOutcome<M> {
    pub processed_files: Vec<String>,
    /// Inputs skipped after a file-scoped failure.
    pub failed_files: Vec<String>,
    pub metrics: M,
}

/// `total / count`, or zero when there is nothing to average.
pub(crate) fn mean(total: f64, count: usize) -> f64 {
    if count == 0 {
        0.0
    } else {
        total / count as f64
    }
}

pub(crate) fn metrics_json<M: Serialize>(metrics: &M) -> Value {
    serde_json::to_value(metrics).unwrap_or_default()
}
