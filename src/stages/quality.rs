//! Quality task: audit the union of all silver rows.
//!
//! The report is written to a fixed blob that each run overwrites, and is
//! also carried by a `data_quality` lineage record. Failing to write either
//! is logged and does not fail the task.

use medallion_core::models::Tier;
use medallion_core::quality::{run_quality_checks, QualityReport};
use medallion_core::store::CONTENT_TYPE_JSON;
use medallion_core::table::Table;
use medallion_core::{PipelineError, Result};

use super::metrics_json;
use crate::pipeline::PipelineContext;
use crate::tabular::decode_table;

pub const STAGE: &str = "data_quality";
pub const REPORT_BLOB: &str = "data_quality/dq_report.json";

pub async fn run_quality_task(ctx: &PipelineContext) -> Result<QualityReport> {
    let silver_files = ctx.store.list(&Tier::Silver.prefix(), ".parquet").await?;

    let mut tables = Vec::with_capacity(silver_files.len());
    for name in &silver_files {
        tables.push(decode_table(name, &ctx.store.get(name).await?)?);
    }
    let combined = Table::concat(&tables)?;

    let report = if combined.is_empty() {
        tracing::warn!("Combined silver table is empty. Skipping data quality checks.");
        QualityReport::default()
    } else {
        let report = run_quality_checks(&combined);
        tracing::info!("Data quality report: {:?}", report);
        report
    };

    match persist_report(ctx, &report).await {
        Ok(()) => tracing::info!("Data quality report saved to {}", REPORT_BLOB),
        Err(e) => tracing::error!("{}", e),
    }

    ctx.lineage
        .emit(STAGE, &silver_files, metrics_json(&report), None)
        .await;

    Ok(report)
}

async fn persist_report(ctx: &PipelineContext, report: &QualityReport) -> Result<()> {
    let persist_err = |message: String| PipelineError::ReportPersist {
        name: REPORT_BLOB.to_string(),
        message,
    };
    let bytes = serde_json::to_vec_pretty(report).map_err(|e| persist_err(e.to_string()))?;
    ctx.store
        .put(REPORT_BLOB, bytes, CONTENT_TYPE_JSON)
        .await
        .map_err(|e| persist_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_blob_lives_in_quality_tier() {
        assert_eq!(
            Tier::DataQuality.relative(REPORT_BLOB),
            Some("dq_report.json")
        );
    }
}
