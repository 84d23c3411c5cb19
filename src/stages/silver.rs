//! bronze→silver: derive `word_count` for every row.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;

use medallion_core::models::{retier, Tier};
use medallion_core::store::CONTENT_TYPE_OCTET_STREAM;
use medallion_core::table::{Column, ColumnKind, Value, CONTENT_COLUMN, WORD_COUNT_COLUMN};
use medallion_core::{PipelineError, Result};

use super::{mean, metrics_json, StageOutcome};
use crate::pipeline::PipelineContext;
use crate::tabular::{decode_table, encode_table};

pub const STAGE: &str = "bronze_to_silver";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SilverMetrics {
    pub total_files: usize,
    pub processed_files: usize,
    pub avg_word_count: f64,
}

/// Number of whitespace-delimited tokens in `content`.
pub fn word_count(content: &str) -> i64 {
    content.split_whitespace().count() as i64
}

/// Augment every `bronze/*.parquet` blob and write it to silver under the
/// same relative name. Returned names are sorted.
pub async fn bronze_to_silver(ctx: &PipelineContext) -> Result<StageOutcome<SilverMetrics>> {
    let bronze_files = ctx.store.list(&Tier::Bronze.prefix(), ".parquet").await?;
    tracing::info!("bronze→silver: {} file(s) to process", bronze_files.len());

    let converted: Vec<(String, Vec<i64>)> = stream::iter(bronze_files.iter())
        .map(|name| silver_file(ctx, name))
        .buffered(ctx.settings.concurrency.max(1))
        .try_collect()
        .await?;

    let mut processed_files = Vec::with_capacity(converted.len());
    let mut counts = Vec::new();
    for (name, file_counts) in converted {
        processed_files.push(name);
        counts.extend(file_counts);
    }
    processed_files.sort();

    let metrics = SilverMetrics {
        total_files: bronze_files.len(),
        processed_files: processed_files.len(),
        avg_word_count: mean(counts.iter().sum::<i64>() as f64, counts.len()),
    };
    tracing::info!("bronze→silver metrics: {:?}", metrics);

    ctx.lineage
        .emit(STAGE, &processed_files, metrics_json(&metrics), None)
        .await;

    Ok(StageOutcome {
        processed_files,
        failed_files: Vec::new(),
        metrics,
    })
}

async fn silver_file(ctx: &PipelineContext, name: &str) -> Result<(String, Vec<i64>)> {
    tracing::info!("Processing bronze file: {}", name);
    let target = retier(name, Tier::Bronze, Tier::Silver, None)
        .ok_or_else(|| PipelineError::InvalidState(format!("{} is not a bronze blob", name)))?;

    let table = decode_table(name, &ctx.store.get(name).await?)?;
    let content_idx = table
        .column_index(CONTENT_COLUMN)
        .ok_or_else(|| PipelineError::Schema {
            column: CONTENT_COLUMN.to_string(),
            message: format!("missing in {}", name),
        })?;

    let table = table.with_column(
        Column::new(WORD_COUNT_COLUMN, ColumnKind::Count),
        |row, _| match &row[content_idx] {
            Value::Text(content) => Value::Count(word_count(content)),
            _ => Value::Null,
        },
    )?;

    let counts = match table.column_index(WORD_COUNT_COLUMN) {
        Some(idx) => table
            .rows()
            .iter()
            .filter_map(|row| match row[idx] {
                Value::Count(n) => Some(n),
                _ => None,
            })
            .collect(),
        None => Vec::new(),
    };

    let encoded = encode_table(&target, &table)?;
    ctx.store
        .put(&target, encoded, CONTENT_TYPE_OCTET_STREAM)
        .await?;
    Ok((target, counts))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count_whitespace_tokens() {
        assert_eq!(word_count("title: a light\nprice: £51.77"), 5);
        assert_eq!(word_count("  spaced   out\t"), 2);
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count(" \n "), 0);
    }
}
