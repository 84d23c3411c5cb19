//! raw→bronze: normalize plain text into single-row Parquet documents.
//!
//! Normalization trims every line, drops blank lines, and lowercases the
//! rest; the cleaned lines are rejoined with `\n`. A raw blob that is not
//! valid UTF-8 halts the whole stage.

use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;

use medallion_core::models::{retier, Tier, TierRecord};
use medallion_core::store::CONTENT_TYPE_OCTET_STREAM;
use medallion_core::table::Table;
use medallion_core::{PipelineError, Result};

use super::{mean, metrics_json, StageOutcome};
use crate::pipeline::PipelineContext;
use crate::tabular::encode_table;

pub const STAGE: &str = "raw_to_bronze";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BronzeMetrics {
    pub total_files: usize,
    pub processed_files: usize,
    pub total_lines: usize,
    pub avg_lines_per_file: f64,
}

/// Trimmed, lowercased, non-blank lines of `text`.
///
/// Besides `\n` and `\r\n`, a lone `\r`, vertical tab, form feed, the
/// `\x1c`..`\x1e` separators, NEL, and U+2028/U+2029 all end a line.
///
/// ```rust
/// use medallion::stages::normalize_lines;
///
/// assert_eq!(normalize_lines("  Hello \n\n\tWORLD\n"), vec!["hello", "world"]);
/// ```
pub fn normalize_lines(text: &str) -> Vec<String> {
    text.split(is_line_break)
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Convert every `raw/*.txt` blob into `bronze/*.parquet`.
pub async fn raw_to_bronze(ctx: &PipelineContext) -> Result<StageOutcome<BronzeMetrics>> {
    let raw_files = ctx.store.list(&Tier::Raw.prefix(), ".txt").await?;
    tracing::info!("raw→bronze: {} file(s) to process", raw_files.len());

    let converted: Vec<(String, usize)> = stream::iter(raw_files.iter())
        .map(|name| bronze_file(ctx, name))
        .buffered(ctx.settings.concurrency.max(1))
        .try_collect()
        .await?;

    let total_lines: usize = converted.iter().map(|(_, lines)| lines).sum();
    let processed_files: Vec<String> = converted.into_iter().map(|(name, _)| name).collect();
    let metrics = BronzeMetrics {
        total_files: raw_files.len(),
        processed_files: processed_files.len(),
        total_lines,
        avg_lines_per_file: mean(total_lines as f64, raw_files.len()),
    };
    tracing::info!("raw→bronze metrics: {:?}", metrics);

    ctx.lineage
        .emit(STAGE, &processed_files, metrics_json(&metrics), None)
        .await;

    Ok(StageOutcome {
        processed_files,
        failed_files: Vec::new(),
        metrics,
    })
}

async fn bronze_file(ctx: &PipelineContext, name: &str) -> Result<(String, usize)> {
    tracing::info!("Processing raw file: {}", name);
    let target = retier(name, Tier::Raw, Tier::Bronze, Some("parquet"))
        .ok_or_else(|| PipelineError::InvalidState(format!("{} is not a raw blob", name)))?;

    let bytes = ctx.store.get(name).await?;
    let text = String::from_utf8(bytes).map_err(|e| PipelineError::decode(name, e))?;
    let lines = normalize_lines(&text);

    let table = Table::from_records(&[TierRecord {
        source_file: name.to_string(),
        content: lines.join("\n"),
        word_count: None,
    }]);
    let encoded = encode_table(&target, &table)?;
    ctx.store
        .put(&target, encoded, CONTENT_TYPE_OCTET_STREAM)
        .await?;

    Ok((target, lines.len()))
}
