//! silver→gold: chunk silver content and hand it to the embedding and
//! index services, one call of each per file.
//!
//! A failure from the embedder or the index only drops the file it
//! happened on; the file is logged and listed in the stage's lineage
//! record. Storage and decode failures still halt the stage.

use serde::Serialize;
use serde_json::{json, Map};

use medallion_core::chunk::{chunk_text, ChunkIdPolicy};
use medallion_core::index::entries_for_chunks;
use medallion_core::models::{Chunk, Tier};
use medallion_core::Result;

use super::{mean, metrics_json, StageOutcome};
use crate::pipeline::PipelineContext;
use crate::tabular::decode_table;

pub const STAGE: &str = "silver_to_gold";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GoldMetrics {
    pub total_files: usize,
    pub processed_files: usize,
    pub failed_files: usize,
    pub total_embedding_chunks: usize,
    pub avg_embedding_chunks_per_file: f64,
}

/// Embed and index every `silver/*.parquet` blob.
pub async fn silver_to_gold(ctx: &PipelineContext) -> Result<StageOutcome<GoldMetrics>> {
    tracing::info!(
        "silver→gold: embedding with model '{}'",
        ctx.embedder.model_name()
    );
    let silver_files = ctx.store.list(&Tier::Silver.prefix(), ".parquet").await?;

    let mut processed_files = Vec::new();
    let mut failed_files = Vec::new();
    let mut total_chunks = 0;

    for name in &silver_files {
        tracing::info!("Embedding silver file: {}", name);
        let chunks = file_chunks(ctx, name).await?;

        match index_chunks(ctx, &chunks).await {
            Ok(()) => {
                tracing::info!("Embedded {} chunk(s) into gold: {}", chunks.len(), name);
                total_chunks += chunks.len();
                processed_files.push(name.clone());
            }
            Err(e) if e.is_file_scoped() => {
                tracing::error!("Skipping {}: {}", name, e);
                failed_files.push(name.clone());
            }
            Err(e) => return Err(e),
        }
    }
    processed_files.sort();

    let metrics = GoldMetrics {
        total_files: silver_files.len(),
        processed_files: processed_files.len(),
        failed_files: failed_files.len(),
        total_embedding_chunks: total_chunks,
        avg_embedding_chunks_per_file: mean(total_chunks as f64, processed_files.len()),
    };
    tracing::info!("silver→gold metrics: {:?}", metrics);

    let mut extra = Map::new();
    extra.insert("embedding_model".into(), json!(ctx.embedder.model_name()));
    extra.insert("chunk_ids".into(), json!(ctx.settings.chunk_ids));
    extra.insert("failed_files".into(), json!(failed_files));
    ctx.lineage
        .emit(STAGE, &processed_files, metrics_json(&metrics), Some(extra))
        .await;

    Ok(StageOutcome {
        processed_files,
        failed_files,
        metrics,
    })
}

/// Chunks for every row of a silver blob whose trimmed content is non-empty.
async fn file_chunks(ctx: &PipelineContext, name: &str) -> Result<Vec<Chunk>> {
    let table = decode_table(name, &ctx.store.get(name).await?)?;
    let records = table.to_records()?;

    Ok(records
        .iter()
        .filter(|r| !r.content.trim().is_empty())
        .flat_map(|r| {
            chunk_text(
                &r.source_file,
                r.content.trim(),
                ctx.settings.chunk_width,
                ctx.settings.chunk_ids,
            )
        })
        .collect())
}

async fn index_chunks(ctx: &PipelineContext, chunks: &[Chunk]) -> Result<()> {
    if chunks.is_empty() {
        return Ok(());
    }
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = ctx.embedder.embed(&texts).await?;
    let entries = entries_for_chunks(chunks, vectors)?;

    match ctx.settings.chunk_ids {
        ChunkIdPolicy::Random => ctx.index.add(entries).await,
        ChunkIdPolicy::Deterministic => ctx.index.upsert(entries).await,
    }
}
