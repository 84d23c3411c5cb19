//! CLI command implementations.
//!
//! Each command builds what it needs from [`Config`], runs, and prints a
//! short `key: value` summary ending in `ok`.

use anyhow::{bail, Result};
use reqwest::header::HeaderMap;
use serde::Serialize;

use medallion_core::quality::QualityReport;

use crate::config::Config;
use crate::fetch::RetryingFetcher;
use crate::pipeline::{Pipeline, PipelineContext};
use crate::scrape::{scrape_to_raw, BodyExtractor, ScrapeOptions};
use crate::stages::{self, StageOutcome};
use crate::storage::build_store;

/// Single stages addressable from the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StageName {
    Bronze,
    Silver,
    Gold,
    Quality,
}

pub async fn run_pipeline(config: &Config) -> Result<()> {
    let mut pipeline = Pipeline::new(PipelineContext::from_config(config)?);
    let report = pipeline.run().await?;
    let summary = pipeline.summary();

    println!("pipeline");
    if let Some(bronze) = &summary.bronze {
        println!("  bronze files: {}", bronze.processed_files.len());
    }
    if let Some(silver) = &summary.silver {
        println!("  silver files: {}", silver.processed_files.len());
    }
    if let Some(gold) = &summary.gold {
        println!("  gold files: {}", gold.processed_files.len());
        println!("  gold failures: {}", gold.failed_files.len());
        println!("  chunks indexed: {}", gold.metrics.total_embedding_chunks);
    }
    print_report(&report)?;
    println!("ok");
    Ok(())
}

pub async fn run_stage(config: &Config, stage: StageName) -> Result<()> {
    let ctx = PipelineContext::from_config(config)?;
    match stage {
        StageName::Bronze => print_outcome("raw_to_bronze", &stages::raw_to_bronze(&ctx).await?)?,
        StageName::Silver => {
            print_outcome("bronze_to_silver", &stages::bronze_to_silver(&ctx).await?)?
        }
        StageName::Gold => print_outcome("silver_to_gold", &stages::silver_to_gold(&ctx).await?)?,
        StageName::Quality => {
            println!("data_quality");
            print_report(&stages::run_quality_task(&ctx).await?)?;
        }
    }
    println!("ok");
    Ok(())
}

pub async fn run_scrape(config: &Config, urls: Vec<String>) -> Result<()> {
    let urls = if urls.is_empty() {
        config.scrape.urls.clone()
    } else {
        urls
    };
    if urls.is_empty() {
        bail!("No URLs given and [scrape].urls is empty");
    }

    let store = build_store(&config.storage)?;
    let fetcher = RetryingFetcher::from_config(&config.fetch)?;
    let options = ScrapeOptions {
        object_prefix: config.scrape.object_prefix.clone(),
        delay: std::time::Duration::from_millis(config.scrape.delay_ms),
        headers: HeaderMap::new(),
    };

    let records = scrape_to_raw(&urls, &fetcher, &BodyExtractor, store.as_ref(), &options).await;

    println!("scrape");
    println!("  requested: {}", urls.len());
    println!("  written: {}", records.len());
    println!("  skipped: {}", urls.len() - records.len());
    for record in &records {
        println!("  {}", record.object_name);
    }
    println!("ok");
    Ok(())
}

pub async fn run_fetch(config: &Config, url: &str) -> Result<()> {
    let fetcher = RetryingFetcher::from_config(&config.fetch)?;
    let payload = fetcher.fetch(url, &HeaderMap::new()).await?;

    println!("fetch {}", url);
    println!("  status: {}", payload.status);
    if let Some(content_type) = &payload.content_type {
        println!("  content-type: {}", content_type);
    }
    println!("  bytes: {}", payload.body.len());
    println!("ok");
    Ok(())
}

fn print_outcome<M: Serialize>(stage: &str, outcome: &StageOutcome<M>) -> Result<()> {
    println!("{}", stage);
    println!("  processed: {}", outcome.processed_files.len());
    if !outcome.failed_files.is_empty() {
        println!("  failed: {}", outcome.failed_files.len());
    }
    println!("  metrics: {}", serde_json::to_string(&outcome.metrics)?);
    Ok(())
}

fn print_report(report: &QualityReport) -> Result<()> {
    println!("  quality report:");
    for line in serde_json::to_string_pretty(report)?.lines() {
        println!("    {}", line);
    }
    Ok(())
}
