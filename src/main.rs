//! # Medallion CLI
//!
//! Runs the raw→bronze→silver→gold pipeline, single stages, the scraper,
//! and one-off retrying fetches.
//!
//! ## Usage
//!
//! ```bash
//! medallion --config ./config/medallion.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `medallion run` | Run every stage and print the quality report |
//! | `medallion stage <bronze\|silver\|gold\|quality>` | Run one stage |
//! | `medallion scrape [URL...]` | Fetch pages into the raw tier |
//! | `medallion fetch <URL>` | Retrying GET, prints status and size |
//!
//! Log verbosity follows `RUST_LOG` (default `info`).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use medallion::commands::{self, StageName};
use medallion::config;

/// Medallion: a staged document pipeline with quality gates and lineage.
#[derive(Parser)]
#[command(name = "medallion", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/medallion.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: bronze, silver, gold, then the quality task.
    Run,

    /// Run a single stage against the current contents of the store.
    Stage {
        #[arg(value_enum)]
        stage: StageName,
    },

    /// Scrape pages into the raw tier.
    ///
    /// Falls back to `[scrape].urls` when no URL is given.
    Scrape { urls: Vec<String> },

    /// Fetch one URL with the configured retry policy.
    Fetch { url: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Run => commands::run_pipeline(&cfg).await?,
        Commands::Stage { stage } => commands::run_stage(&cfg, stage).await?,
        Commands::Scrape { urls } => commands::run_scrape(&cfg, urls).await?,
        Commands::Fetch { url } => commands::run_fetch(&cfg, &url).await?,
    }

    Ok(())
}
