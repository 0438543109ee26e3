// Copyright 2025 Cowboy AI, LLC.

//! Composition CLI
//!
//! Loads a catalog and a batch of challenges, solves them on the worker pool
//! and writes one workflow document per challenge as JSON lines.
//!
//! Usage:
//!   cim-compose --catalog catalog.json --challenges challenges.json \
//!     --workers 4 --max-depth 8 --output workflows.jsonl

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cim_compose::{Catalog, Composer, ComposerConfig, JsonLinesSink, SearchMode};

/// Semantic web service composition
#[derive(Parser, Debug)]
#[command(name = "cim-compose")]
#[command(about = "Compose services from a catalog to satisfy goal concepts")]
struct Args {
    /// Catalog document (concepts, things, services)
    #[arg(long)]
    catalog: PathBuf,

    /// JSON array of challenges
    #[arg(long)]
    challenges: PathBuf,

    /// Composer configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Worker threads
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Depth ceiling
    #[arg(long)]
    max_depth: Option<usize>,

    /// Stop each challenge at its first composition
    #[arg(long)]
    first_solution: bool,

    /// Write JSON lines here instead of stdout
    #[arg(long, short = 'o')]
    output: Option<PathBuf>,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_config(args: &Args) -> Result<ComposerConfig> {
    let mut config = match &args.config {
        Some(path) => ComposerConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ComposerConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("invalid environment override")?;
    if let Some(workers) = args.workers {
        config = config.with_pool_size(workers);
    }
    if let Some(depth) = args.max_depth {
        config = config.with_max_depth(depth);
    }
    if args.first_solution {
        config = config.with_mode(SearchMode::FirstSolution);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(&args)?;
    let catalog = Catalog::from_json_file(&args.catalog)
        .with_context(|| format!("failed to load catalog {}", args.catalog.display()))?;
    let composer = Composer::new(catalog, config).context("invalid configuration")?;
    let queue = composer
        .load_challenges(&args.challenges)
        .with_context(|| format!("failed to load challenges {}", args.challenges.display()))?;
    let total = queue.len();

    let writer: Box<dyn Write + Send> = match &args.output {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(io::stdout()),
    };
    let sink = Arc::new(JsonLinesSink::new(Arc::clone(composer.catalog()), writer));

    let summary = composer
        .compose_all(Arc::new(queue), sink)
        .context("failed to start workers")?
        .wait()
        .await
        .context("worker pool failed")?;

    eprintln!(
        "{} challenges, {} solved, {} unsolved, {} sink failures",
        total,
        summary.solved(),
        summary.processed() - summary.solved(),
        summary.sink_failures()
    );
    Ok(())
}
