//! photosort - reference-table photo sorting CLI
//!
//! Filters files from a source folder against a two-column reference table
//! (identifier, label), copies matches into a target folder renamed to the
//! label, and optionally labels unmatched images through an external
//! description service.

use anyhow::{bail, Context, Result};
use clap::Parser;
use photosort::services::match_resolver::{
    DEFAULT_FUZZY_CUTOFF, DEFAULT_SIMILARITY_THRESHOLD,
};
use photosort::{
    EnrichmentClient, EnrichmentConfig, MatchResolver, Orchestrator, ReferenceIndex,
    VerifiedTransfer,
};
use photosort_common::config::TomlConfig;
use photosort_common::events::ProgressUpdate;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "photosort", version, about = "Sort photos by reference table or image description")]
struct Args {
    /// Source folder with the files to sort
    #[arg(short, long)]
    source: PathBuf,

    /// Target folder for matched files (created if absent)
    #[arg(short, long)]
    target: PathBuf,

    /// Reference table CSV (identifier, label)
    #[arg(short, long)]
    reference: Option<PathBuf>,

    /// Treat the first CSV row as data, not a header
    #[arg(long)]
    no_header: bool,

    /// Label unmatched images via the description service
    #[arg(long)]
    enrich: bool,

    /// TOML config file (default: platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Description service API key (overrides env and TOML)
    #[arg(long)]
    api_key: Option<String>,

    /// Description service endpoint URL
    #[arg(long)]
    endpoint: Option<String>,

    /// Enrichment request budget, requests per second
    #[arg(long)]
    rps: Option<f64>,

    /// Per-request HTTP timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Retry budget for enrichment calls and verified copies
    #[arg(long)]
    max_retries: Option<u32>,

    /// Fuzzy match cutoff (0.0 - 1.0)
    #[arg(long)]
    fuzzy_cutoff: Option<f64>,

    /// Similarity match threshold (0.0 - 1.0)
    #[arg(long)]
    similarity_threshold: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    info!("Starting photosort {}", env!("CARGO_PKG_VERSION"));

    if !args.source.exists() {
        bail!("Source folder does not exist: {}", args.source.display());
    }
    if let Some(parent) = args.target.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            bail!(
                "Parent of target folder does not exist: {}",
                parent.display()
            );
        }
    }
    if let Some(reference) = &args.reference {
        if !reference.exists() {
            bail!("Reference table does not exist: {}", reference.display());
        }
    }
    if args.reference.is_none() && !args.enrich {
        bail!("Nothing to do: provide --reference, --enrich, or both");
    }

    let toml_config = match &args.config {
        Some(path) => TomlConfig::load(path)?,
        None => TomlConfig::load_default()?,
    };

    let max_retries = args
        .max_retries
        .or(toml_config.max_retries)
        .unwrap_or(2);

    let index = match &args.reference {
        Some(path) => {
            let entries = photosort::reference_table::load_csv(path, !args.no_header)?;
            let index = ReferenceIndex::build(entries)?;
            info!(identifiers = index.len(), "Reference table indexed");
            Some(index)
        }
        None => None,
    };

    let enrichment = if args.enrich {
        let api_key = args
            .api_key
            .clone()
            .or_else(|| toml_config.resolve_api_key())
            .context("Enrichment requested but no API key configured (set PHOTOSORT_API_KEY)")?;

        let mut config = EnrichmentConfig::default();
        config.api_key = api_key;
        config.max_retries = max_retries;
        if let Some(endpoint) = args.endpoint.clone().or_else(|| toml_config.endpoint.clone()) {
            config.endpoint = endpoint;
        }
        if let Some(secs) = args.timeout_secs.or(toml_config.timeout_secs) {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(factor) = toml_config.backoff_factor {
            config.backoff_factor = factor;
        }
        if let Some(rps) = args.rps.or(toml_config.requests_per_second) {
            config.requests_per_second = rps;
        }
        if let Some(bytes) = toml_config.max_image_bytes {
            config.max_image_bytes = bytes;
        }
        Some(EnrichmentClient::new(config)?)
    } else {
        None
    };

    let resolver = MatchResolver::new(
        args.fuzzy_cutoff
            .or(toml_config.fuzzy_cutoff)
            .unwrap_or(DEFAULT_FUZZY_CUTOFF),
        args.similarity_threshold
            .or(toml_config.similarity_threshold)
            .unwrap_or(DEFAULT_SIMILARITY_THRESHOLD),
    );

    let orchestrator = Orchestrator::new(
        resolver,
        VerifiedTransfer::new(max_retries),
        index,
        enrichment,
    )?;

    let cancel = CancellationToken::new();
    let cancel_on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Cancellation requested, finishing current file");
            cancel_on_signal.cancel();
        }
    });

    let progress = |update: ProgressUpdate| {
        if let Some(current) = &update.current_file {
            info!(
                "{}/{} processed, {} matched: {}",
                update.processed, update.total, update.matched, current
            );
        }
    };

    let summary = orchestrator
        .run(&args.source, &args.target, &progress, &cancel)
        .await?;

    info!(
        processed = summary.processed,
        matched = summary.matched,
        total = summary.total,
        "Done"
    );
    if summary.matched == 0 {
        info!("No files matched; check that filenames contain the table's identifiers");
    }

    Ok(())
}
