//! CLI entry point for the CQ WW log downloader.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use cqww_core::download::{DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES};
use cqww_core::pipeline::{RunReport, RunRequest, run_with_http};
use cqww_core::{DEFAULT_INDEX_URL, OverwritePolicy};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::Url;

mod app_config;
mod cli;

use app_config::{FileConfig, load_file_config};
use cli::Args;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let args = Args::parse();

    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if args.quiet {
        "error"
    } else {
        match args.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    debug!(?args, "CLI arguments parsed");

    match run(&args).await {
        Ok(report) => ExitCode::from(report.exit_code()),
        Err(e) => {
            error!("{e:#}");
            ExitCode::from(1)
        }
    }
}

async fn run(args: &Args) -> Result<RunReport> {
    let file_config = load_file_config(args.config.as_deref())?;
    let request = build_request(args, &file_config)?;
    info!(
        selection = %request.selection,
        output_dir = %request.output_dir.display(),
        max_concurrent = request.max_concurrent,
        max_retries = request.max_retries,
        overwrite = %request.overwrite,
        "starting"
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing active transfers");
            interrupt.cancel();
        }
    });

    let report = run_with_http(&request, cancel).await?;

    info!("DONE | {}", report.totals);
    if report.not_found > 0 {
        info!(count = report.not_found, "logs not found");
    }
    if args.json {
        let json = serde_json::to_string(&report).context("Failed to encode summary")?;
        println!("{json}");
    }
    Ok(report)
}

/// Merges command line, config file and built-in defaults, in that order.
fn build_request(args: &Args, file: &FileConfig) -> Result<RunRequest> {
    let selection = args.selection().context("Invalid selection")?;

    let index_url = match args.index_url.clone().or_else(|| file.index_url.clone()) {
        Some(url) => url,
        None => Url::parse(DEFAULT_INDEX_URL).context("Invalid built-in index URL")?,
    };
    let output_dir = args
        .output_dir
        .clone()
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let mut request = RunRequest::new(selection, output_dir, index_url);
    request.max_concurrent = args
        .max_concurrent
        .or(file.max_concurrent)
        .unwrap_or(DEFAULT_CONCURRENCY);
    request.max_retries = args
        .retries
        .or(file.max_retries)
        .unwrap_or(DEFAULT_MAX_RETRIES);
    request.overwrite = args
        .overwrite
        .or(file.overwrite)
        .unwrap_or_default();
    Ok(request)
}
