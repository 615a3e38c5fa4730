//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;
use cqww_core::selection::parse_page_url;
use cqww_core::{
    Callsign, DEFAULT_PAGE_URL, Mode, OverwritePolicy, SelectionError, SelectionSpec, Year,
};
use url::Url;

/// Download CQ World Wide DX Contest public logs.
///
/// Without `--call`, downloads every log on a listing page (or, given the
/// archive index, on every category page). With `--call`, downloads one
/// station's logs, optionally narrowed by `--year` and `--mode`.
#[derive(Parser, Debug)]
#[command(name = "cqww-downloader")]
#[command(author, version, about)]
pub struct Args {
    /// Listing or index page to download every log from [default: 2024 SSB listing]
    #[arg(long, value_parser = parse_page_url, conflicts_with = "call")]
    pub url: Option<Url>,

    /// Station call sign for targeted downloads
    #[arg(long)]
    pub call: Option<Callsign>,

    /// Contest year, e.g. 2023 (requires --call)
    #[arg(long, requires = "call")]
    pub year: Option<Year>,

    /// Contest mode: CW, SSB (or PH), RTTY (requires --call)
    #[arg(long, requires = "call")]
    pub mode: Option<Mode>,

    /// Output directory [default: current directory]
    #[arg(short = 'o', long = "out")]
    pub output_dir: Option<PathBuf>,

    /// Maximum concurrent downloads (at least 1) [default: 100]
    #[arg(short = 'c', long, alias = "maxConcurrent", value_parser = parse_concurrency)]
    pub max_concurrent: Option<usize>,

    /// Retries per file after the first attempt [default: 3]
    #[arg(short = 'r', long)]
    pub retries: Option<u32>,

    /// What to do when a file exists: skip, new, replace [default: replace]
    #[arg(long)]
    pub overwrite: Option<OverwritePolicy>,

    /// Archive index page [default: https://cqww.com/publiclogs/]
    #[arg(long, value_parser = parse_page_url)]
    pub index_url: Option<Url>,

    /// Config file [default: $XDG_CONFIG_HOME/cqww-downloader/config.toml]
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the run summary as JSON on stdout
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    /// Builds the selection implied by the arguments.
    pub fn selection(&self) -> Result<SelectionSpec, SelectionError> {
        if let Some(callsign) = &self.call {
            return Ok(SelectionSpec::targeted(
                callsign.clone(),
                self.year.clone(),
                self.mode,
            ));
        }
        let page_url = match &self.url {
            Some(url) => url.clone(),
            None => parse_page_url(DEFAULT_PAGE_URL)?,
        };
        Ok(SelectionSpec::AllLinks { page_url })
    }
}

fn parse_concurrency(raw: &str) -> Result<usize, String> {
    let value: usize = raw
        .trim()
        .parse()
        .map_err(|_| format!("'{raw}' is not a whole number"))?;
    if value < 1 {
        return Err("must be at least 1".to_string());
    }
    Ok(value)
}
