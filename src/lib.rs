//! CQ WW contest log downloader core library.
//!
//! Resolves which public contest logs to fetch (every log on a page, or one
//! station's logs by call sign, year and mode) and downloads them under a
//! concurrency gate with per-file retry and an overwrite policy.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`selection`] - Validated selection types (mode, year, call sign)
//! - [`page`] - Listing page fetch and anchor extraction
//! - [`resolver`] - Selection to work-item resolution
//! - [`download`] - Download engine, per-file task state machine, totals
//! - [`pipeline`] - One complete run, from pre-flight checks to the report

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod page;
pub mod pipeline;
pub mod resolver;
pub mod selection;
mod user_agent;

// Re-export commonly used types
pub use download::{
    DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadEngine, DownloadError, EngineError,
    HttpClient, OverwritePolicy, RetryPolicy, RunTotals, TaskOutcome, Transfer,
};
pub use page::{HttpLinkExtractor, LinkExtractor, PageError};
pub use pipeline::{RunError, RunReport, RunRequest, run, run_with_http};
pub use resolver::{
    DEFAULT_INDEX_URL, DEFAULT_PAGE_URL, Resolution, ResolutionError, TargetResolver, WorkItem,
};
pub use selection::{Callsign, Mode, SelectionError, SelectionSpec, Year};
