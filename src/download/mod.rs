//! Download engine for contest log files.
//!
//! Streams each resolved work item to disk under a concurrency gate, with
//! per-file retry and backoff and an overwrite policy for files that already
//! exist.
//!
//! # Example
//!
//! ```no_run
//! use cqww_core::download::{HttpClient, Transfer, ATTEMPT_TIMEOUT};
//! use std::path::Path;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = HttpClient::new()?;
//! let url = Url::parse("https://cqww.com/publiclogs/2023cw/ok1k.log")?;
//! let bytes = client
//!     .download(&url, Path::new("2023_CW_OK1K.log"), ATTEMPT_TIMEOUT)
//!     .await?;
//! println!("downloaded {bytes} bytes");
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod engine;
mod error;
pub mod filename;
mod overwrite;
mod retry;
mod stats;
mod task;

pub use client::{HttpClient, Transfer};
pub use constants::{ATTEMPT_TIMEOUT, CONNECT_TIMEOUT};
pub use engine::{DEFAULT_CONCURRENCY, DownloadEngine, EngineError};
pub use error::DownloadError;
pub(crate) use error::is_dns_error;
pub use overwrite::{InvalidOverwritePolicy, OverwritePolicy};
pub use retry::{
    DEFAULT_MAX_RETRIES, INITIAL_BACKOFF, MAX_BACKOFF, RetryDecision, RetryPolicy, backoff_delay,
};
pub use stats::RunTotals;
pub use task::{DownloadTask, FailureReason, TaskOutcome};

// Note: we do NOT define module-local Result aliases.
// Use `Result<T, DownloadError>` explicitly in function signatures.
