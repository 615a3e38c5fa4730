//! Download engine: bounded-concurrency fan-out of download tasks.
//!
//! Every [`WorkItem`] becomes its own Tokio task. A task first takes a permit
//! from the engine's semaphore, runs the [`DownloadTask`] state machine to a
//! terminal [`TaskOutcome`], then drops the permit. The engine folds outcomes
//! into [`RunTotals`] as tasks join.
//!
//! # Example
//!
//! ```no_run
//! use cqww_core::download::{DownloadEngine, HttpClient, RetryPolicy, Transfer};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let engine = DownloadEngine::new(10, RetryPolicy::default())?;
//! let transfer: Arc<dyn Transfer> = Arc::new(HttpClient::new()?);
//! let totals = engine.run_all(Vec::new(), transfer, Path::new("./logs")).await;
//! println!("{totals}");
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::Transfer;
use super::constants::ATTEMPT_TIMEOUT;
use super::retry::RetryPolicy;
use super::stats::RunTotals;
use super::task::{DownloadTask, FailureReason, TaskOutcome};
use crate::resolver::WorkItem;

/// Minimum allowed concurrency value.
const MIN_CONCURRENCY: usize = 1;

/// Default concurrency if not specified.
pub const DEFAULT_CONCURRENCY: usize = 100;

/// Error type for download engine construction.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Invalid concurrency value provided.
    #[error("invalid concurrency value {value}: must be at least {MIN_CONCURRENCY}")]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// Concurrent download orchestrator.
///
/// # Concurrency Model
///
/// - Each work item runs in its own Tokio task
/// - A semaphore permit is acquired inside the task before any filesystem or
///   network work, so at most `concurrency` items are active at once
/// - Permits are released when the task finishes (RAII)
/// - Cancelling the engine's token fails tasks still waiting for a permit or
///   sleeping between retries; a transfer already in flight runs to completion
#[derive(Debug)]
pub struct DownloadEngine {
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    retry_policy: RetryPolicy,
    attempt_timeout: Duration,
    cancel: CancellationToken,
}

impl DownloadEngine {
    /// Creates an engine with the given gate width and retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidConcurrency`] when `concurrency` is zero.
    ///
    /// # Example
    ///
    /// ```
    /// use cqww_core::download::{DownloadEngine, RetryPolicy};
    ///
    /// let engine = DownloadEngine::new(5, RetryPolicy::new(3)).unwrap();
    /// assert_eq!(engine.concurrency(), 5);
    /// ```
    #[instrument(level = "debug", skip(retry_policy))]
    pub fn new(concurrency: usize, retry_policy: RetryPolicy) -> Result<Self, EngineError> {
        if concurrency < MIN_CONCURRENCY {
            return Err(EngineError::InvalidConcurrency { value: concurrency });
        }

        debug!(
            concurrency,
            max_retries = retry_policy.max_retries(),
            "creating download engine"
        );

        Ok(Self {
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            retry_policy,
            attempt_timeout: ATTEMPT_TIMEOUT,
            cancel: CancellationToken::new(),
        })
    }

    /// Overrides the per-attempt transfer timeout.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Uses `cancel` as the run-level interrupt signal.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Returns the configured retry policy.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Returns a handle to the run-level interrupt signal.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Downloads every item and returns the totals once all tasks have joined.
    ///
    /// Items are dispatched in list order; completion order is unconstrained.
    /// Individual failures never abort the run: a task that panics is logged
    /// and counted as failed, so `ok + failed + skipped == items.len()`.
    #[instrument(skip(self, items, transfer), fields(items = items.len(), output_dir = %output_dir.display()))]
    pub async fn run_all(
        &self,
        items: Vec<WorkItem>,
        transfer: Arc<dyn Transfer>,
        output_dir: &Path,
    ) -> RunTotals {
        info!(concurrency = self.concurrency, "starting downloads");

        let mut units = JoinSet::new();
        let mut in_flight = HashMap::with_capacity(items.len());
        for item in items {
            let semaphore = Arc::clone(&self.semaphore);
            let transfer = Arc::clone(&transfer);
            let retry_policy = self.retry_policy.clone();
            let cancel = self.cancel.clone();
            let output_dir = output_dir.to_path_buf();
            let attempt_timeout = self.attempt_timeout;
            let label = (item.remote_url.clone(), item.relative_path());

            let handle = units.spawn(async move {
                let _permit = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        warn!(
                            url = %item.remote_url,
                            file = %item.relative_path().display(),
                            "download interrupted before start"
                        );
                        return TaskOutcome::Failed {
                            reason: FailureReason::Interrupted,
                        };
                    }
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => {
                            warn!(
                                url = %item.remote_url,
                                file = %item.relative_path().display(),
                                "download failed: gate closed"
                            );
                            return TaskOutcome::Failed {
                                reason: FailureReason::Internal("download gate closed".to_string()),
                            };
                        }
                    },
                };

                DownloadTask::new(&item, &output_dir, transfer.as_ref(), &retry_policy)
                    .with_attempt_timeout(attempt_timeout)
                    .with_cancellation(cancel)
                    .run()
                    .await
            });
            in_flight.insert(handle.id(), label);
        }

        debug!(task_count = units.len(), "waiting for downloads to complete");

        let mut totals = RunTotals::new();
        while let Some(joined) = units.join_next_with_id().await {
            match joined {
                Ok((_, outcome)) => totals.record(&outcome),
                Err(e) => {
                    match in_flight.get(&e.id()) {
                        Some((url, file)) => warn!(
                            url = %url,
                            file = %file.display(),
                            error = %e,
                            "download task crashed"
                        ),
                        None => warn!(error = %e, "download task crashed"),
                    }
                    totals.record_failure();
                }
            }
        }

        info!(
            ok = totals.ok,
            failed = totals.failed,
            skipped = totals.skipped,
            total_bytes = totals.total_bytes,
            "downloads complete"
        );
        totals
    }
}
