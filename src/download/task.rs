//! Per-file download state machine.
//!
//! ```text
//! Init → ExistenceChecked → { Skip | RenameForNew | ReplaceInPlace }
//!      → Attempting → { Succeeded | Retrying → Attempting | Exhausted }
//! ```
//!
//! The destination path is decided once, before the first attempt. Retries
//! reuse it, so a `new`-renamed path stays fixed for the task's lifetime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::client::Transfer;
use super::constants::ATTEMPT_TIMEOUT;
use super::error::DownloadError;
use super::filename::new_sibling_name;
use super::overwrite::OverwritePolicy;
use super::retry::{RetryDecision, RetryPolicy};
use crate::resolver::WorkItem;

/// Why a task ended in failure.
#[derive(Debug, Error)]
pub enum FailureReason {
    /// Every attempt failed; carries the error of the last one.
    #[error("{last_error} (after {attempts} attempt(s))")]
    Exhausted {
        /// Attempts made, first attempt included.
        attempts: u32,
        /// Error returned by the final attempt.
        last_error: DownloadError,
    },

    /// The run was interrupted while the task was waiting.
    #[error("interrupted")]
    Interrupted,

    /// The destination could not be inspected or its directory created.
    #[error("cannot prepare {path}: {source}")]
    Prepare {
        /// Path being prepared.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The unit running the task failed outside the transfer itself.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Terminal result of one work item, produced exactly once.
#[derive(Debug)]
pub enum TaskOutcome {
    /// The file was transferred.
    Success {
        /// Bytes written.
        bytes: u64,
        /// Where the bytes went.
        path: PathBuf,
    },
    /// The destination existed and the policy said to leave it.
    Skipped {
        /// The existing file.
        path: PathBuf,
    },
    /// The item could not be downloaded.
    Failed {
        /// Why.
        reason: FailureReason,
    },
}

impl TaskOutcome {
    fn failed(reason: FailureReason) -> Self {
        Self::Failed { reason }
    }

    /// Returns true for [`TaskOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Result of the existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Destination {
    /// Nothing is there yet; write to the original path.
    Fresh(PathBuf),
    /// Leave the existing file alone.
    Skip(PathBuf),
    /// Keep the existing file and write next to it.
    RenameForNew(PathBuf),
    /// Overwrite the existing file.
    ReplaceInPlace(PathBuf),
}

/// Stats `path` and applies the overwrite policy.
pub(crate) async fn check_destination(
    path: PathBuf,
    policy: OverwritePolicy,
) -> std::io::Result<Destination> {
    if !tokio::fs::try_exists(&path).await? {
        return Ok(Destination::Fresh(path));
    }

    Ok(match policy {
        OverwritePolicy::Skip => Destination::Skip(path),
        OverwritePolicy::Replace => Destination::ReplaceInPlace(path),
        OverwritePolicy::New => {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Destination::RenameForNew(path.with_file_name(new_sibling_name(&name)))
        }
    })
}

/// One work item's download, from existence check to terminal outcome.
pub struct DownloadTask<'a> {
    item: &'a WorkItem,
    output_dir: &'a Path,
    transfer: &'a dyn Transfer,
    retry_policy: &'a RetryPolicy,
    attempt_timeout: Duration,
    cancel: CancellationToken,
}

impl<'a> DownloadTask<'a> {
    /// Creates a task with the default attempt timeout and no interrupt source.
    #[must_use]
    pub fn new(
        item: &'a WorkItem,
        output_dir: &'a Path,
        transfer: &'a dyn Transfer,
        retry_policy: &'a RetryPolicy,
    ) -> Self {
        Self {
            item,
            output_dir,
            transfer,
            retry_policy,
            attempt_timeout: ATTEMPT_TIMEOUT,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the timeout applied to each transfer attempt.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Sets the token whose cancellation interrupts backoff waits.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Runs the state machine to a terminal outcome.
    #[instrument(skip(self), fields(url = %self.item.remote_url, file = %self.item.local_file_name))]
    pub async fn run(self) -> TaskOutcome {
        let path = self.output_dir.join(self.item.relative_path());

        if self.item.local_dir.is_some()
            && let Some(parent) = path.parent()
            && let Err(source) = tokio::fs::create_dir_all(parent).await
        {
            warn!(dir = %parent.display(), error = %source, "cannot create directory");
            return TaskOutcome::failed(FailureReason::Prepare {
                path: parent.to_path_buf(),
                source,
            });
        }

        let destination = match check_destination(path.clone(), self.item.overwrite).await {
            Ok(destination) => destination,
            Err(source) => {
                warn!(path = %path.display(), error = %source, "cannot check destination");
                return TaskOutcome::failed(FailureReason::Prepare { path, source });
            }
        };

        let target = match destination {
            Destination::Skip(existing) => {
                info!(path = %existing.display(), "skipped (already exists)");
                return TaskOutcome::Skipped { path: existing };
            }
            Destination::RenameForNew(renamed) => {
                info!(path = %renamed.display(), "file exists, downloading as new file");
                renamed
            }
            Destination::ReplaceInPlace(existing) => {
                info!(path = %existing.display(), "file exists, will be replaced");
                existing
            }
            Destination::Fresh(fresh) => fresh,
        };

        self.attempt_until_done(target).await
    }

    async fn attempt_until_done(&self, target: PathBuf) -> TaskOutcome {
        let url = &self.item.remote_url;
        let max_attempts = self.retry_policy.max_attempts();
        let mut attempt = 1u32;

        loop {
            debug!(attempt, "attempting download");
            match self
                .transfer
                .download(url, &target, self.attempt_timeout)
                .await
            {
                Ok(bytes) => {
                    info!(bytes, path = %target.display(), "downloaded");
                    return TaskOutcome::Success {
                        bytes,
                        path: target,
                    };
                }
                Err(error) => {
                    warn!(attempt, max_attempts, error = %error, "download error");
                    match self.retry_policy.should_retry(attempt) {
                        RetryDecision::Retry {
                            delay,
                            attempt: next_attempt,
                        } => {
                            tokio::select! {
                                biased;
                                () = self.cancel.cancelled() => {
                                    warn!(attempt, "interrupted while waiting for retry");
                                    return TaskOutcome::failed(FailureReason::Interrupted);
                                }
                                () = tokio::time::sleep(delay) => {}
                            }
                            attempt = next_attempt;
                        }
                        RetryDecision::DoNotRetry { reason } => {
                            warn!(attempts = attempt, %reason, "download failed");
                            return TaskOutcome::failed(FailureReason::Exhausted {
                                attempts: attempt,
                                last_error: error,
                            });
                        }
                    }
                }
            }
        }
    }
}
