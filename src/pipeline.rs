//! One download run: validate, prepare the output directory, resolve, download.
//!
//! This is the single entry point front ends call. Everything that can be
//! rejected without touching the network (gate width, output directory) is
//! checked before the first page is fetched.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::{
    ATTEMPT_TIMEOUT, DEFAULT_CONCURRENCY, DEFAULT_MAX_RETRIES, DownloadEngine, EngineError,
    HttpClient, OverwritePolicy, RetryPolicy, RunTotals, Transfer,
};
use crate::page::{HttpLinkExtractor, LinkExtractor, PAGE_TIMEOUT};
use crate::resolver::{ResolutionError, TargetResolver};
use crate::selection::SelectionSpec;

const WRITE_PROBE_NAME: &str = ".cqww-downloader-write-test";

/// Everything a run needs.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// What to download.
    pub selection: SelectionSpec,
    /// Where to put it.
    pub output_dir: PathBuf,
    /// Width of the download gate.
    pub max_concurrent: usize,
    /// Retries after the first attempt of each file.
    pub max_retries: u32,
    /// What to do with files that already exist.
    pub overwrite: OverwritePolicy,
    /// Archive index used for category discovery and targeted listings.
    pub index_url: Url,
    /// Timeout for each listing or index page.
    pub page_timeout: Duration,
    /// Timeout for each transfer attempt.
    pub attempt_timeout: Duration,
}

impl RunRequest {
    /// Creates a request with default concurrency, retries, overwrite policy and timeouts.
    #[must_use]
    pub fn new(selection: SelectionSpec, output_dir: impl Into<PathBuf>, index_url: Url) -> Self {
        Self {
            selection,
            output_dir: output_dir.into(),
            max_concurrent: DEFAULT_CONCURRENCY,
            max_retries: DEFAULT_MAX_RETRIES,
            overwrite: OverwritePolicy::default(),
            index_url,
            page_timeout: PAGE_TIMEOUT,
            attempt_timeout: ATTEMPT_TIMEOUT,
        }
    }
}

/// Output directory problems found before any network activity.
#[derive(Debug, Error)]
pub enum OutputDirError {
    /// The path exists and is not a directory.
    #[error("output path is not a directory: {path}")]
    NotADirectory {
        /// Output path.
        path: PathBuf,
    },

    /// The directory cannot be created or written for lack of permission.
    #[error("access denied to output directory {path}: {source}")]
    AccessDenied {
        /// Output path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The write probe failed for another reason.
    #[error("output directory is not writable: {path}: {source}")]
    NotWritable {
        /// Output path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Any other IO failure while inspecting or creating the directory.
    #[error("cannot prepare output directory {path}: {source}")]
    Io {
        /// Output path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },
}

impl OutputDirError {
    fn classify(path: &Path, source: std::io::Error) -> Self {
        let path = path.to_path_buf();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            Self::AccessDenied { path, source }
        } else {
            Self::Io { path, source }
        }
    }
}

/// Errors that abort a run before or during resolution.
#[derive(Debug, Error)]
pub enum RunError {
    /// Invalid engine settings.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The output directory is unusable.
    #[error(transparent)]
    OutputDir(#[from] OutputDirError),

    /// The selection could not be resolved.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// An HTTP client could not be built.
    #[error("cannot build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    /// The run was interrupted before downloads started.
    #[error("interrupted")]
    Interrupted,
}

/// What a finished run reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    /// Download totals; every unreadable listing page counts as one failure.
    pub totals: RunTotals,
    /// Number of work items resolved.
    pub work_items: usize,
    /// Targeted (year, mode) pairs with no log for the station.
    pub not_found: usize,
    /// Listing pages that could not be loaded.
    pub page_failures: usize,
    /// Whether the run was interrupted.
    pub interrupted: bool,
}

impl RunReport {
    /// Process exit status: 0 when nothing failed, 2 when some things
    /// succeeded or were skipped and some failed, 1 when everything failed.
    #[must_use]
    pub fn exit_code(&self) -> u8 {
        let t = &self.totals;
        match (t.failed, t.ok + t.skipped) {
            (0, _) => 0,
            (_, 0) => 1,
            _ => 2,
        }
    }
}

/// Creates the output directory when missing and checks that it is writable.
///
/// # Errors
///
/// Returns an [`OutputDirError`] describing why the directory is unusable.
pub async fn prepare_output_dir(dir: &Path) -> Result<(), OutputDirError> {
    match tokio::fs::metadata(dir).await {
        Ok(meta) if !meta.is_dir() => {
            return Err(OutputDirError::NotADirectory {
                path: dir.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(dir = %dir.display(), "creating output directory");
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| OutputDirError::classify(dir, e))?;
        }
        Err(e) => return Err(OutputDirError::classify(dir, e)),
    }

    let probe = dir.join(WRITE_PROBE_NAME);
    tokio::fs::write(&probe, b"").await.map_err(|source| {
        let path = dir.to_path_buf();
        if source.kind() == std::io::ErrorKind::PermissionDenied {
            OutputDirError::AccessDenied { path, source }
        } else {
            OutputDirError::NotWritable { path, source }
        }
    })?;
    if let Err(e) = tokio::fs::remove_file(&probe).await {
        debug!(path = %probe.display(), error = %e, "cannot remove write probe");
    }
    Ok(())
}

/// Runs one download with the given collaborators.
///
/// `cancel` interrupts resolution, units still waiting for the gate and
/// retry waits. Transfers already in flight finish.
///
/// # Errors
///
/// Returns a [`RunError`] for pre-flight failures, a fatal resolution
/// failure, or an interrupt before downloads start. Download failures are
/// counted in the report instead.
#[instrument(skip_all, fields(selection = %request.selection, output_dir = %request.output_dir.display()))]
pub async fn run(
    request: &RunRequest,
    extractor: Arc<dyn LinkExtractor>,
    transfer: Arc<dyn Transfer>,
    cancel: CancellationToken,
) -> Result<RunReport, RunError> {
    let engine = DownloadEngine::new(request.max_concurrent, RetryPolicy::new(request.max_retries))?
        .with_attempt_timeout(request.attempt_timeout)
        .with_cancellation(cancel.clone());

    prepare_output_dir(&request.output_dir).await?;

    let resolver = TargetResolver::new(extractor, request.index_url.clone(), request.overwrite);
    let resolution = tokio::select! {
        biased;
        () = cancel.cancelled() => return Err(RunError::Interrupted),
        resolution = resolver.resolve(&request.selection) => resolution?,
    };

    let work_items = resolution.items.len();
    if work_items == 0 {
        warn!("nothing to download");
    }

    let mut totals = engine
        .run_all(resolution.items, transfer, &request.output_dir)
        .await;
    for _ in &resolution.failures {
        totals.record_failure();
    }

    let interrupted = cancel.is_cancelled();
    if interrupted {
        warn!("run was interrupted");
    }
    info!(%totals, "run complete");

    Ok(RunReport {
        totals,
        work_items,
        not_found: resolution.not_found.len(),
        page_failures: resolution.failures.len(),
        interrupted,
    })
}

/// Runs one download over HTTP with the production page extractor and transfer client.
///
/// # Errors
///
/// As [`run`], plus [`RunError::Client`] when an HTTP client cannot be built.
pub async fn run_with_http(
    request: &RunRequest,
    cancel: CancellationToken,
) -> Result<RunReport, RunError> {
    let extractor = Arc::new(HttpLinkExtractor::with_timeout(request.page_timeout)?);
    let transfer = Arc::new(HttpClient::new()?);
    run(request, extractor, transfer, cancel).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::download::DownloadError;
    use crate::page::PageError;
    use crate::selection::Mode;

    const INDEX: &str = "https://cqww.com/publiclogs/";

    #[derive(Default)]
    struct FakeExtractor {
        pages: HashMap<String, Vec<Url>>,
        calls: AtomicUsize,
    }

    impl FakeExtractor {
        fn page(mut self, url: &str, names: &[&str]) -> Self {
            let base = Url::parse(url).unwrap();
            self.pages.insert(
                url.to_string(),
                names.iter().map(|n| base.join(n).unwrap()).collect(),
            );
            self
        }
    }

    #[async_trait]
    impl LinkExtractor for FakeExtractor {
        async fn fetch_links(&self, url: &Url) -> Result<Vec<Url>, PageError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.pages
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| PageError::HttpStatus {
                    url: url.clone(),
                    status: 500,
                })
        }
    }

    /// Writes a fixed 45 000-byte body.
    struct FixedTransfer;

    #[async_trait]
    impl Transfer for FixedTransfer {
        async fn download(
            &self,
            _url: &Url,
            dest: &Path,
            _timeout: Duration,
        ) -> Result<u64, DownloadError> {
            let body = vec![b'Q'; 45_000];
            tokio::fs::write(dest, &body)
                .await
                .map_err(|e| DownloadError::io(dest, e))?;
            Ok(body.len() as u64)
        }
    }

    fn exact_request(dir: &Path) -> RunRequest {
        let selection = SelectionSpec::targeted(
            "OK1K".parse().unwrap(),
            Some("2023".parse().unwrap()),
            Some(Mode::Cw),
        );
        RunRequest::new(selection, dir, Url::parse(INDEX).unwrap())
    }

    fn report(ok: u64, failed: u64, skipped: u64) -> RunReport {
        RunReport {
            totals: RunTotals {
                ok,
                failed,
                skipped,
                total_bytes: 0,
            },
            work_items: 0,
            not_found: 0,
            page_failures: 0,
            interrupted: false,
        }
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(report(0, 0, 0).exit_code(), 0);
        assert_eq!(report(3, 0, 1).exit_code(), 0);
        assert_eq!(report(1, 1, 0).exit_code(), 2);
        assert_eq!(report(0, 1, 1).exit_code(), 2);
        assert_eq!(report(0, 2, 0).exit_code(), 1);
    }

    #[tokio::test]
    async fn test_prepare_output_dir_creates_nested_directory() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("logs").join("2023");
        prepare_output_dir(&dir).await.unwrap();
        assert!(dir.is_dir());
        assert!(!dir.join(WRITE_PROBE_NAME).exists());
    }

    #[tokio::test]
    async fn test_prepare_output_dir_rejects_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("not-a-dir");
        std::fs::write(&file, b"x").unwrap();
        let err = prepare_output_dir(&file).await.unwrap_err();
        assert!(matches!(err, OutputDirError::NotADirectory { .. }));
    }

    #[tokio::test]
    async fn test_run_exact_selection() {
        let temp = TempDir::new().unwrap();
        let extractor = FakeExtractor::default()
            .page("https://cqww.com/publiclogs/2023cw/", &["ok1k.log", "OK1K_2.log"]);

        let report = run(
            &exact_request(temp.path()),
            Arc::new(extractor),
            Arc::new(FixedTransfer),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            report.totals,
            RunTotals {
                ok: 1,
                failed: 0,
                skipped: 0,
                total_bytes: 45_000,
            }
        );
        assert_eq!(report.work_items, 1);
        assert!(temp.path().join("2023_CW_OK1K.log").is_file());
        assert_eq!(report.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_page_failures_count_as_failed() {
        let temp = TempDir::new().unwrap();
        let extractor = FakeExtractor::default()
            .page("https://cqww.com/publiclogs/2023cw/", &["OK1K.log"]);
        let mut request = exact_request(temp.path());
        request.selection = SelectionSpec::targeted(
            "OK1K".parse().unwrap(),
            Some("2023".parse().unwrap()),
            None,
        );

        let report = run(
            &request,
            Arc::new(extractor),
            Arc::new(FixedTransfer),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(report.totals.ok, 1);
        assert_eq!(report.totals.failed, 1);
        assert_eq!(report.page_failures, 1);
        assert_eq!(report.exit_code(), 2);
    }

    #[tokio::test]
    async fn test_invalid_concurrency_fails_before_network() {
        let temp = TempDir::new().unwrap();
        let extractor = Arc::new(FakeExtractor::default());
        let mut request = exact_request(temp.path());
        request.max_concurrent = 0;

        let err = run(
            &request,
            Arc::clone(&extractor) as Arc<dyn LinkExtractor>,
            Arc::new(FixedTransfer),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            RunError::Engine(EngineError::InvalidConcurrency { value: 0 })
        ));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bad_output_dir_fails_before_network() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        std::fs::write(&file, b"x").unwrap();
        let extractor = Arc::new(FakeExtractor::default());

        let err = run(
            &exact_request(&file),
            Arc::clone(&extractor) as Arc<dyn LinkExtractor>,
            Arc::new(FixedTransfer),
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

        assert!(matches!(
            err,
            RunError::OutputDir(OutputDirError::NotADirectory { .. })
        ));
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_resolution() {
        let temp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = run(
            &exact_request(temp.path()),
            Arc::new(FakeExtractor::default()),
            Arc::new(FixedTransfer),
            cancel,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, RunError::Interrupted));
    }

    #[test]
    fn test_report_serializes() {
        let json = serde_json::to_value(report(1, 2, 3)).unwrap();
        assert_eq!(json["totals"]["ok"], 1);
        assert_eq!(json["totals"]["failed"], 2);
        assert_eq!(json["interrupted"], false);
    }
}
