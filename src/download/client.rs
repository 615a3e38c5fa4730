//! Transfer client: streams one URL into one file.
//!
//! The [`Transfer`] trait is the seam between the download task state machine
//! and the network, so the engine can be driven by test doubles. [`HttpClient`]
//! is the production implementation.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, instrument};
use url::Url;

use super::constants::CONNECT_TIMEOUT;
use super::error::DownloadError;
use crate::user_agent;

/// Streams a remote resource to a local path.
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Downloads `url` into `dest`, creating or truncating it, and returns the
    /// number of bytes written.
    ///
    /// A failure part way through may leave a truncated file at `dest`.
    async fn download(
        &self,
        url: &Url,
        dest: &Path,
        timeout: Duration,
    ) -> Result<u64, DownloadError>;
}

/// HTTP transfer client with connection pooling.
///
/// Create once and share; clones reuse the same pool.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
}

impl HttpClient {
    /// Creates a client with the default connect timeout.
    ///
    /// The per-attempt timeout is passed to each [`Transfer::download`] call.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error when the client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transfer for HttpClient {
    #[instrument(skip(self, timeout), fields(url = %url, dest = %dest.display()))]
    async fn download(
        &self,
        url: &Url,
        dest: &Path,
        timeout: Duration,
    ) -> Result<u64, DownloadError> {
        debug!("starting transfer");

        let response = self
            .client
            .get(url.clone())
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| DownloadError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if status.as_u16() >= 400 {
            return Err(DownloadError::http_status(url.as_str(), status.as_u16()));
        }

        let file = File::create(dest)
            .await
            .map_err(|e| DownloadError::io(dest, e))?;

        let bytes = stream_to_file(file, response, url.as_str(), dest).await?;
        debug!(bytes, "transfer complete");
        Ok(bytes)
    }
}

/// Streams response body to file, returning bytes written.
async fn stream_to_file(
    file: File,
    response: reqwest::Response,
    url: &str,
    file_path: &Path,
) -> Result<u64, DownloadError> {
    let mut writer = BufWriter::new(file);
    let mut stream = response.bytes_stream();
    let mut bytes_written: u64 = 0;

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| DownloadError::from_reqwest(url, e))?;

        writer
            .write_all(&chunk)
            .await
            .map_err(|e| DownloadError::io(file_path, e))?;

        bytes_written += chunk.len() as u64;
    }

    writer
        .flush()
        .await
        .map_err(|e| DownloadError::io(file_path, e))?;

    Ok(bytes_written)
}
