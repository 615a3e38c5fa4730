//! Page link extraction.
//!
//! Fetches an HTML page and returns the absolute targets of its anchors in
//! page order. Pages are parsed with `scraper`, so attribute values arrive
//! entity-decoded and only a real `href` attribute is read.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

use crate::download::{CONNECT_TIMEOUT, is_dns_error};
use crate::user_agent;

/// Timeout for fetching a single listing or index page.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(20);

static ANCHOR_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a[href]").unwrap_or_else(|e| panic!("invalid static selector: {e}"))
});

/// Errors raised while fetching or reading a page.
#[derive(Debug, Error)]
pub enum PageError {
    /// Host name could not be resolved.
    #[error("DNS error loading {url}: {source}")]
    Dns {
        /// Page URL.
        url: Url,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// Connection or protocol failure.
    #[error("network error loading {url}: {source}")]
    Network {
        /// Page URL.
        url: Url,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The page did not arrive within the page timeout.
    #[error("timeout loading {url}")]
    Timeout {
        /// Page URL.
        url: Url,
    },

    /// The server answered with an error status.
    #[error("HTTP {status} loading {url}")]
    HttpStatus {
        /// Page URL.
        url: Url,
        /// Status code.
        status: u16,
    },

    /// The body could not be read as text.
    #[error("cannot parse page {url}: {reason}")]
    Parse {
        /// Page URL.
        url: Url,
        /// What went wrong.
        reason: String,
    },
}

impl PageError {
    fn from_reqwest(url: &Url, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout { url: url.clone() }
        } else if is_dns_error(&source) {
            Self::Dns {
                url: url.clone(),
                source,
            }
        } else {
            Self::Network {
                url: url.clone(),
                source,
            }
        }
    }
}

/// Returns the ordered absolute hyperlink targets of a page.
#[async_trait]
pub trait LinkExtractor: Send + Sync {
    /// Fetches `url` and returns its anchor targets in page order.
    async fn fetch_links(&self, url: &Url) -> Result<Vec<Url>, PageError>;
}

/// [`LinkExtractor`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpLinkExtractor {
    client: Client,
    timeout: Duration,
}

impl HttpLinkExtractor {
    /// Creates an extractor with the default page timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error when the client cannot be built.
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_timeout(PAGE_TIMEOUT)
    }

    /// Creates an extractor with an explicit per-page timeout.
    ///
    /// # Errors
    ///
    /// Returns the reqwest error when the client cannot be built.
    pub fn with_timeout(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .gzip(true)
            .user_agent(user_agent::default_user_agent())
            .build()?;
        Ok(Self { client, timeout })
    }
}

#[async_trait]
impl LinkExtractor for HttpLinkExtractor {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch_links(&self, url: &Url) -> Result<Vec<Url>, PageError> {
        let response = self
            .client
            .get(url.clone())
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| PageError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PageError::HttpStatus {
                url: url.clone(),
                status: status.as_u16(),
            });
        }

        // Relative hrefs resolve against where the server actually sent us.
        let base = response.url().clone();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                PageError::Timeout { url: url.clone() }
            } else {
                PageError::Parse {
                    url: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let links = extract_links(&body, &base);
        debug!(count = links.len(), "extracted page links");
        Ok(links)
    }
}

/// Extracts absolute http(s) anchor targets from `html`, in document order.
///
/// Fragment-only, `mailto:` and `javascript:` links are dropped, and so is
/// anything that does not resolve to http or https. Duplicates are kept.
#[must_use]
pub fn extract_links(html: &str, base: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    document
        .select(&ANCHOR_SELECTOR)
        .filter_map(|anchor| anchor.value().attr("href"))
        .filter_map(|href| absolutize(href, base))
        .collect()
}

fn absolutize(href: &str, base: &Url) -> Option<Url> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("mailto:") || lower.starts_with("javascript:") {
        return None;
    }
    let url = base.join(href).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}
