//! Target resolution: turns a [`SelectionSpec`] into concrete work items.
//!
//! # Architecture
//!
//! - [`TargetResolver`] - fetches pages through a [`LinkExtractor`] and builds the work list
//! - [`WorkItem`] - one remote file and the local name it is saved under
//! - [`Resolution`] - the work list plus per-page failures and not-found pairs
//! - [`YearCategory`] - a `<year><mode>` category discovered on the index page
//!
//! Bulk selections keep the remote base names. Targeted selections look up
//! one listing page per (year, mode) pair and pick the station's log by
//! call-sign pattern, saving it as `<year>_<MODE>_<CALL>.log`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cqww_core::download::OverwritePolicy;
//! use cqww_core::page::HttpLinkExtractor;
//! use cqww_core::resolver::{DEFAULT_INDEX_URL, TargetResolver};
//! use cqww_core::selection::SelectionSpec;
//! use url::Url;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let resolver = TargetResolver::new(
//!     Arc::new(HttpLinkExtractor::new()?),
//!     Url::parse(DEFAULT_INDEX_URL)?,
//!     OverwritePolicy::Skip,
//! );
//! let spec = SelectionSpec::targeted("OK1K".parse()?, Some("2023".parse()?), None);
//! let resolution = resolver.resolve(&spec).await?;
//! println!("{} file(s) to download", resolution.items.len());
//! # Ok(())
//! # }
//! ```

mod categories;
mod error;
mod matching;

pub use categories::{
    DEFAULT_INDEX_URL, DEFAULT_PAGE_URL, YearCategory, discover_categories, is_index_page,
};
pub use error::ResolutionError;
pub use matching::{best_match, log_links, matches_callsign};

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream;
use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::download::OverwritePolicy;
use crate::download::filename::{file_name_from_url, targeted_file_name};
use crate::page::{LinkExtractor, PageError};
use crate::selection::{Callsign, Mode, SelectionSpec, Year};

/// Listing pages fetched at once during resolution. Results keep input order.
const PAGE_FETCH_CONCURRENCY: usize = 4;

/// One resolved unit of download work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    /// Remote file.
    pub remote_url: Url,
    /// Local file name.
    pub local_file_name: String,
    /// Subdirectory of the output directory, for per-category bulk downloads.
    pub local_dir: Option<String>,
    /// What to do when the local file already exists.
    pub overwrite: OverwritePolicy,
}

impl WorkItem {
    /// Path of the local file relative to the output directory.
    #[must_use]
    pub fn relative_path(&self) -> PathBuf {
        match &self.local_dir {
            Some(dir) => PathBuf::from(dir).join(&self.local_file_name),
            None => PathBuf::from(&self.local_file_name),
        }
    }
}

/// A listing page that could not be loaded in a branch that does not abort resolution.
#[derive(Debug)]
pub struct PageFailure {
    /// The page.
    pub page_url: Url,
    /// Why it failed.
    pub error: PageError,
}

/// Outcome of resolving a selection.
#[derive(Debug, Default)]
pub struct Resolution {
    /// Work to do, in resolution order, with distinct local paths.
    pub items: Vec<WorkItem>,
    /// Listing pages that failed without aborting resolution.
    pub failures: Vec<PageFailure>,
    /// Targeted pairs whose listing had no log for the station.
    pub not_found: Vec<(Year, Mode)>,
}

/// Resolves selections against the log archive.
pub struct TargetResolver {
    extractor: Arc<dyn LinkExtractor>,
    index_url: Url,
    overwrite: OverwritePolicy,
}

impl TargetResolver {
    /// Creates a resolver. A missing trailing slash on `index_url` is added so
    /// category paths join beneath it.
    #[must_use]
    pub fn new(
        extractor: Arc<dyn LinkExtractor>,
        mut index_url: Url,
        overwrite: OverwritePolicy,
    ) -> Self {
        if !index_url.path().ends_with('/') {
            let path = format!("{}/", index_url.path());
            index_url.set_path(&path);
        }
        Self {
            extractor,
            index_url,
            overwrite,
        }
    }

    /// Returns the index URL targeted selections are resolved against.
    #[must_use]
    pub fn index_url(&self) -> &Url {
        &self.index_url
    }

    /// Resolves `spec` into a work list.
    ///
    /// # Errors
    ///
    /// Returns [`ResolutionError::Page`] when the page everything depends on
    /// cannot be loaded: the bulk page, or the index when targeted resolution
    /// needs to discover categories. Failures of individual listing pages are
    /// reported in [`Resolution::failures`] instead.
    #[instrument(skip(self), fields(selection = %spec))]
    pub async fn resolve(&self, spec: &SelectionSpec) -> Result<Resolution, ResolutionError> {
        let mut resolution = match spec {
            SelectionSpec::AllLinks { page_url } => self.resolve_bulk(page_url).await?,
            SelectionSpec::AllYearsAllModes { callsign }
            | SelectionSpec::YearBothModes { callsign, .. }
            | SelectionSpec::ModeAllYears { callsign, .. }
            | SelectionSpec::Exact { callsign, .. } => {
                let pairs = self.targeted_pairs(spec).await?;
                self.resolve_targeted(callsign, pairs).await?
            }
        };

        resolution.items = distinct_local_paths(resolution.items);
        info!(
            items = resolution.items.len(),
            page_failures = resolution.failures.len(),
            not_found = resolution.not_found.len(),
            "resolution complete"
        );
        Ok(resolution)
    }

    async fn resolve_bulk(&self, page_url: &Url) -> Result<Resolution, ResolutionError> {
        let links = self.extractor.fetch_links(page_url).await?;
        let mut resolution = Resolution::default();

        if !is_index_page(page_url, &self.index_url) {
            self.push_listing(&mut resolution, page_url, &links, None);
            return Ok(resolution);
        }

        let categories = discover_categories(&links);
        if categories.is_empty() {
            warn!(url = %page_url, "index lists no contest categories");
            return Ok(resolution);
        }
        info!(count = categories.len(), "discovered categories");

        let pages = self
            .fetch_pages(
                categories
                    .into_iter()
                    .map(|c| (c.local_dir_name, c.source_url))
                    .collect(),
            )
            .await;
        for (dir_name, url, result) in pages {
            match result {
                Ok(listing) => self.push_listing(&mut resolution, &url, &listing, Some(dir_name)),
                Err(error) => {
                    warn!(url = %url, error = %error, "cannot load category page");
                    resolution.failures.push(PageFailure {
                        page_url: url,
                        error,
                    });
                }
            }
        }
        Ok(resolution)
    }

    fn push_listing(
        &self,
        resolution: &mut Resolution,
        page_url: &Url,
        links: &[Url],
        local_dir: Option<String>,
    ) {
        for link in links.iter().filter(|link| file_name_from_url(link).is_none()) {
            debug!(url = %link, "link has no file name, ignored");
        }
        let logs = log_links(links);
        if logs.is_empty() {
            warn!(url = %page_url, "no log files found");
            return;
        }
        debug!(url = %page_url, count = logs.len(), "found log links");

        resolution
            .items
            .extend(logs.into_iter().map(|(link, local_file_name)| WorkItem {
                remote_url: link.clone(),
                local_file_name,
                local_dir: local_dir.clone(),
                overwrite: self.overwrite,
            }));
    }

    /// (year, mode) pairs for a targeted selection, year ascending then mode order.
    async fn targeted_pairs(&self, spec: &SelectionSpec) -> Result<Vec<(Year, Mode)>, ResolutionError> {
        let mut pairs = match spec {
            SelectionSpec::AllLinks { .. } => Vec::new(),
            SelectionSpec::Exact { year, mode, .. } => vec![(year.clone(), *mode)],
            SelectionSpec::YearBothModes { year, .. } => {
                vec![(year.clone(), Mode::Cw), (year.clone(), Mode::Ssb)]
            }
            SelectionSpec::ModeAllYears { mode, .. } => self
                .discover()
                .await?
                .into_iter()
                .filter(|c| c.mode == *mode)
                .map(|c| (c.year, c.mode))
                .collect(),
            SelectionSpec::AllYearsAllModes { .. } => self
                .discover()
                .await?
                .into_iter()
                .map(|c| (c.year, c.mode))
                .collect(),
        };
        pairs.sort();
        pairs.dedup();
        Ok(pairs)
    }

    async fn discover(&self) -> Result<Vec<YearCategory>, ResolutionError> {
        let links = self.extractor.fetch_links(&self.index_url).await?;
        let categories = discover_categories(&links);
        if categories.is_empty() {
            warn!(url = %self.index_url, "index lists no contest categories");
        }
        Ok(categories)
    }

    async fn resolve_targeted(
        &self,
        callsign: &Callsign,
        pairs: Vec<(Year, Mode)>,
    ) -> Result<Resolution, ResolutionError> {
        let mut requests = Vec::with_capacity(pairs.len());
        for (year, mode) in pairs {
            let path = format!("{year}{}/", mode.url_suffix());
            let url = self
                .index_url
                .join(&path)
                .map_err(|e| ResolutionError::listing_url(&self.index_url, path, e))?;
            requests.push(((year, mode), url));
        }

        let mut resolution = Resolution::default();
        for ((year, mode), url, result) in self.fetch_pages(requests).await {
            let links = match result {
                Ok(links) => links,
                Err(error) => {
                    warn!(%year, %mode, url = %url, error = %error, "cannot load listing page");
                    resolution.failures.push(PageFailure {
                        page_url: url,
                        error,
                    });
                    continue;
                }
            };

            match best_match(&links, callsign) {
                Some(link) => {
                    info!(%year, %mode, url = %link, "found log");
                    resolution.items.push(WorkItem {
                        remote_url: link.clone(),
                        local_file_name: targeted_file_name(&year, mode, callsign),
                        local_dir: None,
                        overwrite: self.overwrite,
                    });
                }
                None => {
                    warn!(%year, %mode, %callsign, "log not found");
                    resolution.not_found.push((year, mode));
                }
            }
        }
        Ok(resolution)
    }

    /// Fetches several pages with bounded parallelism, returning results in input order.
    async fn fetch_pages<K>(
        &self,
        requests: Vec<(K, Url)>,
    ) -> Vec<(K, Url, Result<Vec<Url>, PageError>)> {
        let extractor = &self.extractor;
        stream::iter(requests)
            .map(|(key, url)| async move {
                let result = extractor.fetch_links(&url).await;
                (key, url, result)
            })
            .buffered(PAGE_FETCH_CONCURRENCY)
            .collect()
            .await
    }
}

/// Drops items whose local path was already claimed by an earlier item.
fn distinct_local_paths(items: Vec<WorkItem>) -> Vec<WorkItem> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| {
            let fresh = seen.insert(item.relative_path());
            if !fresh {
                debug!(url = %item.remote_url, path = %item.relative_path().display(), "duplicate local path dropped");
            }
            fresh
        })
        .collect()
}
