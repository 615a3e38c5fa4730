//! Error types for target resolution.

use thiserror::Error;
use url::Url;

use crate::page::PageError;

/// Errors that stop resolution of a selection.
///
/// A failing category or pair page is not one of these; those are collected
/// as [`PageFailure`](super::PageFailure)s and resolution carries on.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The page the whole selection depends on could not be loaded.
    #[error("cannot load {0}")]
    Page(#[from] PageError),

    /// A listing page address could not be built from the index URL.
    #[error("cannot build listing URL '{path}' from {base}: {reason}")]
    ListingUrl {
        /// Index URL used as base.
        base: Url,
        /// Relative path that was joined.
        path: String,
        /// Parser message.
        reason: String,
    },
}

impl ResolutionError {
    /// Creates a listing URL error.
    #[must_use]
    pub fn listing_url(base: &Url, path: impl Into<String>, reason: impl ToString) -> Self {
        Self::ListingUrl {
            base: base.clone(),
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
