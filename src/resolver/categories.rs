//! Year/mode category discovery on the archive index page.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::selection::{Mode, Year};

/// Archive index the tool resolves targeted selections against.
pub const DEFAULT_INDEX_URL: &str = "https://cqww.com/publiclogs/";

/// Default bulk page when none is given.
pub const DEFAULT_PAGE_URL: &str = "https://cqww.com/publiclogs/2024ph/";

static CATEGORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d{4})(ph|cw|rtty)$")
        .unwrap_or_else(|e| panic!("invalid static regex: {e}"))
});

/// One contest category listed on the index, e.g. `2023cw`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearCategory {
    /// Contest year.
    pub year: Year,
    /// Contest mode.
    pub mode: Mode,
    /// Listing page of the category.
    pub source_url: Url,
    /// Directory the category's logs go to in bulk mode.
    pub local_dir_name: String,
}

impl YearCategory {
    /// Builds a category and derives its local directory name.
    #[must_use]
    pub fn new(year: Year, mode: Mode, source_url: Url) -> Self {
        let local_dir_name = format!("{year}_CQWW{}_LOGS", mode.label());
        Self {
            year,
            mode,
            source_url,
            local_dir_name,
        }
    }
}

/// Returns true when `page` is the archive index itself.
///
/// Trailing slashes are ignored on both sides, so `/publiclogs` and
/// `/publiclogs/` are the same page.
#[must_use]
pub fn is_index_page(page: &Url, index: &Url) -> bool {
    let index_path = index.path().trim_end_matches('/');
    let page_path = page.path().trim_end_matches('/');
    if index_path.is_empty() {
        page_path.is_empty()
    } else {
        page_path.ends_with(index_path)
    }
}

/// Finds `<year><mode>` categories among index links, in page order.
///
/// Only the last non-empty path segment is inspected. The first link for a
/// given (year, mode) wins.
#[must_use]
pub fn discover_categories(links: &[Url]) -> Vec<YearCategory> {
    let mut seen = HashSet::new();
    let mut categories = Vec::new();

    for link in links {
        let Some((year, mode)) = category_of(link) else {
            continue;
        };
        if seen.insert((year.clone(), mode)) {
            categories.push(YearCategory::new(year, mode, link.clone()));
        }
    }
    categories
}

fn category_of(link: &Url) -> Option<(Year, Mode)> {
    let segment = link.path_segments()?.rev().find(|s| !s.is_empty())?;
    let caps = CATEGORY_RE.captures(segment)?;
    let year = caps.get(1)?.as_str().parse().ok()?;
    let mode = Mode::from_url_suffix(&caps.get(2)?.as_str().to_ascii_lowercase())?;
    Some((year, mode))
}
