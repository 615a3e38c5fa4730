//! Log link filtering and call-sign matching on listing pages.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::download::filename::file_name_from_url;
use crate::selection::Callsign;

// Call signs are alphanumeric, so the greedy run stops exactly where the
// station part of the name ends.
static STATION_LOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^([a-z0-9]+)(?:[._-].*)?\.log$")
        .unwrap_or_else(|e| panic!("invalid static regex: {e}"))
});

fn is_log_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".log")
}

/// Distinct `.log` links in first-seen order, each with its local file name.
///
/// Links without a usable file name (directories, `..`) and non-log files
/// are left out.
#[must_use]
pub fn log_links(links: &[Url]) -> Vec<(&Url, String)> {
    let mut seen = HashSet::new();
    links
        .iter()
        .filter_map(|link| file_name_from_url(link).map(|name| (link, name)))
        .filter(|(_, name)| is_log_name(name))
        .filter(|(link, _)| seen.insert(link.as_str()))
        .collect()
}

/// Returns true when `file_name` is a log of `callsign`:
/// `<CALL>.log` or `<CALL>` followed by `.`, `_` or `-` and anything, then `.log`.
#[must_use]
pub fn matches_callsign(file_name: &str, callsign: &Callsign) -> bool {
    STATION_LOG_RE
        .captures(file_name)
        .and_then(|caps| caps.get(1))
        .is_some_and(|station| station.as_str().eq_ignore_ascii_case(callsign.as_str()))
}

/// Picks the station's log among `links`: the shortest matching file name,
/// first in page order among equals.
#[must_use]
pub fn best_match<'a>(links: &'a [Url], callsign: &Callsign) -> Option<&'a Url> {
    links
        .iter()
        .filter_map(|link| file_name_from_url(link).map(|name| (link, name)))
        .filter(|(_, name)| matches_callsign(name, callsign))
        .min_by_key(|(_, name)| name.len())
        .map(|(link, _)| link)
}
