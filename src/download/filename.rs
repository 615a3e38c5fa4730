//! File naming for downloaded logs.
//!
//! Bulk downloads keep the remote base name. Targeted downloads get a
//! canonical `<year>_<MODE>_<CALLSIGN>.log` name so logs of one station from
//! different contests sit side by side without clashing.

use url::Url;

use crate::selection::{Callsign, Mode, Year};

/// Returns the percent-decoded last path segment of `url`, if it names a file.
///
/// Path separators that survive decoding are replaced so the result can never
/// escape the output directory.
#[must_use]
pub fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let cleaned = sanitize_file_name(&decoded);
    (!cleaned.is_empty() && cleaned != "." && cleaned != "..").then_some(cleaned)
}

fn sanitize_file_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

/// Canonical local name for a targeted download, e.g. `2023_CW_OK1K.log`.
#[must_use]
pub fn targeted_file_name(year: &Year, mode: Mode, callsign: &Callsign) -> String {
    format!("{year}_{}_{callsign}.log", mode.label())
}

/// Sibling name used by the `new` overwrite policy.
///
/// Inserts `_new` before the last extension (`OK1K.log` → `OK1K_new.log`),
/// or appends it when there is no extension. A leading dot does not start an
/// extension.
#[must_use]
pub fn new_sibling_name(file_name: &str) -> String {
    match file_name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < file_name.len() => {
            let (stem, ext) = file_name.split_at(dot);
            format!("{stem}_new{ext}")
        }
        _ => format!("{file_name}_new"),
    }
}
