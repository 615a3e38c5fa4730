//! Selection of which logs a run should fetch.
//!
//! A [`SelectionSpec`] is built once per invocation from validated input and
//! never changes afterwards. Everything that can be mistyped on the command
//! line (year, mode, call sign, page URL) is parsed into a closed type here, so
//! bad input is rejected before any network activity.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use url::Url;

/// Errors produced while validating selection input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    /// Year is not exactly four ASCII digits.
    #[error("invalid year '{value}': expected four digits, e.g. 2023")]
    InvalidYear {
        /// The rejected input.
        value: String,
    },

    /// Mode is not one of the supported contest modes.
    #[error("invalid mode '{value}': allowed values are CW, SSB (or PH), RTTY")]
    InvalidMode {
        /// The rejected input.
        value: String,
    },

    /// Call sign is empty or contains characters that cannot form a file name.
    #[error("invalid call sign '{value}': expected letters and digits only")]
    InvalidCallsign {
        /// The rejected input.
        value: String,
    },

    /// Page URL could not be parsed.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The rejected input.
        url: String,
        /// Parser message.
        reason: String,
    },

    /// Page URL uses a scheme other than http or https.
    #[error("invalid URL scheme '{scheme}' in '{url}': only http and https are supported")]
    UnsupportedScheme {
        /// The rejected input.
        url: String,
        /// The scheme that was found.
        scheme: String,
    },
}

/// Contest mode.
///
/// Declaration order (CW, SSB, RTTY) is the iteration order used by targeted
/// resolution, so the derived `Ord` is load-bearing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Mode {
    /// Telegraphy.
    Cw,
    /// Phone. The archive calls this `ph`.
    Ssb,
    /// Radioteletype.
    Rtty,
}

impl Mode {
    /// All modes in declaration order.
    pub const ALL: [Mode; 3] = [Mode::Cw, Mode::Ssb, Mode::Rtty];

    /// Upper-case label used in file and directory names.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Cw => "CW",
            Self::Ssb => "SSB",
            Self::Rtty => "RTTY",
        }
    }

    /// Suffix used by the archive in listing-page paths (`2023cw/`, `2023ph/`).
    #[must_use]
    pub fn url_suffix(self) -> &'static str {
        match self {
            Self::Cw => "cw",
            Self::Ssb => "ph",
            Self::Rtty => "rtty",
        }
    }

    /// Maps an archive path suffix back to a mode, ignoring case.
    #[must_use]
    pub fn from_url_suffix(suffix: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.url_suffix().eq_ignore_ascii_case(suffix))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Mode {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CW" => Ok(Self::Cw),
            "SSB" | "PH" => Ok(Self::Ssb),
            "RTTY" => Ok(Self::Rtty),
            _ => Err(SelectionError::InvalidMode {
                value: s.to_string(),
            }),
        }
    }
}

/// Contest year, always four ASCII digits.
///
/// Ordering of the inner string matches numeric ordering because the width is
/// fixed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Year(String);

impl Year {
    /// Returns the year as written in archive paths.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Year {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Year {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.len() == 4 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(SelectionError::InvalidYear {
                value: s.to_string(),
            })
        }
    }
}

/// Station call sign, normalised to upper case.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Callsign(String);

impl Callsign {
    /// Returns the upper-case call sign.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Callsign {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Callsign {
    type Err = SelectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(SelectionError::InvalidCallsign {
                value: s.to_string(),
            });
        }
        Ok(Self(trimmed.to_ascii_uppercase()))
    }
}

/// What a single run should download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionSpec {
    /// Every `.log` link on a listing page, or on every category of an index page.
    AllLinks {
        /// Listing or index page.
        page_url: Url,
    },
    /// The station's log in every discovered year and mode.
    AllYearsAllModes {
        /// Station to look for.
        callsign: Callsign,
    },
    /// The station's CW and SSB logs for one year.
    YearBothModes {
        /// Station to look for.
        callsign: Callsign,
        /// Contest year.
        year: Year,
    },
    /// The station's log in one mode across every discovered year.
    ModeAllYears {
        /// Station to look for.
        callsign: Callsign,
        /// Contest mode.
        mode: Mode,
    },
    /// One station, one year, one mode.
    Exact {
        /// Station to look for.
        callsign: Callsign,
        /// Contest year.
        year: Year,
        /// Contest mode.
        mode: Mode,
    },
}

impl SelectionSpec {
    /// Builds the targeted variant implied by which optional filters are present.
    #[must_use]
    pub fn targeted(callsign: Callsign, year: Option<Year>, mode: Option<Mode>) -> Self {
        match (year, mode) {
            (Some(year), Some(mode)) => Self::Exact {
                callsign,
                year,
                mode,
            },
            (Some(year), None) => Self::YearBothModes { callsign, year },
            (None, Some(mode)) => Self::ModeAllYears { callsign, mode },
            (None, None) => Self::AllYearsAllModes { callsign },
        }
    }

    /// Returns the call sign for targeted variants.
    #[must_use]
    pub fn callsign(&self) -> Option<&Callsign> {
        match self {
            Self::AllLinks { .. } => None,
            Self::AllYearsAllModes { callsign }
            | Self::YearBothModes { callsign, .. }
            | Self::ModeAllYears { callsign, .. }
            | Self::Exact { callsign, .. } => Some(callsign),
        }
    }
}

impl fmt::Display for SelectionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AllLinks { page_url } => write!(f, "all links on {page_url}"),
            Self::AllYearsAllModes { callsign } => write!(f, "{callsign} in all years and modes"),
            Self::YearBothModes { callsign, year } => write!(f, "{callsign} {year} CW+SSB"),
            Self::ModeAllYears { callsign, mode } => write!(f, "{callsign} {mode} in all years"),
            Self::Exact {
                callsign,
                year,
                mode,
            } => write!(f, "{callsign} {year} {mode}"),
        }
    }
}

/// Parses a page URL and rejects anything that is not http or https.
///
/// # Errors
///
/// Returns [`SelectionError::InvalidUrl`] when the input does not parse and
/// [`SelectionError::UnsupportedScheme`] for other schemes.
pub fn parse_page_url(raw: &str) -> Result<Url, SelectionError> {
    let trimmed = raw.trim();
    let url = Url::parse(trimmed).map_err(|e| SelectionError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(SelectionError::UnsupportedScheme {
            url: trimmed.to_string(),
            scheme: other.to_string(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_year_accepts_four_digits() {
        let year: Year = "2023".parse().unwrap();
        assert_eq!(year.as_str(), "2023");
        assert_eq!(" 1999 ".parse::<Year>().unwrap().as_str(), "1999");
    }

    #[test]
    fn test_year_rejects_other_shapes() {
        for bad in ["", "23", "20234", "20a3", "２０２３"] {
            assert!(
                matches!(bad.parse::<Year>(), Err(SelectionError::InvalidYear { .. })),
                "expected rejection for {bad:?}"
            );
        }
    }

    #[test]
    fn test_year_ordering_is_numeric() {
        let mut years: Vec<Year> = ["2024", "1999", "2010"]
            .iter()
            .map(|y| y.parse().unwrap())
            .collect();
        years.sort();
        let sorted: Vec<&str> = years.iter().map(Year::as_str).collect();
        assert_eq!(sorted, ["1999", "2010", "2024"]);
    }

    #[test]
    fn test_mode_parse_accepts_aliases_case_insensitively() {
        assert_eq!("cw".parse::<Mode>().unwrap(), Mode::Cw);
        assert_eq!("SSB".parse::<Mode>().unwrap(), Mode::Ssb);
        assert_eq!("ph".parse::<Mode>().unwrap(), Mode::Ssb);
        assert_eq!("Rtty".parse::<Mode>().unwrap(), Mode::Rtty);
        assert!(matches!(
            "fm".parse::<Mode>(),
            Err(SelectionError::InvalidMode { .. })
        ));
    }

    #[test]
    fn test_mode_url_suffix_round_trip() {
        assert_eq!(Mode::Ssb.url_suffix(), "ph");
        assert_eq!(Mode::from_url_suffix("PH"), Some(Mode::Ssb));
        assert_eq!(Mode::from_url_suffix("cw"), Some(Mode::Cw));
        assert_eq!(Mode::from_url_suffix("ssb"), None);
    }

    #[test]
    fn test_mode_declaration_order() {
        let mut modes = vec![Mode::Rtty, Mode::Ssb, Mode::Cw];
        modes.sort();
        assert_eq!(modes, Mode::ALL);
    }

    #[test]
    fn test_callsign_is_upper_cased() {
        let call: Callsign = " ok1k ".parse().unwrap();
        assert_eq!(call.as_str(), "OK1K");
    }

    #[test]
    fn test_callsign_rejects_empty_and_separators() {
        assert!("".parse::<Callsign>().is_err());
        assert!("   ".parse::<Callsign>().is_err());
        assert!("OK1K/P".parse::<Callsign>().is_err());
        assert!("OK1K.log".parse::<Callsign>().is_err());
    }

    #[test]
    fn test_targeted_picks_variant_from_filters() {
        let call: Callsign = "OK1K".parse().unwrap();
        let year: Year = "2023".parse().unwrap();

        assert!(matches!(
            SelectionSpec::targeted(call.clone(), Some(year.clone()), Some(Mode::Cw)),
            SelectionSpec::Exact { .. }
        ));
        assert!(matches!(
            SelectionSpec::targeted(call.clone(), Some(year), None),
            SelectionSpec::YearBothModes { .. }
        ));
        assert!(matches!(
            SelectionSpec::targeted(call.clone(), None, Some(Mode::Rtty)),
            SelectionSpec::ModeAllYears { .. }
        ));
        let all = SelectionSpec::targeted(call, None, None);
        assert!(matches!(all, SelectionSpec::AllYearsAllModes { .. }));
        assert_eq!(all.callsign().unwrap().as_str(), "OK1K");
    }

    #[test]
    fn test_parse_page_url_accepts_http_and_https() {
        assert!(parse_page_url("https://cqww.com/publiclogs/").is_ok());
        assert!(parse_page_url(" http://example.com/2024ph/ ").is_ok());
    }

    #[test]
    fn test_parse_page_url_rejects_other_schemes() {
        let err = parse_page_url("ftp://example.com/logs/").unwrap_err();
        assert!(matches!(err, SelectionError::UnsupportedScheme { ref scheme, .. } if scheme == "ftp"));
        assert!(err.to_string().contains("only http and https"));
    }

    #[test]
    fn test_parse_page_url_rejects_garbage() {
        assert!(matches!(
            parse_page_url("not a url"),
            Err(SelectionError::InvalidUrl { .. })
        ));
    }
}
