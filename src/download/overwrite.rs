//! What to do when a destination file already exists.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Rejected `--overwrite` value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid overwrite value '{0}': allowed values are skip, new, replace")]
pub struct InvalidOverwritePolicy(pub String);

/// Rule applied when the destination already exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverwritePolicy {
    /// Leave the existing file untouched and report the item as skipped.
    Skip,
    /// Keep the existing file and write next to it as `name_new.ext`.
    New,
    /// Overwrite the existing file in place.
    #[default]
    Replace,
}

impl OverwritePolicy {
    /// Stable lower-case label, as accepted on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::New => "new",
            Self::Replace => "replace",
        }
    }
}

impl fmt::Display for OverwritePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OverwritePolicy {
    type Err = InvalidOverwritePolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(Self::Skip),
            "new" => Ok(Self::New),
            "replace" => Ok(Self::Replace),
            _ => Err(InvalidOverwritePolicy(s.to_string())),
        }
    }
}
