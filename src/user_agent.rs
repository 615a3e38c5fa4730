//! Shared User-Agent string for page and transfer HTTP clients.
//!
//! Page fetches and log transfers hit the same contest server, so both
//! identify the tool the same way.

/// Public log archive the tool is written against.
const PROJECT_UA_URL: &str = "https://cqww.com/publiclogs/";

/// Default User-Agent for every request issued by the tool.
#[must_use]
pub(crate) fn default_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("cqww-downloader/{version} (+{PROJECT_UA_URL})")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_contains_version_and_project_url() {
        let ua = default_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL: {ua}");
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("cqww-downloader/")
                .and_then(|s| s.split(' ').next())
                .unwrap(),
            "UA must contain crate version"
        );
    }
}
