//! Constants for the download module (timeouts).

use std::time::Duration;

/// HTTP connect timeout shared by page and transfer clients.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Timeout for a single transfer attempt.
pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);
