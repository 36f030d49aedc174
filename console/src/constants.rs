//! Central repository for timeouts, intervals, and fixed values
//!
//! Constants are grouped by concern so that the poller, the HTTP layer and the
//! CLI agree on a single source of truth.

use std::time::Duration;

/// HTTP client timeout constants
pub mod http {
    use super::Duration;

    /// Default timeout for a single request to the REST API
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

    /// Timeout for establishing HTTP connections
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
}

/// Job polling constants
pub mod polling {
    use super::Duration;

    /// Interval between two status checks of the same job
    pub const JOB_POLL_INTERVAL: Duration = Duration::from_millis(5000);

    /// Interval used by the CLI while waiting for a registration to go idle
    pub const IDLE_WAIT_INTERVAL: Duration = Duration::from_millis(250);
}

/// Job key prefixes, joined to the VM identifier with a dash
pub mod keys {
    pub const SNAPSHOT_PREFIX: &str = "snapshot";
    pub const EXECUTION_PREFIX: &str = "execution";
}

/// Default values
pub mod defaults {
    /// CRON proposed for a new schedule: every day at midnight
    pub const CRON: &str = "0 0 0 * * ?";

    /// Configuration directory, relative to the working directory
    pub const CONFIG_DIR: &str = "config";

    /// Capacity of the notification broadcast channel
    pub const NOTIFICATION_CAPACITY: usize = 64;
}

/// Status text put on a snapshot row while its deletion is in progress
pub const DELETING_STATUS_TEXT: &str = "deleting";
