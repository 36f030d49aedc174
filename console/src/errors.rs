//! Error types for the VM console
//!
//! Validation errors (`Cron*`) are raised before any side effect. Remote errors
//! are reported once, from the call that issued the request. Failures of a
//! single poll tick never reach this type: the poller absorbs them and waits
//! for the next tick.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConsoleError>;

/// Main error type for the VM console
#[derive(Debug, Error)]
pub enum ConsoleError {
    /// CRON validation errors
    #[error("CRON error: {0}")]
    Cron(#[from] CronError),

    /// Errors raised by a remote call
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// A downloaded report could not be written
    #[error("Failed to write report {path}: {reason}")]
    ReportWrite { path: String, reason: String },
}

/// CRON validation error variants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CronError {
    /// The expression does not parse as a 6 or 7 field CRON
    #[error("invalid CRON expression '{expression}': {reason}")]
    Invalid { expression: String, reason: String },

    /// The expression is valid but fires every second
    #[error("CRON expression '{expression}' fires every second")]
    EverySecond { expression: String },
}

/// Remote call error variants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    /// The remote side answered with a non-success status
    #[error("{method} {path} failed with status {status}: {message}")]
    SubmissionFailed {
        method: String,
        path: String,
        status: u16,
        message: String,
    },

    /// The request did not reach the remote side
    #[error("connection to {url} failed: {reason}")]
    ConnectionFailed { url: String, reason: String },

    /// The response body could not be decoded
    #[error("invalid response from {path}: {reason}")]
    InvalidResponse { path: String, reason: String },
}

/// Configuration error variants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("failed to load config from '{path}': {reason}")]
    LoadFailed { path: String, reason: String },

    #[error("failed to parse config: {reason}")]
    ParseError { reason: String },

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

impl ConsoleError {
    /// True for client-side validation failures, raised before any request
    pub fn is_validation(&self) -> bool {
        matches!(self, ConsoleError::Cron(_))
    }
}
