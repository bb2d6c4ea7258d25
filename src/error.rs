//! Error handling for the hostsweep engine
//!
//! Only boundary failures are represented here: malformed input, an engine that
//! is already busy, or a probing subsystem that cannot be brought up. Per-host
//! failures (timeouts, NXDOMAIN, refused ports) never become a `ScanError`; the
//! probe pipeline records them as empty fields instead.

use std::io;
use thiserror::Error;

/// Main error type for discovery operations
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid prefix length: /{0} (expected 0-32)")]
    InvalidPrefix(u8),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("A scan is already running")]
    AlreadyRunning,

    #[error("Network init failed: {0}")]
    NetworkInit(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Permission denied: {0}")]
    Permission(String),

    #[error("Timeout error")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ScanError {
    /// Map a socket creation error, keeping permission problems distinguishable.
    pub fn from_socket_error(err: io::Error, what: &str) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            ScanError::Permission(format!("{}: {}", what, err))
        } else {
            ScanError::Network(format!("{}: {}", what, err))
        }
    }

    /// True for errors a caller caused with bad input.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            ScanError::InvalidAddress(_)
                | ScanError::InvalidRange(_)
                | ScanError::InvalidPrefix(_)
                | ScanError::Config(_)
        )
    }
}
