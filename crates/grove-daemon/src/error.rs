//! Daemon error types

use thiserror::Error;

/// Errors that stop the daemon. Reconcile failures never surface here;
/// those stay per-resource inside the workers.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("server error: {0}")]
    Server(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type DaemonResult<T> = std::result::Result<T, DaemonError>;
