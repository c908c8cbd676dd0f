//! CLI error types.

use thiserror::Error;
use tocsin_alerts::AlertError;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),

    /// The configuration loaded but was rejected by the dispatcher.
    #[error(transparent)]
    Alerts(#[from] AlertError),

    /// Every attempted channel failed.
    #[error("alert was not delivered: {failed} channel(s) failed")]
    Undelivered {
        /// Channels that failed.
        failed: usize,
    },

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(err.to_string())
    }
}
