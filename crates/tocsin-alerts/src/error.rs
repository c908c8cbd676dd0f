//! Error types for the tocsin-alerts crate.
//!
//! Two families live here. [`AlertError`] covers configuration mistakes that
//! the caller has to fix before dispatching again. [`ChannelError`] covers
//! transport failures that the retry wrapper records and never propagates.

use std::time::Duration;

use thiserror::Error;

/// Configuration errors raised while building or driving the dispatcher.
#[derive(Debug, Error)]
pub enum AlertError {
    /// No built-in or registered channel kind matches.
    #[error("unknown channel kind: {kind}")]
    UnknownChannelKind {
        /// The kind that was requested.
        kind: String,
    },

    /// A channel could not be constructed from its configuration.
    #[error("invalid {kind} channel configuration: {reason}")]
    InvalidChannelConfig {
        /// The channel kind being built.
        kind: String,
        /// What was wrong with the configuration.
        reason: String,
    },

    /// A dispatch strategy name did not parse.
    #[error("unknown dispatch strategy: {name}")]
    UnknownStrategy {
        /// The name that was given.
        name: String,
    },

    /// A severity name did not parse.
    #[error("unknown severity: {name}")]
    UnknownSeverity {
        /// The name that was given.
        name: String,
    },

    /// Manager-wide dispatch settings are out of range.
    #[error("invalid dispatch settings: {reason}")]
    InvalidSettings {
        /// The reason the settings were rejected.
        reason: String,
    },

    /// The manager was shut down and no longer accepts dispatches.
    #[error("alert manager has been shut down")]
    ShutDown,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl AlertError {
    /// Shorthand for [`AlertError::InvalidChannelConfig`].
    pub fn invalid_channel(kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidChannelConfig {
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;

/// Failures reported by a channel while sending a single alert.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The HTTP request could not be completed.
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The destination answered with a non-success status code.
    #[error("unexpected status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, possibly empty.
        body: String,
    },

    /// The destination accepted the request but reported an error.
    #[error("api error {code}: {message}")]
    Api {
        /// Provider error code.
        code: i64,
        /// Provider error message.
        message: String,
    },

    /// A short-lived access credential could not be obtained.
    #[error("credential fetch failed: {0}")]
    Credential(String),

    /// The SMTP exchange failed.
    #[error("smtp error: {0}")]
    Smtp(String),

    /// The attempt did not finish in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl From<lettre::transport::smtp::Error> for ChannelError {
    fn from(err: lettre::transport::smtp::Error) -> Self {
        Self::Smtp(err.to_string())
    }
}
