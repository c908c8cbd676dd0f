//! Bounded retry around a single channel send.
//!
//! [`attempt`] consults the decision policy first. A channel the policy
//! rejects is reported as skipped without calling it. Otherwise the channel
//! gets up to `max_retries` attempts, each bounded by the channel timeout,
//! with a fixed pause between them. A send that panics counts as a failed
//! attempt, so one faulty channel cannot take the dispatch down with it.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::channels::Channel;
use crate::config::{ChannelConfig, DispatchSettings};
use crate::error::ChannelError;
use crate::policy::decide;
use crate::types::Alert;

/// A configured channel in the manager's channel set.
#[derive(Debug, Clone)]
pub struct ChannelEntry {
    /// The configuration the channel was built from.
    pub config: ChannelConfig,
    /// The channel itself.
    pub channel: Arc<dyn Channel>,
}

impl ChannelEntry {
    /// Pairs a configuration with its channel.
    #[must_use]
    pub fn new(config: ChannelConfig, channel: Arc<dyn Channel>) -> Self {
        Self { config, channel }
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.channel.name()
    }

    /// Channel priority.
    #[must_use]
    pub const fn priority(&self) -> i32 {
        self.config.priority
    }

    /// Bound on one send: the configured `timeout_secs`, else the
    /// channel's own default, else `global`.
    #[must_use]
    pub fn timeout(&self, global: Duration) -> Duration {
        self.config
            .timeout_or(self.channel.default_timeout().unwrap_or(global))
    }
}

/// Retry parameters applied to every channel unless it overrides them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per channel.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Bound on each attempt.
    pub timeout: Duration,
}

impl From<&DispatchSettings> for RetryPolicy {
    fn from(settings: &DispatchSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            retry_delay: settings.retry_delay,
            timeout: settings.timeout,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DispatchSettings::default())
    }
}

/// What happened to one channel during a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelOutcome {
    /// Channel name.
    pub channel: String,
    /// Channel priority.
    pub priority: i32,
    /// Send attempts made; zero when skipped.
    pub attempts: u32,
    /// True if delivered, or skipped.
    pub succeeded: bool,
    /// True if the policy said not to send.
    pub skipped: bool,
    /// Last error, when every attempt failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelOutcome {
    /// A channel the policy did not select.
    #[must_use]
    pub fn skipped(entry: &ChannelEntry) -> Self {
        Self {
            channel: entry.name().to_string(),
            priority: entry.priority(),
            attempts: 0,
            succeeded: true,
            skipped: true,
            error: None,
        }
    }

    /// A channel that delivered on attempt `attempts`.
    #[must_use]
    pub fn delivered(entry: &ChannelEntry, attempts: u32) -> Self {
        Self {
            channel: entry.name().to_string(),
            priority: entry.priority(),
            attempts,
            succeeded: true,
            skipped: false,
            error: None,
        }
    }

    /// A channel that never delivered.
    #[must_use]
    pub fn failed(entry: &ChannelEntry, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            channel: entry.name().to_string(),
            priority: entry.priority(),
            attempts,
            succeeded: false,
            skipped: false,
            error: Some(error.into()),
        }
    }

    /// True if the channel actually delivered, as opposed to being skipped.
    #[must_use]
    pub const fn delivered_alert(&self) -> bool {
        self.succeeded && !self.skipped
    }
}

/// Runs one channel for one alert, with retries.
pub async fn attempt(entry: &ChannelEntry, alert: &Alert, policy: &RetryPolicy) -> ChannelOutcome {
    let decision = decide(&entry.config, alert);
    if !decision.send {
        debug!(
            channel = %entry.name(),
            alert_id = %alert.id(),
            reason = %decision.reason,
            "channel skipped"
        );
        return ChannelOutcome::skipped(entry);
    }

    let max_retries = entry.config.max_retries.unwrap_or(policy.max_retries).max(1);
    let timeout = entry.timeout(policy.timeout);
    let mut last_error = String::new();

    for n in 1..=max_retries {
        debug!(
            channel = %entry.name(),
            alert_id = %alert.id(),
            attempt = n,
            max_retries,
            reason = %decision.reason,
            "sending alert"
        );

        let send = AssertUnwindSafe(entry.channel.send(alert)).catch_unwind();
        let error = match tokio::time::timeout(timeout, send).await {
            Ok(Ok(Ok(()))) => return ChannelOutcome::delivered(entry, n),
            Ok(Ok(Err(e))) => e,
            Ok(Err(panic)) => {
                ChannelError::Other(format!("channel panicked: {}", panic_message(&*panic)))
            }
            Err(_) => ChannelError::Timeout(timeout),
        };

        warn!(
            channel = %entry.name(),
            alert_id = %alert.id(),
            attempt = n,
            max_retries,
            error = %error,
            "alert attempt failed"
        );
        last_error = error.to_string();

        if n < max_retries {
            tokio::time::sleep(policy.retry_delay).await;
        }
    }

    warn!(
        channel = %entry.name(),
        alert_id = %alert.id(),
        attempts = max_retries,
        error = %last_error,
        "giving up on channel"
    );
    ChannelOutcome::failed(entry, max_retries, last_error)
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}
