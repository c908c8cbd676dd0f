//! Channel and manager configuration.
//!
//! [`ChannelConfig`] describes one destination: its kind, its level filter,
//! its priority and the transport settings the channel constructor reads.
//! [`DispatchSettings`] holds the manager-wide retry and timeout parameters,
//! and [`AlertsConfig`] is the file-level shape that produces both.

use std::collections::BTreeSet;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{AlertError, Result};
use crate::strategy::DispatchStrategy;
use crate::types::Severity;

/// Default number of attempts per channel.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default pause between attempts, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 1.0;
/// Default per-channel timeout, in seconds.
pub const DEFAULT_TIMEOUT_SECS: f64 = 5.0;
/// Default size of the parallel worker pool.
pub const DEFAULT_WORKERS: usize = 10;

/// Configuration for a single alert channel.
///
/// Keys not recognised here are kept in [`settings`](Self::settings) and
/// handed to the channel constructor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel kind, e.g. `dingtalk` or `email`.
    #[serde(rename = "type", alias = "kind")]
    pub kind: String,

    /// Display name; defaults to the kind.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether this channel may send at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Severities that trigger this channel when no override is given.
    /// `None` means the channel never triggers on its own.
    #[serde(default, alias = "alert_levels")]
    pub levels: Option<BTreeSet<Severity>>,

    /// Ordering priority; higher goes first.
    #[serde(default)]
    pub priority: i32,

    /// Transport timeout in seconds.
    #[serde(default, alias = "timeout", skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<f64>,

    /// Attempts for this channel, overriding the manager value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,

    /// Transport-specific settings.
    #[serde(flatten)]
    pub settings: serde_json::Map<String, serde_json::Value>,
}

const fn default_enabled() -> bool {
    true
}

impl ChannelConfig {
    /// Creates an enabled channel configuration with no level filter.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            name: None,
            enabled: true,
            levels: None,
            priority: 0,
            timeout_secs: None,
            max_retries: None,
            settings: serde_json::Map::new(),
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets whether the channel is enabled.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the triggering severities.
    #[must_use]
    pub fn with_levels(mut self, levels: impl IntoIterator<Item = Severity>) -> Self {
        self.levels = Some(levels.into_iter().collect());
        self
    }

    /// Sets the priority.
    #[must_use]
    pub const fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the transport timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_secs = Some(timeout.as_secs_f64());
        self
    }

    /// Sets the per-channel attempt count.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Adds a transport setting.
    #[must_use]
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }

    /// Returns the transport timeout, falling back to `default`.
    ///
    /// Negative or non-finite values fall back as well.
    #[must_use]
    pub fn timeout_or(&self, default: Duration) -> Duration {
        self.timeout_secs
            .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
            .filter(|d| !d.is_zero())
            .unwrap_or(default)
    }

    /// Deserializes the transport settings into a channel-specific struct.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannelConfig` if required settings are
    /// missing or have the wrong shape.
    pub fn parse_settings<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(serde_json::Value::Object(self.settings.clone()))
            .map_err(|e| AlertError::invalid_channel(&self.kind, e.to_string()))
    }
}

/// Manager-wide dispatch parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchSettings {
    /// Strategy used for every dispatch.
    pub strategy: DispatchStrategy,
    /// Attempts per channel; at least one.
    pub max_retries: u32,
    /// Pause between attempts.
    pub retry_delay: Duration,
    /// Per-channel timeout. The parallel strategy waits at most twice this.
    pub timeout: Duration,
    /// Concurrent attempts in the parallel strategy; at least one.
    pub workers: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            strategy: DispatchStrategy::Parallel,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: Duration::from_secs_f64(DEFAULT_RETRY_DELAY_SECS),
            timeout: Duration::from_secs_f64(DEFAULT_TIMEOUT_SECS),
            workers: DEFAULT_WORKERS,
        }
    }
}

impl DispatchSettings {
    /// Sets the strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: DispatchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the attempt count.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the pause between attempts.
    #[must_use]
    pub const fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Sets the per-channel timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the worker pool size.
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Checks that the settings are usable.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidSettings` if the attempt count or the
    /// worker count is zero, or the timeout is zero.
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(AlertError::InvalidSettings {
                reason: "max_retries must be at least 1".to_string(),
            });
        }
        if self.workers == 0 {
            return Err(AlertError::InvalidSettings {
                reason: "workers must be at least 1".to_string(),
            });
        }
        if self.timeout.is_zero() {
            return Err(AlertError::InvalidSettings {
                reason: "timeout must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// File-level alerting configuration.
///
/// ```toml
/// strategy = "failover"
/// max_retries = 2
///
/// [[channels]]
/// type = "dingtalk"
/// webhook = "https://oapi.dingtalk.com/robot/send?access_token=..."
/// levels = ["ERROR", "CRITICAL"]
/// priority = 10
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertsConfig {
    /// Dispatch strategy.
    pub strategy: DispatchStrategy,
    /// Attempts per channel.
    pub max_retries: u32,
    /// Pause between attempts, in seconds.
    pub retry_delay_secs: f64,
    /// Per-channel timeout, in seconds.
    pub timeout_secs: f64,
    /// Parallel worker pool size.
    pub workers: usize,
    /// Configured channels.
    pub channels: Vec<ChannelConfig>,
    /// Single legacy webhook URL, used only when `channels` is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<String>,
    /// Levels for the legacy webhook; defaults to `ERROR` and `CRITICAL`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub levels: Option<BTreeSet<Severity>>,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            strategy: DispatchStrategy::Parallel,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_secs: DEFAULT_RETRY_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workers: DEFAULT_WORKERS,
            channels: Vec::new(),
            webhook: None,
            levels: None,
        }
    }
}

impl AlertsConfig {
    /// Builds validated dispatch settings.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidSettings` if a duration is negative or
    /// not finite, or if [`DispatchSettings::validate`] rejects the result.
    pub fn dispatch_settings(&self) -> Result<DispatchSettings> {
        let settings = DispatchSettings {
            strategy: self.strategy,
            max_retries: self.max_retries,
            retry_delay: seconds("retry_delay_secs", self.retry_delay_secs)?,
            timeout: seconds("timeout_secs", self.timeout_secs)?,
            workers: self.workers,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Returns the channel list, synthesising one from the legacy
    /// `webhook` key when no channels are configured.
    #[must_use]
    pub fn channel_configs(&self) -> Vec<ChannelConfig> {
        if !self.channels.is_empty() {
            return self.channels.clone();
        }

        self.webhook.as_ref().map_or_else(Vec::new, |url| {
            let levels = self
                .levels
                .clone()
                .unwrap_or_else(|| BTreeSet::from([Severity::Error, Severity::Critical]));
            let mut config =
                ChannelConfig::new(infer_webhook_kind(url)).with_setting(webhook_key(url), url.as_str());
            config.levels = Some(levels);
            vec![config]
        })
    }
}

fn seconds(field: &str, secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs).map_err(|_| AlertError::InvalidSettings {
        reason: format!("{field} must be a non-negative number of seconds, got {secs}"),
    })
}

/// Infers a channel kind from a bare webhook URL.
#[must_use]
pub fn infer_webhook_kind(url: &str) -> &'static str {
    if url.contains("dingtalk") {
        "dingtalk"
    } else if url.contains("qyapi.weixin.qq.com") {
        "wecom_webhook"
    } else {
        "webhook"
    }
}

fn webhook_key(url: &str) -> &'static str {
    if infer_webhook_kind(url) == "webhook" {
        "url"
    } else {
        "webhook"
    }
}
