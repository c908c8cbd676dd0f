//! Multi-channel alert dispatch for structured logging.
//!
//! `tocsin-alerts` decides, for every log record, whether external channels
//! should be notified, and delivers the notification under a selectable
//! strategy with retries, timeouts and per-channel accounting.
//!
//! # Features
//!
//! - **Decision Policy**: per-call override, then per-channel level filter,
//!   then default suppression
//! - **Channels**: DingTalk, WeCom robot, WeCom app, SMTP email, generic
//!   webhook and `tracing` output, plus custom kinds registered at runtime
//! - **Strategies**: parallel, sequential, failover and priority tiers
//! - **Retries**: bounded attempts with a fixed delay and per-attempt timeout
//! - **Tracing Bridge**: [`AlertLayer`] turns `tracing` events into alerts
//!
//! # Example
//!
//! ```rust
//! use std::collections::BTreeMap;
//! use tocsin_alerts::{AlertManager, ChannelConfig, DispatchSettings, DispatchStrategy, Severity};
//!
//! # async fn run() -> tocsin_alerts::Result<()> {
//! let manager = AlertManager::with_settings(
//!     DispatchSettings::default().with_strategy(DispatchStrategy::Failover),
//! )?;
//!
//! // Alerts at ERROR or CRITICAL go to the log channel
//! manager.add_channel(
//!     ChannelConfig::new("log").with_levels([Severity::Error, Severity::Critical]),
//! )?;
//!
//! let result = manager
//!     .dispatch(Severity::Error, "database unreachable", None, BTreeMap::new())
//!     .await?;
//! assert_eq!(result.succeeded, 1);
//!
//! // Force an INFO record through regardless of channel levels
//! let result = manager
//!     .dispatch(Severity::Info, "deploy finished", Some(true), BTreeMap::new())
//!     .await?;
//! assert_eq!(result.succeeded, 1);
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration
//!
//! An [`AlertsConfig`] can be deserialized from any serde format and turned
//! into a manager with [`AlertManager::from_config`]:
//!
//! ```rust
//! use tocsin_alerts::{AlertManager, AlertsConfig};
//!
//! let config: AlertsConfig = serde_json::from_str(r#"{
//!     "strategy": "priority",
//!     "channels": [
//!         { "type": "log", "name": "audit", "levels": ["CRITICAL"], "priority": 10 },
//!         { "type": "log", "name": "ops", "levels": ["ERROR", "CRITICAL"] }
//!     ]
//! }"#).unwrap();
//!
//! let manager = AlertManager::from_config(&config).unwrap();
//! assert_eq!(manager.channel_names(), vec!["audit", "ops"]);
//! ```

#![forbid(unsafe_code)]
#![doc(html_root_url = "https://docs.rs/tocsin-alerts/0.1.0")]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channels;
pub mod config;
pub mod error;
pub mod layer;
pub mod manager;
pub mod policy;
pub mod registry;
pub mod retry;
pub mod strategy;
pub mod types;

#[cfg(test)]
mod test_support;

// Re-export main types at crate root
pub use channels::{
    Channel, DingTalkChannel, EmailChannel, LogChannel, SendFuture, WeComAppChannel,
    WeComWebhookChannel, WebhookChannel,
};
pub use config::{AlertsConfig, ChannelConfig, DispatchSettings};
pub use error::{AlertError, ChannelError, Result};
pub use layer::AlertLayer;
pub use manager::AlertManager;
pub use policy::{Decision, Reason, decide, should_send};
pub use registry::{BuiltinKind, ChannelFactory, ChannelRegistry};
pub use retry::{ChannelEntry, ChannelOutcome, RetryPolicy, attempt};
pub use strategy::{DispatchResult, DispatchStrategy};
pub use types::{Alert, AlertBuilder, Override, Severity, SourceLocation};
