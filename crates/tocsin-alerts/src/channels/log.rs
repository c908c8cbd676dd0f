//! A channel that writes alerts to `tracing`.

use tracing::{error, info, warn};

use super::{Channel, SendFuture};
use crate::config::ChannelConfig;
use crate::error::Result;
use crate::types::{Alert, Severity};

/// A channel that logs alerts for debugging and dry runs.
///
/// Events are emitted under this crate's target, which the
/// [`AlertLayer`](crate::AlertLayer) ignores.
#[derive(Debug, Clone)]
pub struct LogChannel {
    name: String,
}

impl LogChannel {
    /// Creates a new log channel.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    /// Builds the channel from its configuration.
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other built-in channels.
    pub fn from_config(config: &ChannelConfig) -> Result<Self> {
        Ok(Self::new(config.display_name()))
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new("log")
    }
}

impl Channel for LogChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> SendFuture<'a> {
        Box::pin(async move {
            let fields = serde_json::to_string(alert.fields()).unwrap_or_default();
            match alert.level() {
                Severity::Critical | Severity::Error => {
                    error!(channel = %self.name, alert_id = %alert.id(), level = %alert.level(), %fields, "ALERT: {}", alert.message());
                }
                Severity::Warning => {
                    warn!(channel = %self.name, alert_id = %alert.id(), level = %alert.level(), %fields, "ALERT: {}", alert.message());
                }
                _ => {
                    info!(channel = %self.name, alert_id = %alert.id(), level = %alert.level(), %fields, "ALERT: {}", alert.message());
                }
            }
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_defaults_to_kind() {
        let channel = LogChannel::from_config(&ChannelConfig::new("log")).unwrap();
        assert_eq!(channel.name(), "log");
        assert_eq!(LogChannel::default().name(), "log");
    }

    #[test]
    fn configured_name_is_used() {
        let channel =
            LogChannel::from_config(&ChannelConfig::new("log").with_name("audit")).unwrap();
        assert_eq!(channel.name(), "audit");
    }

    #[tokio::test]
    async fn send_always_succeeds() {
        let channel = LogChannel::default();
        for level in Severity::ALL {
            let alert = Alert::builder(level, "hello").field("k", "v").build();
            assert!(channel.send(&alert).await.is_ok());
        }
    }
}
