//! DingTalk custom robot channel.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::json;
use sha2::Sha256;
use tracing::debug;

use super::{Channel, SendFuture, http_client, markdown_body, read_api_reply};
use crate::config::ChannelConfig;
use crate::error::{AlertError, ChannelError, Result};
use crate::types::Alert;

const KIND: &str = "dingtalk";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct DingTalkSettings {
    webhook: String,
    #[serde(default)]
    secret: Option<String>,
    #[serde(default)]
    at_mobiles: Vec<String>,
    #[serde(default)]
    at_all: bool,
}

/// Posts markdown messages to a DingTalk robot webhook.
///
/// When a `secret` is configured every request is signed: the current time
/// in milliseconds and `base64(HMAC-SHA256(secret, "{timestamp}\n{secret}"))`
/// are appended as the `timestamp` and `sign` query parameters.
#[derive(Debug, Clone)]
pub struct DingTalkChannel {
    name: String,
    webhook: reqwest::Url,
    secret: Option<String>,
    at_mobiles: Vec<String>,
    at_all: bool,
    client: reqwest::Client,
}

impl DingTalkChannel {
    /// Builds the channel from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannelConfig` if `webhook` is missing or
    /// not a valid URL.
    pub fn from_config(config: &ChannelConfig) -> Result<Self> {
        let settings: DingTalkSettings = config.parse_settings()?;
        let webhook = reqwest::Url::parse(&settings.webhook)
            .map_err(|e| AlertError::invalid_channel(KIND, format!("invalid webhook url: {e}")))?;

        Ok(Self {
            name: config.display_name().to_string(),
            webhook,
            secret: settings.secret.filter(|s| !s.is_empty()),
            at_mobiles: settings.at_mobiles,
            at_all: settings.at_all,
            client: http_client(KIND, config.timeout_or(DEFAULT_TIMEOUT))?,
        })
    }

    /// Computes the request signature for a millisecond timestamp.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Other` if the key is rejected by the MAC.
    pub fn sign(secret: &str, timestamp_ms: i64) -> std::result::Result<String, ChannelError> {
        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .map_err(|e| ChannelError::Other(format!("invalid signing key: {e}")))?;
        mac.update(format!("{timestamp_ms}\n{secret}").as_bytes());
        Ok(STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn payload(&self, alert: &Alert) -> serde_json::Value {
        json!({
            "msgtype": "markdown",
            "markdown": {
                "title": format!("{} alert", alert.level()),
                "text": markdown_body(alert, false),
            },
            "at": {
                "atMobiles": self.at_mobiles,
                "isAtAll": self.at_all,
            },
        })
    }
}

impl Channel for DingTalkChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> SendFuture<'a> {
        Box::pin(async move {
            let mut request = self.client.post(self.webhook.clone()).json(&self.payload(alert));

            if let Some(secret) = &self.secret {
                let timestamp = Utc::now().timestamp_millis();
                let sign = Self::sign(secret, timestamp)?;
                request = request.query(&[("timestamp", timestamp.to_string()), ("sign", sign)]);
            }

            read_api_reply(request.send().await?).await?;
            debug!(channel = %self.name, alert_id = %alert.id(), "dingtalk message delivered");
            Ok(())
        })
    }
}
