//! WeCom group robot channel.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Channel, SendFuture, http_client, markdown_body, read_api_reply};
use crate::config::ChannelConfig;
use crate::error::{AlertError, Result};
use crate::types::Alert;

const KIND: &str = "wecom_webhook";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct WeComWebhookSettings {
    webhook: String,
    #[serde(default)]
    mentioned_list: Vec<String>,
    #[serde(default)]
    mentioned_mobile_list: Vec<String>,
}

/// Posts markdown messages to a WeCom group robot webhook.
#[derive(Debug, Clone)]
pub struct WeComWebhookChannel {
    name: String,
    webhook: reqwest::Url,
    mentioned_list: Vec<String>,
    mentioned_mobile_list: Vec<String>,
    client: reqwest::Client,
}

impl WeComWebhookChannel {
    /// Builds the channel from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannelConfig` if `webhook` is missing or
    /// not a valid URL.
    pub fn from_config(config: &ChannelConfig) -> Result<Self> {
        let settings: WeComWebhookSettings = config.parse_settings()?;
        let webhook = reqwest::Url::parse(&settings.webhook)
            .map_err(|e| AlertError::invalid_channel(KIND, format!("invalid webhook url: {e}")))?;

        Ok(Self {
            name: config.display_name().to_string(),
            webhook,
            mentioned_list: settings.mentioned_list,
            mentioned_mobile_list: settings.mentioned_mobile_list,
            client: http_client(KIND, config.timeout_or(DEFAULT_TIMEOUT))?,
        })
    }
}

impl Channel for WeComWebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> SendFuture<'a> {
        Box::pin(async move {
            let payload = json!({
                "msgtype": "markdown",
                "markdown": {
                    "content": markdown_body(alert, true),
                    "mentioned_list": self.mentioned_list,
                    "mentioned_mobile_list": self.mentioned_mobile_list,
                },
            });

            let response = self
                .client
                .post(self.webhook.clone())
                .json(&payload)
                .send()
                .await?;
            read_api_reply(response).await?;

            debug!(channel = %self.name, alert_id = %alert.id(), "wecom robot message delivered");
            Ok(())
        })
    }
}
