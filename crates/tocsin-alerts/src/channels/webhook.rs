//! Generic JSON webhook channel.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Channel, SendFuture, http_client};
use crate::config::ChannelConfig;
use crate::error::{AlertError, ChannelError, Result};
use crate::types::{Alert, Severity, SourceLocation};

const KIND: &str = "webhook";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct WebhookSettings {
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
}

/// A webhook channel.
///
/// Sends each alert as a JSON POST request to a configured URL. Any 2xx
/// response counts as delivered.
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    name: String,
    url: reqwest::Url,
    headers: HeaderMap,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Builds the channel from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannelConfig` if the URL is missing or
    /// invalid, or a header name or value is not valid HTTP.
    pub fn from_config(config: &ChannelConfig) -> Result<Self> {
        let settings: WebhookSettings = config.parse_settings()?;
        let url = reqwest::Url::parse(&settings.url)
            .map_err(|e| AlertError::invalid_channel(KIND, format!("invalid url: {e}")))?;

        let mut headers = HeaderMap::with_capacity(settings.headers.len());
        for (key, value) in &settings.headers {
            let name = HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| AlertError::invalid_channel(KIND, format!("invalid header {key:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| AlertError::invalid_channel(KIND, format!("invalid value for header {key:?}: {e}")))?;
            headers.insert(name, value);
        }

        Ok(Self {
            name: config.display_name().to_string(),
            url,
            headers,
            client: http_client(KIND, config.timeout_or(DEFAULT_TIMEOUT))?,
        })
    }

    /// Returns the webhook URL.
    #[must_use]
    pub fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl Channel for WebhookChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> SendFuture<'a> {
        Box::pin(async move {
            let response = self
                .client
                .post(self.url.clone())
                .headers(self.headers.clone())
                .json(&WebhookPayload::from_alert(alert))
                .send()
                .await?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ChannelError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            debug!(channel = %self.name, url = %self.url, status = status.as_u16(), "webhook delivered");
            Ok(())
        })
    }
}

/// The JSON body posted by [`WebhookChannel`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    /// Alert identifier.
    pub id: String,
    /// Severity name.
    pub level: Severity,
    /// Message text.
    pub message: String,
    /// RFC 3339 capture time.
    pub timestamp: String,
    /// Visible structured fields.
    pub fields: BTreeMap<String, serde_json::Value>,
    /// Source location, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceLocation>,
}

impl WebhookPayload {
    /// Creates a payload from an alert.
    #[must_use]
    pub fn from_alert(alert: &Alert) -> Self {
        Self {
            id: alert.id().to_string(),
            level: alert.level(),
            message: alert.message().to_string(),
            timestamp: alert.timestamp().to_rfc3339(),
            fields: alert
                .visible_fields()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            source: alert.source().cloned(),
        }
    }
}
