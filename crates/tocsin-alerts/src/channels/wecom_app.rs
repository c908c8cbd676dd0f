//! WeCom application message channel.
//!
//! Sending requires an access token obtained from `/cgi-bin/gettoken`. The
//! token is cached until five minutes before it expires and refreshed on the
//! next send. A failed token fetch fails that send; it never fails
//! construction.

use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{Channel, SendFuture, http_client, markdown_body, read_api_reply};
use crate::config::ChannelConfig;
use crate::error::{AlertError, ChannelError, Result};
use crate::types::Alert;

const KIND: &str = "wecom_app";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_API_BASE: &str = "https://qyapi.weixin.qq.com";
const DEFAULT_TOKEN_TTL_SECS: u64 = 7200;
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(300);

// errcodes meaning the cached token is no longer accepted
const INVALID_TOKEN_CODES: [i64; 2] = [40014, 42001];

/// Application id; WeCom accepts it as a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum AgentId {
    Number(i64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct WeComAppSettings {
    corpid: String,
    corpsecret: String,
    agentid: AgentId,
    #[serde(default = "default_touser")]
    touser: String,
    #[serde(default)]
    toparty: String,
    #[serde(default)]
    totag: String,
    #[serde(default)]
    api_base: Option<String>,
}

fn default_touser() -> String {
    "@all".to_string()
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Sends markdown application messages through the WeCom API.
#[derive(Debug)]
pub struct WeComAppChannel {
    name: String,
    api_base: String,
    corpid: String,
    corpsecret: String,
    agentid: AgentId,
    touser: String,
    toparty: String,
    totag: String,
    client: reqwest::Client,
    token: Mutex<Option<CachedToken>>,
}

impl WeComAppChannel {
    /// Builds the channel from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannelConfig` if `corpid`, `corpsecret`
    /// or `agentid` is missing or empty.
    pub fn from_config(config: &ChannelConfig) -> Result<Self> {
        let settings: WeComAppSettings = config.parse_settings()?;

        if settings.corpid.is_empty() || settings.corpsecret.is_empty() {
            return Err(AlertError::invalid_channel(
                KIND,
                "corpid and corpsecret must not be empty",
            ));
        }
        if matches!(&settings.agentid, AgentId::Text(s) if s.is_empty()) {
            return Err(AlertError::invalid_channel(KIND, "agentid must not be empty"));
        }

        let api_base = settings
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            name: config.display_name().to_string(),
            api_base,
            corpid: settings.corpid,
            corpsecret: settings.corpsecret,
            agentid: settings.agentid,
            touser: settings.touser,
            toparty: settings.toparty,
            totag: settings.totag,
            client: http_client(KIND, config.timeout_or(DEFAULT_TIMEOUT))?,
            token: Mutex::new(None),
        })
    }

    fn cached_token(&self) -> Option<String> {
        self.token
            .lock()
            .as_ref()
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| t.value.clone())
    }

    async fn access_token(&self) -> std::result::Result<String, ChannelError> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let response = self
            .client
            .get(format!("{}/cgi-bin/gettoken", self.api_base))
            .query(&[("corpid", &self.corpid), ("corpsecret", &self.corpsecret)])
            .send()
            .await
            .map_err(|e| ChannelError::Credential(e.to_string()))?;

        let reply = read_api_reply(response)
            .await
            .map_err(|e| ChannelError::Credential(e.to_string()))?;

        let value = reply
            .rest
            .get("access_token")
            .and_then(serde_json::Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ChannelError::Credential("response carried no access_token".to_string()))?
            .to_string();
        let ttl = reply
            .rest
            .get("expires_in")
            .and_then(serde_json::Value::as_u64)
            .unwrap_or(DEFAULT_TOKEN_TTL_SECS);

        let lifetime = Duration::from_secs(ttl).saturating_sub(TOKEN_REFRESH_MARGIN);
        // An expiry past what Instant can represent is not cached.
        let cached = Instant::now().checked_add(lifetime).map(|expires_at| CachedToken {
            value: value.clone(),
            expires_at,
        });
        if cached.is_none() {
            debug!(channel = %self.name, ttl_secs = ttl, "wecom token lifetime out of range, not caching");
        }
        *self.token.lock() = cached;

        info!(channel = %self.name, ttl_secs = ttl, "refreshed wecom access token");
        Ok(value)
    }

    fn payload(&self, alert: &Alert) -> serde_json::Value {
        json!({
            "touser": self.touser,
            "toparty": self.toparty,
            "totag": self.totag,
            "msgtype": "markdown",
            "agentid": self.agentid,
            "markdown": { "content": markdown_body(alert, false) },
        })
    }
}

impl Channel for WeComAppChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> SendFuture<'a> {
        Box::pin(async move {
            let token = self.access_token().await?;

            let response = self
                .client
                .post(format!("{}/cgi-bin/message/send", self.api_base))
                .query(&[("access_token", &token)])
                .json(&self.payload(alert))
                .send()
                .await?;

            match read_api_reply(response).await {
                Ok(_) => {
                    debug!(channel = %self.name, alert_id = %alert.id(), "wecom app message delivered");
                    Ok(())
                }
                Err(ChannelError::Api { code, message }) if INVALID_TOKEN_CODES.contains(&code) => {
                    self.token.lock().take();
                    Err(ChannelError::Api { code, message })
                }
                Err(e) => Err(e),
            }
        })
    }
}
