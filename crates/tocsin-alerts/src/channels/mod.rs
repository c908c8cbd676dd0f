//! Alert channels.
//!
//! This module provides the [`Channel`] trait and the built-in destinations:
//!
//! | Kind | Type | Transport |
//! |---|---|---|
//! | `dingtalk` | [`DingTalkChannel`] | chat webhook, optional HMAC signing |
//! | `wecom_webhook` | [`WeComWebhookChannel`] | chat webhook with mentions |
//! | `wecom_app` | [`WeComAppChannel`] | app message API with cached token |
//! | `email` | [`EmailChannel`] | SMTP |
//! | `webhook` | [`WebhookChannel`] | JSON POST |
//! | `log` | [`LogChannel`] | `tracing` event |
//!
//! Channels are built from a [`ChannelConfig`](crate::ChannelConfig) and
//! validate their settings at construction. A send failure is returned as a
//! [`ChannelError`] and never escapes the dispatcher.

mod dingtalk;
mod email;
mod log;
mod webhook;
mod wecom_app;
mod wecom_webhook;

pub use dingtalk::DingTalkChannel;
pub use email::EmailChannel;
pub use log::LogChannel;
pub use webhook::WebhookChannel;
pub use wecom_app::WeComAppChannel;
pub use wecom_webhook::WeComWebhookChannel;

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use chrono::Local;
use serde::Deserialize;

use crate::error::{AlertError, ChannelError};
use crate::types::Alert;

/// Boxed future returned by [`Channel::send`].
pub type SendFuture<'a> = Pin<Box<dyn Future<Output = Result<(), ChannelError>> + Send + 'a>>;

/// A destination capable of transmitting one alert.
///
/// Implementations must not panic on transport failures; return an error
/// instead and let the retry wrapper decide what to do.
pub trait Channel: Send + Sync + fmt::Debug {
    /// Returns the name of this channel.
    fn name(&self) -> &str;

    /// Sends an alert through this channel.
    ///
    /// # Errors
    ///
    /// Returns a [`ChannelError`] if the destination could not be reached
    /// or rejected the message.
    fn send<'a>(&'a self, alert: &'a Alert) -> SendFuture<'a>;

    /// Timeout this channel needs when its configuration sets none.
    ///
    /// `None` defers to the manager's timeout.
    fn default_timeout(&self) -> Option<Duration> {
        None
    }
}

/// Builds the HTTP client a channel uses for every request.
pub(crate) fn http_client(kind: &str, timeout: Duration) -> Result<reqwest::Client, AlertError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| AlertError::invalid_channel(kind, format!("failed to build http client: {e}")))
}

/// Body shared by the chat APIs: `{"errcode": 0, "errmsg": "ok", ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiReply {
    errcode: Option<i64>,
    #[serde(default)]
    errmsg: String,
    #[serde(flatten)]
    pub(crate) rest: serde_json::Map<String, serde_json::Value>,
}

/// Checks the status code and the `errcode` of a chat API response.
pub(crate) async fn read_api_reply(response: reqwest::Response) -> Result<ApiReply, ChannelError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ChannelError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let reply: ApiReply = response.json().await?;
    match reply.errcode {
        Some(0) => Ok(reply),
        Some(code) => Err(ChannelError::Api {
            code,
            message: reply.errmsg,
        }),
        None => Err(ChannelError::Other("response carried no errcode".to_string())),
    }
}

/// Renders the alert timestamp in local time.
pub(crate) fn local_time(alert: &Alert) -> String {
    alert
        .timestamp()
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Renders a field value without JSON quoting for strings.
pub(crate) fn display_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Source location entries as label/value pairs, in display order.
pub(crate) fn location_entries(alert: &Alert) -> Vec<(&'static str, String)> {
    let Some(source) = alert.source() else {
        return Vec::new();
    };

    let mut entries = Vec::with_capacity(3);
    if let Some(module) = &source.module {
        entries.push(("Module", module.clone()));
    }
    if let Some(function) = &source.function {
        entries.push(("Function", function.clone()));
    }
    if let Some(line) = source.line {
        entries.push(("Line", line.to_string()));
    }
    entries
}

/// Renders the common markdown body used by the chat channels.
///
/// `quote` prefixes each detail line with `>` (WeCom style) instead of `- `.
pub(crate) fn markdown_body(alert: &Alert, quote: bool) -> String {
    use std::fmt::Write as _;

    let level = alert.level();
    let bullet = if quote { ">" } else { "- " };
    let mut out = String::new();

    let _ = writeln!(out, "## {} {level} alert\n", level.emoji());
    let _ = writeln!(out, "**Time**: {}\n", local_time(alert));
    let _ = writeln!(out, "**Message**: {}\n", alert.message());

    let location = location_entries(alert);
    if !location.is_empty() {
        out.push_str("**Location**:\n");
        for (label, value) in location {
            let _ = writeln!(out, "{bullet}{label}: {value}");
        }
        out.push('\n');
    }

    let mut fields = alert.visible_fields().peekable();
    if fields.peek().is_some() {
        out.push_str("**Details**:\n");
        for (key, value) in fields {
            let _ = writeln!(out, "{bullet}{key}: {}", display_value(value));
        }
    }

    out
}
