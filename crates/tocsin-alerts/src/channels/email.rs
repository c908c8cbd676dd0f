//! SMTP email channel.

use std::fmt::Write as _;
use std::time::Duration;

use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::Deserialize;
use tracing::debug;

use super::{Channel, SendFuture, display_value, local_time, location_entries};
use crate::config::ChannelConfig;
use crate::error::{AlertError, ChannelError, Result};
use crate::types::Alert;

const KIND: &str = "email";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_SUBJECT_PREFIX: &str = "[Alert]";

/// A single address or a list of addresses.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Addresses {
    One(String),
    Many(Vec<String>),
}

impl Default for Addresses {
    fn default() -> Self {
        Self::Many(Vec::new())
    }
}

impl Addresses {
    fn into_vec(self) -> Vec<String> {
        match self {
            Self::One(addr) => vec![addr],
            Self::Many(addrs) => addrs,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EmailSettings {
    smtp_host: String,
    #[serde(default)]
    smtp_port: Option<u16>,
    smtp_user: String,
    smtp_password: String,
    #[serde(default)]
    use_ssl: bool,
    #[serde(default)]
    use_tls: bool,
    #[serde(default)]
    from_addr: Option<String>,
    #[serde(default)]
    from_name: Option<String>,
    to_addrs: Addresses,
    #[serde(default)]
    cc_addrs: Addresses,
    #[serde(default)]
    subject_prefix: Option<String>,
}

/// Sends multipart plain-text and HTML alert emails over SMTP.
///
/// `use_ssl` selects implicit TLS (port 465 by default), `use_tls` selects
/// STARTTLS, and neither means a plain connection (port 25 by default).
#[derive(Clone)]
pub struct EmailChannel {
    name: String,
    from: Mailbox,
    to: Vec<Mailbox>,
    cc: Vec<Mailbox>,
    subject_prefix: String,
    transport: AsyncSmtpTransport<Tokio1Executor>,
}

impl std::fmt::Debug for EmailChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailChannel")
            .field("name", &self.name)
            .field("from", &self.from.to_string())
            .field("to", &self.to.len())
            .field("cc", &self.cc.len())
            .finish_non_exhaustive()
    }
}

fn parse_mailbox(field: &str, addr: &str) -> Result<Mailbox> {
    addr.parse()
        .map_err(|e| AlertError::invalid_channel(KIND, format!("invalid {field} address {addr:?}: {e}")))
}

impl EmailChannel {
    /// Builds the channel from its configuration.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannelConfig` if a required setting is
    /// missing, an address does not parse, or the TLS setup fails.
    pub fn from_config(config: &ChannelConfig) -> Result<Self> {
        let settings: EmailSettings = config.parse_settings()?;

        if settings.smtp_host.is_empty() || settings.smtp_user.is_empty() || settings.smtp_password.is_empty() {
            return Err(AlertError::invalid_channel(
                KIND,
                "smtp_host, smtp_user and smtp_password must not be empty",
            ));
        }

        let to = settings
            .to_addrs
            .into_vec()
            .iter()
            .map(|a| parse_mailbox("to", a))
            .collect::<Result<Vec<_>>>()?;
        if to.is_empty() {
            return Err(AlertError::invalid_channel(KIND, "to_addrs must list at least one recipient"));
        }
        let cc = settings
            .cc_addrs
            .into_vec()
            .iter()
            .map(|a| parse_mailbox("cc", a))
            .collect::<Result<Vec<_>>>()?;

        let from_addr = settings.from_addr.as_deref().unwrap_or(&settings.smtp_user);
        let mut from = parse_mailbox("from", from_addr)?;
        if let Some(name) = settings.from_name.filter(|n| !n.is_empty()) {
            from.name = Some(name);
        }

        let port = settings
            .smtp_port
            .unwrap_or(if settings.use_ssl { 465 } else { 25 });
        let builder = if settings.use_ssl {
            AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.smtp_host)
        } else if settings.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&settings.smtp_host)
        } else {
            Ok(AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&settings.smtp_host))
        }
        .map_err(|e| AlertError::invalid_channel(KIND, format!("failed to set up smtp transport: {e}")))?;

        let transport = builder
            .port(port)
            .credentials(Credentials::new(settings.smtp_user, settings.smtp_password))
            .timeout(Some(config.timeout_or(DEFAULT_TIMEOUT)))
            .build();

        Ok(Self {
            name: config.display_name().to_string(),
            from,
            to,
            cc,
            subject_prefix: settings
                .subject_prefix
                .unwrap_or_else(|| DEFAULT_SUBJECT_PREFIX.to_string()),
            transport,
        })
    }

    /// Builds the email for an alert.
    ///
    /// # Errors
    ///
    /// Returns `ChannelError::Other` if the message cannot be assembled.
    pub fn message(&self, alert: &Alert) -> std::result::Result<Message, ChannelError> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .subject(format!("{} {} alert", self.subject_prefix, alert.level()));
        for to in &self.to {
            builder = builder.to(to.clone());
        }
        for cc in &self.cc {
            builder = builder.cc(cc.clone());
        }

        builder
            .multipart(MultiPart::alternative_plain_html(plain_text(alert), html(alert)))
            .map_err(|e| ChannelError::Other(format!("failed to build email: {e}")))
    }
}

impl Channel for EmailChannel {
    fn name(&self) -> &str {
        &self.name
    }

    fn send<'a>(&'a self, alert: &'a Alert) -> SendFuture<'a> {
        Box::pin(async move {
            let message = self.message(alert)?;
            self.transport.send(message).await?;
            debug!(
                channel = %self.name,
                alert_id = %alert.id(),
                recipients = self.to.len() + self.cc.len(),
                "alert email sent"
            );
            Ok(())
        })
    }

    fn default_timeout(&self) -> Option<Duration> {
        Some(DEFAULT_TIMEOUT)
    }
}

fn plain_text(alert: &Alert) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "[{} alert]\n", alert.level());
    let _ = writeln!(out, "Time: {}", local_time(alert));
    let _ = writeln!(out, "Level: {}", alert.level());
    let _ = writeln!(out, "Message: {}\n", alert.message());

    let location = location_entries(alert);
    if !location.is_empty() {
        out.push_str("Location:\n");
        for (label, value) in location {
            let _ = writeln!(out, "  {label}: {value}");
        }
        out.push('\n');
    }

    let mut fields = alert.visible_fields().peekable();
    if fields.peek().is_some() {
        out.push_str("Details:\n");
        for (key, value) in fields {
            let _ = writeln!(out, "  {key}: {}", display_value(value));
        }
        out.push('\n');
    }

    out.push_str("---\nSent automatically by tocsin.\n");
    out
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

fn html(alert: &Alert) -> String {
    let level = alert.level();
    let color = level.color();
    let mut out = String::new();

    let _ = write!(
        out,
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"></head>\
         <body style=\"font-family:Arial,sans-serif;max-width:600px;margin:0 auto;padding:20px;color:#333\">\
         <div style=\"background:{color};color:#fff;padding:16px;border-radius:5px 5px 0 0;text-align:center\">\
         <h2>{} {level} alert</h2></div>\
         <div style=\"background:#f8f9fa;padding:16px;border:1px solid #dee2e6;border-top:none\">",
        level.emoji()
    );

    let item = |out: &mut String, label: &str, value: &str| {
        let _ = write!(
            out,
            "<div style=\"margin-bottom:8px;padding:8px;background:#fff;border-left:3px solid {color}\">\
             <strong style=\"color:{color}\">{}:</strong> {}</div>",
            escape(label),
            escape(value)
        );
    };

    item(&mut out, "Time", &local_time(alert));
    item(&mut out, "Level", level.as_str());
    item(&mut out, "Message", alert.message());

    let location = location_entries(alert);
    if !location.is_empty() {
        out.push_str("<div><strong>Location</strong></div>");
        for (label, value) in &location {
            item(&mut out, label, value);
        }
    }

    let mut fields = alert.visible_fields().peekable();
    if fields.peek().is_some() {
        out.push_str("<div><strong>Details</strong></div>");
        for (key, value) in fields {
            item(&mut out, key, &display_value(value));
        }
    }

    out.push_str(
        "</div><div style=\"margin-top:16px;text-align:center;color:#6c757d;font-size:12px\">\
         Sent automatically by tocsin. Please do not reply.</div></body></html>",
    );
    out
}
