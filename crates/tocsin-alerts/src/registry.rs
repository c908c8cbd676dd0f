//! Channel kinds and the factory table that builds them.
//!
//! Built-in kinds are a closed enum, [`BuiltinKind`]. Additional kinds are
//! registered at runtime as factories keyed by name; a registered factory
//! takes precedence over a built-in kind of the same name.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::channels::{
    Channel, DingTalkChannel, EmailChannel, LogChannel, WeComAppChannel, WeComWebhookChannel,
    WebhookChannel,
};
use crate::config::ChannelConfig;
use crate::error::{AlertError, Result};

/// Builds a channel from its configuration.
pub type ChannelFactory = Arc<dyn Fn(&ChannelConfig) -> Result<Arc<dyn Channel>> + Send + Sync>;

/// The channel kinds shipped with this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinKind {
    /// DingTalk robot webhook.
    DingTalk,
    /// WeCom group robot webhook.
    WeComWebhook,
    /// WeCom application messages.
    WeComApp,
    /// SMTP email.
    Email,
    /// Generic JSON webhook.
    Webhook,
    /// `tracing` output.
    Log,
}

impl BuiltinKind {
    /// All built-in kinds.
    pub const ALL: [Self; 6] = [
        Self::DingTalk,
        Self::WeComWebhook,
        Self::WeComApp,
        Self::Email,
        Self::Webhook,
        Self::Log,
    ];

    /// Returns the configuration name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DingTalk => "dingtalk",
            Self::WeComWebhook => "wecom_webhook",
            Self::WeComApp => "wecom_app",
            Self::Email => "email",
            Self::Webhook => "webhook",
            Self::Log => "log",
        }
    }

    /// Builds a channel of this kind.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidChannelConfig` if the settings are invalid.
    pub fn build(self, config: &ChannelConfig) -> Result<Arc<dyn Channel>> {
        Ok(match self {
            Self::DingTalk => Arc::new(DingTalkChannel::from_config(config)?),
            Self::WeComWebhook => Arc::new(WeComWebhookChannel::from_config(config)?),
            Self::WeComApp => Arc::new(WeComAppChannel::from_config(config)?),
            Self::Email => Arc::new(EmailChannel::from_config(config)?),
            Self::Webhook => Arc::new(WebhookChannel::from_config(config)?),
            Self::Log => Arc::new(LogChannel::from_config(config)?),
        })
    }
}

impl fmt::Display for BuiltinKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuiltinKind {
    type Err = AlertError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dingtalk" => Ok(Self::DingTalk),
            "wecom_webhook" | "weixin_webhook" => Ok(Self::WeComWebhook),
            "wecom_app" | "weixin_app" => Ok(Self::WeComApp),
            "email" | "smtp" => Ok(Self::Email),
            "webhook" => Ok(Self::Webhook),
            "log" => Ok(Self::Log),
            _ => Err(AlertError::UnknownChannelKind {
                kind: s.to_string(),
            }),
        }
    }
}

/// Resolves channel kinds to constructors.
#[derive(Clone, Default)]
pub struct ChannelRegistry {
    custom: BTreeMap<String, ChannelFactory>,
}

impl fmt::Debug for ChannelRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ChannelRegistry {
    /// Creates a registry holding only the built-in kinds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a factory for `kind`, replacing any earlier registration.
    pub fn register<F>(&mut self, kind: impl Into<String>, factory: F)
    where
        F: Fn(&ChannelConfig) -> Result<Arc<dyn Channel>> + Send + Sync + 'static,
    {
        self.custom.insert(kind.into(), Arc::new(factory));
    }

    /// Returns true if `kind` can be built.
    #[must_use]
    pub fn contains(&self, kind: &str) -> bool {
        self.custom.contains_key(kind) || kind.parse::<BuiltinKind>().is_ok()
    }

    /// Returns every buildable kind name: built-ins first, then registered.
    #[must_use]
    pub fn kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = BuiltinKind::ALL.iter().map(ToString::to_string).collect();
        for kind in self.custom.keys() {
            if !kinds.contains(kind) {
                kinds.push(kind.clone());
            }
        }
        kinds
    }

    /// Builds a channel for the configuration's kind.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::UnknownChannelKind` if nothing matches the kind,
    /// or the constructor's error if the settings are invalid.
    pub fn build(&self, config: &ChannelConfig) -> Result<Arc<dyn Channel>> {
        if let Some(factory) = self.custom.get(&config.kind) {
            return factory(config);
        }
        config.kind.parse::<BuiltinKind>()?.build(config)
    }
}
