//! Core types for the alerting system.
//!
//! This module provides the values that flow through a dispatch:
//! - [`Severity`]: The ordered level of a log record
//! - [`Override`]: A per-call flag forcing or forbidding delivery
//! - [`SourceLocation`]: Where the record was emitted
//! - [`Alert`]: One notification-worthy event

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::error::AlertError;

/// Severity of a log record, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// Most verbose tracing output.
    Trace,
    /// Debugging information.
    Debug,
    /// General information.
    #[default]
    Info,
    /// An operation completed successfully.
    Success,
    /// Something unexpected that does not stop the program.
    Warning,
    /// An operation failed.
    Error,
    /// The program cannot continue normally.
    Critical,
}

impl Severity {
    /// All severities in ascending order.
    pub const ALL: [Self; 7] = [
        Self::Trace,
        Self::Debug,
        Self::Info,
        Self::Success,
        Self::Warning,
        Self::Error,
        Self::Critical,
    ];

    /// Returns the canonical upper-case name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "TRACE",
            Self::Debug => "DEBUG",
            Self::Info => "INFO",
            Self::Success => "SUCCESS",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
            Self::Critical => "CRITICAL",
        }
    }

    /// Returns a short marker used when rendering chat messages.
    #[must_use]
    pub const fn emoji(&self) -> &'static str {
        match self {
            Self::Trace => "📝",
            Self::Debug => "🔍",
            Self::Info => "ℹ️",
            Self::Success => "✅",
            Self::Warning => "⚠️",
            Self::Error => "❌",
            Self::Critical => "🚨",
        }
    }

    /// Returns the accent colour used in HTML renderings.
    #[must_use]
    pub const fn color(&self) -> &'static str {
        match self {
            Self::Trace | Self::Debug => "#6c757d",
            Self::Info => "#0dcaf0",
            Self::Success => "#198754",
            Self::Warning => "#ffc107",
            Self::Error => "#dc3545",
            Self::Critical => "#8b0000",
        }
    }

    /// Maps a `tracing` level onto the severity scale.
    #[must_use]
    pub fn from_tracing(level: tracing::Level) -> Self {
        match level {
            tracing::Level::TRACE => Self::Trace,
            tracing::Level::DEBUG => Self::Debug,
            tracing::Level::INFO => Self::Info,
            tracing::Level::WARN => Self::Warning,
            tracing::Level::ERROR => Self::Error,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = AlertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TRACE" => Ok(Self::Trace),
            "DEBUG" => Ok(Self::Debug),
            "INFO" => Ok(Self::Info),
            "SUCCESS" => Ok(Self::Success),
            "WARNING" | "WARN" => Ok(Self::Warning),
            "ERROR" => Ok(Self::Error),
            "CRITICAL" | "FATAL" => Ok(Self::Critical),
            _ => Err(AlertError::UnknownSeverity {
                name: s.to_string(),
            }),
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse().map_err(serde::de::Error::custom)
    }
}

/// Per-call delivery override.
///
/// `ForceSend` and `ForceSuppress` beat every channel level filter; only a
/// disabled channel ignores them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Override {
    /// Let each channel's level filter decide.
    #[default]
    Unset,
    /// Deliver regardless of level filters.
    ForceSend,
    /// Never deliver.
    ForceSuppress,
}

impl Override {
    /// Returns the forced verdict, if any.
    #[must_use]
    pub const fn forced(self) -> Option<bool> {
        match self {
            Self::Unset => None,
            Self::ForceSend => Some(true),
            Self::ForceSuppress => Some(false),
        }
    }
}

impl From<Option<bool>> for Override {
    fn from(flag: Option<bool>) -> Self {
        match flag {
            None => Self::Unset,
            Some(true) => Self::ForceSend,
            Some(false) => Self::ForceSuppress,
        }
    }
}

impl From<bool> for Override {
    fn from(flag: bool) -> Self {
        Self::from(Some(flag))
    }
}

/// Where a log record was emitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Module path.
    pub module: Option<String>,
    /// Function name.
    pub function: Option<String>,
    /// Line number.
    pub line: Option<u32>,
}

impl SourceLocation {
    /// Returns true if no part of the location is known.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.module.is_none() && self.function.is_none() && self.line.is_none()
    }
}

/// One notification-worthy event derived from a log record.
///
/// Alerts are immutable once built; construct them with [`Alert::builder`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    id: Uuid,
    level: Severity,
    message: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    fields: BTreeMap<String, serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    source: Option<SourceLocation>,
    #[serde(default, rename = "override")]
    override_flag: Override,
}

impl Alert {
    /// Creates an alert with no fields, no source and no override.
    #[must_use]
    pub fn new(level: Severity, message: impl Into<String>) -> Self {
        Self::builder(level, message).build()
    }

    /// Starts building an alert.
    pub fn builder(level: Severity, message: impl Into<String>) -> AlertBuilder {
        AlertBuilder::new(level, message)
    }

    /// Unique identifier, used to correlate log lines for one dispatch.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Severity of the originating record.
    #[must_use]
    pub const fn level(&self) -> Severity {
        self.level
    }

    /// Message text.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Capture time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Structured fields attached to the record.
    #[must_use]
    pub const fn fields(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.fields
    }

    /// Fields meant for display: keys starting with `_` are internal.
    pub fn visible_fields(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.fields.iter().filter(|(k, _)| !k.starts_with('_'))
    }

    /// Source location, when known.
    #[must_use]
    pub const fn source(&self) -> Option<&SourceLocation> {
        self.source.as_ref()
    }

    /// The per-call override.
    #[must_use]
    pub const fn override_flag(&self) -> Override {
        self.override_flag
    }
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.level, self.message)
    }
}

/// Builder for [`Alert`].
#[derive(Debug)]
pub struct AlertBuilder {
    level: Severity,
    message: String,
    timestamp: Option<DateTime<Utc>>,
    fields: BTreeMap<String, serde_json::Value>,
    source: Option<SourceLocation>,
    override_flag: Override,
}

impl AlertBuilder {
    fn new(level: Severity, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: None,
            fields: BTreeMap::new(),
            source: None,
            override_flag: Override::Unset,
        }
    }

    /// Sets the capture time; defaults to the moment `build` is called.
    #[must_use]
    pub const fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Adds one structured field.
    #[must_use]
    pub fn field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Adds every entry of a field map.
    #[must_use]
    pub fn fields<I, K>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        self.fields
            .extend(fields.into_iter().map(|(k, v)| (k.into(), v)));
        self
    }

    /// Sets the source location; an empty location is dropped.
    #[must_use]
    pub fn source(mut self, source: SourceLocation) -> Self {
        self.source = (!source.is_empty()).then_some(source);
        self
    }

    /// Sets the per-call override.
    #[must_use]
    pub fn override_flag(mut self, flag: impl Into<Override>) -> Self {
        self.override_flag = flag.into();
        self
    }

    /// Builds the alert.
    #[must_use]
    pub fn build(self) -> Alert {
        Alert {
            id: Uuid::new_v4(),
            level: self.level,
            message: self.message,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            fields: self.fields,
            source: self.source,
            override_flag: self.override_flag,
        }
    }
}
