//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;
use tocsin_alerts::{ChannelEntry, DispatchResult, DispatchSettings};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone, Default)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

impl TableDisplay for DispatchResult {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Dispatch ({})", self.strategy)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "  Channels:       {}", self.total)?;
        writeln!(writer, "  Succeeded:      {}", self.succeeded)?;
        writeln!(writer, "  Failed:         {}", self.failed)?;
        writeln!(writer, "  Skipped:        {}", self.skipped)?;
        if let Some(ref note) = self.note {
            writeln!(writer, "  Note:           {note}")?;
        }

        if self.outcomes.is_empty() {
            return Ok(());
        }

        writeln!(writer)?;
        writeln!(
            writer,
            "{:<24}  {:>8}  {:>8}  {:<9}  ERROR",
            "CHANNEL", "PRIORITY", "ATTEMPTS", "RESULT"
        )?;
        writeln!(writer, "{}", "─".repeat(72))?;
        for outcome in &self.outcomes {
            let result = if outcome.skipped {
                "skipped"
            } else if outcome.succeeded {
                "delivered"
            } else {
                "failed"
            };
            writeln!(
                writer,
                "{:<24}  {:>8}  {:>8}  {:<9}  {}",
                truncate(&outcome.channel, 24),
                outcome.priority,
                outcome.attempts,
                result,
                outcome.error.as_deref().unwrap_or("-")
            )?;
        }

        let unattempted = self.total.saturating_sub(self.attempted());
        if unattempted > 0 {
            writeln!(writer)?;
            writeln!(writer, "{unattempted} channel(s) not attempted")?;
        }
        Ok(())
    }
}

/// One configured channel, as listed by `check`.
#[derive(Debug, Clone, Serialize)]
pub struct ChannelRow {
    /// Channel name.
    pub name: String,
    /// Channel kind.
    pub kind: String,
    /// Whether the channel is enabled.
    pub enabled: bool,
    /// Dispatch priority.
    pub priority: i32,
    /// Accepted levels; `None` means only forced alerts.
    pub levels: Option<Vec<String>>,
}

impl From<&ChannelEntry> for ChannelRow {
    fn from(entry: &ChannelEntry) -> Self {
        Self {
            name: entry.name().to_string(),
            kind: entry.config.kind.clone(),
            enabled: entry.config.enabled,
            priority: entry.priority(),
            levels: entry
                .config
                .levels
                .as_ref()
                .map(|levels| levels.iter().map(ToString::to_string).collect()),
        }
    }
}

/// Validated configuration summary.
#[derive(Debug, Clone, Serialize)]
pub struct ConfigReport {
    /// Dispatch strategy.
    pub strategy: String,
    /// Attempts per channel.
    pub max_retries: u32,
    /// Pause between attempts, in seconds.
    pub retry_delay_secs: f64,
    /// Per-attempt timeout, in seconds.
    pub timeout_secs: f64,
    /// Parallel worker pool size.
    pub workers: usize,
    /// Channels in dispatch order.
    pub channels: Vec<ChannelRow>,
}

impl ConfigReport {
    /// Builds a report from validated settings and a channel snapshot.
    #[must_use]
    pub fn new(settings: &DispatchSettings, channels: &[ChannelEntry]) -> Self {
        Self {
            strategy: settings.strategy.to_string(),
            max_retries: settings.max_retries,
            retry_delay_secs: settings.retry_delay.as_secs_f64(),
            timeout_secs: settings.timeout.as_secs_f64(),
            workers: settings.workers,
            channels: channels.iter().map(ChannelRow::from).collect(),
        }
    }
}

impl TableDisplay for ConfigReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Configuration OK")?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "  Strategy:       {}", self.strategy)?;
        writeln!(writer, "  Max Retries:    {}", self.max_retries)?;
        writeln!(writer, "  Retry Delay:    {}s", self.retry_delay_secs)?;
        writeln!(writer, "  Timeout:        {}s", self.timeout_secs)?;
        writeln!(writer, "  Workers:        {}", self.workers)?;
        writeln!(writer)?;

        if self.channels.is_empty() {
            writeln!(writer, "No channels configured")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<24}  {:<14}  {:>8}  {:<8}  LEVELS",
            "NAME", "KIND", "PRIORITY", "ENABLED"
        )?;
        writeln!(writer, "{}", "─".repeat(72))?;
        for channel in &self.channels {
            let levels = channel
                .levels
                .as_ref()
                .map_or_else(|| "(forced only)".to_string(), |l| l.join(","));
            writeln!(
                writer,
                "{:<24}  {:<14}  {:>8}  {:<8}  {}",
                truncate(&channel.name, 24),
                channel.kind,
                channel.priority,
                if channel.enabled { "yes" } else { "no" },
                levels
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} channel(s)", self.channels.len())?;
        Ok(())
    }
}

/// Registered channel kinds.
#[derive(Debug, Clone, Serialize)]
pub struct KindList {
    /// Kind names, built-ins first.
    pub kinds: Vec<String>,
}

impl TableDisplay for KindList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Channel Kinds")?;
        writeln!(writer, "══════════════════════════════════")?;
        for kind in &self.kinds {
            writeln!(writer, "  {kind}")?;
        }
        Ok(())
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
        out.push('…');
        out
    }
}
