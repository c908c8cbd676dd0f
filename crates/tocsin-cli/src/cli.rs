//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tocsin_alerts::{DispatchStrategy, Severity};

/// Tocsin - multi-channel alert dispatch.
#[derive(Parser, Debug, Clone)]
#[command(name = "tocsin")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Alert configuration file (TOML or JSON).
    #[arg(short, long, value_name = "FILE", env = "TOCSIN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Dispatch one alert through the configured channels.
    Send(SendArgs),

    /// Validate the configuration and list channels in dispatch order.
    Check,

    /// List the channel kinds that can be configured.
    Kinds,
}

/// Arguments for the send command.
#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// Alert severity (TRACE, DEBUG, INFO, SUCCESS, WARNING, ERROR, CRITICAL).
    #[arg(short, long, default_value = "ERROR")]
    pub level: Severity,

    /// Alert message.
    #[arg(short, long)]
    pub message: String,

    /// Send regardless of channel levels.
    #[arg(long, conflicts_with = "suppress")]
    pub force: bool,

    /// Do not send, whatever the channel levels say.
    #[arg(long)]
    pub suppress: bool,

    /// Structured field attached to the alert (repeatable).
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, serde_json::Value)>,

    /// Override the configured dispatch strategy.
    #[arg(short, long)]
    pub strategy: Option<DispatchStrategy>,
}

impl SendArgs {
    /// The override implied by `--force` / `--suppress`.
    #[must_use]
    pub const fn override_flag(&self) -> Option<bool> {
        match (self.force, self.suppress) {
            (true, _) => Some(true),
            (false, true) => Some(false),
            (false, false) => None,
        }
    }
}

/// Parses `KEY=VALUE`. Values that read as JSON scalars keep their type.
fn parse_field(raw: &str) -> Result<(String, serde_json::Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    if key.is_empty() {
        return Err(format!("empty key in '{raw}'"));
    }

    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(parsed) if !parsed.is_object() && !parsed.is_array() => parsed,
        _ => serde_json::Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}
