//! Send command implementation.
//!
//! Builds a manager from the loaded configuration and dispatches one alert.

use std::collections::BTreeMap;
use std::io::Write;

use tocsin_alerts::{AlertManager, AlertsConfig};
use tracing::info;

use crate::cli::SendArgs;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for the send command.
pub struct SendCommand<'a> {
    config: &'a AlertsConfig,
}

impl<'a> SendCommand<'a> {
    /// Creates a new send command handler.
    #[must_use]
    pub const fn new(config: &'a AlertsConfig) -> Self {
        Self { config }
    }

    /// Dispatches the alert and prints the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is rejected, or
    /// `CliError::Undelivered` when channels were attempted and none
    /// delivered.
    pub async fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        args: &SendArgs,
    ) -> Result<(), CliError> {
        let manager = AlertManager::from_config(self.config)?;
        if let Some(strategy) = args.strategy {
            manager.set_strategy(strategy);
        }

        let fields: BTreeMap<_, _> = args.fields.iter().cloned().collect();
        info!(level = %args.level, channels = manager.channel_count(), "sending alert");
        let result = manager
            .dispatch(args.level, &args.message, args.override_flag(), fields)
            .await?;
        manager.shutdown();

        format.write(out, &result)?;

        if result.succeeded == 0 && result.failed > 0 {
            return Err(CliError::Undelivered {
                failed: result.failed,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    use crate::cli::{Cli, Commands, Format};

    fn args(argv: &[&str]) -> SendArgs {
        let cli = Cli::parse_from(["tocsin", "send"].iter().chain(argv));
        match cli.command {
            Commands::Send(args) => args,
            _ => panic!("expected send command"),
        }
    }

    fn log_config() -> AlertsConfig {
        serde_json::from_value(serde_json::json!({
            "retry_delay_secs": 0.0,
            "channels": [
                { "type": "log", "name": "ops", "levels": ["ERROR", "CRITICAL"] }
            ]
        }))
        .unwrap()
    }

    async fn run(config: &AlertsConfig, argv: &[&str]) -> (Result<(), CliError>, serde_json::Value) {
        let mut out = Vec::new();
        let format = OutputFormat::new(Format::Json);
        let result = SendCommand::new(config).execute(&mut out, &format, &args(argv)).await;
        let json = if out.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&out).unwrap()
        };
        (result, json)
    }

    #[tokio::test]
    async fn error_alert_is_delivered() {
        let (result, json) = run(&log_config(), &["-m", "db down", "--field", "host=db-1"]).await;
        assert!(result.is_ok());
        assert_eq!(json["succeeded"], 1);
    }

    #[tokio::test]
    async fn info_alert_is_skipped() {
        let (result, json) = run(&log_config(), &["-l", "info", "-m", "deployed"]).await;
        assert!(result.is_ok());
        assert_eq!(json["skipped"], 1);
    }

    #[tokio::test]
    async fn forced_info_alert_is_delivered() {
        let (result, json) = run(&log_config(), &["-l", "info", "-m", "deployed", "--force"]).await;
        assert!(result.is_ok());
        assert_eq!(json["succeeded"], 1);
    }

    #[tokio::test]
    async fn suppressed_critical_is_skipped() {
        let (_, json) = run(&log_config(), &["-l", "critical", "-m", "x", "--suppress"]).await;
        assert_eq!(json["skipped"], 1);
    }

    #[tokio::test]
    async fn strategy_flag_overrides_config() {
        let (_, json) = run(&log_config(), &["-m", "x", "-s", "sequential"]).await;
        assert_eq!(json["strategy"], "sequential");
    }

    #[tokio::test]
    async fn no_channels_reports_note() {
        let (result, json) = run(&AlertsConfig::default(), &["-m", "x"]).await;
        assert!(result.is_ok());
        assert_eq!(json["note"], "no channels configured");
    }

    #[tokio::test]
    async fn undeliverable_alert_is_an_error() {
        let config: AlertsConfig = serde_json::from_value(serde_json::json!({
            "max_retries": 1,
            "channels": [
                { "type": "webhook", "name": "dead", "levels": ["ERROR"], "url": "http://127.0.0.1:1/hook", "timeout": 1.0 }
            ]
        }))
        .unwrap();

        let (result, json) = run(&config, &["-m", "x"]).await;
        assert!(matches!(result, Err(CliError::Undelivered { failed: 1 })));
        assert_eq!(json["failed"], 1);
    }

    #[tokio::test]
    async fn invalid_channel_is_a_config_error() {
        let config: AlertsConfig = serde_json::from_value(serde_json::json!({
            "channels": [ { "type": "carrier_pigeon" } ]
        }))
        .unwrap();

        let (result, _) = run(&config, &["-m", "x"]).await;
        assert!(matches!(result, Err(CliError::Alerts(_))));
    }
}
