//! Tocsin CLI binary entrypoint.
//!
//! This is the main entry point for the `tocsin` command-line tool.

use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tocsin_cli::cli::{Cli, Commands};
use tocsin_cli::commands::{CheckCommand, KindsCommand, SendCommand};
use tocsin_cli::config;
use tocsin_cli::output::OutputFormat;

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    // Parse CLI arguments
    let cli = Cli::parse();

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let format = OutputFormat::new(cli.format);
    let mut stdout = io::stdout().lock();

    match cli.command {
        Commands::Kinds => {
            KindsCommand::new().execute(&mut stdout, &format)?;
        }
        Commands::Check => {
            let config = load(&cli)?;
            CheckCommand::new(&config).execute(&mut stdout, &format)?;
        }
        Commands::Send(ref args) => {
            let config = load(&cli)?;
            SendCommand::new(&config).execute(&mut stdout, &format, args).await?;
        }
    }

    Ok(())
}

fn load(cli: &Cli) -> anyhow::Result<tocsin_alerts::AlertsConfig> {
    config::load(cli.config.as_deref()).with_context(|| match cli.config {
        Some(ref path) => format!("loading {}", path.display()),
        None => "loading configuration from the environment".to_string(),
    })
}
