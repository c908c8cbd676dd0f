//! # tocsin-cli
//!
//! Command-line front end for `tocsin-alerts`.
//!
//! Provides commands for:
//! - Sending a test alert through the configured channels
//! - Validating an alert configuration
//! - Listing the available channel kinds
//!
//! Configuration is read from a TOML or JSON file given with `--config`
//! (or `TOCSIN_CONFIG`), with `TOCSIN_`-prefixed environment overrides.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format, SendArgs};
pub use error::CliError;
pub use output::OutputFormat;
