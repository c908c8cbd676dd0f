//! Check command implementation.

use std::io::Write;

use tocsin_alerts::{AlertManager, AlertsConfig};

use crate::error::CliError;
use crate::output::{ConfigReport, OutputFormat};

/// Handler for the check command.
pub struct CheckCommand<'a> {
    config: &'a AlertsConfig,
}

impl<'a> CheckCommand<'a> {
    /// Creates a new check command handler.
    #[must_use]
    pub const fn new(config: &'a AlertsConfig) -> Self {
        Self { config }
    }

    /// Builds every configured channel and prints them in dispatch order.
    ///
    /// # Errors
    ///
    /// Returns the first settings or channel construction error.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let manager = AlertManager::from_config(self.config)?;
        let report = ConfigReport::new(&manager.settings(), &manager.channels());
        format.write(out, &report)
    }
}
