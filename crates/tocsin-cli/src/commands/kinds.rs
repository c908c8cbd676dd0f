//! Kinds command implementation.

use std::io::Write;

use tocsin_alerts::AlertManager;

use crate::error::CliError;
use crate::output::{KindList, OutputFormat};

/// Handler for the kinds command.
#[derive(Debug, Default)]
pub struct KindsCommand;

impl KindsCommand {
    /// Creates a new kinds command handler.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Prints the channel kinds a configuration may use.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn execute<W: Write>(&self, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let kinds = KindList {
            kinds: AlertManager::new().registered_kinds(),
        };
        format.write(out, &kinds)
    }
}
