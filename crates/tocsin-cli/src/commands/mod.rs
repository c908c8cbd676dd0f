//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`send`] - Dispatch a single alert
//! - [`check`] - Configuration validation
//! - [`kinds`] - Channel kind listing

pub mod check;
pub mod kinds;
pub mod send;

pub use check::CheckCommand;
pub use kinds::KindsCommand;
pub use send::SendCommand;
