//! Tooling & Integration Layer
//!
//! The command-line interface and the text formatting of its results.

pub mod cli;
pub mod format;

pub use cli::{Cli, CliContext, Commands, ConfigCommands};
