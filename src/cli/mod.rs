//! CLI module for the guestctl tool.
//!
//! This module provides the command-line interface for reconciling
//! vSphere guests against their desired specification.

mod commands;
mod output;

pub use commands::{Cli, Commands, OutputFormat, ToolsStateArg};
pub use output::OutputFormatter;
