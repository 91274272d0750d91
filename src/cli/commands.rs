//! CLI command definitions.
//!
//! This module defines all CLI commands and their arguments using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ToolsPolicy;

/// guestctl - Declarative vSphere guest reconciliation.
#[derive(Parser, Debug)]
#[command(name = "guestctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration file.
    #[arg(short, long, global = true, env = "GUESTCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format (text, json).
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new guestctl configuration.
    Init {
        /// Directory to initialize (defaults to current directory).
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Force overwrite existing files.
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the guest configuration.
    Validate {
        /// Show all warnings, not just errors.
        #[arg(short, long)]
        warnings: bool,
    },

    /// Report the pending changes without applying them.
    Plan,

    /// Reconcile the guest to the desired state.
    Apply {
        /// Skip confirmation prompt.
        #[arg(short, long)]
        yes: bool,

        /// Per-task deadline in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Show the observed facts of the guest.
    Facts,

    /// Migrate the guest to the configured resource pool within its
    /// cluster, matching the pool by path suffix.
    MigratePool {
        /// Report the migration without applying it.
        #[arg(long)]
        dry_run: bool,

        /// Submit the migration without waiting for completion.
        #[arg(long)]
        no_wait: bool,

        /// Per-task deadline in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Check the in-guest tools status, upgrading when the policy allows.
    Tools {
        /// Override the configured tools policy.
        #[arg(long, value_enum)]
        state: Option<ToolsStateArg>,

        /// Report the upgrade without applying it.
        #[arg(long)]
        dry_run: bool,

        /// Per-task deadline in seconds.
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for scripting.
    Json,
}

/// Tools policy argument values.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ToolsStateArg {
    /// Tools must be installed.
    Present,
    /// Tools must be installed and current.
    Latest,
    /// Tools must not be installed.
    Absent,
}

impl From<ToolsStateArg> for ToolsPolicy {
    fn from(arg: ToolsStateArg) -> Self {
        match arg {
            ToolsStateArg::Present => Self::Present,
            ToolsStateArg::Latest => Self::Latest,
            ToolsStateArg::Absent => Self::Absent,
        }
    }
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
