//! Configuration module for the guestctl reconciliation tool.
//!
//! This module handles all configuration-related functionality:
//! - Parsing and deserializing `guestctl.yaml`
//! - Validation of configuration values
//! - Sourcing credentials from the environment

mod parser;
mod spec;
mod validator;

pub use parser::{ConfigParser, DEFAULT_CONFIG_FILES, find_config_file};
pub use spec::{GuestSpec, GuestctlConfig, ToolsConfig, ToolsPolicy, VcenterConfig};
pub use validator::{ConfigValidator, ValidationError, ValidationResult};
