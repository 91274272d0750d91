//! Configuration parser for loading the guest specification file.
//!
//! This module handles loading configuration from YAML files and
//! environment variables, with proper precedence and error handling.

use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, GuestctlError, Result};

use super::spec::GuestctlConfig;

/// Configuration parser for loading guest specifications.
#[derive(Debug, Default)]
pub struct ConfigParser {
    /// Base path for resolving relative paths.
    base_path: Option<std::path::PathBuf>,
}

impl ConfigParser {
    /// Creates a new configuration parser.
    #[must_use]
    pub const fn new() -> Self {
        Self { base_path: None }
    }

    /// Sets the base path for resolving relative paths.
    #[must_use]
    pub fn with_base_path(mut self, path: impl Into<std::path::PathBuf>) -> Self {
        self.base_path = Some(path.into());
        self
    }

    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_file(&self, path: impl AsRef<Path>) -> Result<GuestctlConfig> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(GuestctlError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            GuestctlError::Config(ConfigError::ParseError {
                message: format!("Failed to read file: {e}"),
                location: Some(path.display().to_string()),
            })
        })?;

        self.parse_yaml(&content, Some(path))
    }

    /// Parses configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is invalid.
    pub fn parse_yaml(&self, content: &str, source: Option<&Path>) -> Result<GuestctlConfig> {
        debug!("Parsing YAML configuration");

        let config: GuestctlConfig = serde_yaml::from_str(content).map_err(|e| {
            let location = source.map(|p| p.display().to_string());
            GuestctlError::Config(ConfigError::ParseError {
                message: format!("YAML parse error: {e}"),
                location,
            })
        })?;

        debug!(
            "Successfully parsed configuration for guest: {}",
            config.guest.name
        );
        Ok(config)
    }

    /// Loads configuration with environment variable overrides.
    ///
    /// Environment variables are checked in the format
    /// `GUESTCTL_<SECTION>_<KEY>` (e.g. `GUESTCTL_VCENTER_HOST`).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_with_env(&self, path: impl AsRef<Path>) -> Result<GuestctlConfig> {
        let mut config = self.load_file(path)?;

        // Apply environment overrides
        Self::apply_env_overrides(&mut config);

        Ok(config)
    }

    /// Applies environment variable overrides to the configuration.
    fn apply_env_overrides(config: &mut GuestctlConfig) {
        if let Ok(host) = std::env::var("GUESTCTL_VCENTER_HOST") {
            debug!("Overriding vcenter.host from environment");
            config.vcenter.host = host;
        }

        if let Ok(username) = std::env::var("GUESTCTL_VCENTER_USERNAME") {
            debug!("Overriding vcenter.username from environment");
            config.vcenter.username = username;
        }

        if let Ok(name) = std::env::var("GUESTCTL_GUEST_NAME") {
            debug!("Overriding guest.name from environment");
            config.guest.name = name;
        }

        if let Ok(pool) = std::env::var("GUESTCTL_GUEST_RESOURCE_POOL") {
            debug!("Overriding guest.resource_pool from environment");
            config.guest.resource_pool = pool;
        }
    }

    /// Loads the .env file if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the .env file exists but cannot be loaded.
    pub fn load_dotenv(&self) -> Result<()> {
        let env_path = self
            .base_path
            .as_ref()
            .map_or_else(|| std::path::PathBuf::from(".env"), |p| p.join(".env"));

        if env_path.exists() {
            info!("Loading environment from: {}", env_path.display());
            dotenvy::from_path(&env_path).map_err(|e| {
                GuestctlError::Config(ConfigError::ParseError {
                    message: format!("Failed to load .env file: {e}"),
                    location: Some(env_path.display().to_string()),
                })
            })?;
        } else {
            debug!(".env file not found at: {}", env_path.display());
        }

        Ok(())
    }

    /// Gets the vCenter password from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the password variable is not set.
    pub fn get_vsphere_password() -> Result<String> {
        std::env::var("VSPHERE_PASSWORD").map_err(|_| {
            GuestctlError::Config(ConfigError::MissingEnvVar {
                name: String::from("VSPHERE_PASSWORD"),
            })
        })
    }
}

/// Default configuration file names to search for.
pub const DEFAULT_CONFIG_FILES: &[&str] = &["guestctl.yaml", "guestctl.yml"];

/// Finds the configuration file in the current directory or parent
/// directories.
///
/// # Errors
///
/// Returns an error if no configuration file is found.
pub fn find_config_file(start_dir: impl AsRef<Path>) -> Result<std::path::PathBuf> {
    let start = start_dir.as_ref();
    let mut current = start.to_path_buf();

    loop {
        for filename in DEFAULT_CONFIG_FILES {
            let config_path = current.join(filename);
            if config_path.exists() {
                info!("Found configuration file: {}", config_path.display());
                return Ok(config_path);
            }
        }

        if !current.pop() {
            break;
        }
    }

    Err(GuestctlError::Config(ConfigError::FileNotFound {
        path: start.join(DEFAULT_CONFIG_FILES[0]),
    }))
}
