//! Configuration validation for guest specifications.
//!
//! This module validates a parsed configuration before any connection is
//! attempted, so obviously broken specs never reach the backend.

use tracing::debug;

use crate::error::{ConfigError, GuestctlError, Result};

use super::spec::{GuestSpec, GuestctlConfig, VcenterConfig};

/// Maximum virtual CPU count accepted by the validator.
const MAX_NUM_CPUS: u32 = 128;

/// Minimum memory size in MB accepted by the validator.
const MIN_MEMORY_MB: u64 = 4;

/// Maximum length of a guest name.
const MAX_NAME_LEN: usize = 80;

/// Validator for guest configurations.
#[derive(Debug, Default)]
pub struct ConfigValidator;

/// Validation result containing all issues found.
#[derive(Debug, Default)]
pub struct ValidationResult {
    /// List of validation errors.
    pub errors: Vec<ValidationError>,
    /// List of warnings (non-fatal issues).
    pub warnings: Vec<String>,
}

/// A single validation error.
#[derive(Debug)]
pub struct ValidationError {
    /// The field path that failed validation.
    pub field: String,
    /// The error message.
    pub message: String,
}

impl ValidationResult {
    /// Returns true if no errors were found.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

impl ConfigValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a guest configuration.
    ///
    /// # Errors
    ///
    /// Returns an error carrying the first validation failure; the full
    /// list is available in the returned result on success.
    pub fn validate(&self, config: &GuestctlConfig) -> Result<ValidationResult> {
        let mut result = ValidationResult::default();

        Self::validate_vcenter(&config.vcenter, &mut result);
        Self::validate_guest(&config.guest, &mut result);

        if result.errors.is_empty() {
            debug!("Configuration validation passed");
            Ok(result)
        } else {
            let first_error = &result.errors[0];
            Err(GuestctlError::Config(ConfigError::ValidationError {
                message: first_error.message.clone(),
                field: Some(first_error.field.clone()),
            }))
        }
    }

    /// Validates the vCenter connection parameters.
    fn validate_vcenter(vcenter: &VcenterConfig, result: &mut ValidationResult) {
        if vcenter.host.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("vcenter.host"),
                message: String::from("vCenter hostname cannot be empty"),
            });
        }

        if vcenter.username.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("vcenter.username"),
                message: String::from("vCenter username cannot be empty"),
            });
        }

        if vcenter.port == 0 {
            result.errors.push(ValidationError {
                field: String::from("vcenter.port"),
                message: String::from("vCenter port cannot be 0"),
            });
        }

        if vcenter.insecure {
            result.warnings.push(String::from(
                "vcenter.insecure: TLS certificate verification is disabled",
            ));
        }
    }

    /// Validates the desired guest specification.
    fn validate_guest(guest: &GuestSpec, result: &mut ValidationResult) {
        Self::validate_name(&guest.name, result);

        for (field, value) in [
            ("guest.template", &guest.template),
            ("guest.datacenter", &guest.datacenter),
            ("guest.resource_pool", &guest.resource_pool),
            ("guest.folder", &guest.folder),
            ("guest.datastore", &guest.datastore),
        ] {
            if value.is_empty() {
                result.errors.push(ValidationError {
                    field: String::from(field),
                    message: format!("{field} cannot be empty"),
                });
            }
        }

        if guest.num_cpus == 0 {
            result.errors.push(ValidationError {
                field: String::from("guest.num_cpus"),
                message: String::from("Guest must have at least 1 CPU"),
            });
        } else if guest.num_cpus > MAX_NUM_CPUS {
            result.errors.push(ValidationError {
                field: String::from("guest.num_cpus"),
                message: format!("Guest CPU count {} exceeds {MAX_NUM_CPUS}", guest.num_cpus),
            });
        }

        if guest.memory_mb < MIN_MEMORY_MB {
            result.errors.push(ValidationError {
                field: String::from("guest.memory_mb"),
                message: format!(
                    "Guest memory {} MB is below the minimum of {MIN_MEMORY_MB} MB",
                    guest.memory_mb
                ),
            });
        }
    }

    /// Validates the guest name itself.
    fn validate_name(name: &str, result: &mut ValidationResult) {
        if name.is_empty() {
            result.errors.push(ValidationError {
                field: String::from("guest.name"),
                message: String::from("Guest name cannot be empty"),
            });
            return;
        }

        if name.len() > MAX_NAME_LEN {
            result.errors.push(ValidationError {
                field: String::from("guest.name"),
                message: format!("Guest name exceeds {MAX_NAME_LEN} characters"),
            });
        }

        if name.contains('/') || name.contains('\\') {
            result.errors.push(ValidationError {
                field: String::from("guest.name"),
                message: format!("Guest name '{name}' must not contain path separators"),
            });
        }
    }
}
