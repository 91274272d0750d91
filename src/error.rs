//! Error types for the guestctl reconciliation engine.
//!
//! This module provides the error hierarchy for every operation in the
//! reconciliation lifecycle: configuration, connection, inventory lookup,
//! change gating, and backend task tracking. None of these errors is
//! retried automatically; each one is a terminal, user-visible outcome.

use std::path::PathBuf;
use thiserror::Error;

use crate::vsphere::{ObjectKind, PowerState};

/// The main error type for guestctl operations.
#[derive(Debug, Error)]
pub enum GuestctlError {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The initial handshake with the vCenter server failed.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// A referenced inventory object is absent.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// A hardware change was requested while the VM is powered on.
    #[error("{0}")]
    UnsafeChange(#[from] UnsafeChangeError),

    /// A backend task reached a terminal failure, or waiting stopped early.
    #[error("Task error: {0}")]
    Task(#[from] TaskError),

    /// Transport or protocol failure talking to the vCenter API.
    #[error("vCenter API error: {0}")]
    Api(#[from] ApiError),

    /// The desired tools policy contradicts the observed tools status.
    #[error("{0}")]
    ToolsState(#[from] ToolsStateError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration-related errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {path}")]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The configuration file could not be parsed.
    #[error("Failed to parse configuration: {message}")]
    ParseError {
        /// Description of the parse error.
        message: String,
        /// Optional source location.
        location: Option<String>,
    },

    /// Validation failed.
    #[error("Configuration validation failed: {message}")]
    ValidationError {
        /// Description of the validation error.
        message: String,
        /// Field that failed validation.
        field: Option<String>,
    },

    /// Environment variable is missing.
    #[error("Missing environment variable: {name}")]
    MissingEnvVar {
        /// Name of the missing variable.
        name: String,
    },
}

/// The initial connection to the vCenter server failed.
///
/// Raised at entry, before any operation is attempted.
#[derive(Debug, Error)]
#[error("failed to connect to vCenter server at {host} with user {username}: {message}")]
pub struct ConnectionError {
    /// Hostname of the vCenter server.
    pub host: String,
    /// Username the connection was attempted as.
    pub username: String,
    /// Description of the underlying failure.
    pub message: String,
}

/// A referenced cluster, pool, datastore, folder, template or guest is
/// absent from the inventory.
#[derive(Debug, Clone, Error)]
#[error("{kind} {name} not found on vCenter server at {server}")]
pub struct NotFoundError {
    /// Kind of the missing object.
    pub kind: ObjectKind,
    /// Name the lookup was performed with.
    pub name: String,
    /// Identity of the server that was searched.
    pub server: String,
}

/// A hardware change was requested while the VM is powered on.
///
/// The message enumerates every pending change so the operator can power
/// off once and retry once.
#[derive(Debug, Error)]
#[error("cannot apply changes while the VM is {power_state}: {}", .changes.join("; "))]
pub struct UnsafeChangeError {
    /// Power state that blocked the change-set.
    pub power_state: PowerState,
    /// Every pending change description.
    pub changes: Vec<String>,
}

/// Errors from the backend task tracking state machine.
#[derive(Debug, Error)]
pub enum TaskError {
    /// The backend reported a terminal failure status.
    #[error("{message}")]
    Failed {
        /// Classified, user-facing failure message.
        message: String,
        /// Backend fault kind the classification was derived from.
        kind: String,
    },

    /// Polling was cancelled by the caller.
    ///
    /// This only stops observation; the backend task may still run to
    /// completion remotely.
    #[error("task polling cancelled; the backend task may still run to completion")]
    Cancelled,

    /// The caller-supplied deadline elapsed before a terminal status.
    #[error("task did not reach a terminal state within {waited_secs} seconds")]
    DeadlineExceeded {
        /// Seconds spent polling before giving up.
        waited_secs: u64,
    },
}

/// Transport and protocol errors from the vCenter API client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The API returned a non-success status code.
    #[error("request failed: {status} - {message}")]
    RequestFailed {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// Network-level failure reaching the server.
    #[error("network error: {message}")]
    Network {
        /// Description of the network error.
        message: String,
    },

    /// The response body did not match the expected shape.
    #[error("invalid response: {message}")]
    InvalidResponse {
        /// Description of the response issue.
        message: String,
    },
}

/// The desired tools policy contradicts the observed tools status.
#[derive(Debug, Error)]
#[error("guest VM \"{guest}\" has the tools state \"{policy}\", but the current status of the tools is \"{status}\"")]
pub struct ToolsStateError {
    /// Name of the guest VM.
    pub guest: String,
    /// Requested tools policy.
    pub policy: String,
    /// Observed tools status.
    pub status: String,
}

/// Result type alias for guestctl operations.
pub type Result<T> = std::result::Result<T, GuestctlError>;

impl GuestctlError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Creates a validation error for a specific field.
    #[must_use]
    pub fn validation(message: impl Into<String>, field: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Creates a validation error without a specific field.
    #[must_use]
    pub fn validation_general(message: impl Into<String>) -> Self {
        Self::ValidationError {
            message: message.into(),
            field: None,
        }
    }
}

impl NotFoundError {
    /// Creates a not-found error for the given object kind and name.
    #[must_use]
    pub fn new(kind: ObjectKind, name: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            server: server.into(),
        }
    }
}

impl ApiError {
    /// Creates an API request error.
    #[must_use]
    pub fn request(status: u16, message: impl Into<String>) -> Self {
        Self::RequestFailed {
            status,
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Creates an invalid-response error.
    #[must_use]
    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }
}
