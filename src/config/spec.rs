//! Configuration specification types for guest reconciliation.
//!
//! This module defines the structs that map to the `guestctl.yaml` file:
//! the vCenter connection parameters and the desired state of one guest.
//! The desired spec is immutable input to a single reconciliation run.

use serde::{Deserialize, Serialize};

/// The root configuration structure for a guestctl run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestctlConfig {
    /// vCenter connection parameters.
    pub vcenter: VcenterConfig,
    /// Desired state of the managed guest.
    pub guest: GuestSpec,
}

/// vCenter connection parameters.
///
/// The password is never part of the file; it is sourced from the
/// `VSPHERE_PASSWORD` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VcenterConfig {
    /// Hostname of the vCenter server.
    pub host: String,
    /// Port the API is accessible on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Username to connect as.
    pub username: String,
    /// Whether to accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,
}

/// Desired state of a single guest VM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuestSpec {
    /// Name of the guest to create or manage.
    pub name: String,
    /// Name of the source template to deploy from.
    pub template: String,
    /// Name of the datacenter the guest lives in.
    pub datacenter: String,
    /// Name of the cluster, required for pool migration.
    #[serde(default)]
    pub cluster: Option<String>,
    /// Name of the desired resource pool (suffix form accepted by the
    /// pool matcher, e.g. `/Resources` or `Prod`).
    pub resource_pool: String,
    /// Name of the desired folder.
    pub folder: String,
    /// Name of the datastore, used at creation only.
    pub datastore: String,
    /// Annotation text to set on the guest.
    #[serde(default)]
    pub notes: String,
    /// Number of virtual CPUs the guest should have.
    #[serde(default = "default_num_cpus")]
    pub num_cpus: u32,
    /// Memory size in MB the guest should have.
    #[serde(default = "default_memory_mb")]
    pub memory_mb: u64,
    /// Whether to power the guest on after creation.
    #[serde(default = "default_power_on")]
    pub power_on_after_create: bool,
    /// Optional in-guest tools policy.
    #[serde(default)]
    pub tools: Option<ToolsConfig>,
}

/// Desired policy for the in-guest tools agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolsConfig {
    /// Desired tools state.
    #[serde(default)]
    pub state: ToolsPolicy,
    /// Command line options passed to the tools installer.
    #[serde(default)]
    pub installer_options: String,
}

/// Tools policy options.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolsPolicy {
    /// Tools must be installed; their version is not checked.
    #[default]
    Present,
    /// Tools must be installed and current, upgrading when necessary.
    Latest,
    /// Tools must not be installed.
    Absent,
}

// Default value functions

const fn default_port() -> u16 {
    443
}

const fn default_num_cpus() -> u32 {
    2
}

const fn default_memory_mb() -> u64 {
    4096
}

const fn default_power_on() -> bool {
    true
}

impl GuestctlConfig {
    /// Returns the server identity used in operator-facing messages.
    #[must_use]
    pub fn server(&self) -> &str {
        &self.vcenter.host
    }
}

impl GuestSpec {
    /// Returns the effective tools policy, defaulting to `present`.
    #[must_use]
    pub fn tools_policy(&self) -> ToolsPolicy {
        self.tools.as_ref().map_or_else(ToolsPolicy::default, |t| t.state)
    }

    /// Returns the installer options for tools upgrades.
    #[must_use]
    pub fn tools_installer_options(&self) -> &str {
        self.tools
            .as_ref()
            .map_or("", |t| t.installer_options.as_str())
    }
}

impl std::fmt::Display for ToolsPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Present => "present",
            Self::Latest => "latest",
            Self::Absent => "absent",
        };
        write!(f, "{s}")
    }
}
