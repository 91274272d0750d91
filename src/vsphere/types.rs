//! vCenter API types and data structures.
//!
//! This module defines the wire types used for communication with the
//! vCenter Automation API: inventory references, VM detail payloads,
//! task statuses and the request bodies for submitted work.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fault kind reported by the backend when a name collision occurs.
pub const DUPLICATE_NAME_FAULT: &str = "DuplicateName";

/// Kinds of inventory objects that can be looked up by name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A virtual machine or template.
    VirtualMachine,
    /// A datacenter.
    Datacenter,
    /// A datastore.
    Datastore,
    /// A VM folder.
    Folder,
    /// A resource pool.
    ResourcePool,
    /// A compute cluster.
    Cluster,
}

/// An opaque reference to an inventory object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Kind of the referenced object.
    pub kind: ObjectKind,
    /// Backend identifier (e.g. `vm-1042`, `resgroup-8`).
    pub id: String,
}

/// Power state of a virtual machine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    /// The VM is running.
    PoweredOn,
    /// The VM is shut down.
    PoweredOff,
    /// The VM is suspended.
    Suspended,
}

/// Backend-reported status of the in-guest tools agent.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolsStatus {
    /// Tools have never been installed.
    #[serde(rename = "guestToolsNotInstalled")]
    NotInstalled,
    /// Tools are installed but an upgrade is available.
    #[serde(rename = "guestToolsNeedUpgrade")]
    NeedsUpgrade,
    /// Tools are outdated but still supported.
    #[serde(rename = "guestToolsSupportedOld")]
    SupportedOld,
    /// Tools are too old to be supported.
    #[serde(rename = "guestToolsTooOld")]
    TooOld,
    /// The installed tools version is blacklisted.
    #[serde(rename = "guestToolsBlacklisted")]
    Blacklisted,
    /// Tools are up to date.
    #[serde(rename = "guestToolsCurrent")]
    Current,
    /// Tools are managed outside the platform.
    #[serde(rename = "guestToolsUnmanaged")]
    Unmanaged,
}

/// Opaque identifier of an asynchronous backend task.
///
/// A handle lives for a single reconciliation run and is discarded once
/// its outcome has been observed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskHandle(String);

/// Status of an asynchronous backend task, as reported by polling.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "status")]
pub enum TaskStatus {
    /// The task is queued and has not started running.
    #[serde(rename = "PENDING")]
    Pending,
    /// The task is running.
    #[serde(rename = "RUNNING")]
    Running {
        /// Completion percentage, when the backend reports one.
        #[serde(default)]
        progress: Option<u8>,
    },
    /// The task completed successfully.
    #[serde(rename = "SUCCEEDED")]
    Succeeded {
        /// Opaque result payload (e.g. the identifier of a created VM).
        #[serde(default)]
        result: serde_json::Value,
    },
    /// The task reached a terminal failure.
    #[serde(rename = "FAILED")]
    Failed {
        /// Fault details for classification.
        fault: TaskFault,
    },
}

/// Fault details of a failed backend task.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskFault {
    /// Backend fault kind (e.g. `DuplicateName`).
    pub kind: String,
    /// Backend-supplied message, when present.
    #[serde(default)]
    pub message: Option<String>,
    /// Name of the conflicting object, for name-collision faults.
    #[serde(default)]
    pub name: Option<String>,
}

/// An inventory listing entry: identifier plus display name.
///
/// The id key differs per endpoint (`vm`, `datastore`, `folder`, ...);
/// the aliases fold them onto one field.
#[derive(Debug, Clone, Deserialize)]
pub struct InventoryItem {
    /// Backend identifier of the object.
    #[serde(
        alias = "vm",
        alias = "datacenter",
        alias = "datastore",
        alias = "folder",
        alias = "resource_pool",
        alias = "cluster"
    )]
    pub id: String,
    /// Display name of the object.
    pub name: String,
}

/// A resource-pool listing entry beneath a cluster.
#[derive(Debug, Clone, Deserialize)]
pub struct ResourcePoolItem {
    /// Backend identifier of the pool.
    pub resource_pool: String,
    /// Display name of the pool.
    pub name: String,
    /// Identifier of the parent pool, absent for the root pool.
    #[serde(default)]
    pub parent_resource_pool: Option<String>,
}

/// Identity fields of a virtual machine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmIdentity {
    /// BIOS UUID of the VM.
    pub uuid: Uuid,
    /// vCenter instance UUID of the VM.
    pub instance_uuid: Uuid,
    /// Display name of the VM.
    pub name: String,
}

/// CPU section of a VM detail payload.
#[derive(Debug, Clone, Deserialize)]
pub struct CpuInfo {
    /// Number of virtual CPUs.
    pub count: u32,
}

/// Memory section of a VM detail payload.
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryInfo {
    /// Memory size in MiB.
    pub size_mib: u64,
}

/// A named placement reference inside a VM detail payload.
#[derive(Debug, Clone, Deserialize)]
pub struct NamedRef {
    /// Backend identifier.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Placement section of a VM detail payload.
#[derive(Debug, Clone, Deserialize)]
pub struct VmPlacement {
    /// Resource pool the VM currently belongs to.
    pub resource_pool: NamedRef,
    /// Folder the VM currently belongs to.
    pub folder: NamedRef,
}

/// Guest tools section of a VM detail payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsInfo {
    /// Version status of the in-guest tools agent.
    pub version_status: ToolsStatus,
}

/// Full detail payload of a virtual machine.
#[derive(Debug, Clone, Deserialize)]
pub struct VmDetail {
    /// Identity fields.
    pub identity: VmIdentity,
    /// Current power state.
    pub power_state: PowerState,
    /// CPU configuration.
    pub cpu: CpuInfo,
    /// Memory configuration.
    pub memory: MemoryInfo,
    /// Annotation text, empty when unset.
    #[serde(default)]
    pub annotation: String,
    /// Current placement.
    pub placement: VmPlacement,
    /// Guest tools state.
    pub tools: ToolsInfo,
}

/// Request body for relocating an existing VM.
///
/// Deliberately carries no datastore: datastore placement is immutable for
/// an existing VM, multi-datastore relocation has unpredictable
/// data-movement semantics.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct RelocateRequest {
    /// Target resource pool identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_pool: Option<String>,
    /// Target folder identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
}

/// Request body for reconfiguring an existing VM.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ReconfigureRequest {
    /// New annotation text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// New virtual CPU count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_count: Option<u32>,
    /// New memory size in MiB.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mib: Option<u64>,
}

/// Request body for cloning a new VM from a template.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CloneRequest {
    /// Name of the VM to create.
    pub name: String,
    /// Target datastore identifier.
    pub datastore: String,
    /// Target resource pool identifier.
    pub resource_pool: String,
    /// Target folder identifier.
    pub folder: String,
    /// Virtual CPU count of the clone.
    pub cpu_count: u32,
    /// Memory size of the clone in MiB.
    pub memory_mib: u64,
    /// Annotation text of the clone.
    pub annotation: String,
    /// Whether CPUs may be hot-added after creation.
    pub cpu_hot_add_enabled: bool,
    /// Whether memory may be hot-added after creation.
    pub memory_hot_add_enabled: bool,
    /// Whether to power the clone on once created.
    pub power_on: bool,
}

impl ObjectRef {
    /// Creates a new object reference.
    #[must_use]
    pub fn new(kind: ObjectKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }
}

impl TaskHandle {
    /// Creates a handle from a backend task identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the backend task identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl TaskStatus {
    /// Returns true if this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }
}

impl PowerState {
    /// Returns true if the VM is running.
    #[must_use]
    pub const fn is_powered_on(&self) -> bool {
        matches!(self, Self::PoweredOn)
    }
}

impl ToolsStatus {
    /// Returns true if the `latest` tools policy considers this status
    /// upgradeable.
    #[must_use]
    pub const fn is_upgradeable(&self) -> bool {
        matches!(
            self,
            Self::Blacklisted
                | Self::NeedsUpgrade
                | Self::NotInstalled
                | Self::SupportedOld
                | Self::TooOld
        )
    }

    /// Returns the backend wire string for this status.
    #[must_use]
    pub const fn as_wire(&self) -> &'static str {
        match self {
            Self::NotInstalled => "guestToolsNotInstalled",
            Self::NeedsUpgrade => "guestToolsNeedUpgrade",
            Self::SupportedOld => "guestToolsSupportedOld",
            Self::TooOld => "guestToolsTooOld",
            Self::Blacklisted => "guestToolsBlacklisted",
            Self::Current => "guestToolsCurrent",
            Self::Unmanaged => "guestToolsUnmanaged",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::VirtualMachine => "virtual machine",
            Self::Datacenter => "datacenter",
            Self::Datastore => "datastore",
            Self::Folder => "folder",
            Self::ResourcePool => "resource pool",
            Self::Cluster => "cluster",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::PoweredOn => "powered on",
            Self::PoweredOff => "powered off",
            Self::Suspended => "suspended",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for ToolsStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_wire())
    }
}

impl std::fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_wire_format() {
        let state: PowerState = serde_json::from_str("\"poweredOn\"").unwrap();
        assert_eq!(state, PowerState::PoweredOn);
        assert!(state.is_powered_on());

        let state: PowerState = serde_json::from_str("\"poweredOff\"").unwrap();
        assert_eq!(state, PowerState::PoweredOff);
    }

    #[test]
    fn test_tools_status_wire_format() {
        let status: ToolsStatus = serde_json::from_str("\"guestToolsNeedUpgrade\"").unwrap();
        assert_eq!(status, ToolsStatus::NeedsUpgrade);
        assert!(status.is_upgradeable());

        let status: ToolsStatus = serde_json::from_str("\"guestToolsCurrent\"").unwrap();
        assert!(!status.is_upgradeable());
    }

    #[test]
    fn test_task_status_running() {
        let status: TaskStatus =
            serde_json::from_str(r#"{"status": "RUNNING", "progress": 42}"#).unwrap();
        assert!(!status.is_terminal());
        match status {
            TaskStatus::Running { progress } => assert_eq!(progress, Some(42)),
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn test_task_status_failed_with_fault() {
        let status: TaskStatus = serde_json::from_str(
            r#"{"status": "FAILED", "fault": {"kind": "DuplicateName", "name": "myvm001"}}"#,
        )
        .unwrap();
        assert!(status.is_terminal());
        match status {
            TaskStatus::Failed { fault } => {
                assert_eq!(fault.kind, DUPLICATE_NAME_FAULT);
                assert_eq!(fault.name.as_deref(), Some("myvm001"));
            }
            other => panic!("unexpected status: {other:?}"),
        }
    }

    #[test]
    fn test_inventory_item_id_aliases() {
        let item: InventoryItem =
            serde_json::from_str(r#"{"vm": "vm-1042", "name": "myvm001"}"#).unwrap();
        assert_eq!(item.id, "vm-1042");

        let item: InventoryItem =
            serde_json::from_str(r#"{"resource_pool": "resgroup-8", "name": "Prod"}"#).unwrap();
        assert_eq!(item.id, "resgroup-8");
    }

    #[test]
    fn test_reconfigure_request_skips_unset_fields() {
        let request = ReconfigureRequest {
            cpu_count: Some(4),
            ..Default::default()
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json, serde_json::json!({"cpu_count": 4}));
    }
}
