//! Desired-state comparator.
//!
//! This module computes the difference between the desired guest
//! specification and the observed state of an existing VM. The comparator
//! is a pure function of its two inputs: it performs no I/O, compares by
//! resolved reference equality (never by display name), and produces an
//! ordered change-set with relocations ahead of reconfigurations.

use tracing::debug;

use crate::vsphere::{ObjectRef, ObservedState};

/// Classification of a single change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// Moving the VM's pool or folder assignment.
    Relocation,
    /// Changing the VM's virtual hardware or metadata.
    Reconfiguration,
}

/// The typed payload of a single change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOp {
    /// Move the VM to another resource pool.
    ResourcePool(ObjectRef),
    /// Move the VM to another folder.
    Folder(ObjectRef),
    /// Replace the annotation text.
    Annotation(String),
    /// Change the virtual CPU count.
    CpuCount(u32),
    /// Change the memory size in MB.
    MemoryMb(u64),
}

/// A single planned change against an existing VM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeItem {
    /// Operator-facing description of the change.
    pub description: String,
    /// Typed payload of the change.
    pub op: ChangeOp,
}

/// Ordered sequence of changes; relocations always precede
/// reconfigurations, since hardware flags may depend on placement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// The ordered change items.
    items: Vec<ChangeItem>,
}

/// The desired guest specification after directory lookup.
///
/// Pool and folder are resolved references; the display names ride along
/// for change descriptions only. This type deliberately carries no
/// datastore: datastore placement is immutable for an existing VM.
#[derive(Debug, Clone)]
pub struct ResolvedGuest {
    /// Desired resource pool.
    pub resource_pool: ObjectRef,
    /// Display name of the desired resource pool.
    pub resource_pool_name: String,
    /// Desired folder.
    pub folder: ObjectRef,
    /// Display name of the desired folder.
    pub folder_name: String,
    /// Desired annotation text.
    pub annotation: String,
    /// Desired virtual CPU count.
    pub cpu_count: u32,
    /// Desired memory size in MB.
    pub memory_mb: u64,
}

/// Engine computing the change-set between desired and observed state.
#[derive(Debug, Default)]
pub struct GuestDiffEngine;

impl ChangeOp {
    /// Returns the classification of this change.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::ResourcePool(_) | Self::Folder(_) => ChangeKind::Relocation,
            Self::Annotation(_) | Self::CpuCount(_) | Self::MemoryMb(_) => {
                ChangeKind::Reconfiguration
            }
        }
    }

    /// Returns true if this change is unsafe to apply while powered on.
    #[must_use]
    pub const fn requires_shutdown(&self) -> bool {
        matches!(self, Self::CpuCount(_) | Self::MemoryMb(_))
    }
}

impl ChangeItem {
    /// Returns the classification of this change.
    #[must_use]
    pub const fn kind(&self) -> ChangeKind {
        self.op.kind()
    }

    /// Returns true if this change is unsafe to apply while powered on.
    #[must_use]
    pub const fn requires_shutdown(&self) -> bool {
        self.op.requires_shutdown()
    }
}

impl ChangeSet {
    /// Returns true if no change is pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the number of pending changes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns the ordered change items.
    #[must_use]
    pub fn items(&self) -> &[ChangeItem] {
        &self.items
    }

    /// Returns the descriptions of all pending changes, in order.
    #[must_use]
    pub fn descriptions(&self) -> Vec<String> {
        self.items.iter().map(|i| i.description.clone()).collect()
    }

    /// Returns true if any pending change requires the VM to be off.
    #[must_use]
    pub fn any_requires_shutdown(&self) -> bool {
        self.items.iter().any(ChangeItem::requires_shutdown)
    }

    /// Splits the set into its relocation and reconfiguration sub-lists,
    /// preserving order.
    #[must_use]
    pub fn partition(self) -> (Vec<ChangeItem>, Vec<ChangeItem>) {
        self.items
            .into_iter()
            .partition(|item| item.kind() == ChangeKind::Relocation)
    }
}

impl GuestDiffEngine {
    /// Creates a new diff engine.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Computes the change-set between a desired and an observed guest.
    ///
    /// Each rule is independent and order-stable; an observed state that
    /// already equals the desired projection yields an empty set.
    #[must_use]
    pub fn compute(&self, desired: &ResolvedGuest, observed: &ObservedState) -> ChangeSet {
        let mut items = Vec::new();

        if observed.resource_pool != desired.resource_pool {
            items.push(ChangeItem {
                description: format!(
                    "resource pool change from {} to {}",
                    observed.resource_pool_name, desired.resource_pool_name
                ),
                op: ChangeOp::ResourcePool(desired.resource_pool.clone()),
            });
        }

        if observed.folder != desired.folder {
            items.push(ChangeItem {
                description: format!(
                    "folder change from {} to {}",
                    observed.folder_name, desired.folder_name
                ),
                op: ChangeOp::Folder(desired.folder.clone()),
            });
        }

        if observed.annotation != desired.annotation {
            items.push(ChangeItem {
                description: format!(
                    "annotation change from \"{}\" to \"{}\"",
                    observed.annotation, desired.annotation
                ),
                op: ChangeOp::Annotation(desired.annotation.clone()),
            });
        }

        if observed.cpu_count != desired.cpu_count {
            items.push(ChangeItem {
                description: format!(
                    "cpu count change from {} to {}",
                    observed.cpu_count, desired.cpu_count
                ),
                op: ChangeOp::CpuCount(desired.cpu_count),
            });
        }

        if observed.memory_mb != desired.memory_mb {
            items.push(ChangeItem {
                description: format!(
                    "memory change from {} MB to {} MB",
                    observed.memory_mb, desired.memory_mb
                ),
                op: ChangeOp::MemoryMb(desired.memory_mb),
            });
        }

        debug!(
            "Computed {} pending changes for {}",
            items.len(),
            observed.name
        );

        ChangeSet { items }
    }
}

impl std::fmt::Display for ChangeItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description)
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::vsphere::{ObjectKind, PowerState, ToolsStatus};

    fn create_test_observed() -> ObservedState {
        ObservedState {
            vm: ObjectRef::new(ObjectKind::VirtualMachine, "vm-1042"),
            name: String::from("myvm001"),
            uuid: Uuid::parse_str("423e4567-e89b-12d3-a456-426614174000").unwrap(),
            instance_uuid: Uuid::parse_str("503e4567-e89b-12d3-a456-426614174999").unwrap(),
            resource_pool: ObjectRef::new(ObjectKind::ResourcePool, "resgroup-8"),
            resource_pool_name: String::from("Prod"),
            folder: ObjectRef::new(ObjectKind::Folder, "group-v3"),
            folder_name: String::from("web-servers"),
            annotation: String::from("managed by guestctl"),
            cpu_count: 2,
            memory_mb: 4096,
            power_state: PowerState::PoweredOff,
            tools_status: ToolsStatus::Current,
        }
    }

    /// Projects an observed state back onto a desired spec.
    fn project_desired(observed: &ObservedState) -> ResolvedGuest {
        ResolvedGuest {
            resource_pool: observed.resource_pool.clone(),
            resource_pool_name: observed.resource_pool_name.clone(),
            folder: observed.folder.clone(),
            folder_name: observed.folder_name.clone(),
            annotation: observed.annotation.clone(),
            cpu_count: observed.cpu_count,
            memory_mb: observed.memory_mb,
        }
    }

    #[test]
    fn test_identical_states_produce_empty_set() {
        let observed = create_test_observed();
        let desired = project_desired(&observed);

        let changes = GuestDiffEngine::new().compute(&desired, &observed);
        assert!(changes.is_empty());
    }

    #[test]
    fn test_pool_change_is_relocation_without_shutdown() {
        let observed = create_test_observed();
        let mut desired = project_desired(&observed);
        desired.resource_pool = ObjectRef::new(ObjectKind::ResourcePool, "resgroup-9");
        desired.resource_pool_name = String::from("Dev");

        let changes = GuestDiffEngine::new().compute(&desired, &observed);
        assert_eq!(changes.len(), 1);

        let item = &changes.items()[0];
        assert_eq!(item.kind(), ChangeKind::Relocation);
        assert!(!item.requires_shutdown());
        assert_eq!(item.description, "resource pool change from Prod to Dev");
    }

    #[test]
    fn test_same_pool_name_different_reference_still_relocates() {
        // Comparison is by resolved reference, not display name.
        let observed = create_test_observed();
        let mut desired = project_desired(&observed);
        desired.resource_pool = ObjectRef::new(ObjectKind::ResourcePool, "resgroup-77");

        let changes = GuestDiffEngine::new().compute(&desired, &observed);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes.items()[0].kind(), ChangeKind::Relocation);
    }

    #[test]
    fn test_annotation_change_is_safe_reconfiguration() {
        let observed = create_test_observed();
        let mut desired = project_desired(&observed);
        desired.annotation = String::from("updated notes");

        let changes = GuestDiffEngine::new().compute(&desired, &observed);
        assert_eq!(changes.len(), 1);

        let item = &changes.items()[0];
        assert_eq!(item.kind(), ChangeKind::Reconfiguration);
        assert!(!item.requires_shutdown());
    }

    #[test]
    fn test_hardware_changes_require_shutdown() {
        let observed = create_test_observed();
        let mut desired = project_desired(&observed);
        desired.cpu_count = 4;
        desired.memory_mb = 8192;

        let changes = GuestDiffEngine::new().compute(&desired, &observed);
        assert_eq!(changes.len(), 2);
        assert!(changes.any_requires_shutdown());

        let descriptions = changes.descriptions();
        assert_eq!(descriptions[0], "cpu count change from 2 to 4");
        assert_eq!(descriptions[1], "memory change from 4096 MB to 8192 MB");
        assert!(changes.items().iter().all(ChangeItem::requires_shutdown));
    }

    #[test]
    fn test_relocations_precede_reconfigurations() {
        let observed = create_test_observed();
        let mut desired = project_desired(&observed);
        desired.cpu_count = 8;
        desired.folder = ObjectRef::new(ObjectKind::Folder, "group-v9");
        desired.folder_name = String::from("db-servers");

        let changes = GuestDiffEngine::new().compute(&desired, &observed);
        let kinds: Vec<ChangeKind> = changes.items().iter().map(ChangeItem::kind).collect();
        assert_eq!(kinds, vec![ChangeKind::Relocation, ChangeKind::Reconfiguration]);

        let (relocations, reconfigurations) = changes.partition();
        assert_eq!(relocations.len(), 1);
        assert_eq!(reconfigurations.len(), 1);
    }
}
