//! Guest observation and inventory lookup.
//!
//! This module reads the live state of a virtual machine and resolves
//! human names to opaque object references through a per-run inventory
//! index. The index is keyed by `(kind, name)` and built from one listing
//! per kind; duplicate names keep the first listing entry, matching the
//! backend's own first-match lookup semantics. Observed state is read
//! fresh at the start of each run and never cached across runs.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::error::{NotFoundError, Result};

use super::backend::GuestBackend;
use super::types::{ObjectKind, ObjectRef, PowerState, ToolsStatus, VmDetail};

/// Snapshot of a virtual machine at the start of a reconciliation run.
#[derive(Debug, Clone)]
pub struct ObservedState {
    /// Reference to the observed VM.
    pub vm: ObjectRef,
    /// Display name of the VM.
    pub name: String,
    /// BIOS UUID.
    pub uuid: Uuid,
    /// vCenter instance UUID.
    pub instance_uuid: Uuid,
    /// Resource pool the VM currently belongs to.
    pub resource_pool: ObjectRef,
    /// Display name of the current resource pool.
    pub resource_pool_name: String,
    /// Folder the VM currently belongs to.
    pub folder: ObjectRef,
    /// Display name of the current folder.
    pub folder_name: String,
    /// Annotation text, empty when unset.
    pub annotation: String,
    /// Virtual CPU count.
    pub cpu_count: u32,
    /// Memory size in MB.
    pub memory_mb: u64,
    /// Current power state.
    pub power_state: PowerState,
    /// Guest tools status.
    pub tools_status: ToolsStatus,
}

/// Summary facts of a guest, reported back to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct GuestFacts {
    /// BIOS UUID of the VM.
    pub vm_uuid: Uuid,
    /// Display name of the VM.
    pub vm_name: String,
    /// vCenter instance UUID of the VM.
    pub instance_uuid: Uuid,
    /// Memory size in MB.
    pub memory_mb: u64,
    /// Memory size in whole GB.
    pub memory_gb: u64,
    /// Virtual CPU count.
    pub num_cpus: u32,
    /// Current power state.
    pub power_state: PowerState,
    /// Guest tools status.
    pub vm_tools_status: ToolsStatus,
}

/// Observer resolving names and reading live guest state.
pub struct GuestObserver<'a> {
    /// Backend to read from.
    backend: &'a dyn GuestBackend,
    /// Inventory index keyed by `(kind, name)`, first match wins.
    index: HashMap<(ObjectKind, String), ObjectRef>,
    /// Kinds whose listing has already been folded into the index.
    loaded: HashSet<ObjectKind>,
}

impl<'a> GuestObserver<'a> {
    /// Creates an observer with an empty inventory index.
    #[must_use]
    pub fn new(backend: &'a dyn GuestBackend) -> Self {
        Self {
            backend,
            index: HashMap::new(),
            loaded: HashSet::new(),
        }
    }

    /// Loads the listing for a kind into the index, once per run.
    async fn load_kind(&mut self, kind: ObjectKind) -> Result<()> {
        if self.loaded.contains(&kind) {
            return Ok(());
        }

        let objects = self.backend.list_objects(kind).await?;
        debug!("Indexed {} objects of kind {kind}", objects.len());

        for (reference, name) in objects {
            // First listing entry wins on duplicate names.
            self.index.entry((kind, name)).or_insert(reference);
        }
        self.loaded.insert(kind);
        Ok(())
    }

    /// Looks up an object by kind and name, without treating absence as an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns an error if the inventory listing fails.
    pub async fn find(&mut self, kind: ObjectKind, name: &str) -> Result<Option<ObjectRef>> {
        self.load_kind(kind).await?;
        Ok(self.index.get(&(kind, name.to_string())).cloned())
    }

    /// Resolves an object by kind and name, failing when it is absent.
    ///
    /// # Errors
    ///
    /// Returns a [`NotFoundError`] naming the object and the server when
    /// no object of the kind carries the name.
    pub async fn resolve(&mut self, kind: ObjectKind, name: &str) -> Result<ObjectRef> {
        self.find(kind, name).await?.ok_or_else(|| {
            NotFoundError::new(kind, name, self.backend.server()).into()
        })
    }

    /// Reads the live state of a VM.
    ///
    /// # Errors
    ///
    /// Returns an error if the detail read fails.
    pub async fn observe(&self, vm: &ObjectRef) -> Result<ObservedState> {
        let detail = self.backend.fetch_vm(vm).await?;
        Ok(Self::to_observed(vm.clone(), detail))
    }

    /// Converts a wire detail payload into an observed snapshot.
    fn to_observed(vm: ObjectRef, detail: VmDetail) -> ObservedState {
        ObservedState {
            vm,
            name: detail.identity.name,
            uuid: detail.identity.uuid,
            instance_uuid: detail.identity.instance_uuid,
            resource_pool: ObjectRef::new(
                ObjectKind::ResourcePool,
                detail.placement.resource_pool.id,
            ),
            resource_pool_name: detail.placement.resource_pool.name,
            folder: ObjectRef::new(ObjectKind::Folder, detail.placement.folder.id),
            folder_name: detail.placement.folder.name,
            annotation: detail.annotation,
            cpu_count: detail.cpu.count,
            memory_mb: detail.memory.size_mib,
            power_state: detail.power_state,
            tools_status: detail.tools.version_status,
        }
    }
}

impl ObservedState {
    /// Builds the caller-facing facts summary from this snapshot.
    #[must_use]
    pub fn facts(&self) -> GuestFacts {
        GuestFacts {
            vm_uuid: self.uuid,
            vm_name: self.name.clone(),
            instance_uuid: self.instance_uuid,
            memory_mb: self.memory_mb,
            memory_gb: self.memory_mb / 1024,
            num_cpus: self.cpu_count,
            power_state: self.power_state,
            vm_tools_status: self.tools_status,
        }
    }
}
