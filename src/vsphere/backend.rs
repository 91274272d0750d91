//! Backend seam consumed by the reconciliation core.
//!
//! Everything the engine needs from vCenter goes through this trait:
//! inventory listings, VM observation, work submission and task polling.
//! Keeping the seam object-safe lets the planner and reconciler run against
//! a mock backend in tests.

use async_trait::async_trait;

use crate::error::Result;

use super::types::{
    CloneRequest, ObjectKind, ObjectRef, ReconfigureRequest, RelocateRequest, TaskHandle,
    TaskStatus, VmDetail,
};

/// Operations the reconciliation core requires from the vCenter backend.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GuestBackend: Send + Sync {
    /// Identity of the server, for error messages.
    fn server(&self) -> &str;

    /// Lists all objects of a kind as `(reference, name)` pairs.
    async fn list_objects(&self, kind: ObjectKind) -> Result<Vec<(ObjectRef, String)>>;

    /// Lists the resource pools reachable under a cluster as
    /// `(reference, hierarchical path)` pairs.
    async fn resource_pool_paths(&self, cluster: &ObjectRef) -> Result<Vec<(ObjectRef, String)>>;

    /// Fetches the full detail payload of a virtual machine.
    async fn fetch_vm(&self, vm: &ObjectRef) -> Result<VmDetail>;

    /// Submits a relocation and returns the handle of the accepted task.
    async fn submit_relocate(
        &self,
        vm: &ObjectRef,
        request: &RelocateRequest,
    ) -> Result<TaskHandle>;

    /// Submits a reconfiguration and returns the handle of the accepted task.
    async fn submit_reconfigure(
        &self,
        vm: &ObjectRef,
        request: &ReconfigureRequest,
    ) -> Result<TaskHandle>;

    /// Submits a clone from a template and returns the handle of the
    /// accepted task.
    async fn submit_clone(
        &self,
        template: &ObjectRef,
        request: &CloneRequest,
    ) -> Result<TaskHandle>;

    /// Submits an in-guest tools upgrade and returns the handle of the
    /// accepted task.
    async fn submit_tools_upgrade(
        &self,
        vm: &ObjectRef,
        installer_options: &str,
    ) -> Result<TaskHandle>;

    /// Queries the current status of a submitted task.
    async fn poll_task(&self, task: &TaskHandle) -> Result<TaskStatus>;
}
