//! Guest provisioner for creating VMs from templates.
//!
//! This module handles the creation path of a reconciliation run: when the
//! desired guest does not exist yet, it is cloned from a template in a
//! single submitted work item carrying placement, hardware, annotation and
//! the power-on flag. Datastore placement is decided here, at creation
//! time, and never revisited afterwards.

use tracing::{debug, info};

use crate::config::GuestSpec;
use crate::error::{ApiError, Result};

use super::backend::GuestBackend;
use super::tasks::WaitOptions;
use super::types::{CloneRequest, ObjectKind, ObjectRef, TaskHandle};

/// Resolved placement references for a clone.
#[derive(Debug, Clone)]
pub struct ClonePlacement {
    /// Target datastore.
    pub datastore: ObjectRef,
    /// Target resource pool.
    pub resource_pool: ObjectRef,
    /// Target folder.
    pub folder: ObjectRef,
}

/// Provisioner creating guests from templates.
pub struct GuestProvisioner<'a> {
    /// Backend to submit work to.
    backend: &'a dyn GuestBackend,
    /// Waiting parameters for the clone task.
    wait: WaitOptions,
}

impl<'a> GuestProvisioner<'a> {
    /// Creates a new provisioner.
    #[must_use]
    pub fn new(backend: &'a dyn GuestBackend) -> Self {
        Self {
            backend,
            wait: WaitOptions::default(),
        }
    }

    /// Sets the waiting parameters for submitted work.
    #[must_use]
    pub fn with_wait_options(mut self, wait: WaitOptions) -> Self {
        self.wait = wait;
        self
    }

    /// Builds the clone request for a desired guest.
    ///
    /// CPU and memory hot-add stay disabled on the clone; hardware grows
    /// through reconfiguration with the safety gate in front of it.
    #[must_use]
    pub fn build_clone_request(spec: &GuestSpec, placement: &ClonePlacement) -> CloneRequest {
        CloneRequest {
            name: spec.name.clone(),
            datastore: placement.datastore.id.clone(),
            resource_pool: placement.resource_pool.id.clone(),
            folder: placement.folder.id.clone(),
            cpu_count: spec.num_cpus,
            memory_mib: spec.memory_mb,
            annotation: spec.notes.clone(),
            cpu_hot_add_enabled: false,
            memory_hot_add_enabled: false,
            power_on: spec.power_on_after_create,
        }
    }

    /// Clones a guest from a template and waits for the task to finish.
    ///
    /// Returns the reference of the newly created VM.
    ///
    /// # Errors
    ///
    /// Returns an error if submission fails, the task reaches a terminal
    /// failure (a name collision is reported with the conflicting name),
    /// or the task result carries no VM identifier.
    pub async fn clone_guest(
        &self,
        template: &ObjectRef,
        spec: &GuestSpec,
        placement: &ClonePlacement,
    ) -> Result<ObjectRef> {
        let request = Self::build_clone_request(spec, placement);
        info!("Cloning guest {} from template {}", spec.name, spec.template);

        let task = self.backend.submit_clone(template, &request).await?;
        let result = self.finish(task).await?;

        let vm_id = result
            .get("vm")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ApiError::invalid_response("clone task result carries no vm id"))?;

        debug!("Guest {} created as {vm_id}", spec.name);
        Ok(ObjectRef::new(ObjectKind::VirtualMachine, vm_id))
    }

    /// Waits a submitted task to its terminal state.
    async fn finish(&self, task: TaskHandle) -> Result<serde_json::Value> {
        self.wait.waiter(self.backend).wait(task).await
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::GuestctlError;
    use crate::vsphere::backend::MockGuestBackend;
    use crate::vsphere::tasks::PollPolicy;
    use crate::vsphere::types::TaskStatus;

    fn create_test_spec() -> GuestSpec {
        GuestSpec {
            name: String::from("myvm001"),
            template: String::from("debian12-template"),
            datacenter: String::from("DC1"),
            cluster: None,
            resource_pool: String::from("/Resources"),
            folder: String::from("web-servers"),
            datastore: String::from("SAN01"),
            notes: String::from("managed by guestctl"),
            num_cpus: 4,
            memory_mb: 8192,
            power_on_after_create: true,
            tools: None,
        }
    }

    fn create_test_placement() -> ClonePlacement {
        ClonePlacement {
            datastore: ObjectRef::new(ObjectKind::Datastore, "datastore-11"),
            resource_pool: ObjectRef::new(ObjectKind::ResourcePool, "resgroup-8"),
            folder: ObjectRef::new(ObjectKind::Folder, "group-v3"),
        }
    }

    fn fast_wait() -> WaitOptions {
        WaitOptions {
            policy: PollPolicy {
                initial: Duration::from_millis(1),
                max: Duration::from_millis(2),
            },
            ..WaitOptions::default()
        }
    }

    #[test]
    fn test_build_clone_request_disables_hot_add() {
        let request =
            GuestProvisioner::build_clone_request(&create_test_spec(), &create_test_placement());

        assert_eq!(request.name, "myvm001");
        assert_eq!(request.datastore, "datastore-11");
        assert_eq!(request.cpu_count, 4);
        assert_eq!(request.memory_mib, 8192);
        assert!(!request.cpu_hot_add_enabled);
        assert!(!request.memory_hot_add_enabled);
        assert!(request.power_on);
    }

    #[tokio::test]
    async fn test_clone_guest_returns_new_vm_reference() {
        let mut backend = MockGuestBackend::new();
        backend
            .expect_submit_clone()
            .times(1)
            .returning(|_, _| Ok(TaskHandle::new("task-9")));
        backend.expect_poll_task().returning(|_| {
            Ok(TaskStatus::Succeeded {
                result: json!({"vm": "vm-2001"}),
            })
        });

        let provisioner = GuestProvisioner::new(&backend).with_wait_options(fast_wait());
        let template = ObjectRef::new(ObjectKind::VirtualMachine, "vm-42");
        let vm = provisioner
            .clone_guest(&template, &create_test_spec(), &create_test_placement())
            .await
            .unwrap();

        assert_eq!(vm, ObjectRef::new(ObjectKind::VirtualMachine, "vm-2001"));
    }

    #[tokio::test]
    async fn test_clone_guest_rejects_result_without_vm_id() {
        let mut backend = MockGuestBackend::new();
        backend
            .expect_submit_clone()
            .returning(|_, _| Ok(TaskHandle::new("task-9")));
        backend.expect_poll_task().returning(|_| {
            Ok(TaskStatus::Succeeded {
                result: json!({"status": "done"}),
            })
        });

        let provisioner = GuestProvisioner::new(&backend).with_wait_options(fast_wait());
        let template = ObjectRef::new(ObjectKind::VirtualMachine, "vm-42");
        let err = provisioner
            .clone_guest(&template, &create_test_spec(), &create_test_placement())
            .await
            .unwrap_err();

        assert!(matches!(err, GuestctlError::Api(ApiError::InvalidResponse { .. })));
    }
}
