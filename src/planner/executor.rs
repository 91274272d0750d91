//! Change executor for admitted plans.
//!
//! The executor turns an admitted plan into at most two backend work
//! items: one relocation and one reconfiguration. Relocation is always
//! submitted and awaited first, because reconfiguration flags may depend
//! on placement. Each work item is tracked to its terminal state through
//! the task machine before the next one is submitted; a mid-flight
//! failure therefore leaves at most one of the two groups applied, and is
//! always reported.

use tracing::{debug, info};

use crate::error::Result;
use crate::vsphere::{
    GuestBackend, ObjectRef, ReconfigureRequest, RelocateRequest, WaitOptions,
};

use super::diff::{ChangeItem, ChangeOp};
use super::gate::ApplyPlan;

/// Executor submitting admitted changes to the backend.
pub struct ChangeExecutor<'a> {
    /// Backend to submit work to.
    backend: &'a dyn GuestBackend,
    /// Waiting parameters for submitted work.
    wait: WaitOptions,
}

impl<'a> ChangeExecutor<'a> {
    /// Creates a new executor.
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

    /// Applies an admitted plan to a VM and returns the descriptions of
    /// the applied changes, in submission order.
    ///
    /// # Errors
    ///
    /// Returns an error if a submission fails or a task reaches a
    /// terminal failure. No automatic retry is attempted.
    pub async fn apply(&self, vm: &ObjectRef, plan: &ApplyPlan) -> Result<Vec<String>> {
        let mut applied = Vec::new();

        if !plan.relocations.is_empty() {
            let request = Self::relocate_request(&plan.relocations);
            info!(
                "Submitting relocation of {} with {} changes",
                vm.id,
                plan.relocations.len()
            );

            let task = self.backend.submit_relocate(vm, &request).await?;
            self.wait.waiter(self.backend).wait(task).await?;

            debug!("Relocation of {} completed", vm.id);
            applied.extend(plan.relocations.iter().map(|i| i.description.clone()));
        }

        if !plan.reconfigurations.is_empty() {
            let request = Self::reconfigure_request(&plan.reconfigurations);
            info!(
                "Submitting reconfiguration of {} with {} changes",
                vm.id,
                plan.reconfigurations.len()
            );

            let task = self.backend.submit_reconfigure(vm, &request).await?;
            self.wait.waiter(self.backend).wait(task).await?;

            debug!("Reconfiguration of {} completed", vm.id);
            applied.extend(plan.reconfigurations.iter().map(|i| i.description.clone()));
        }

        Ok(applied)
    }

    /// Folds relocation items into one request body.
    fn relocate_request(items: &[ChangeItem]) -> RelocateRequest {
        let mut request = RelocateRequest::default();
        for item in items {
            match &item.op {
                ChangeOp::ResourcePool(pool) => request.resource_pool = Some(pool.id.clone()),
                ChangeOp::Folder(folder) => request.folder = Some(folder.id.clone()),
                // Reconfiguration ops never land in the relocation list.
                ChangeOp::Annotation(_) | ChangeOp::CpuCount(_) | ChangeOp::MemoryMb(_) => {}
            }
        }
        request
    }

    /// Folds reconfiguration items into one request body.
    fn reconfigure_request(items: &[ChangeItem]) -> ReconfigureRequest {
        let mut request = ReconfigureRequest::default();
        for item in items {
            match &item.op {
                ChangeOp::Annotation(text) => request.annotation = Some(text.clone()),
                ChangeOp::CpuCount(count) => request.cpu_count = Some(*count),
                ChangeOp::MemoryMb(mb) => request.memory_mib = Some(*mb),
                // Relocation ops never land in the reconfiguration list.
                ChangeOp::ResourcePool(_) | ChangeOp::Folder(_) => {}
            }
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mockall::Sequence;
    use serde_json::json;

    use super::*;
    use crate::vsphere::{
        MockGuestBackend, ObjectKind, PollPolicy, TaskHandle, TaskStatus,
    };

    fn vm_ref() -> ObjectRef {
        ObjectRef::new(ObjectKind::VirtualMachine, "vm-1042")
    }

    fn pool_item() -> ChangeItem {
        ChangeItem {
            description: String::from("resource pool change from Prod to Dev"),
            op: ChangeOp::ResourcePool(ObjectRef::new(ObjectKind::ResourcePool, "resgroup-9")),
        }
    }

    fn cpu_item() -> ChangeItem {
        ChangeItem {
            description: String::from("cpu count change from 2 to 4"),
            op: ChangeOp::CpuCount(4),
        }
    }

    fn memory_item() -> ChangeItem {
        ChangeItem {
            description: String::from("memory change from 4096 MB to 8192 MB"),
            op: ChangeOp::MemoryMb(8192),
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

    fn succeed_immediately(backend: &mut MockGuestBackend) {
        backend.expect_poll_task().returning(|_| {
            Ok(TaskStatus::Succeeded {
                result: json!({}),
            })
        });
    }

    #[tokio::test]
    async fn test_relocation_submitted_before_reconfiguration() {
        let mut backend = MockGuestBackend::new();
        let mut seq = Sequence::new();

        backend
            .expect_submit_relocate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(TaskHandle::new("task-1")));
        backend
            .expect_submit_reconfigure()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(TaskHandle::new("task-2")));
        succeed_immediately(&mut backend);

        let plan = ApplyPlan {
            relocations: vec![pool_item()],
            reconfigurations: vec![cpu_item()],
        };

        let executor = ChangeExecutor::new(&backend).with_wait_options(fast_wait());
        let applied = executor.apply(&vm_ref(), &plan).await.unwrap();

        assert_eq!(
            applied,
            vec![
                String::from("resource pool change from Prod to Dev"),
                String::from("cpu count change from 2 to 4"),
            ]
        );
    }

    #[tokio::test]
    async fn test_reconfiguration_group_is_one_work_item() {
        let mut backend = MockGuestBackend::new();

        backend
            .expect_submit_reconfigure()
            .times(1)
            .withf(|_, request| {
                *request
                    == ReconfigureRequest {
                        annotation: None,
                        cpu_count: Some(4),
                        memory_mib: Some(8192),
                    }
            })
            .returning(|_, _| Ok(TaskHandle::new("task-2")));
        succeed_immediately(&mut backend);

        let plan = ApplyPlan {
            relocations: vec![],
            reconfigurations: vec![cpu_item(), memory_item()],
        };

        let executor = ChangeExecutor::new(&backend).with_wait_options(fast_wait());
        let applied = executor.apply(&vm_ref(), &plan).await.unwrap();
        assert_eq!(applied.len(), 2);
    }

    #[tokio::test]
    async fn test_relocation_only_plan_skips_reconfiguration() {
        let mut backend = MockGuestBackend::new();

        backend
            .expect_submit_relocate()
            .times(1)
            .withf(|_, request| {
                *request
                    == RelocateRequest {
                        resource_pool: Some(String::from("resgroup-9")),
                        folder: None,
                    }
            })
            .returning(|_, _| Ok(TaskHandle::new("task-1")));
        succeed_immediately(&mut backend);

        let plan = ApplyPlan {
            relocations: vec![pool_item()],
            reconfigurations: vec![],
        };

        let executor = ChangeExecutor::new(&backend).with_wait_options(fast_wait());
        let applied = executor.apply(&vm_ref(), &plan).await.unwrap();
        assert_eq!(applied.len(), 1);
    }

    #[tokio::test]
    async fn test_task_failure_stops_the_run() {
        let mut backend = MockGuestBackend::new();

        backend
            .expect_submit_relocate()
            .returning(|_, _| Ok(TaskHandle::new("task-1")));
        backend.expect_submit_reconfigure().times(0);
        backend.expect_poll_task().returning(|_| {
            Ok(TaskStatus::Failed {
                fault: crate::vsphere::TaskFault {
                    kind: String::from("InvalidState"),
                    message: None,
                    name: None,
                },
            })
        });

        let plan = ApplyPlan {
            relocations: vec![pool_item()],
            reconfigurations: vec![cpu_item()],
        };

        let executor = ChangeExecutor::new(&backend).with_wait_options(fast_wait());
        let result = executor.apply(&vm_ref(), &plan).await;
        assert!(result.is_err());
    }
}
