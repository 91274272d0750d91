//! Reconciler for maintaining desired guest state.
//!
//! This module implements the core reconciliation flow: observe the live
//! VM, compare it against the desired specification, gate the resulting
//! change-set, and apply it through the task machine. Execution per run
//! is single-threaded and strictly sequential; no two work items are ever
//! in flight for the same VM. All state is scoped to one run and
//! discarded afterwards. Cross-run races are delegated to the backend's
//! own object-level locking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{GuestctlConfig, ToolsPolicy};
use crate::error::{ConfigError, NotFoundError, Result, ToolsStateError};
use crate::planner::{
    ApplyMode, ApplyPlan, ChangeExecutor, ChangeItem, ChangeOp, GateDecision, GuestDiffEngine,
    PoolDecision, ResolvedGuest, SafetyGate, find_target,
};
use crate::vsphere::{
    ClonePlacement, GuestBackend, GuestFacts, GuestObserver, GuestProvisioner, ObjectKind,
    ObjectRef, ObservedState, RelocateRequest, WaitOptions,
};

/// Suffix attached to change descriptions reported from a dry-run.
const DRY_RUN_SUFFIX: &str = " (not applied, dry-run)";

/// Reconciler driving one guest toward its desired state.
pub struct Reconciler<'a> {
    /// Desired configuration.
    config: &'a GuestctlConfig,
    /// Backend the run operates against.
    backend: &'a dyn GuestBackend,
    /// Waiting parameters shared by every submitted work item.
    wait: WaitOptions,
}

/// Tagged outcome of a reconciliation run.
///
/// The process boundary translates this into its response convention;
/// the engine itself never exits.
#[derive(Debug)]
pub enum ReconcileOutcome {
    /// The observed state already matches the desired state.
    NoChange {
        /// Facts of the observed guest.
        facts: GuestFacts,
    },
    /// Changes were applied.
    Applied {
        /// Descriptions of the applied changes, in submission order.
        changes: Vec<String>,
        /// Facts of the guest after application.
        facts: GuestFacts,
    },
    /// Changes are pending but the run was a dry-run.
    DryRun {
        /// Descriptions of the changes that would be applied.
        changes: Vec<String>,
    },
}

/// Caller-facing report of a reconciliation run.
#[derive(Debug, Serialize)]
pub struct ReconcileReport {
    /// Whether anything changed (or would change, on a dry-run).
    pub changed: bool,
    /// Descriptions of the changes.
    pub changes: Vec<String>,
    /// Facts of the guest, absent on dry-run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facts: Option<GuestFacts>,
    /// When the run completed.
    pub completed_at: DateTime<Utc>,
}

impl<'a> Reconciler<'a> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(config: &'a GuestctlConfig, backend: &'a dyn GuestBackend) -> Self {
        Self {
            config,
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

    /// Reconciles the guest toward the desired specification.
    ///
    /// An existing guest is compared and minimally adjusted; an absent
    /// one is cloned from the configured template.
    ///
    /// # Errors
    ///
    /// Returns an error when a referenced object is missing, a hardware
    /// change is blocked by the power state, or a backend task fails.
    pub async fn reconcile(&self, mode: ApplyMode) -> Result<ReconcileOutcome> {
        let guest = &self.config.guest;
        info!("Starting reconciliation for guest {}", guest.name);

        let mut observer = GuestObserver::new(self.backend);

        match observer.find(ObjectKind::VirtualMachine, &guest.name).await? {
            Some(vm) => self.reconcile_existing(&mut observer, &vm, mode).await,
            None => self.create_from_template(&mut observer, mode).await,
        }
    }

    /// Compares an existing guest against the desired spec and applies
    /// the admitted changes.
    async fn reconcile_existing(
        &self,
        observer: &mut GuestObserver<'_>,
        vm: &ObjectRef,
        mode: ApplyMode,
    ) -> Result<ReconcileOutcome> {
        let observed = observer.observe(vm).await?;
        let desired = self.resolve_desired(observer).await?;

        let changes = GuestDiffEngine::new().compute(&desired, &observed);
        let decision = SafetyGate::new().admit(changes, observed.power_state, mode)?;

        match decision {
            GateDecision::NoChange => {
                info!("Guest {} already matches the desired state", observed.name);
                Ok(ReconcileOutcome::NoChange {
                    facts: observed.facts(),
                })
            }
            GateDecision::DryRun { changes } => {
                info!(
                    "Guest {} has {} pending changes (dry-run)",
                    observed.name,
                    changes.len()
                );
                Ok(ReconcileOutcome::DryRun { changes })
            }
            GateDecision::Apply(plan) => {
                let executor = ChangeExecutor::new(self.backend).with_wait_options(self.wait.clone());
                let applied = executor.apply(vm, &plan).await?;

                // Read back fresh facts after the changes landed.
                let fresh = observer.observe(vm).await?;
                Ok(ReconcileOutcome::Applied {
                    changes: applied,
                    facts: fresh.facts(),
                })
            }
        }
    }

    /// Creates the guest from the configured template.
    async fn create_from_template(
        &self,
        observer: &mut GuestObserver<'_>,
        mode: ApplyMode,
    ) -> Result<ReconcileOutcome> {
        let guest = &self.config.guest;
        debug!("Guest {} not found, creating from template", guest.name);

        let template = observer
            .resolve(ObjectKind::VirtualMachine, &guest.template)
            .await?;
        let datastore = observer
            .resolve(ObjectKind::Datastore, &guest.datastore)
            .await?;
        // The datacenter is validated the same way even though placement
        // is fully determined by datastore, pool and folder.
        observer
            .resolve(ObjectKind::Datacenter, &guest.datacenter)
            .await?;
        let folder = observer.resolve(ObjectKind::Folder, &guest.folder).await?;
        let resource_pool = observer
            .resolve(ObjectKind::ResourcePool, &guest.resource_pool)
            .await?;

        if mode == ApplyMode::DryRun {
            return Ok(ReconcileOutcome::DryRun {
                changes: vec![format!("vm {} would have been created", guest.name)],
            });
        }

        let placement = ClonePlacement {
            datastore,
            resource_pool,
            folder,
        };
        let provisioner =
            GuestProvisioner::new(self.backend).with_wait_options(self.wait.clone());
        let vm = provisioner.clone_guest(&template, guest, &placement).await?;

        let observed = observer.observe(&vm).await?;
        Ok(ReconcileOutcome::Applied {
            changes: vec![format!("vm {} has been created", guest.name)],
            facts: observed.facts(),
        })
    }

    /// Migrates the guest to the desired resource pool within its
    /// cluster, matching the pool by path suffix.
    ///
    /// With `wait_for_completion` unset, the relocation task is submitted
    /// and left to finish on its own.
    ///
    /// # Errors
    ///
    /// Returns an error when the cluster is not configured, the guest or
    /// cluster is missing, or no pool path matches the desired name.
    pub async fn migrate_pool(
        &self,
        mode: ApplyMode,
        wait_for_completion: bool,
    ) -> Result<ReconcileOutcome> {
        let guest = &self.config.guest;
        let cluster_name = guest.cluster.as_deref().ok_or_else(|| {
            ConfigError::validation("cluster is required for pool migration", "guest.cluster")
        })?;

        info!(
            "Matching resource pool {} for guest {} under cluster {cluster_name}",
            guest.resource_pool, guest.name
        );

        let mut observer = GuestObserver::new(self.backend);
        let vm = observer
            .resolve(ObjectKind::VirtualMachine, &guest.name)
            .await?;
        let observed = observer.observe(&vm).await?;

        let cluster = observer.resolve(ObjectKind::Cluster, cluster_name).await?;
        let pools = self.backend.resource_pool_paths(&cluster).await?;

        let decision = find_target(&guest.resource_pool, &observed.resource_pool_name, &pools)
            .ok_or_else(|| {
                NotFoundError::new(
                    ObjectKind::ResourcePool,
                    &guest.resource_pool,
                    self.backend.server(),
                )
            })?;

        match decision {
            PoolDecision::AlreadyPlaced => {
                info!(
                    "Guest {} is already in a pool matching {}",
                    guest.name, guest.resource_pool
                );
                Ok(ReconcileOutcome::NoChange {
                    facts: observed.facts(),
                })
            }
            PoolDecision::Migrate(target) => {
                self.migrate_to(&observed, target, mode, wait_for_completion)
                    .await
            }
        }
    }

    /// Submits the pool relocation decided by the matcher.
    async fn migrate_to(
        &self,
        observed: &ObservedState,
        target: ObjectRef,
        mode: ApplyMode,
        wait_for_completion: bool,
    ) -> Result<ReconcileOutcome> {
        let description = format!(
            "resource pool change from {} to {}",
            observed.resource_pool_name, self.config.guest.resource_pool
        );

        if mode == ApplyMode::DryRun {
            return Ok(ReconcileOutcome::DryRun {
                changes: vec![description],
            });
        }

        if wait_for_completion {
            let plan = ApplyPlan {
                relocations: vec![ChangeItem {
                    description: description.clone(),
                    op: ChangeOp::ResourcePool(target),
                }],
                reconfigurations: vec![],
            };
            let executor = ChangeExecutor::new(self.backend).with_wait_options(self.wait.clone());
            let changes = executor.apply(&observed.vm, &plan).await?;

            let fresh = GuestObserver::new(self.backend).observe(&observed.vm).await?;
            return Ok(ReconcileOutcome::Applied {
                changes,
                facts: fresh.facts(),
            });
        }

        // Fire-and-forget: submit without observing the task outcome.
        let request = RelocateRequest {
            resource_pool: Some(target.id),
            folder: None,
        };
        let task = self.backend.submit_relocate(&observed.vm, &request).await?;
        info!("Relocation task {task} submitted without waiting");

        Ok(ReconcileOutcome::Applied {
            changes: vec![description],
            facts: observed.facts(),
        })
    }

    /// Checks the in-guest tools status against the configured policy,
    /// upgrading when the policy is `latest` and the status allows it.
    ///
    /// # Errors
    ///
    /// Returns a [`ToolsStateError`] when the observed status contradicts
    /// a `present` or `absent` policy.
    pub async fn ensure_tools(&self, mode: ApplyMode) -> Result<ReconcileOutcome> {
        let guest = &self.config.guest;
        let policy = guest.tools_policy();

        let mut observer = GuestObserver::new(self.backend);
        let vm = observer
            .resolve(ObjectKind::VirtualMachine, &guest.name)
            .await?;
        let observed = observer.observe(&vm).await?;
        let status = observed.tools_status;

        debug!("Guest {} tools status: {status}", guest.name);

        match policy {
            ToolsPolicy::Present if status == crate::vsphere::ToolsStatus::NotInstalled => {
                Err(ToolsStateError {
                    guest: guest.name.clone(),
                    policy: policy.to_string(),
                    status: status.to_string(),
                }
                .into())
            }
            ToolsPolicy::Absent if status != crate::vsphere::ToolsStatus::NotInstalled => {
                Err(ToolsStateError {
                    guest: guest.name.clone(),
                    policy: policy.to_string(),
                    status: status.to_string(),
                }
                .into())
            }
            ToolsPolicy::Latest if status.is_upgradeable() => {
                if mode == ApplyMode::DryRun {
                    return Ok(ReconcileOutcome::DryRun {
                        changes: vec![format!(
                            "tools on guest VM {} would have been upgraded",
                            guest.name
                        )],
                    });
                }

                let task = self
                    .backend
                    .submit_tools_upgrade(&vm, guest.tools_installer_options())
                    .await?;
                self.wait.waiter(self.backend).wait(task).await?;

                let fresh = observer.observe(&vm).await?;
                Ok(ReconcileOutcome::Applied {
                    changes: vec![format!("tools on guest VM {} have been upgraded", guest.name)],
                    facts: fresh.facts(),
                })
            }
            _ => Ok(ReconcileOutcome::NoChange {
                facts: observed.facts(),
            }),
        }
    }

    /// Resolves the desired placement and hardware into comparable form.
    async fn resolve_desired(&self, observer: &mut GuestObserver<'_>) -> Result<ResolvedGuest> {
        let guest = &self.config.guest;

        let resource_pool = observer
            .resolve(ObjectKind::ResourcePool, &guest.resource_pool)
            .await?;
        let folder = observer.resolve(ObjectKind::Folder, &guest.folder).await?;

        Ok(ResolvedGuest {
            resource_pool,
            resource_pool_name: guest.resource_pool.clone(),
            folder,
            folder_name: guest.folder.clone(),
            annotation: guest.notes.clone(),
            cpu_count: guest.num_cpus,
            memory_mb: guest.memory_mb,
        })
    }
}

impl ReconcileOutcome {
    /// Returns true if the run changed (or would change) anything.
    #[must_use]
    pub const fn changed(&self) -> bool {
        !matches!(self, Self::NoChange { .. })
    }

    /// Converts the outcome into the caller-facing report, stamping the
    /// dry-run suffix onto pending change descriptions.
    #[must_use]
    pub fn into_report(self) -> ReconcileReport {
        let completed_at = Utc::now();
        match self {
            Self::NoChange { facts } => ReconcileReport {
                changed: false,
                changes: vec![],
                facts: Some(facts),
                completed_at,
            },
            Self::Applied { changes, facts } => ReconcileReport {
                changed: true,
                changes,
                facts: Some(facts),
                completed_at,
            },
            Self::DryRun { changes } => ReconcileReport {
                changed: true,
                changes: changes
                    .into_iter()
                    .map(|c| format!("{c}{DRY_RUN_SUFFIX}"))
                    .collect(),
                facts: None,
                completed_at,
            },
        }
    }
}

impl std::fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.changed {
            writeln!(f, "Changed:")?;
            for change in &self.changes {
                writeln!(f, "  - {change}")?;
            }
        } else {
            writeln!(f, "No change required - guest matches the desired state")?;
        }
        Ok(())
    }
}
