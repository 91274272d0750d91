//! Safety gate in front of the change executor.
//!
//! The gate inspects a computed change-set against the VM's current power
//! state and decides whether the run is a no-op, a dry-run report, or an
//! applicable plan. A hardware change that requires the VM to be off makes
//! the entire set inapplicable while powered on: the gate blocks, it never
//! skips individual items.

use crate::error::UnsafeChangeError;
use crate::vsphere::PowerState;

use super::diff::{ChangeItem, ChangeSet};

/// Operating mode of a reconciliation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ApplyMode {
    /// Compute and apply pending changes.
    #[default]
    Apply,
    /// Compute and report pending changes without applying them.
    DryRun,
}

/// The admitted change-set, partitioned into its two submission units.
///
/// Each sub-list is submitted as one backend work item, never one item
/// per change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyPlan {
    /// Relocation changes, submitted first.
    pub relocations: Vec<ChangeItem>,
    /// Reconfiguration changes, submitted after relocation completes.
    pub reconfigurations: Vec<ChangeItem>,
}

/// Decision produced by the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The observed state already matches the desired state.
    NoChange,
    /// Changes are pending but the run is a dry-run; nothing reaches the
    /// executor.
    DryRun {
        /// Descriptions of the changes that would be applied.
        changes: Vec<String>,
    },
    /// Changes are pending and safe to apply.
    Apply(ApplyPlan),
}

/// Gate deciding whether a change-set may reach the executor.
#[derive(Debug, Default)]
pub struct SafetyGate;

impl ApplyPlan {
    /// Returns the descriptions of all admitted changes, relocations
    /// first.
    #[must_use]
    pub fn descriptions(&self) -> Vec<String> {
        self.relocations
            .iter()
            .chain(&self.reconfigurations)
            .map(|item| item.description.clone())
            .collect()
    }
}

impl SafetyGate {
    /// Creates a new gate.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decides whether the change-set may be applied.
    ///
    /// # Errors
    ///
    /// Returns an [`UnsafeChangeError`] enumerating every pending change
    /// when any item requires shutdown while the VM is powered on. The
    /// dry-run mode performs the same decision, so an unsafe plan fails
    /// the same way it would on a real run.
    pub fn admit(
        &self,
        changes: ChangeSet,
        power_state: PowerState,
        mode: ApplyMode,
    ) -> Result<GateDecision, UnsafeChangeError> {
        if changes.is_empty() {
            return Ok(GateDecision::NoChange);
        }

        if power_state.is_powered_on() && changes.any_requires_shutdown() {
            return Err(UnsafeChangeError {
                power_state,
                changes: changes.descriptions(),
            });
        }

        if mode == ApplyMode::DryRun {
            return Ok(GateDecision::DryRun {
                changes: changes.descriptions(),
            });
        }

        let (relocations, reconfigurations) = changes.partition();
        Ok(GateDecision::Apply(ApplyPlan {
            relocations,
            reconfigurations,
        }))
    }
}
