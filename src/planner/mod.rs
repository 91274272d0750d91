//! Planning module for reconciliation runs.
//!
//! This module handles the comparison between desired and observed
//! states, the safety gating of the resulting change-set, the pool path
//! matcher, and the execution of admitted plans.

mod diff;
mod executor;
mod gate;
mod pool;

pub use diff::{ChangeItem, ChangeKind, ChangeOp, ChangeSet, GuestDiffEngine, ResolvedGuest};
pub use executor::ChangeExecutor;
pub use gate::{ApplyMode, ApplyPlan, GateDecision, SafetyGate};
pub use pool::{PoolDecision, find_target};
