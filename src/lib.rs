// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(non_camel_case_types)]        // Types must follow CamelCase convention
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![deny(overflowing_literals)]        // Overflowing literals are forbidden
#![warn(missing_docs)]                // All public items should be documented
#![warn(unused_must_use)]             // Handle Result and Option explicitly

// Clippy lints (warnings only)
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::todo)]                // TODO warning
#![warn(clippy::unimplemented)]       // unimplemented!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::shadow_unrelated)]    // Shadowing unrelated variables warning
#![warn(clippy::cognitive_complexity)] // Limit cognitive complexity

// ============================================================================
// Crate Documentation
// ============================================================================

//! # guestctl
//!
//! Declarative, idempotent reconciliation of vSphere virtual machines.
//!
//! ## Overview
//!
//! guestctl compares the desired description of a guest (placement,
//! hardware, annotation, lifecycle state) against the live object on a
//! vCenter server and applies the minimal set of changes, tracking the
//! asynchronous backend tasks to completion:
//!
//! - Define the desired guest as code in a YAML configuration file
//! - Create missing guests from a template in a single clone operation
//! - Detect drift in pool, folder, annotation, CPU count and memory
//! - Block hardware changes that are unsafe while the guest is running
//! - Migrate guests between resource pools matched by path suffix
//! - Keep the in-guest tools agent at the desired version
//!
//! ## Architecture
//!
//! The system is built around **desired-state reconciliation**:
//!
//! 1. **Desired State**: defined in `guestctl.yaml`
//! 2. **Observed State**: read fresh from the vCenter API each run
//! 3. **Reconciler**: compares states, gates the change-set against the
//!    power state, and submits at most one relocation and one
//!    reconfiguration work item
//!
//! ## Modules
//!
//! - [`config`]: Configuration parsing and validation
//! - [`vsphere`]: vCenter API client, observation and task tracking
//! - [`planner`]: Diff computation, safety gating and plan execution
//! - [`reconciler`]: Guest reconciliation engine
//! - [`cli`]: Command-line interface
//!
//! ## Example
//!
//! ```yaml
//! vcenter:
//!   host: vcenter.mydomain.local
//!   username: automation@vsphere.local
//!
//! guest:
//!   name: myvm001
//!   template: debian12-template
//!   datacenter: DC1
//!   resource_pool: /Resources/Prod
//!   folder: web-servers
//!   datastore: SAN01
//!   num_cpus: 4
//!   memory_mb: 8192
//! ```

// ============================================================================
// Modules
// ============================================================================

pub mod cli;
pub mod config;
pub mod error;
pub mod planner;
pub mod reconciler;
pub mod vsphere;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, ConfigValidator, GuestSpec, GuestctlConfig, ToolsPolicy};
pub use error::{GuestctlError, Result};
pub use planner::{
    ApplyMode, ChangeExecutor, ChangeItem, ChangeKind, ChangeSet, GuestDiffEngine, SafetyGate,
};
pub use reconciler::{ReconcileOutcome, ReconcileReport, Reconciler};
pub use vsphere::{
    ConnectOptions, GuestBackend, GuestFacts, GuestObserver, GuestProvisioner, TaskWaiter,
    VsphereClient, WaitOptions,
};
