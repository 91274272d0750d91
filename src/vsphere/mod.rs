//! vCenter API integration module.
//!
//! This module provides everything the engine needs from the backend:
//! the HTTP client, the backend trait seam, guest observation, task
//! tracking and the clone-from-template provisioner.

mod backend;
mod client;
mod observer;
mod provisioner;
mod tasks;
mod types;

pub use backend::GuestBackend;
pub use client::{ConnectOptions, VsphereClient};
pub use observer::{GuestFacts, GuestObserver, ObservedState};
pub use provisioner::{ClonePlacement, GuestProvisioner};
pub use tasks::{PollPolicy, TaskWaiter, WaitOptions};
pub use types::{
    CloneRequest, CpuInfo, DUPLICATE_NAME_FAULT, InventoryItem, MemoryInfo, NamedRef, ObjectKind,
    ObjectRef, PowerState, ReconfigureRequest, RelocateRequest, ResourcePoolItem, TaskFault,
    TaskHandle, TaskStatus, ToolsInfo, ToolsStatus, VmDetail, VmIdentity, VmPlacement,
};

#[cfg(test)]
pub use backend::MockGuestBackend;
