//! Task execution and polling state machine.
//!
//! Submitted backend work is tracked to a terminal state here:
//! `Submitted -> Polling -> {Success, Failure}`. Intermediate statuses
//! (queued, running, progress reports) keep the machine polling with
//! bounded exponential back-off. The first terminal status decides the
//! outcome; a failure is fatal to the calling action and never retried.

use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::error::{Result, TaskError};

use super::backend::GuestBackend;
use super::types::{DUPLICATE_NAME_FAULT, TaskFault, TaskHandle, TaskStatus};

/// Generic message for unclassified task failures.
const GENERIC_FAILURE_MESSAGE: &str = "an error occurred while waiting for the task to complete";

/// Default initial poll interval in milliseconds.
const DEFAULT_INITIAL_POLL_MS: u64 = 500;

/// Default poll interval ceiling in seconds.
const DEFAULT_MAX_POLL_SECS: u64 = 10;

/// Back-off policy for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// First interval between polls.
    pub initial: Duration,
    /// Ceiling the interval doubles up to.
    pub max: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(DEFAULT_INITIAL_POLL_MS),
            max: Duration::from_secs(DEFAULT_MAX_POLL_SECS),
        }
    }
}

/// Waiting parameters shared by every action of one reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct WaitOptions {
    /// Back-off policy for polling.
    pub policy: PollPolicy,
    /// Optional overall deadline per task.
    pub deadline: Option<Duration>,
    /// Cancellation signal observed between polls.
    pub cancel: CancellationToken,
}

impl WaitOptions {
    /// Builds a waiter over the given backend with these parameters.
    #[must_use]
    pub fn waiter<'a>(&self, backend: &'a dyn GuestBackend) -> TaskWaiter<'a> {
        let waiter = TaskWaiter::new(backend)
            .with_policy(self.policy)
            .with_cancellation(self.cancel.clone());
        match self.deadline {
            Some(deadline) => waiter.with_deadline(deadline),
            None => waiter,
        }
    }
}

/// Internal machine states while a task is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WaitState {
    /// The backend accepted the work and returned a handle.
    Submitted,
    /// Repeatedly querying until a terminal status is reported.
    Polling,
}

/// Tracks one submitted backend task to its terminal state.
pub struct TaskWaiter<'a> {
    /// Backend to poll.
    backend: &'a dyn GuestBackend,
    /// Back-off policy.
    policy: PollPolicy,
    /// Optional overall deadline for the wait.
    deadline: Option<Duration>,
    /// Cancellation signal supplied by the caller.
    cancel: CancellationToken,
}

impl<'a> TaskWaiter<'a> {
    /// Creates a waiter with the default back-off policy, no deadline and
    /// a never-firing cancellation token.
    #[must_use]
    pub fn new(backend: &'a dyn GuestBackend) -> Self {
        Self {
            backend,
            policy: PollPolicy::default(),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Sets the back-off policy.
    #[must_use]
    pub const fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets an overall deadline for the wait.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the cancellation token observed between polls.
    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Polls the task until it reaches a terminal state and returns the
    /// success payload.
    ///
    /// The handle is consumed: its outcome is observed exactly once, then
    /// it is discarded. Cancellation and deadline only stop observation on
    /// this side; the backend task may still run to completion remotely.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Failed`] on a terminal failure status (refined
    /// to name the conflicting object for name-collision faults),
    /// [`TaskError::Cancelled`] when the token fires, and
    /// [`TaskError::DeadlineExceeded`] when the deadline elapses first.
    pub async fn wait(&self, task: TaskHandle) -> Result<serde_json::Value> {
        let started = Instant::now();
        let mut interval = self.policy.initial;
        let mut state = WaitState::Submitted;

        loop {
            if let Some(limit) = self.deadline
                && started.elapsed() >= limit
            {
                return Err(TaskError::DeadlineExceeded {
                    waited_secs: started.elapsed().as_secs(),
                }
                .into());
            }

            let status = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(TaskError::Cancelled.into()),
                status = self.backend.poll_task(&task) => status?,
            };

            if state == WaitState::Submitted {
                debug!(task = %task, "task accepted, polling until terminal");
                state = WaitState::Polling;
            }

            match status {
                TaskStatus::Pending => trace!(task = %task, "task queued"),
                TaskStatus::Running { progress } => {
                    trace!(task = %task, progress = ?progress, "task running");
                }
                TaskStatus::Succeeded { result } => {
                    debug!(task = %task, "task completed successfully");
                    return Ok(result);
                }
                TaskStatus::Failed { fault } => {
                    return Err(TaskError::Failed {
                        message: classify_fault(&fault),
                        kind: fault.kind,
                    }
                    .into());
                }
            }

            tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err(TaskError::Cancelled.into()),
                () = tokio::time::sleep(interval) => {}
            }

            interval = (interval * 2).min(self.policy.max);
        }
    }
}

/// Builds the user-facing message for a terminal task fault.
///
/// A recognized name-collision fault names the conflicting object; every
/// other fault kind falls back to the generic message.
fn classify_fault(fault: &TaskFault) -> String {
    if fault.kind == DUPLICATE_NAME_FAULT
        && let Some(name) = &fault.name
    {
        format!("an object with the name {name} already exists")
    } else {
        GENERIC_FAILURE_MESSAGE.to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::*;
    use crate::error::GuestctlError;
    use crate::vsphere::backend::MockGuestBackend;

    fn fast_policy() -> PollPolicy {
        PollPolicy {
            initial: Duration::from_millis(1),
            max: Duration::from_millis(4),
        }
    }

    fn running() -> TaskStatus {
        TaskStatus::Running { progress: None }
    }

    #[tokio::test]
    async fn test_wait_reaches_success_after_intermediate_statuses() {
        let mut backend = MockGuestBackend::new();
        let calls = AtomicUsize::new(0);
        backend.expect_poll_task().returning(move |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            Ok(match n {
                0 => TaskStatus::Pending,
                1 => running(),
                _ => TaskStatus::Succeeded {
                    result: json!({"vm": "vm-77"}),
                },
            })
        });

        let waiter = TaskWaiter::new(&backend).with_policy(fast_policy());
        let result = waiter.wait(TaskHandle::new("task-1")).await.unwrap();
        assert_eq!(result, json!({"vm": "vm-77"}));
    }

    #[tokio::test]
    async fn test_duplicate_name_fault_names_the_colliding_object() {
        let mut backend = MockGuestBackend::new();
        backend.expect_poll_task().returning(|_| {
            Ok(TaskStatus::Failed {
                fault: TaskFault {
                    kind: String::from("DuplicateName"),
                    message: None,
                    name: Some(String::from("myvm001")),
                },
            })
        });

        let waiter = TaskWaiter::new(&backend).with_policy(fast_policy());
        let err = waiter.wait(TaskHandle::new("task-2")).await.unwrap_err();
        match err {
            GuestctlError::Task(TaskError::Failed { message, kind }) => {
                assert_eq!(message, "an object with the name myvm001 already exists");
                assert_eq!(kind, "DuplicateName");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unrecognized_fault_uses_generic_message() {
        let mut backend = MockGuestBackend::new();
        backend.expect_poll_task().returning(|_| {
            Ok(TaskStatus::Failed {
                fault: TaskFault {
                    kind: String::from("InsufficientResourcesFault"),
                    message: Some(String::from("no admission")),
                    name: None,
                },
            })
        });

        let waiter = TaskWaiter::new(&backend).with_policy(fast_policy());
        let err = waiter.wait(TaskHandle::new("task-3")).await.unwrap_err();
        match err {
            GuestctlError::Task(TaskError::Failed { message, .. }) => {
                assert_eq!(
                    message,
                    "an error occurred while waiting for the task to complete"
                );
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_stops_polling() {
        let mut backend = MockGuestBackend::new();
        backend.expect_poll_task().returning(|_| Ok(running()));

        let waiter = TaskWaiter::new(&backend)
            .with_policy(fast_policy())
            .with_deadline(Duration::from_millis(20));
        let err = waiter.wait(TaskHandle::new("task-4")).await.unwrap_err();
        assert!(matches!(
            err,
            GuestctlError::Task(TaskError::DeadlineExceeded { .. })
        ));
    }

    #[tokio::test]
    async fn test_cancellation_stops_observation() {
        let mut backend = MockGuestBackend::new();
        backend.expect_poll_task().returning(|_| Ok(running()));

        let cancel = CancellationToken::new();
        cancel.cancel();

        let waiter = TaskWaiter::new(&backend)
            .with_policy(fast_policy())
            .with_cancellation(cancel);
        let err = waiter.wait(TaskHandle::new("task-5")).await.unwrap_err();
        assert!(matches!(err, GuestctlError::Task(TaskError::Cancelled)));
    }

    #[test]
    fn test_classify_duplicate_name_without_name_falls_back() {
        let fault = TaskFault {
            kind: String::from("DuplicateName"),
            message: None,
            name: None,
        };
        assert_eq!(classify_fault(&fault), GENERIC_FAILURE_MESSAGE);
    }
}
