//! Remote worker bookkeeping owned by the distributed coordinator.

use crate::action::ActionId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::SystemTime;

/// Coordinator-assigned identifier for a registered remote worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub u64);

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Lifecycle state of a registered worker.
///
/// Transitions: `Registering -> Idle -> Busy -> Idle (loop) -> Failed ->
/// Removed`. A worker in `Busy` carries exactly one assignment; a worker in
/// `Failed` carries none — enforced by [`Worker::assign`] /
/// [`Worker::mark_failed`], not left to callers to maintain by convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerState {
    /// Registration handshake in progress.
    Registering,
    /// Idle and eligible for assignment.
    Idle,
    /// Executing exactly one assigned action.
    Busy,
    /// Missed its heartbeat deadline; any assignment has been reclaimed.
    Failed,
    /// Permanently removed from the registry.
    Removed,
}

/// A worker's declared capability set: operating system, architecture,
/// available toolchains, and a coarse memory tier. Selection requires the
/// action's required set to be a *subset* of the worker's set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Capabilities {
    /// Free-form capability tags (e.g. `"os:linux"`, `"toolchain:rustc"`,
    /// `"mem:high"`). Kept as an opaque set rather than a fixed struct so
    /// new toolchains never require a core release.
    pub tags: BTreeSet<String>,
}

impl Capabilities {
    /// Whether `self` satisfies every tag `required` asks for.
    #[must_use]
    pub fn satisfies(&self, required: &Self) -> bool {
        required.tags.is_subset(&self.tags)
    }
}

/// Record maintained by the coordinator for one registered worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Worker {
    /// Coordinator-assigned id.
    pub id: WorkerId,
    /// Declared capabilities.
    pub capabilities: Capabilities,
    /// Timestamp of the last heartbeat received.
    pub last_heartbeat: SystemTime,
    /// Current lifecycle state.
    pub state: WorkerState,
    /// The action currently assigned, if any. Invariant: `Some` iff `state
    /// == Busy`.
    pub assignment: Option<ActionId>,
    /// Monotonic count of actions this worker has completed, used to
    /// tie-break selection toward least-recently-assigned workers.
    pub completed_count: u64,
}

impl Worker {
    /// Register a freshly-seen worker in the `Idle` state.
    #[must_use]
    pub fn new(id: WorkerId, capabilities: Capabilities, now: SystemTime) -> Self {
        Self {
            id,
            capabilities,
            last_heartbeat: now,
            state: WorkerState::Idle,
            assignment: None,
            completed_count: 0,
        }
    }

    /// Assign an action to this (idle) worker, transitioning it to `Busy`.
    ///
    /// Returns `false` (and makes no change) if the worker is not idle —
    /// callers must not assign over an existing assignment.
    pub fn assign(&mut self, action: ActionId) -> bool {
        if self.state != WorkerState::Idle {
            return false;
        }
        self.assignment = Some(action);
        self.state = WorkerState::Busy;
        true
    }

    /// Record completion of the current assignment, returning to `Idle`.
    pub fn complete(&mut self) {
        self.assignment = None;
        self.state = WorkerState::Idle;
        self.completed_count += 1;
    }

    /// Transition to `Failed`, releasing any assignment so the coordinator
    /// can reinsert it at the head of the scheduling queue.
    pub fn mark_failed(&mut self) -> Option<ActionId> {
        self.state = WorkerState::Failed;
        self.assignment.take()
    }

    /// Re-register a previously failed worker; it restarts `Idle`.
    pub fn reregister(&mut self, now: SystemTime) {
        self.state = WorkerState::Idle;
        self.assignment = None;
        self.last_heartbeat = now;
    }
}
