//! Public handle types: a caller-facing way to await one action's
//! outcome independently of the whole run finishing, and the summary
//! produced once a run completes.

use crate::arena::Arena;
use anvil_types::action::{ActionId, ActionOutcome};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use tokio::sync::{watch, Notify};

/// A subscription to a single action's terminal outcome. Cloning an
/// `ActionHandle` gives a second independent waiter for the same action —
/// this is the multi-waiter property a one-shot channel can't provide,
/// needed because several dependents (and the caller) may all want to
/// observe the same action complete.
#[derive(Clone)]
pub struct ActionHandle {
    id: ActionId,
    receiver: watch::Receiver<Option<ActionOutcome>>,
    arena: Arc<Arena>,
    remaining: Arc<AtomicUsize>,
    notify: Arc<Notify>,
}

impl ActionHandle {
    pub(crate) fn new(
        id: ActionId,
        receiver: watch::Receiver<Option<ActionOutcome>>,
        arena: Arc<Arena>,
        remaining: Arc<AtomicUsize>,
        notify: Arc<Notify>,
    ) -> Self {
        Self {
            id,
            receiver,
            arena,
            remaining,
            notify,
        }
    }

    /// The action this handle tracks.
    #[must_use]
    pub fn action_id(&self) -> ActionId {
        self.id
    }

    /// Wait for the action to reach a terminal outcome. Resolves
    /// immediately if the outcome is already known. If the scheduler
    /// drops the action's slot without ever sending an outcome (it never
    /// will, in normal operation) this resolves to `Cancelled` rather than
    /// hanging forever.
    pub async fn outcome(mut self) -> ActionOutcome {
        loop {
            if let Some(outcome) = self.receiver.borrow_and_update().clone() {
                return outcome;
            }
            if self.receiver.changed().await.is_err() {
                return ActionOutcome::Cancelled;
            }
        }
    }

    /// Cancel this action (§4.3): sets its cancellation flag so the
    /// scheduler skips dispatching it (or retrying it after a transient
    /// failure) and transitively cancels every not-yet-finished dependent,
    /// so no descendant of a cancelled action is ever dispatched (§8). A
    /// no-op, returning `false`, if the action already reached a terminal
    /// outcome or was already cancelled.
    ///
    /// This only sets the cooperative flag; it does not reach into an
    /// already in-flight execution. An `Executor` whose action runs a real
    /// child process or RPC is responsible for the SIGTERM-then-SIGKILL
    /// behavior §4.3 describes, by observing its own cancellation source
    /// (e.g. the sandbox's `SandboxSpec`), since `anvil-sched` never holds
    /// a process handle directly.
    pub fn cancel(&self) -> bool {
        let cancelled = self.arena.cancel(self.id, &self.remaining);
        if cancelled {
            self.notify.notify_waiters();
        }
        cancelled
    }
}

/// Summary of one completed (or halted) scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Actions that completed successfully.
    pub succeeded: Vec<ActionId>,
    /// Actions that failed non-retryably, with a short message.
    pub failed: Vec<(ActionId, String)>,
    /// Actions cancelled directly or transitively (dependency failure,
    /// user cancellation, or fail-fast halt).
    pub cancelled: Vec<ActionId>,
    /// Actions that never reached a terminal state (should only be
    /// non-empty if the run was interrupted before `join` completed).
    pub blocked: Vec<ActionId>,
}

impl RunReport {
    /// Whether every action in the run succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty() && self.cancelled.is_empty() && self.blocked.is_empty()
    }
}
