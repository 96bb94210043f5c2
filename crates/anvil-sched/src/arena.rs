//! Action arena: actions and in-flight scheduling state live here, indexed
//! by [`ActionId`] rather than referenced by pointer, per §9's "hold
//! actions in an arena indexed by `ActionId`; nodes and waiters reference
//! actions by id, not by pointer" design note.

use anvil_types::action::{Action, ActionId, ActionOutcome};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::watch;

/// Per-action bookkeeping the scheduler needs beyond the immutable
/// [`Action`] itself: completion signaling, cancellation, and attempt
/// count.
pub struct ActionSlot {
    /// The action this slot tracks.
    pub action: Action,
    /// Broadcasts the terminal outcome once known. `None` while in flight
    /// or not yet dispatched; every dependent and every caller of
    /// [`crate::ActionHandle::outcome`] subscribes to a clone of the
    /// receiver side, so a single execution can satisfy many waiters.
    pub outcome: watch::Sender<Option<ActionOutcome>>,
    /// Set by [`Arena::cancel`] (reached externally via
    /// [`crate::ActionHandle::cancel`]) or by the scheduler's own failure
    /// propagation; checked before each dispatch and before each retry
    /// attempt.
    pub cancelled: AtomicBool,
    /// Attempts made so far (1-based once dispatch starts).
    pub attempts: AtomicU32,
    /// Ids of actions that depend directly on this one, for completion
    /// propagation.
    pub dependents: Vec<ActionId>,
    /// Count of this action's own dependencies not yet resolved
    /// successfully. Reaches zero exactly once, at which point the action
    /// becomes ready to dispatch.
    pub pending_deps: AtomicU32,
}

impl ActionSlot {
    fn new(action: Action, dependents: Vec<ActionId>, pending_deps: u32) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            action,
            outcome: tx,
            cancelled: AtomicBool::new(false),
            attempts: AtomicU32::new(0),
            dependents,
            pending_deps: AtomicU32::new(pending_deps),
        }
    }

    /// Subscribe to this action's completion.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<ActionOutcome>> {
        self.outcome.subscribe()
    }
}

/// Owns every [`ActionSlot`] for one scheduler run, keyed by [`ActionId`].
/// A single `RwLock` over the map is adequate per §5 ("Worker registry: one
/// mutex; operations are O(workers) and workers are bounded") — the
/// equivalent bound here is the action count of one run, not an unbounded
/// server-lifetime structure.
#[derive(Default)]
pub struct Arena {
    slots: RwLock<HashMap<ActionId, Arc<ActionSlot>>>,
}

impl Arena {
    /// Build an arena from a flat action list, computing dependents and
    /// initial pending-dependency counts from each action's `deps`.
    #[must_use]
    pub fn build(actions: Vec<Action>) -> Self {
        let mut dependents: HashMap<ActionId, Vec<ActionId>> = HashMap::new();
        for action in &actions {
            for dep in &action.deps {
                dependents.entry(*dep).or_default().push(action.id);
            }
        }
        let mut slots = HashMap::with_capacity(actions.len());
        for action in actions {
            let id = action.id;
            let pending = u32::try_from(action.deps.len()).unwrap_or(u32::MAX);
            let deps = dependents.remove(&id).unwrap_or_default();
            slots.insert(id, Arc::new(ActionSlot::new(action, deps, pending)));
        }
        Self {
            slots: RwLock::new(slots),
        }
    }

    /// Look up a slot by id.
    #[must_use]
    pub fn get(&self, id: ActionId) -> Option<Arc<ActionSlot>> {
        self.slots.read().get(&id).cloned()
    }

    /// Every action id currently held, in arbitrary order.
    #[must_use]
    pub fn ids(&self) -> Vec<ActionId> {
        self.slots.read().keys().copied().collect()
    }

    /// Number of actions in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    /// Whether the arena holds no actions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }

    /// Actions with zero unresolved dependencies at construction time —
    /// the initial ready set the root seeds into worker queues.
    #[must_use]
    pub fn initially_ready(&self) -> Vec<ActionId> {
        self.slots
            .read()
            .iter()
            .filter(|(_, slot)| slot.pending_deps.load(Ordering::SeqCst) == 0)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Cancel `id`: finalizes it as [`ActionOutcome::Cancelled`] (unless
    /// it already reached a terminal outcome) and transitively cancels
    /// every dependent that hasn't finished either, so no descendant of a
    /// cancelled action is ever dispatched (§8). `remaining` is the run's
    /// outstanding-action counter, kept in lockstep so `worker_loop`'s
    /// "anything left to do" check still settles. Returns whether `id`
    /// itself was freshly cancelled by this call (`false` if it was
    /// already cancelled or had already completed).
    pub fn cancel(&self, id: ActionId, remaining: &AtomicUsize) -> bool {
        let Some(slot) = self.get(id) else {
            return false;
        };
        let cancelled_now = Self::mark_cancelled(&slot, remaining);
        if cancelled_now {
            self.cancel_dependents_of(&slot, remaining);
        }
        cancelled_now
    }

    /// Transitively cancel every dependent of `slot`, not `slot` itself.
    /// Shared by [`Arena::cancel`] (external, user-initiated) and the
    /// scheduler's own propagation on a non-retryable failure, so both
    /// paths leave `remaining` in the same state.
    pub fn cancel_dependents_of(&self, slot: &ActionSlot, remaining: &AtomicUsize) {
        let mut frontier = slot.dependents.clone();
        while let Some(dep_id) = frontier.pop() {
            let Some(dep_slot) = self.get(dep_id) else {
                continue;
            };
            if Self::mark_cancelled(&dep_slot, remaining) {
                frontier.extend(dep_slot.dependents.iter().copied());
            }
        }
    }

    /// Mark one slot cancelled and finalize it as `Cancelled`,
    /// decrementing `remaining`. Returns `false` (a no-op) if the slot
    /// already reached a terminal outcome (including a prior cancellation)
    /// so callers walking a dependency frontier don't re-walk an
    /// already-visited subtree, and so cancelling something that already
    /// finished is reported as having done nothing.
    fn mark_cancelled(slot: &ActionSlot, remaining: &AtomicUsize) -> bool {
        if slot.outcome.borrow().is_some() {
            return false;
        }
        if slot.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = slot.outcome.send(Some(ActionOutcome::Cancelled));
        remaining.fetch_sub(1, Ordering::SeqCst);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn action(id: u8, deps: &[u8]) -> Action {
        Action {
            id: ActionId([id; 32]),
            command: vec!["true".to_owned()],
            env: BTreeMap::new(),
            inputs: vec![],
            outputs: vec![],
            sandbox_spec: String::new(),
            timeout: None,
            priority: 0,
            deps: deps.iter().map(|d| ActionId([*d; 32])).collect(),
        }
    }

    #[test]
    fn initially_ready_excludes_actions_with_deps() {
        let arena = Arena::build(vec![action(1, &[]), action(2, &[1])]);
        let ready = arena.initially_ready();
        assert_eq!(ready, vec![ActionId([1u8; 32])]);
    }

    #[test]
    fn dependents_are_indexed_from_forward_deps() {
        let arena = Arena::build(vec![action(1, &[]), action(2, &[1])]);
        let slot = arena.get(ActionId([1u8; 32])).unwrap();
        assert_eq!(slot.dependents, vec![ActionId([2u8; 32])]);
    }

    #[test]
    fn cancel_marks_the_action_and_its_transitive_dependents() {
        let arena = Arena::build(vec![action(1, &[]), action(2, &[1]), action(3, &[2])]);
        let remaining = AtomicUsize::new(arena.len());

        assert!(arena.cancel(ActionId([2u8; 32]), &remaining));

        assert!(arena.get(ActionId([2u8; 32])).unwrap().cancelled.load(Ordering::SeqCst));
        assert!(arena.get(ActionId([3u8; 32])).unwrap().cancelled.load(Ordering::SeqCst));
        assert!(!arena.get(ActionId([1u8; 32])).unwrap().cancelled.load(Ordering::SeqCst));
        assert_eq!(remaining.load(Ordering::SeqCst), arena.len() - 2);
    }

    #[test]
    fn cancelling_twice_is_a_no_op_the_second_time() {
        let arena = Arena::build(vec![action(1, &[])]);
        let remaining = AtomicUsize::new(arena.len());

        assert!(arena.cancel(ActionId([1u8; 32]), &remaining));
        assert!(!arena.cancel(ActionId([1u8; 32]), &remaining));
        assert_eq!(remaining.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelling_an_already_succeeded_action_is_a_no_op() {
        let arena = Arena::build(vec![action(1, &[])]);
        let remaining = AtomicUsize::new(arena.len());
        let slot = arena.get(ActionId([1u8; 32])).unwrap();
        let _ = slot.outcome.send(Some(ActionOutcome::Success {
            output_hashes: vec![],
            duration: std::time::Duration::from_secs(0),
        }));
        remaining.fetch_sub(1, Ordering::SeqCst);

        assert!(!arena.cancel(ActionId([1u8; 32]), &remaining));
        assert_eq!(remaining.load(Ordering::SeqCst), 0);
        assert_eq!(
            slot.outcome.borrow().clone(),
            Some(ActionOutcome::Success {
                output_hashes: vec![],
                duration: std::time::Duration::from_secs(0),
            })
        );
    }
}
