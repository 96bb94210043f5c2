//! Work-stealing queues: one deque per worker thread plus a shared
//! injector for newly-ready actions, per §4.3's "each worker owns a
//! local deque and may steal from any other worker's deque when its own
//! is empty."
//!
//! `crossbeam_deque::Worker` only exposes LIFO push/pop from the owning
//! end. Priority is approximated rather than exact: a batch of
//! newly-ready actions is sorted ascending by priority before being
//! pushed, so the highest-priority action in the batch lands on top and
//! is the next one popped.

use anvil_types::action::ActionId;
use crossbeam_deque::{Injector, Steal, Stealer, Worker};

/// One worker's local queue plus the means for other workers (and the
/// dispatcher) to see into it.
pub struct WorkerQueue {
    local: Worker<ActionId>,
}

impl WorkerQueue {
    /// Create a new empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self {
            local: Worker::new_lifo(),
        }
    }

    /// A handle other workers can steal through.
    #[must_use]
    pub fn stealer(&self) -> Stealer<ActionId> {
        self.local.stealer()
    }

    /// Push a batch of newly-ready actions, highest priority last (so it
    /// pops first).
    pub fn push_ready(&self, mut batch: Vec<(ActionId, i32)>) {
        batch.sort_by_key(|(_, priority)| *priority);
        for (id, _) in batch {
            self.local.push(id);
        }
    }

    /// Push a single action (used for retries, which skip the priority
    /// batch sort and go straight back in).
    pub fn push(&self, id: ActionId) {
        self.local.push(id);
    }

    /// Pop from this worker's own queue.
    pub fn pop(&self) -> Option<ActionId> {
        self.local.pop()
    }

    /// Whether this worker's local queue is currently empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }

    /// Try to steal work from another worker's queue into this one,
    /// returning one stolen action if any was available.
    pub fn steal_from(&self, stealer: &Stealer<ActionId>) -> Option<ActionId> {
        steal_into(stealer, &self.local)
    }

    /// Try to pull work from the shared injector into this queue.
    pub fn steal_from_injector(&self, injector: &Injector<ActionId>) -> Option<ActionId> {
        steal_from_injector(injector, &self.local)
    }
}

impl Default for WorkerQueue {
    fn default() -> Self {
        Self::new()
    }
}

/// Attempt to steal one action from `stealer` into `dest`, retrying on
/// the `Retry` result `crossbeam_deque` returns for contended steals.
pub fn steal_into(stealer: &Stealer<ActionId>, dest: &Worker<ActionId>) -> Option<ActionId> {
    loop {
        match stealer.steal_batch_and_pop(dest) {
            Steal::Success(id) => return Some(id),
            Steal::Empty => return None,
            Steal::Retry => continue,
        }
    }
}

/// Pull one action from the shared injector, retrying on contention.
pub fn steal_from_injector(injector: &Injector<ActionId>, dest: &Worker<ActionId>) -> Option<ActionId> {
    loop {
        match injector.steal_batch_and_pop(dest) {
            Steal::Success(id) => return Some(id),
            Steal::Empty => return None,
            Steal::Retry => continue,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ActionId {
        ActionId([n; 32])
    }

    #[test]
    fn higher_priority_pops_first_within_a_batch() {
        let queue = WorkerQueue::new();
        queue.push_ready(vec![(id(1), 0), (id(2), 10), (id(3), 5)]);
        assert_eq!(queue.pop(), Some(id(2)));
        assert_eq!(queue.pop(), Some(id(3)));
        assert_eq!(queue.pop(), Some(id(1)));
    }

    #[test]
    fn stealing_from_an_empty_stealer_returns_none() {
        let victim = WorkerQueue::new();
        let thief = Worker::<ActionId>::new_fifo();
        assert_eq!(steal_into(&victim.stealer(), &thief), None);
    }

    #[test]
    fn stealing_moves_work_from_victim_to_thief() {
        let victim = WorkerQueue::new();
        victim.push(id(7));
        let thief = Worker::<ActionId>::new_fifo();
        let stolen = steal_into(&victim.stealer(), &thief);
        assert!(stolen == Some(id(7)) || thief.pop() == Some(id(7)));
    }
}
