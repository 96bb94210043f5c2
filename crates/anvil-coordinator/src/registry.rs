//! The coordinator's worker registry (§4.4): tracks every registered
//! worker's capabilities, lifecycle state and load, and selects the best
//! candidate for a given capability requirement.

use anvil_sched::LoadSample;
use anvil_types::action::ActionId;
use anvil_types::worker::{Capabilities, Worker, WorkerId, WorkerState};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::SystemTime;

/// Coordinator-only bookkeeping alongside the shared [`Worker`] record:
/// its most recent load sample and when it was last handed an assignment,
/// neither of which belong on the type shared with other crates.
#[derive(Debug, Clone)]
struct WorkerEntry {
    worker: Worker,
    last_load: LoadSample,
    last_assigned: Option<SystemTime>,
}

/// Thread-safe table of every worker the coordinator knows about.
pub struct WorkerRegistry {
    entries: Mutex<BTreeMap<WorkerId, WorkerEntry>>,
    next_id: Mutex<u64>,
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkerRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            next_id: Mutex::new(1),
        }
    }

    /// Register a new worker, assigning it a fresh id.
    pub fn register(&self, capabilities: Capabilities, now: SystemTime) -> WorkerId {
        let id = {
            let mut next_id = self.next_id.lock();
            let id = WorkerId(*next_id);
            *next_id += 1;
            id
        };
        self.entries.lock().insert(
            id,
            WorkerEntry {
                worker: Worker::new(id, capabilities, now),
                last_load: LoadSample {
                    queue_depth: 0,
                    in_flight: 0,
                    steal_success_rate: 0.0,
                },
                last_assigned: None,
            },
        );
        id
    }

    /// Record a heartbeat and load sample from `id`.
    pub fn heartbeat(&self, id: WorkerId, load: LoadSample, now: SystemTime) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.worker.last_heartbeat = now;
            entry.last_load = load;
        }
    }

    /// Select the best idle worker whose capabilities satisfy `required`:
    /// the least-loaded one, breaking ties toward the worker that has gone
    /// longest without an assignment (§4.4's least-recently-assigned
    /// tiebreak).
    #[must_use]
    pub fn select_for(&self, required: &Capabilities) -> Option<WorkerId> {
        let entries = self.entries.lock();
        let mut best: Option<(&WorkerId, &WorkerEntry)> = None;
        for (id, entry) in entries.iter() {
            if entry.worker.state != WorkerState::Idle {
                continue;
            }
            if !entry.worker.capabilities.satisfies(required) {
                continue;
            }
            best = match best {
                None => Some((id, entry)),
                Some((_, current)) => {
                    if entry.last_load.less_loaded_than(&current.last_load) {
                        Some((id, entry))
                    } else if current.last_load.less_loaded_than(&entry.last_load) {
                        best
                    } else if entry.last_assigned < current.last_assigned {
                        Some((id, entry))
                    } else {
                        best
                    }
                }
            };
        }
        best.map(|(id, _)| *id)
    }

    /// Mark `id` as assigned `action`, transitioning it to `Busy` and
    /// stamping the assignment time for the least-recently-assigned
    /// tiebreak. Returns `false` if `id` was not idle.
    pub fn assign(&self, id: WorkerId, action: ActionId, now: SystemTime) -> bool {
        let mut entries = self.entries.lock();
        let Some(entry) = entries.get_mut(&id) else {
            return false;
        };
        if entry.worker.assign(action) {
            entry.last_assigned = Some(now);
            true
        } else {
            false
        }
    }

    /// Record a completed assignment, returning `id` to `Idle`.
    pub fn complete(&self, id: WorkerId) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.worker.complete();
        }
    }

    /// Mark `id` as `Failed`, releasing any in-flight assignment back to
    /// the caller so it can be requeued.
    pub fn mark_failed(&self, id: WorkerId) -> Option<ActionId> {
        self.entries
            .lock()
            .get_mut(&id)
            .and_then(|entry| entry.worker.mark_failed())
    }

    /// Re-register a previously failed worker.
    pub fn reregister(&self, id: WorkerId, now: SystemTime) {
        if let Some(entry) = self.entries.lock().get_mut(&id) {
            entry.worker.reregister(now);
        }
    }

    /// Every worker whose last heartbeat is older than `timeout`, relative
    /// to `now`. The caller (the coordinator's health-check tick) is
    /// responsible for calling [`WorkerRegistry::mark_failed`] on each.
    #[must_use]
    pub fn stale_workers(&self, now: SystemTime, timeout: std::time::Duration) -> Vec<WorkerId> {
        self.entries
            .lock()
            .iter()
            .filter(|(_, entry)| {
                entry.worker.state != WorkerState::Failed
                    && entry.worker.state != WorkerState::Removed
                    && now
                        .duration_since(entry.worker.last_heartbeat)
                        .map(|elapsed| elapsed > timeout)
                        .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect()
    }

    /// Snapshot of a single worker's state, for diagnostics.
    #[must_use]
    pub fn worker_state(&self, id: WorkerId) -> Option<WorkerState> {
        self.entries.lock().get(&id).map(|entry| entry.worker.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::time::Duration;

    fn caps(tags: &[&str]) -> Capabilities {
        Capabilities {
            tags: tags.iter().map(|s| (*s).to_owned()).collect::<BTreeSet<_>>(),
        }
    }

    #[test]
    fn selects_only_workers_satisfying_required_capabilities() {
        let registry = WorkerRegistry::new();
        let now = SystemTime::now();
        let weak = registry.register(caps(&["os:linux"]), now);
        let strong = registry.register(caps(&["os:linux", "toolchain:rustc"]), now);

        let selected = registry.select_for(&caps(&["toolchain:rustc"]));
        assert_eq!(selected, Some(strong));
        assert_ne!(selected, Some(weak));
    }

    #[test]
    fn prefers_least_loaded_worker() {
        let registry = WorkerRegistry::new();
        let now = SystemTime::now();
        let busy = registry.register(caps(&[]), now);
        let idle = registry.register(caps(&[]), now);
        registry.heartbeat(
            busy,
            LoadSample {
                queue_depth: 5,
                in_flight: 1,
                steal_success_rate: 0.0,
            },
            now,
        );
        registry.heartbeat(
            idle,
            LoadSample {
                queue_depth: 0,
                in_flight: 0,
                steal_success_rate: 0.0,
            },
            now,
        );

        assert_eq!(registry.select_for(&Capabilities::default()), Some(idle));
    }

    #[test]
    fn ties_break_toward_least_recently_assigned() {
        let registry = WorkerRegistry::new();
        let now = SystemTime::now();
        let a = registry.register(caps(&[]), now);
        let b = registry.register(caps(&[]), now);
        // `a` was assigned recently; `b` never was. `b` should win the tie.
        registry.assign(a, ActionId([1; 32]), now);
        registry.complete(a);

        assert_eq!(registry.select_for(&Capabilities::default()), Some(b));
    }

    #[test]
    fn assign_fails_against_a_busy_worker() {
        let registry = WorkerRegistry::new();
        let now = SystemTime::now();
        let id = registry.register(caps(&[]), now);
        assert!(registry.assign(id, ActionId([1; 32]), now));
        assert!(!registry.assign(id, ActionId([2; 32]), now));
    }

    #[test]
    fn mark_failed_releases_the_assignment() {
        let registry = WorkerRegistry::new();
        let now = SystemTime::now();
        let id = registry.register(caps(&[]), now);
        registry.assign(id, ActionId([3; 32]), now);
        let released = registry.mark_failed(id);
        assert_eq!(released, Some(ActionId([3; 32])));
        assert_eq!(registry.worker_state(id), Some(WorkerState::Failed));
    }

    #[test]
    fn stale_workers_are_reported_after_the_timeout_elapses() {
        let registry = WorkerRegistry::new();
        let past = SystemTime::now() - Duration::from_secs(60);
        let id = registry.register(caps(&[]), past);
        let stale = registry.stale_workers(SystemTime::now(), Duration::from_secs(10));
        assert_eq!(stale, vec![id]);
    }
}
