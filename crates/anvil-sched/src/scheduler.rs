//! The work-stealing scheduler itself: dispatches ready actions across a
//! fixed pool of worker tasks, retries transient failures with backoff,
//! propagates cancellation transitively through dependents, and honors
//! fail-fast or keep-going failure semantics for the remainder of the run.

use crate::arena::Arena;
use crate::executor::Executor;
use crate::handle::{ActionHandle, RunReport};
use crate::queue::WorkerQueue;
use crate::retry::RetryPolicy;
use anvil_types::action::{Action, ActionId, ActionOutcome};
use crossbeam_deque::{Injector, Stealer};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// How the run reacts to the first non-retryable action failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Stop dispatching any action that hasn't already started. Actions
    /// already executing are allowed to finish.
    FailFast,
    /// Keep dispatching everything not downstream of the failure; only
    /// that action's transitive dependents are blocked.
    KeepGoing,
}

/// Tunables for a [`Scheduler`].
#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Number of worker tasks to run concurrently.
    pub workers: usize,
    /// Retry policy applied to every action.
    pub retry_policy: RetryPolicy,
    /// Failure semantics for the run.
    pub failure_mode: FailureMode,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            workers: num_cpus::get().max(1),
            retry_policy: RetryPolicy::default(),
            failure_mode: FailureMode::KeepGoing,
        }
    }
}

/// Drives one graph of [`Action`]s to completion using a configured
/// [`Executor`].
pub struct Scheduler<E> {
    executor: Arc<E>,
    config: SchedulerConfig,
}

impl<E: Executor + 'static> Scheduler<E> {
    /// Build a scheduler around `executor`.
    pub fn new(executor: E, config: SchedulerConfig) -> Self {
        Self {
            executor: Arc::new(executor),
            config,
        }
    }

    /// Run `actions` to completion, blocking until every action reaches a
    /// terminal state (or is permanently blocked by a failed dependency).
    pub async fn run(&self, actions: Vec<Action>) -> RunReport {
        if actions.is_empty() {
            return RunReport::default();
        }
        let arena = Arc::new(Arena::build(actions));
        let remaining = Arc::new(AtomicUsize::new(arena.len()));
        let notify = Arc::new(Notify::new());
        dispatch_all(arena.clone(), self.executor.clone(), self.config, remaining, notify).await;
        build_report(&arena)
    }

    /// Like [`Scheduler::run`], but returns immediately with a handle per
    /// action so callers can await individual outcomes (e.g. to start
    /// downstream work the moment its inputs are ready), or cancel one via
    /// [`ActionHandle::cancel`], while the rest of the run continues in
    /// the background. Call [`RunHandle::join`] to wait for the whole run
    /// and get the final [`RunReport`].
    pub fn spawn_run(&self, actions: Vec<Action>) -> RunHandle {
        let arena = Arc::new(Arena::build(actions));
        let remaining = Arc::new(AtomicUsize::new(arena.len()));
        let notify = Arc::new(Notify::new());
        let handles = arena
            .ids()
            .into_iter()
            .filter_map(|id| {
                arena.get(id).map(|slot| {
                    let handle = ActionHandle::new(id, slot.subscribe(), arena.clone(), remaining.clone(), notify.clone());
                    (id, handle)
                })
            })
            .collect();

        let executor = self.executor.clone();
        let config = self.config;
        let arena_for_task = arena.clone();
        let remaining_for_task = remaining.clone();
        let notify_for_task = notify.clone();
        let join = tokio::spawn(async move {
            dispatch_all(arena_for_task.clone(), executor, config, remaining_for_task, notify_for_task).await;
            build_report(&arena_for_task)
        });

        RunHandle { join, handles }
    }
}

/// A run dispatched in the background via [`Scheduler::spawn_run`].
pub struct RunHandle {
    join: tokio::task::JoinHandle<RunReport>,
    handles: HashMap<ActionId, ActionHandle>,
}

impl RunHandle {
    /// A handle to await one action's outcome without waiting for the
    /// whole run to finish.
    #[must_use]
    pub fn handle_for(&self, id: ActionId) -> Option<ActionHandle> {
        self.handles.get(&id).cloned()
    }

    /// Wait for the entire run to finish and collect its summary.
    pub async fn join(self) -> RunReport {
        self.join.await.unwrap_or_default()
    }
}

struct WorkerCtx<E> {
    arena: Arc<Arena>,
    injector: Arc<Injector<ActionId>>,
    stealers: Arc<RwLock<Vec<Stealer<ActionId>>>>,
    remaining: Arc<AtomicUsize>,
    halted: Arc<AtomicBool>,
    notify: Arc<Notify>,
    executor: Arc<E>,
    retry_policy: RetryPolicy,
    failure_mode: FailureMode,
}

impl<E> Clone for WorkerCtx<E> {
    fn clone(&self) -> Self {
        Self {
            arena: self.arena.clone(),
            injector: self.injector.clone(),
            stealers: self.stealers.clone(),
            remaining: self.remaining.clone(),
            halted: self.halted.clone(),
            notify: self.notify.clone(),
            executor: self.executor.clone(),
            retry_policy: self.retry_policy,
            failure_mode: self.failure_mode,
        }
    }
}

async fn dispatch_all<E: Executor + 'static>(
    arena: Arc<Arena>,
    executor: Arc<E>,
    config: SchedulerConfig,
    remaining: Arc<AtomicUsize>,
    notify: Arc<Notify>,
) {
    let injector = Arc::new(Injector::<ActionId>::new());
    for id in arena.initially_ready() {
        injector.push(id);
    }

    let halted = Arc::new(AtomicBool::new(false));
    let stealers: Arc<RwLock<Vec<Stealer<ActionId>>>> = Arc::new(RwLock::new(Vec::new()));

    let mut handles = Vec::with_capacity(config.workers.max(1));
    for _ in 0..config.workers.max(1) {
        let local = WorkerQueue::new();
        stealers.write().push(local.stealer());
        let ctx = WorkerCtx {
            arena: arena.clone(),
            injector: injector.clone(),
            stealers: stealers.clone(),
            remaining: remaining.clone(),
            halted: halted.clone(),
            notify: notify.clone(),
            executor: executor.clone(),
            retry_policy: config.retry_policy,
            failure_mode: config.failure_mode,
        };
        handles.push(tokio::spawn(worker_loop(local, ctx)));
    }

    for handle in handles {
        let _ = handle.await;
    }
}

async fn worker_loop<E: Executor>(local: WorkerQueue, ctx: WorkerCtx<E>) {
    loop {
        let popped = local
            .pop()
            .or_else(|| local.steal_from_injector(&ctx.injector))
            .or_else(|| steal_from_peers(&local, &ctx));

        match popped {
            Some(id) => handle_action(id, &ctx, &local).await,
            None => {
                if ctx.remaining.load(Ordering::SeqCst) == 0 {
                    return;
                }
                let _ = tokio::time::timeout(Duration::from_millis(5), ctx.notify.notified()).await;
            }
        }
    }
}

fn steal_from_peers<E>(local: &WorkerQueue, ctx: &WorkerCtx<E>) -> Option<ActionId> {
    for stealer in ctx.stealers.read().iter() {
        if let Some(id) = local.steal_from(stealer) {
            return Some(id);
        }
    }
    None
}

async fn handle_action<E: Executor>(id: ActionId, ctx: &WorkerCtx<E>, local: &WorkerQueue) {
    let Some(slot) = ctx.arena.get(id) else {
        return;
    };

    if slot.cancelled.load(Ordering::SeqCst) {
        return;
    }

    if ctx.halted.load(Ordering::SeqCst) {
        finish(&slot, ActionOutcome::Cancelled, ctx, local);
        return;
    }

    let attempt = slot.attempts.fetch_add(1, Ordering::SeqCst) + 1;
    let outcome = ctx.executor.execute(&slot.action).await;

    if ctx.retry_policy.should_retry(&outcome, attempt) {
        let mut rng = rand::thread_rng();
        let backoff = ctx.retry_policy.backoff(attempt + 1, &mut rng);
        if !backoff.is_zero() {
            tokio::time::sleep(backoff).await;
        }
        if slot.cancelled.load(Ordering::SeqCst) || ctx.halted.load(Ordering::SeqCst) {
            finish(&slot, ActionOutcome::Cancelled, ctx, local);
            return;
        }
        local.push(id);
        ctx.notify.notify_waiters();
        return;
    }

    finish(&slot, outcome, ctx, local);
}

fn finish<E>(slot: &Arc<crate::arena::ActionSlot>, outcome: ActionOutcome, ctx: &WorkerCtx<E>, local: &WorkerQueue) {
    let is_success = matches!(outcome, ActionOutcome::Success { .. });
    let _ = slot.outcome.send(Some(outcome));
    ctx.remaining.fetch_sub(1, Ordering::SeqCst);

    if is_success {
        dispatch_ready_dependents(slot, ctx, local);
    } else {
        if ctx.failure_mode == FailureMode::FailFast {
            ctx.halted.store(true, Ordering::SeqCst);
        }
        ctx.arena.cancel_dependents_of(slot, &ctx.remaining);
    }

    ctx.notify.notify_waiters();
}

fn dispatch_ready_dependents<E>(slot: &Arc<crate::arena::ActionSlot>, ctx: &WorkerCtx<E>, local: &WorkerQueue) {
    if ctx.halted.load(Ordering::SeqCst) {
        return;
    }
    let mut ready = Vec::new();
    for dep_id in &slot.dependents {
        let Some(dep_slot) = ctx.arena.get(*dep_id) else {
            continue;
        };
        if dep_slot.cancelled.load(Ordering::SeqCst) {
            continue;
        }
        let previous = dep_slot.pending_deps.fetch_sub(1, Ordering::SeqCst);
        if previous == 1 {
            ready.push((*dep_id, dep_slot.action.priority));
        }
    }
    if !ready.is_empty() {
        local.push_ready(ready);
    }
}

fn build_report(arena: &Arena) -> RunReport {
    let mut report = RunReport::default();
    for id in arena.ids() {
        let Some(slot) = arena.get(id) else {
            continue;
        };
        let outcome = slot.outcome.borrow().clone();
        match outcome {
            Some(ActionOutcome::Success { .. }) => report.succeeded.push(id),
            Some(ActionOutcome::Failed { message, .. }) => report.failed.push((id, message)),
            Some(ActionOutcome::Timeout) => report.failed.push((id, "action timed out".to_owned())),
            Some(ActionOutcome::Cancelled) => report.cancelled.push(id),
            Some(ActionOutcome::Retryable { .. }) | None => report.blocked.push(id),
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::MockExecutor;
    use std::collections::BTreeMap;
    use std::time::Duration as StdDuration;

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

    fn success() -> ActionOutcome {
        ActionOutcome::Success {
            output_hashes: vec![],
            duration: StdDuration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn a_simple_chain_all_succeeds() {
        let executor = MockExecutor::always(success());
        let scheduler = Scheduler::new(executor, SchedulerConfig::default());
        let report = scheduler
            .run(vec![action(1, &[]), action(2, &[1]), action(3, &[2])])
            .await;
        assert_eq!(report.succeeded.len(), 3);
        assert!(report.failed.is_empty());
        assert!(report.cancelled.is_empty());
    }

    #[tokio::test]
    async fn keep_going_blocks_only_the_failed_branch() {
        let executor = MockExecutor::always(ActionOutcome::Failed {
            kind: "compile-error".to_owned(),
            message: "nope".to_owned(),
        });
        let config = SchedulerConfig {
            workers: 2,
            failure_mode: FailureMode::KeepGoing,
            ..SchedulerConfig::default()
        };
        let scheduler = Scheduler::new(executor, config);
        // Action 1 fails; action 2 depends on it and should be cancelled.
        // Action 3 is independent and isn't executed by this mock (it
        // always fails too), but it must still be dispatched rather than
        // blocked by action 1's failure.
        let report = scheduler.run(vec![action(1, &[]), action(2, &[1]), action(3, &[])]).await;
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.cancelled, vec![ActionId([2; 32])]);
    }

    #[tokio::test]
    async fn retryable_outcomes_eventually_succeed() {
        let executor = MockExecutor::sequence(vec![
            ActionOutcome::Retryable {
                attempt: 1,
                kind: "io".to_owned(),
            },
            success(),
        ]);
        let scheduler = Scheduler::new(executor, SchedulerConfig::default());
        let report = scheduler.run(vec![action(1, &[])]).await;
        assert_eq!(report.succeeded, vec![ActionId([1; 32])]);
    }

    #[tokio::test]
    async fn spawn_run_exposes_a_handle_before_the_whole_run_finishes() {
        let executor = MockExecutor::always(success());
        let scheduler = Scheduler::new(executor, SchedulerConfig::default());
        let run = scheduler.spawn_run(vec![action(1, &[])]);
        let handle = run.handle_for(ActionId([1; 32])).expect("handle exists");
        assert_eq!(handle.outcome().await, success());
        let report = run.join().await;
        assert_eq!(report.succeeded, vec![ActionId([1; 32])]);
    }

    #[tokio::test]
    async fn empty_run_reports_nothing() {
        let executor = MockExecutor::always(success());
        let scheduler = Scheduler::new(executor, SchedulerConfig::default());
        let report = scheduler.run(vec![]).await;
        assert_eq!(report, RunReport::default());
    }

    /// An executor that counts invocations and sleeps a bit on every
    /// call, so a test has a window to cancel a still-blocked dependent
    /// before its upstream dependency finishes.
    struct SlowExecutor {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Executor for SlowExecutor {
        async fn execute(&self, _action: &Action) -> ActionOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(StdDuration::from_millis(30)).await;
            success()
        }
    }

    #[tokio::test]
    async fn cancelling_a_handle_marks_it_cancelled_and_blocks_its_dependents() {
        let executor = SlowExecutor {
            calls: std::sync::atomic::AtomicUsize::new(0),
        };
        let scheduler = Scheduler::new(executor, SchedulerConfig::default());
        let run = scheduler.spawn_run(vec![action(1, &[]), action(2, &[1]), action(3, &[2])]);

        let dependent = run.handle_for(ActionId([2; 32])).expect("handle exists");
        assert!(dependent.cancel(), "first cancel of an in-flight action reports true");
        assert!(!dependent.cancel(), "cancelling an already-cancelled action is a no-op");

        let report = run.join().await;
        assert!(report.succeeded.contains(&ActionId([1; 32])));
        assert!(report.cancelled.contains(&ActionId([2; 32])));
        assert!(report.cancelled.contains(&ActionId([3; 32])));
    }

    #[tokio::test]
    async fn cancelling_an_already_finished_action_is_a_no_op() {
        let executor = MockExecutor::always(success());
        let scheduler = Scheduler::new(executor, SchedulerConfig::default());
        let run = scheduler.spawn_run(vec![action(1, &[])]);
        let handle = run.handle_for(ActionId([1; 32])).expect("handle exists");
        assert_eq!(handle.clone().outcome().await, success());

        assert!(!handle.cancel(), "cancelling a completed action must be a no-op");

        let report = run.join().await;
        assert_eq!(report.succeeded, vec![ActionId([1; 32])]);
    }
}
