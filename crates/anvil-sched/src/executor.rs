//! The scheduler's boundary to whatever actually runs an [`Action`].
//!
//! `anvil-sched` never depends on `anvil-cache` or `anvil-handler`
//! directly — the driver binary wires a concrete executor (cache lookup,
//! sandboxed handler invocation, cache store) in at runtime. This keeps
//! the scheduler testable with a `MockExecutor` and reusable by anything
//! that can produce an [`ActionOutcome`] for an [`Action`].

use anvil_types::action::{Action, ActionOutcome};
use async_trait::async_trait;

/// Executes one [`Action`] attempt and reports its outcome.
///
/// Implementations are responsible for honoring `action.timeout`
/// themselves or relying on the scheduler's own timeout wrapper; either
/// is valid, but an implementation that ignores the timeout entirely
/// will never observe `ActionOutcome::Timeout` reported back to it.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one attempt of `action`, returning its terminal-for-this-attempt
    /// outcome. Must not panic on ordinary failure; ordinary failure is
    /// `ActionOutcome::Failed` or `ActionOutcome::Retryable`.
    async fn execute(&self, action: &Action) -> ActionOutcome;
}

/// A scripted executor for tests: returns outcomes from a fixed sequence
/// (consumed one call at a time, repeating the last entry once exhausted)
/// or a closure-backed default.
#[cfg(any(test, feature = "test-support"))]
pub struct MockExecutor {
    outcomes: std::sync::Mutex<std::collections::VecDeque<ActionOutcome>>,
    default: ActionOutcome,
}

#[cfg(any(test, feature = "test-support"))]
impl MockExecutor {
    /// An executor that always returns `outcome`.
    #[must_use]
    pub fn always(outcome: ActionOutcome) -> Self {
        Self {
            outcomes: std::sync::Mutex::new(std::collections::VecDeque::new()),
            default: outcome,
        }
    }

    /// An executor that returns each of `outcomes` in order, then repeats
    /// the last one.
    #[must_use]
    pub fn sequence(outcomes: Vec<ActionOutcome>) -> Self {
        let default = outcomes
            .last()
            .cloned()
            .unwrap_or(ActionOutcome::Cancelled);
        Self {
            outcomes: std::sync::Mutex::new(outcomes.into()),
            default,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Executor for MockExecutor {
    async fn execute(&self, _action: &Action) -> ActionOutcome {
        let mut queue = self
            .outcomes
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        queue.pop_front().unwrap_or_else(|| self.default.clone())
    }
}
