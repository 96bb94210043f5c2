//! End-of-run summary returned by the driver binary's `build` subcommand.

use crate::action::ActionId;
use crate::target::TargetId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Outcome of a single target within a [`BuildReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetReport {
    /// The target this report covers.
    pub target: TargetId,
    /// The action id the target's fingerprint resolved to.
    pub action: ActionId,
    /// Whether the action was served from cache.
    pub cached: bool,
    /// Wall-clock duration of the build (or cache lookup).
    pub duration: Duration,
    /// Whether the target ultimately succeeded.
    pub succeeded: bool,
}

/// Aggregate summary of one `anvil build` invocation, sufficient to drive
/// the exit-code mapping in §6 and to assert against in end-to-end tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildReport {
    /// Per-target reports, in completion order.
    pub targets: Vec<TargetReport>,
}

impl BuildReport {
    /// Number of actions served from cache.
    #[must_use]
    pub fn cache_hits(&self) -> usize {
        self.targets.iter().filter(|t| t.cached).count()
    }

    /// Number of actions actually executed.
    #[must_use]
    pub fn cache_misses(&self) -> usize {
        self.targets.iter().filter(|t| !t.cached).count()
    }

    /// Whether every target succeeded.
    #[must_use]
    pub fn all_succeeded(&self) -> bool {
        self.targets.iter().all(|t| t.succeeded)
    }

    /// The process exit code this report maps to per §6: 0 on success, 1
    /// if any target failed.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        i32::from(!self.all_succeeded())
    }
}
