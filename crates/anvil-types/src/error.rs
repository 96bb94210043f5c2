//! Error taxonomy: one `thiserror` enum per component boundary (§7).
//!
//! Each variant is named after a *kind*, not wrapped in a generic
//! catch-all, so the driver can print structured context (component,
//! action id, target id, remediation) instead of a bare string.

use crate::action::ActionId;
use crate::target::TargetId;
use thiserror::Error;

/// Errors raised while building or querying the graph (`anvil-graph`).
/// All variants are fatal — construction either produces a usable [`Node`]
/// set or it fails outright.
///
/// [`Node`]: crate::Node
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A dependency or selector referenced a target id that doesn't exist.
    #[error("unknown target: {0}")]
    UnknownTarget(TargetId),
    /// Dependency resolution found a cycle; `path` names every node in it,
    /// in traversal order, starting and ending at the same id.
    #[error("dependency cycle: {}", path.iter().map(ToString::to_string).collect::<Vec<_>>().join(" -> "))]
    CycleDetected {
        /// The full cycle, first and last entries identical.
        path: Vec<TargetId>,
    },
    /// A declared source file does not exist on disk.
    #[error("missing source `{path}` declared by target {target}")]
    MissingSource {
        /// The target that declared the missing source.
        target: TargetId,
        /// The path that could not be found.
        path: String,
    },
    /// Two targets declared the same identifier.
    #[error("duplicate target identifier: {0}")]
    DuplicateIdentifier(TargetId),
    /// The toolchain registry has no entry for the target's language.
    #[error("no toolchain available for target {target} (language {language})")]
    ToolchainUnavailable {
        /// The target whose language could not be resolved.
        target: TargetId,
        /// The language tag that had no registered toolchain.
        language: String,
    },
    /// An internal bookkeeping invariant did not hold. Indicates a bug in
    /// the graph construction or traversal code, not a problem with the
    /// workspace being built.
    #[error("internal graph invariant violated: {0}")]
    Internal(String),
}

/// Errors raised by the action cache and content-addressed store
/// (`anvil-cache`). Most are locally recoverable per §7; only corruption of
/// the on-disk entry index escalates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// No entry found for the given [`ActionId`]. Not escalated — callers
    /// treat this as "must execute", not as a failure.
    #[error("cache miss for action {0}")]
    Miss(ActionId),
    /// An entry was found but failed signature verification or hash
    /// verification on read; the entry has already been deleted.
    #[error("cache entry for action {0} failed integrity verification and was evicted")]
    Corrupted(ActionId),
    /// The keyed MAC over a cache entry did not match.
    #[error("signature mismatch for action {0}")]
    SignatureMismatch(ActionId),
    /// Eviction ran and the store is still over its configured byte budget.
    #[error("content store is full after eviction (budget exceeded)")]
    StoreFull,
    /// Underlying filesystem I/O failure.
    #[error("cache I/O error: {0}")]
    Io(String),
}

/// Errors raised by the scheduler (`anvil-sched`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchedError {
    /// The action's retry budget (`maxAttempts`) was exhausted.
    #[error("action {0} exhausted its retry budget")]
    RetriesExhausted(ActionId),
    /// The handle was already consumed/awaited.
    #[error("action handle for {0} was already awaited")]
    HandleConsumed(ActionId),
    /// A dependency of this action failed non-retryably, so this action
    /// was never dispatched (keep-going mode).
    #[error("action {0} blocked: dependency {1} failed")]
    BlockedByDependency(ActionId, ActionId),
    /// Fail-fast mode halted the run before this action could dispatch.
    #[error("run halted (fail-fast) before action {0} could dispatch")]
    HaltedFailFast(ActionId),
}

/// Errors raised by the distributed coordinator (`anvil-coordinator`).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoordinatorError {
    /// No worker's capability set was a superset of what the action needs;
    /// the action has been parked, not failed.
    #[error("no capable worker available for action {0}")]
    NoCapableWorker(ActionId),
    /// The connection to a worker or client was lost.
    #[error("connection lost: {0}")]
    ConnectionLost(String),
    /// A received frame failed to decode, or decoded to an unexpected
    /// schema major version.
    #[error("wire protocol error: {0}")]
    Protocol(String),
    /// The REAPI façade received a call while disabled.
    #[error("REAPI support is not enabled on this coordinator")]
    ReapiNotSupported,
}

/// Aggregate error surfaced to the driver binary, carrying the structured
/// context §7 requires: component, action, target, remediation, cause.
#[derive(Debug, Error)]
#[error("{component}: {message}{}{}",
    action.as_ref().map(|a| format!(" (action {a})")).unwrap_or_default(),
    target.as_ref().map(|t| format!(" (target {t})")).unwrap_or_default())]
pub struct BuildError {
    /// Which subsystem raised this error (e.g. `"graph"`, `"cache"`).
    pub component: &'static str,
    /// Human-readable summary.
    pub message: String,
    /// The action in flight when the error occurred, if any.
    pub action: Option<ActionId>,
    /// The target in flight when the error occurred, if any.
    pub target: Option<TargetId>,
    /// A short suggestion for how to resolve the error, if one is known.
    pub remediation: Option<String>,
    /// The underlying cause, if this error wraps another.
    #[source]
    pub cause: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl BuildError {
    /// Construct a `BuildError` with no target/remediation/cause set.
    #[must_use]
    pub fn new(component: &'static str, message: impl Into<String>) -> Self {
        Self {
            component,
            message: message.into(),
            action: None,
            target: None,
            remediation: None,
            cause: None,
        }
    }

    /// Attach remediation advice.
    #[must_use]
    pub fn with_remediation(mut self, advice: impl Into<String>) -> Self {
        self.remediation = Some(advice.into());
        self
    }

    /// Attach the target id in flight.
    #[must_use]
    pub fn with_target(mut self, target: TargetId) -> Self {
        self.target = Some(target);
        self
    }

    /// Attach the action id in flight.
    #[must_use]
    pub fn with_action(mut self, action: ActionId) -> Self {
        self.action = Some(action);
        self
    }
}
