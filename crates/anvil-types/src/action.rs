//! The cacheable unit of work derived from a [`crate::Target`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stable identifier for an [`Action`].
///
/// `ActionId(A) = hash(command ∥ sorted inputs with hashes ∥ env ∥ sandbox
/// spec ∥ schema version)`, computed by [`Action::derive_id`] — callers
/// assemble `command`/`inputs`/`env`/`sandbox_spec` (typically `anvil-driver`,
/// once it has resolved a target against a language handler) and pass them
/// in; this type itself is just the fixed-size output. Storing it as a
/// 32-byte array (rather than re-deriving a `String`) keeps the cache index
/// and the wire protocol working with a fixed-size, `Copy` key.
///
/// This is a distinct concept from `anvil-graph`'s node fingerprint: the
/// fingerprint captures *why a target needs rebuilding* (sources, transitive
/// deps, toolchain); `ActionId` captures *what was actually asked of the
/// cache* for one dispatched unit of work, per the invariant above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionId(pub [u8; 32]);

impl ActionId {
    /// View the id as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Display for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ActionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ActionId({self})")
    }
}

/// Schema version folded into every [`Action::derive_id`] call. Bumping it
/// invalidates every existing `ActionId` at once, matching how
/// `anvil-graph::fingerprint::FINGERPRINT_SCHEMA_VERSION` handles the
/// analogous bump for node fingerprints.
pub const ACTION_SCHEMA_VERSION: u16 = 1;

/// A single declared input to an [`Action`]: a path plus its content hash,
/// so the scheduler never needs to re-hash a file to build an `ActionId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionInput {
    /// Path relative to the workspace root.
    pub path: String,
    /// BLAKE3 content hash of the file at the time this action was built.
    pub content_hash: [u8; 32],
}

/// The unit of cacheable work dispatched by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Stable id, derived from the fields below via `anvil-graph`.
    pub id: ActionId,
    /// Command vector; element 0 is the program.
    pub command: Vec<String>,
    /// Environment variables, in sorted-by-key order (required for
    /// `ActionId` determinism under permutation, per spec invariant).
    pub env: BTreeMap<String, String>,
    /// Declared inputs with content hashes.
    pub inputs: Vec<ActionInput>,
    /// Declared output paths, relative to the sandbox's writable scratch.
    pub outputs: Vec<String>,
    /// Sandbox spec serialized to a stable string (the real `SandboxSpec`
    /// type lives in `anvil-sandbox`; this crate can't depend on it without
    /// creating a cycle, so actions carry it pre-encoded).
    pub sandbox_spec: String,
    /// Wall-clock timeout, if any.
    pub timeout: Option<std::time::Duration>,
    /// Scheduling priority; higher runs first within a worker's queue.
    pub priority: i32,
    /// Actions that must complete successfully before this one may dispatch.
    pub deps: Vec<ActionId>,
}

impl Action {
    /// Derive the canonical `ActionId` for the given `command`/`inputs`/
    /// `env`/`sandbox_spec`, per the §3/§8 invariant: `ActionId(A) =
    /// hash(command ∥ sorted inputs with hashes ∥ env ∥ sandbox spec ∥
    /// schema version)`. `inputs` need not already be sorted — this sorts
    /// a local copy by path, so permuting the caller's input order never
    /// changes the result. `env`'s `BTreeMap` is already ordered by key.
    #[must_use]
    pub fn derive_id(
        command: &[String],
        inputs: &[ActionInput],
        env: &BTreeMap<String, String>,
        sandbox_spec: &str,
    ) -> ActionId {
        let mut sorted_inputs: Vec<&ActionInput> = inputs.iter().collect();
        sorted_inputs.sort_by(|a, b| a.path.cmp(&b.path));

        let mut buf = Vec::new();
        for part in command {
            buf.extend_from_slice(part.as_bytes());
            buf.push(0);
        }
        for input in sorted_inputs {
            buf.extend_from_slice(input.path.as_bytes());
            buf.push(0);
            buf.extend_from_slice(&input.content_hash);
        }
        for (key, value) in env {
            buf.extend_from_slice(key.as_bytes());
            buf.push(0);
            buf.extend_from_slice(value.as_bytes());
            buf.push(0);
        }
        buf.extend_from_slice(sandbox_spec.as_bytes());
        buf.extend_from_slice(&ACTION_SCHEMA_VERSION.to_be_bytes());

        ActionId(anvil_crypto::hash(&buf))
    }
}

/// Classification of whether an [`ActionOutcome`] may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RetryClass {
    /// Retrying is pointless (e.g. a compile error) — never retry.
    Terminal,
    /// Retrying may succeed (e.g. transient I/O, transport errors).
    Retryable,
}

/// The result of attempting to execute an [`Action`] once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionOutcome {
    /// The action ran to completion successfully.
    Success {
        /// BLAKE3 hash of each declared output, in declaration order.
        output_hashes: Vec<[u8; 32]>,
        /// Wall-clock duration of the attempt.
        duration: std::time::Duration,
    },
    /// The action ran and failed in a way retrying will not fix.
    Failed {
        /// A short machine-readable failure kind (e.g. `"compile-error"`).
        kind: String,
        /// Human-readable message, including the tail of captured stderr.
        message: String,
    },
    /// The action was cancelled before or during execution.
    Cancelled,
    /// The action exceeded its configured timeout.
    Timeout,
    /// The action failed in a way that may succeed on a later attempt.
    Retryable {
        /// Which attempt (1-based) produced this outcome.
        attempt: u32,
        /// A short machine-readable failure kind.
        kind: String,
    },
}

impl ActionOutcome {
    /// Whether the scheduler's retry policy should consider another
    /// attempt for this outcome, independent of `maxAttempts` bookkeeping.
    #[must_use]
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::Success { .. } | Self::Cancelled | Self::Failed { .. } => RetryClass::Terminal,
            Self::Timeout | Self::Retryable { .. } => RetryClass::Retryable,
        }
    }

    /// Whether the action cache should be allowed to persist this outcome.
    ///
    /// The cache deliberately never stores `Failed` outcomes for retryable
    /// kinds, so a rebuild isn't permanently poisoned by a transient
    /// failure that happened to occur on the very first attempt.
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}
