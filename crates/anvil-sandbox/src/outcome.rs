//! What a worker reports back after running a command inside a
//! [`crate::SandboxSpec`]'s envelope (§4.6).

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One captured output file, named by the sandbox-relative path it was
/// declared at and its content hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedOutput {
    /// Path relative to the sandbox's writable scratch root.
    pub path: String,
    /// BLAKE3 content hash of the captured bytes.
    pub content_hash: [u8; 32],
}

/// Resource consumption observed for one run, for reporting and for
/// autoscaling/capacity decisions upstream; not enforced here (enforcement
/// is `ResourceLimits`' job).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceUsage {
    /// CPU time consumed, in milliseconds.
    pub cpu_millis: u64,
    /// Peak resident memory observed, in bytes.
    pub peak_memory_bytes: u64,
}

/// What the worker returns after running a command inside the sandbox:
/// exit status, captured declared outputs, timing, and resource usage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxOutcome {
    /// Process exit code, if the process ran to exit (as opposed to being
    /// killed for a resource-limit or integrity violation).
    pub exit_code: Option<i32>,
    /// Every declared output the sandbox could find and hash after exit.
    /// A declared output missing from this list means the command didn't
    /// produce it — callers treat that as a build failure, not a sandbox
    /// error.
    pub outputs: Vec<CapturedOutput>,
    /// Tail of captured stdout, truncated to a worker-chosen bound.
    pub stdout_tail: String,
    /// Tail of captured stderr, truncated to a worker-chosen bound.
    pub stderr_tail: String,
    /// Wall-clock duration of the run.
    pub duration: Duration,
    /// Observed resource usage.
    pub resource_usage: ResourceUsage,
}

/// Errors a [`crate::Sandbox`] implementation raises for conditions the
/// envelope itself is responsible for, as opposed to ordinary command
/// failure (which is `exit_code != 0`, not an error here).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SandboxError {
    /// The command attempted to access a path outside its input
    /// projection or writable scratch, and the sandbox either prevented
    /// it or detected it after the fact. Per §4.6 this is always an
    /// integrity failure, never silently allowed.
    #[error("sandbox integrity violation: access to `{path}` outside the declared projection")]
    IntegrityViolation {
        /// The path that was accessed outside the projection.
        path: String,
    },
    /// A resource limit in [`crate::ResourceLimits`] was exceeded and the
    /// process was killed.
    #[error("resource limit `{limit}` exceeded")]
    ResourceLimitExceeded {
        /// Which limit was exceeded (e.g. `"wall_clock"`, `"memory_bytes"`).
        limit: String,
    },
    /// The sandbox itself failed to set up the envelope (e.g. couldn't
    /// bind-mount an input, couldn't create the scratch directory).
    #[error("sandbox setup failed: {0}")]
    SetupFailed(String),
}
