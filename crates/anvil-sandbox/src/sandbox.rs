//! The contract a worker's sandbox implementation honors. `anvil-sandbox`
//! defines this trait and its data types only — no implementation of
//! namespaces, cgroups, or seccomp lives in the core, per §1's "only the
//! interfaces they consume/provide are specified" and §4.6.

use crate::outcome::{SandboxError, SandboxOutcome};
use crate::spec::SandboxSpec;
use async_trait::async_trait;

/// Runs one command inside the hermetic envelope described by a
/// [`SandboxSpec`]. Implementations live in worker binaries, entirely out
/// of scope for this crate; what's specified here is the shape every
/// implementation must present to the scheduler/executor layer above it.
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Execute `command` inside `spec`'s envelope, capturing declared
    /// outputs and resource usage. Any access outside the projection is
    /// either prevented or reported as
    /// [`SandboxError::IntegrityViolation`] — never silently allowed
    /// through.
    async fn run(&self, spec: &SandboxSpec, command: &[String]) -> Result<SandboxOutcome, SandboxError>;
}

/// A scripted sandbox for tests and for driving the scheduler end-to-end
/// without a real OS-level sandbox: always returns a fixed outcome,
/// regardless of the spec or command given.
#[cfg(any(test, feature = "test-support"))]
pub struct NullSandbox {
    outcome: SandboxOutcome,
}

#[cfg(any(test, feature = "test-support"))]
impl NullSandbox {
    /// A sandbox that always succeeds with an empty output set.
    #[must_use]
    pub fn succeeding() -> Self {
        Self {
            outcome: SandboxOutcome {
                exit_code: Some(0),
                outputs: Vec::new(),
                stdout_tail: String::new(),
                stderr_tail: String::new(),
                duration: std::time::Duration::from_millis(1),
                resource_usage: crate::outcome::ResourceUsage::default(),
            },
        }
    }

    /// A sandbox that always returns `outcome`, whatever it is.
    #[must_use]
    pub fn returning(outcome: SandboxOutcome) -> Self {
        Self { outcome }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl Sandbox for NullSandbox {
    async fn run(&self, _spec: &SandboxSpec, _command: &[String]) -> Result<SandboxOutcome, SandboxError> {
        Ok(self.outcome.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeding_sandbox_reports_exit_zero() {
        let sandbox = NullSandbox::succeeding();
        let outcome = sandbox.run(&SandboxSpec::empty(), &["true".to_owned()]).await.unwrap();
        assert_eq!(outcome.exit_code, Some(0));
    }
}
