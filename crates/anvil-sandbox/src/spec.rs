//! The hermetic envelope a worker must build before running an action's
//! command: a read-only input projection, a writable scratch directory,
//! a network policy, resource limits, and an environment allowlist (§4.6).

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Network access granted to the sandboxed process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkPolicy {
    /// No network access of any kind.
    Off,
    /// Access limited to an allowlist the worker enforces itself (e.g. a
    /// package registry mirror); anvil does not specify the allowlist
    /// mechanism, only that this policy exists.
    Restricted,
    /// Unrestricted network access.
    Full,
}

/// Resource ceilings the worker must enforce while the command runs.
/// Every field is optional: `None` means "no limit imposed by anvil" (the
/// worker's own OS defaults still apply).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// CPU time budget, in milliseconds.
    pub cpu_millis: Option<u64>,
    /// Resident memory budget, in bytes.
    pub memory_bytes: Option<u64>,
    /// Wall-clock budget. Distinct from `Action::timeout` in `anvil-types`
    /// — this is enforced by the sandbox itself, not the scheduler, so a
    /// hung process is killed even if the scheduler's own timeout wrapper
    /// never gets scheduled.
    pub wall_clock: Option<Duration>,
    /// Maximum open file descriptors.
    pub max_file_descriptors: Option<u32>,
}

/// One input made visible inside the sandbox: a workspace-relative source
/// path mapped to a path inside the read-only projection. Mapping target
/// defaults to the same relative path; kept as an explicit pair so a
/// handler can re-root sources that a toolchain expects at a fixed layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputMapping {
    /// Path on the host, relative to the workspace root.
    pub host_path: String,
    /// Path the command sees inside the sandbox.
    pub sandbox_path: String,
}

/// The full hermetic envelope for one action dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxSpec {
    /// Every input visible inside the sandbox, read-only. Any path not
    /// listed here is either absent or, if the sandbox can't hide it,
    /// access to it is an integrity violation (§4.6).
    pub inputs: Vec<InputMapping>,
    /// Declared output paths, relative to the writable scratch root. Only
    /// these paths are captured after the command exits.
    pub declared_outputs: Vec<String>,
    /// Network policy enforced for the duration of the command.
    pub network: NetworkPolicy,
    /// Resource ceilings.
    pub limits: ResourceLimits,
    /// Environment variable names the command may read from the host
    /// environment; anything not listed is scrubbed before exec. Does not
    /// include variables the action itself sets via `Action::env` — those
    /// always pass through.
    pub env_allowlist: BTreeSet<String>,
}

impl SandboxSpec {
    /// A spec with no inputs, no outputs, network off, and no resource
    /// limits — a minimal hermetic envelope useful as a builder base or in
    /// tests.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            inputs: Vec::new(),
            declared_outputs: Vec::new(),
            network: NetworkPolicy::Off,
            limits: ResourceLimits::default(),
            env_allowlist: BTreeSet::new(),
        }
    }

    /// Whether `path` (sandbox-relative) is a declared output this spec
    /// expects back.
    #[must_use]
    pub fn declares_output(&self, path: &str) -> bool {
        self.declared_outputs.iter().any(|p| p == path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_spec_has_no_network_and_no_inputs() {
        let spec = SandboxSpec::empty();
        assert_eq!(spec.network, NetworkPolicy::Off);
        assert!(spec.inputs.is_empty());
    }

    #[test]
    fn declares_output_checks_the_declared_list_only() {
        let mut spec = SandboxSpec::empty();
        spec.declared_outputs.push("out/lib.a".to_owned());
        assert!(spec.declares_output("out/lib.a"));
        assert!(!spec.declares_output("out/other.a"));
    }
}
