//! Hermetic sandbox contract consumed by anvil workers (§4.6).
//!
//! `anvil-sandbox` does not implement a sandbox — no namespaces, no
//! cgroups, no seccomp filters. It specifies the narrow interface workers
//! must honor: given a [`SandboxSpec`] (read-only input projection,
//! writable scratch, network policy, resource limits, env allowlist), run
//! a command and report a [`SandboxOutcome`]. This mirrors §1's framing of
//! language handlers and workers as external collaborators behind a
//! narrow interface.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod outcome;
pub mod sandbox;
pub mod spec;

pub use outcome::{CapturedOutput, ResourceUsage, SandboxError, SandboxOutcome};
pub use sandbox::Sandbox;
pub use spec::{InputMapping, NetworkPolicy, ResourceLimits, SandboxSpec};

#[cfg(any(test, feature = "test-support"))]
pub use sandbox::NullSandbox;
