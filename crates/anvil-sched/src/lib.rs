//! Concurrent, work-stealing execution scheduler for anvil.
//!
//! Given a flat list of [`anvil_types::Action`]s whose `deps` already form
//! a DAG (as produced by lowering an `anvil-graph` [`anvil_types::Node`]
//! set into actions), the [`Scheduler`] dispatches ready actions across a
//! fixed pool of worker tasks, each with its own `crossbeam-deque` queue
//! and the ability to steal from its peers when idle. Retries, fail-fast
//! vs keep-going failure semantics, and transitive cancellation through
//! dependents all live here; actually *running* an action is delegated to
//! an [`Executor`] the caller supplies, so this crate knows nothing about
//! caches, sandboxes, or language handlers.
//!
//! - [`arena`] holds in-flight scheduling state per action, indexed by id.
//! - [`queue`] is the per-worker deque plus steal helpers.
//! - [`retry`] is the backoff-with-jitter policy.
//! - [`checkpoint`] persists run progress so an interrupted run can resume.
//! - [`load`] scores worker load for the coordinator's assignment policy.
//! - [`executor`] is the trait boundary to whatever runs an action.
//! - [`handle`] and [`scheduler`] are the public submit/await/run API.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod arena;
pub mod checkpoint;
pub mod executor;
pub mod handle;
pub mod load;
pub mod queue;
pub mod retry;
pub mod scheduler;

pub use checkpoint::{Checkpoint, CheckpointError};
pub use executor::Executor;
pub use handle::{ActionHandle, RunReport};
pub use load::LoadSample;
pub use retry::RetryPolicy;
pub use scheduler::{FailureMode, RunHandle, Scheduler, SchedulerConfig};

#[cfg(any(test, feature = "test-support"))]
pub use executor::MockExecutor;
