//! Shared data model for the anvil build core.
//!
//! This crate defines the immutable records that flow between the graph
//! builder, the action cache, the scheduler and the distributed coordinator:
//! [`Target`], [`Action`]/[`ActionId`], [`Node`], [`Worker`], the external
//! [`workspace`] shape, and the error taxonomy each component raises.
//!
//! No component in this workspace owns another component's type: putting the
//! shared vocabulary in one leaf crate is what lets `anvil-graph`,
//! `anvil-cache`, `anvil-sched` and `anvil-coordinator` depend on each other
//! only through trait interfaces, never through a type-level cycle.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]

pub mod action;
pub mod error;
pub mod node;
pub mod report;
pub mod target;
pub mod worker;
pub mod workspace;

pub use action::{Action, ActionId, ActionOutcome, RetryClass};
pub use error::{CacheError, CoordinatorError, GraphError, SchedError};
pub use node::Node;
pub use report::{BuildReport, TargetReport};
pub use target::{Language, OutputKind, Target, TargetId};
pub use worker::{Worker, WorkerId, WorkerState};
pub use workspace::{TargetSpec, WorkspaceConfig, WorkspaceOptions};
