//! Worker pool and provisioner (§4.5): pool occupancy stats, an
//! autoscaling policy (target utilization band, cool-down windows,
//! most-recently-idle-first scale-down), and a pluggable [`CloudProvider`]
//! abstraction the [`WorkerProvisioner`] delegates machine creation to.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod autoscale;
pub mod pool;
pub mod provider;
pub mod provisioner;
pub mod stats;

pub use autoscale::{AutoscaleConfig, AutoscalePolicy, ScaleDecision};
pub use pool::{default_autoscale_policy, WorkerPool};
pub use provider::{CloudProvider, MockProvider, ProvisionError, ProvisionSpec};
pub use provisioner::WorkerProvisioner;
pub use stats::PoolStats;
