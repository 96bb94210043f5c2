//! Build graph construction, fingerprinting and incremental change
//! analysis (§4.1).
//!
//! [`graph::Graph`] holds the DAG and its topological waves; [`fingerprint`]
//! computes the BLAKE3 content fingerprint for a node; [`index`] maintains
//! the file→node reverse index used by [`index::DependencyIndex::affected_by`]
//! for incremental rebuilds; [`persist`] serializes fingerprints and the
//! dependency index through `anvil-codec`'s versioned envelope.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod fingerprint;
pub mod graph;
pub mod index;
pub mod persist;
pub mod toolchain;

pub use fingerprint::fingerprint_node;
pub use graph::Graph;
pub use index::DependencyIndex;
pub use toolchain::{ToolchainId, ToolchainRegistry};
