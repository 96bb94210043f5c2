//! Graph node bookkeeping: a [`Target`](crate::Target) plus dependency
//! back-edges and a cached fingerprint.

use crate::target::{Target, TargetId};
use serde::{Deserialize, Serialize};

/// A node in the build DAG. The graph exclusively owns `Node`s; the
/// scheduler only ever holds a reference by [`TargetId`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// The target this node wraps.
    pub target: Target,
    /// Forward dependency ids (same as `target.deps`, kept alongside for
    /// symmetry with `dependents`).
    pub deps: Vec<TargetId>,
    /// Back-edges: targets that declared a dependency on this node.
    pub dependents: Vec<TargetId>,
    /// BLAKE3 content fingerprint, computed bottom-up. `None` until
    /// [`anvil_graph`](../anvil_graph/index.html)'s fingerprinting pass has
    /// run for this node.
    pub fingerprint: Option<[u8; 32]>,
}

impl Node {
    /// Construct a fresh node with no computed fingerprint yet.
    #[must_use]
    pub fn new(target: Target) -> Self {
        let deps = target.deps.clone();
        Self {
            target,
            deps,
            dependents: Vec::new(),
            fingerprint: None,
        }
    }
}
