//! File→node reverse index for `analyzeChanges`: given a set of changed
//! files, find the rebuild frontier without re-walking the whole graph.

use crate::graph::Graph;
use anvil_types::target::TargetId;
use std::collections::{BTreeMap, BTreeSet};

/// Maps source file paths to the nodes that declare them, so a changed
/// file can be resolved directly to its owning targets before walking
/// dependents.
#[derive(Debug, Default, Clone)]
pub struct DependencyIndex {
    file_to_targets: BTreeMap<String, BTreeSet<TargetId>>,
}

impl DependencyIndex {
    /// Build the reverse index from a graph's current node set. A glob
    /// source is indexed by its literal pattern text, not its expansion —
    /// expansion happens at fingerprint time; the index only needs to
    /// answer "which node declares this exact path".
    #[must_use]
    pub fn build(graph: &Graph) -> Self {
        let mut file_to_targets: BTreeMap<String, BTreeSet<TargetId>> = BTreeMap::new();
        for id in graph.node_ids() {
            let Some(node) = graph.node(id) else { continue };
            for source in node.target.sorted_sources() {
                file_to_targets
                    .entry(source.to_owned())
                    .or_default()
                    .insert(id.clone());
            }
        }
        Self { file_to_targets }
    }

    /// Given a set of changed file paths, return the affected node set:
    /// every node that directly declares a changed file, plus all of
    /// their transitive dependents. Unaffected nodes may safely reuse
    /// their prior fingerprint.
    #[must_use]
    pub fn affected_by(&self, graph: &Graph, changed_files: &[String]) -> BTreeSet<TargetId> {
        let mut affected = BTreeSet::new();
        for file in changed_files {
            if let Some(owners) = self.file_to_targets.get(file) {
                for owner in owners {
                    if affected.insert(owner.clone()) {
                        affected.extend(graph.dependents(owner));
                    }
                }
            }
        }
        affected
    }
}
