//! The build DAG: construction from a workspace config, topological wave
//! computation (Kahn's algorithm), cycle detection, and bottom-up
//! fingerprinting.

use crate::fingerprint::{fingerprint_node, SourceReader};
use crate::toolchain::ToolchainRegistry;
use anvil_types::error::GraphError;
use anvil_types::node::Node;
use anvil_types::target::TargetId;
use anvil_types::workspace::WorkspaceConfig;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// A built dependency graph: nodes keyed by target id, grouped into
/// topologically ordered waves. All nodes in a wave have no unresolved
/// dependency within that wave, so they are safe to schedule concurrently.
#[derive(Debug, Default)]
pub struct Graph {
    nodes: BTreeMap<TargetId, Node>,
    waves: Vec<Vec<TargetId>>,
    fingerprints: BTreeMap<TargetId, [u8; 32]>,
}

impl Graph {
    /// Build a graph from a workspace config, optionally restricted to the
    /// transitive closure of `selector` (an empty selector means "all
    /// targets"). Detects duplicate target ids, unknown dependency
    /// references and dependency cycles.
    pub fn build(
        config: &WorkspaceConfig,
        selector: &[TargetId],
    ) -> Result<Self, GraphError> {
        let mut nodes: BTreeMap<TargetId, Node> = BTreeMap::new();
        for spec in &config.targets {
            let id = spec.id.clone();
            if nodes.contains_key(&id) {
                return Err(GraphError::DuplicateIdentifier(id));
            }
            let target = anvil_types::target::Target {
                id: id.clone(),
                language: spec.language.clone(),
                kind: spec.kind,
                sources: spec.sources.clone(),
                deps: spec.deps.clone(),
                language_config: spec.language_config.clone(),
                output_path: spec.output_path.clone(),
            };
            nodes.insert(id, Node::new(target));
        }

        for node in nodes.values() {
            for dep in &node.deps {
                if !nodes.contains_key(dep) {
                    return Err(GraphError::UnknownTarget(dep.clone()));
                }
            }
        }

        let kept: BTreeSet<TargetId> = if selector.is_empty() {
            nodes.keys().cloned().collect()
        } else {
            let mut keep = BTreeSet::new();
            let mut queue: VecDeque<TargetId> = selector.iter().cloned().collect();
            while let Some(id) = queue.pop_front() {
                if !keep.insert(id.clone()) {
                    continue;
                }
                if let Some(node) = nodes.get(&id) {
                    for dep in &node.deps {
                        queue.push_back(dep.clone());
                    }
                } else {
                    return Err(GraphError::UnknownTarget(id));
                }
            }
            keep
        };
        nodes.retain(|id, _| kept.contains(id));

        let dependent_ids: BTreeMap<TargetId, Vec<TargetId>> = {
            let mut map: BTreeMap<TargetId, Vec<TargetId>> = BTreeMap::new();
            for (id, node) in &nodes {
                for dep in &node.deps {
                    map.entry(dep.clone()).or_default().push(id.clone());
                }
            }
            map
        };
        for (id, dependents) in &dependent_ids {
            if let Some(node) = nodes.get_mut(id) {
                node.dependents = dependents.clone();
            }
        }

        let waves = topological_waves(&nodes)?;

        Ok(Self {
            nodes,
            waves,
            fingerprints: BTreeMap::new(),
        })
    }

    /// The ids of every node scheduled in wave `i`, or an empty slice if
    /// `i` is out of range.
    #[must_use]
    pub fn nodes_in_wave(&self, i: usize) -> &[TargetId] {
        self.waves.get(i).map_or(&[], Vec::as_slice)
    }

    /// Number of waves in the graph.
    #[must_use]
    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    /// Look up a node by id.
    #[must_use]
    pub fn node(&self, id: &TargetId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// All node ids, in wave order.
    pub fn node_ids(&self) -> impl Iterator<Item = &TargetId> {
        self.waves.iter().flatten()
    }

    /// Direct and transitive dependents of `id` — used for incremental
    /// change propagation. Empty if `id` is unknown.
    #[must_use]
    pub fn dependents(&self, id: &TargetId) -> BTreeSet<TargetId> {
        let mut out = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(id.clone());
        while let Some(current) = queue.pop_front() {
            let Some(node) = self.nodes.get(&current) else {
                continue;
            };
            for dependent in &node.dependents {
                if out.insert(dependent.clone()) {
                    queue.push_back(dependent.clone());
                }
            }
        }
        out
    }

    /// The cached fingerprint for `id`, if it has been computed by
    /// [`Graph::fingerprint_all`].
    #[must_use]
    pub fn fingerprint(&self, id: &TargetId) -> Option<[u8; 32]> {
        self.fingerprints.get(id).copied()
    }

    /// Compute and cache fingerprints for every node, bottom-up (wave
    /// order guarantees dependencies are fingerprinted before dependents).
    pub fn fingerprint_all(
        &mut self,
        toolchains: &dyn ToolchainRegistry,
        reader: &dyn SourceReader,
    ) -> Result<(), GraphError> {
        for wave in &self.waves {
            for id in wave {
                let node = self.nodes.get(id).ok_or_else(|| {
                    GraphError::Internal(format!("wave references unknown node {id}"))
                })?;
                let toolchain = toolchains.resolve(&node.target.language)?;
                let fp = fingerprint_node(node, &self.fingerprints, &toolchain, reader)?;
                self.fingerprints.insert(id.clone(), fp);
            }
        }
        Ok(())
    }
}

/// Kahn's algorithm: repeatedly peel off the set of nodes with zero
/// remaining in-degree. A non-empty remainder after the queue drains means
/// a cycle exists among the leftover nodes.
fn topological_waves(
    nodes: &BTreeMap<TargetId, Node>,
) -> Result<Vec<Vec<TargetId>>, GraphError> {
    let mut in_degree: BTreeMap<TargetId, usize> = nodes
        .keys()
        .map(|id| (id.clone(), nodes[id].deps.len()))
        .collect();

    let mut waves = Vec::new();
    let mut remaining: BTreeSet<TargetId> = nodes.keys().cloned().collect();

    loop {
        let wave: Vec<TargetId> = remaining
            .iter()
            .filter(|id| in_degree[*id] == 0)
            .cloned()
            .collect();
        if wave.is_empty() {
            break;
        }
        for id in &wave {
            remaining.remove(id);
        }
        for id in &remaining {
            let node = &nodes[id];
            if wave.iter().any(|w| node.deps.contains(w)) {
                let degree = in_degree.get_mut(id).ok_or_else(|| {
                    GraphError::Internal(format!("in-degree map missing entry for {id}"))
                })?;
                *degree -= 1;
            }
        }
        waves.push(wave);
    }

    if !remaining.is_empty() {
        let path = find_cycle(nodes, &remaining)?;
        return Err(GraphError::CycleDetected { path });
    }

    Ok(waves)
}

/// Finds one concrete cycle among `remaining` nodes via DFS, for error
/// reporting. Any node in `remaining` is known to be on some cycle.
fn find_cycle(
    nodes: &BTreeMap<TargetId, Node>,
    remaining: &BTreeSet<TargetId>,
) -> Result<Vec<TargetId>, GraphError> {
    let start = remaining
        .iter()
        .next()
        .ok_or_else(|| {
            GraphError::Internal("find_cycle called with an empty remainder".to_owned())
        })?
        .clone();
    let mut path = vec![start.clone()];
    let mut visited: BTreeSet<TargetId> = BTreeSet::new();
    let mut current = start;
    loop {
        let node = &nodes[&current];
        let Some(next) = node.deps.iter().find(|d| remaining.contains(d)) else {
            break;
        };
        if visited.contains(next) {
            path.push(next.clone());
            break;
        }
        visited.insert(current.clone());
        path.push(next.clone());
        current = next.clone();
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_types::target::{Language, OutputKind};
    use anvil_types::workspace::{TargetSpec, WorkspaceOptions};
    use std::path::PathBuf;

    fn spec(id: &str, deps: &[&str]) -> TargetSpec {
        TargetSpec {
            id: TargetId::from(id.to_owned()),
            language: Language::Rust,
            kind: OutputKind::Library,
            sources: vec![format!("{id}.rs")],
            deps: deps.iter().map(|d| TargetId::from((*d).to_owned())).collect(),
            flags: Vec::new(),
            language_config: BTreeMap::new(),
            output_path: None,
        }
    }

    fn workspace(targets: Vec<TargetSpec>) -> WorkspaceConfig {
        WorkspaceConfig {
            root: PathBuf::from("."),
            options: WorkspaceOptions::default(),
            targets,
        }
    }

    #[test]
    fn linear_chain_produces_one_node_per_wave() {
        let config = workspace(vec![spec("a", &[]), spec("b", &["a"]), spec("c", &["b"])]);
        let graph = Graph::build(&config, &[]).unwrap();
        assert_eq!(graph.wave_count(), 3);
        assert_eq!(graph.nodes_in_wave(0), &[TargetId::from("a".to_owned())]);
        assert_eq!(graph.nodes_in_wave(2), &[TargetId::from("c".to_owned())]);
    }

    #[test]
    fn independent_targets_share_a_wave() {
        let config = workspace(vec![spec("a", &[]), spec("b", &[])]);
        let graph = Graph::build(&config, &[]).unwrap();
        assert_eq!(graph.wave_count(), 1);
        assert_eq!(graph.nodes_in_wave(0).len(), 2);
    }

    #[test]
    fn cycle_is_detected() {
        let config = workspace(vec![spec("a", &["b"]), spec("b", &["a"])]);
        let err = Graph::build(&config, &[]).unwrap_err();
        assert!(matches!(err, GraphError::CycleDetected { .. }));
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let config = workspace(vec![spec("a", &["missing"])]);
        let err = Graph::build(&config, &[]).unwrap_err();
        assert!(matches!(err, GraphError::UnknownTarget(_)));
    }

    #[test]
    fn duplicate_target_id_is_rejected() {
        let config = workspace(vec![spec("a", &[]), spec("a", &[])]);
        let err = Graph::build(&config, &[]).unwrap_err();
        assert!(matches!(err, GraphError::DuplicateIdentifier(_)));
    }

    #[test]
    fn dependents_reaches_transitively() {
        let config = workspace(vec![spec("a", &[]), spec("b", &["a"]), spec("c", &["b"])]);
        let graph = Graph::build(&config, &[]).unwrap();
        let deps = graph.dependents(&TargetId::from("a".to_owned()));
        assert!(deps.contains(&TargetId::from("b".to_owned())));
        assert!(deps.contains(&TargetId::from("c".to_owned())));
    }

    #[test]
    fn selector_prunes_to_transitive_closure() {
        let config = workspace(vec![
            spec("a", &[]),
            spec("b", &["a"]),
            spec("unrelated", &[]),
        ]);
        let graph = Graph::build(&config, &[TargetId::from("b".to_owned())]).unwrap();
        assert!(graph.node(&TargetId::from("a".to_owned())).is_some());
        assert!(graph.node(&TargetId::from("unrelated".to_owned())).is_none());
    }
}
