//! Content fingerprinting: BLAKE3 of a target's normalized declaration,
//! its sorted source hashes, its transitive dependency fingerprints, the
//! language tag, the schema version, and the resolved toolchain id.

use crate::toolchain::{language_tag, ToolchainId};
use anvil_crypto::hash;
use anvil_types::error::GraphError;
use anvil_types::node::Node;
use anvil_types::target::{Target, TargetId};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Schema version folded into every fingerprint — bumping it invalidates
/// every cached fingerprint at once, which is the intended behavior for a
/// format change.
pub const FINGERPRINT_SCHEMA_VERSION: u16 = 1;

/// Reads declared source content and expands glob-style source patterns.
/// Kept as a trait so tests can substitute an in-memory filesystem instead
/// of touching disk.
pub trait SourceReader {
    /// Expand a source entry into concrete file paths. A plain path
    /// expands to itself; a path ending in `/**` expands recursively to
    /// every regular file beneath that directory, sorted for determinism.
    fn expand(&self, pattern: &str) -> Result<Vec<String>, GraphError>;
    /// Read the full contents of a concrete file path.
    fn read(&self, path: &str) -> Result<Vec<u8>, GraphError>;
}

/// A [`SourceReader`] backed by the real filesystem, rooted at a workspace
/// directory.
pub struct FsSourceReader {
    root: std::path::PathBuf,
}

impl FsSourceReader {
    /// Create a reader rooted at `root`; source paths are resolved
    /// relative to it.
    #[must_use]
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn walk(&self, dir: &Path, out: &mut Vec<String>) -> Result<(), GraphError> {
        let entries = fs::read_dir(dir).map_err(|_| missing_source(dir))?;
        let mut paths: Vec<_> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .collect();
        paths.sort();
        for path in paths {
            if path.is_dir() {
                self.walk(&path, out)?;
            } else if let Ok(rel) = path.strip_prefix(&self.root) {
                out.push(rel.to_string_lossy().replace('\\', "/"));
            }
        }
        Ok(())
    }
}

fn missing_source(path: &Path) -> GraphError {
    GraphError::MissingSource {
        target: TargetId::from(String::new()),
        path: path.to_string_lossy().into_owned(),
    }
}

impl SourceReader for FsSourceReader {
    fn expand(&self, pattern: &str) -> Result<Vec<String>, GraphError> {
        if let Some(prefix) = pattern.strip_suffix("/**") {
            let mut out = Vec::new();
            self.walk(&self.root.join(prefix), &mut out)?;
            Ok(out)
        } else {
            Ok(vec![pattern.to_owned()])
        }
    }

    fn read(&self, path: &str) -> Result<Vec<u8>, GraphError> {
        fs::read(self.root.join(path)).map_err(|_| missing_source(Path::new(path)))
    }
}

/// A canonical, serializable form of a target's declaration, independent
/// of the `Target` struct's in-memory field order — used only as
/// fingerprint input, never persisted on its own.
#[derive(serde::Serialize)]
struct Declaration<'a> {
    id: &'a str,
    kind: &'a str,
    deps: Vec<&'a str>,
    language_config: &'a BTreeMap<String, String>,
    output_path: Option<&'a str>,
}

fn declaration_bytes(target: &Target) -> Vec<u8> {
    let mut deps: Vec<&str> = target.deps.iter().map(|d| d.0.as_str()).collect();
    deps.sort_unstable();
    let decl = Declaration {
        id: target.id.0.as_str(),
        kind: match target.kind {
            anvil_types::target::OutputKind::Executable => "executable",
            anvil_types::target::OutputKind::Library => "library",
            anvil_types::target::OutputKind::Test => "test",
            anvil_types::target::OutputKind::Custom => "custom",
        },
        deps,
        language_config: &target.language_config,
        output_path: target.output_path.as_deref(),
    };
    let mut bytes = Vec::new();
    ciborium::ser::into_writer(&decl, &mut bytes).unwrap_or_default();
    bytes
}

/// Compute the content fingerprint for `node`, given the already-computed
/// fingerprints of its direct dependencies (keyed by `TargetId`) and the
/// toolchain resolved for its language. Dependency fingerprints must
/// already reflect *their* transitive closure — callers fingerprint nodes
/// bottom-up (see [`crate::graph::Graph::fingerprint_all`]).
pub fn fingerprint_node(
    node: &Node,
    dep_fingerprints: &BTreeMap<TargetId, [u8; 32]>,
    toolchain: &ToolchainId,
    reader: &dyn SourceReader,
) -> Result<[u8; 32], GraphError> {
    let mut input = Vec::new();
    input.extend_from_slice(&declaration_bytes(&node.target));

    let mut source_hashes = Vec::new();
    for pattern in node.target.sorted_sources() {
        for path in reader.expand(pattern)? {
            let bytes = reader.read(&path)?;
            source_hashes.push(hash(&bytes));
        }
    }
    source_hashes.sort_unstable();
    for h in &source_hashes {
        input.extend_from_slice(h);
    }

    for dep_id in &node.deps {
        let dep_fp = dep_fingerprints
            .get(dep_id)
            .copied()
            .unwrap_or([0u8; 32]);
        input.extend_from_slice(dep_id.0.as_bytes());
        input.extend_from_slice(&dep_fp);
    }

    input.extend_from_slice(language_tag(&node.target.language).as_bytes());
    input.extend_from_slice(&FINGERPRINT_SCHEMA_VERSION.to_be_bytes());
    input.extend_from_slice(toolchain.0.as_bytes());

    Ok(hash(&input))
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_types::target::{Language, OutputKind, Target};
    use std::collections::BTreeMap as Map;

    struct MemReader(Map<String, Vec<u8>>);

    impl SourceReader for MemReader {
        fn expand(&self, pattern: &str) -> Result<Vec<String>, GraphError> {
            Ok(vec![pattern.to_owned()])
        }
        fn read(&self, path: &str) -> Result<Vec<u8>, GraphError> {
            self.0
                .get(path)
                .cloned()
                .ok_or_else(|| missing_source(Path::new(path)))
        }
    }

    fn target(id: &str, sources: Vec<&str>) -> Target {
        Target {
            id: TargetId::from(id.to_owned()),
            language: Language::Rust,
            kind: OutputKind::Library,
            sources: sources.into_iter().map(str::to_owned).collect(),
            deps: Vec::new(),
            language_config: Map::new(),
            output_path: None,
        }
    }

    #[test]
    fn identical_inputs_produce_identical_fingerprints() {
        let mut files = Map::new();
        files.insert("a.rs".to_owned(), b"fn a() {}".to_vec());
        let reader = MemReader(files);
        let node = Node::new(target("t", vec!["a.rs"]));
        let toolchain = ToolchainId("rustc-1.82.0".to_owned());
        let deps = Map::new();

        let fp1 = fingerprint_node(&node, &deps, &toolchain, &reader).unwrap();
        let fp2 = fingerprint_node(&node, &deps, &toolchain, &reader).unwrap();
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn changing_a_source_changes_the_fingerprint() {
        let mut files = Map::new();
        files.insert("a.rs".to_owned(), b"fn a() {}".to_vec());
        let reader1 = MemReader(files.clone());
        files.insert("a.rs".to_owned(), b"fn a() { /* changed */ }".to_vec());
        let reader2 = MemReader(files);

        let node = Node::new(target("t", vec!["a.rs"]));
        let toolchain = ToolchainId("rustc-1.82.0".to_owned());
        let deps = Map::new();

        let fp1 = fingerprint_node(&node, &deps, &toolchain, &reader1).unwrap();
        let fp2 = fingerprint_node(&node, &deps, &toolchain, &reader2).unwrap();
        assert_ne!(fp1, fp2);
    }

    #[test]
    fn source_order_does_not_affect_fingerprint() {
        let mut files = Map::new();
        files.insert("a.rs".to_owned(), b"a".to_vec());
        files.insert("b.rs".to_owned(), b"b".to_vec());
        let reader = MemReader(files);
        let toolchain = ToolchainId("rustc-1.82.0".to_owned());
        let deps = Map::new();

        let node1 = Node::new(target("t", vec!["a.rs", "b.rs"]));
        let node2 = Node::new(target("t", vec!["b.rs", "a.rs"]));

        let fp1 = fingerprint_node(&node1, &deps, &toolchain, &reader).unwrap();
        let fp2 = fingerprint_node(&node2, &deps, &toolchain, &reader).unwrap();
        assert_eq!(fp1, fp2);
    }

    #[test]
    fn different_toolchain_changes_fingerprint() {
        let mut files = Map::new();
        files.insert("a.rs".to_owned(), b"a".to_vec());
        let reader = MemReader(files);
        let node = Node::new(target("t", vec!["a.rs"]));
        let deps = Map::new();

        let fp1 =
            fingerprint_node(&node, &deps, &ToolchainId("rustc-1.82.0".to_owned()), &reader)
                .unwrap();
        let fp2 =
            fingerprint_node(&node, &deps, &ToolchainId("rustc-1.83.0".to_owned()), &reader)
                .unwrap();
        assert_ne!(fp1, fp2);
    }
}
