//! The shape of parsed workspace data the core consumes from an external
//! parser (§6). The core does not define DSL syntax — only this shape.

use crate::target::{Language, OutputKind, TargetId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// One target as produced by the external parser, before it becomes a
/// graph [`crate::Node`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Workspace-unique identifier.
    pub id: TargetId,
    /// Language tag.
    pub language: Language,
    /// Output kind.
    pub kind: OutputKind,
    /// Source paths (may include unexpanded globs; `anvil-graph` expands
    /// them against the workspace root).
    pub sources: Vec<String>,
    /// Declared dependency identifiers.
    pub deps: Vec<TargetId>,
    /// Flags passed through to the handler untouched.
    pub flags: Vec<String>,
    /// Opaque language-specific configuration blob.
    pub language_config: BTreeMap<String, String>,
    /// Optional output path override.
    pub output_path: Option<String>,
}

/// Workspace-wide options, analogous to `WorkspaceConfig.options` in §6.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceOptions {
    /// Directory build outputs are written under.
    pub output_dir: PathBuf,
    /// Directory the action cache and content store live under.
    pub cache_dir: PathBuf,
    /// Maximum scheduler parallelism; `0` means "auto" (logical CPU count).
    pub max_parallelism: usize,
}

impl Default for WorkspaceOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("out"),
            cache_dir: PathBuf::from(".anvil-cache"),
            max_parallelism: 0,
        }
    }
}

/// The full parsed workspace model handed to [`anvil_graph`'s `build`
/// operation](../anvil_graph/fn.build.html).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceConfig {
    /// Absolute path to the workspace root.
    pub root: PathBuf,
    /// Workspace-wide options.
    pub options: WorkspaceOptions,
    /// Every declared target.
    pub targets: Vec<TargetSpec>,
}
