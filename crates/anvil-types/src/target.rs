//! The immutable `Target` record produced by parsing a workspace.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Unique, workspace-wide stable identifier for a [`Target`].
///
/// A thin `String` newtype rather than a bare `String` so the rest of the
/// crate can't accidentally compare a target id against an unrelated string.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TargetId(pub String);

impl std::fmt::Display for TargetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TargetId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for TargetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Language tag consulted by the toolchain registry and the handler
/// registry. `Other` carries an opaque name so the core never needs a
/// release to support a new plug-in language.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[non_exhaustive]
pub enum Language {
    /// C or C++.
    Cpp,
    /// Rust.
    Rust,
    /// Go.
    Go,
    /// TypeScript/JavaScript.
    TypeScript,
    /// JVM languages (Java, Kotlin, Scala).
    Jvm,
    /// Any other language, keyed by its plug-in-assigned name.
    Other(String),
}

/// What kind of artifact a [`Target`] produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputKind {
    /// A runnable executable.
    Executable,
    /// A library consumable by other targets.
    Library,
    /// A test binary.
    Test,
    /// Anything else a handler defines for itself.
    Custom,
}

/// An immutable record produced by parsing. Never mutated after
/// construction; see the crate-level docs for the ownership model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Workspace-unique identifier.
    pub id: TargetId,
    /// Language tag, used to select a toolchain and a handler.
    pub language: Language,
    /// What this target produces.
    pub kind: OutputKind,
    /// Source paths, relative to the workspace root, in declaration order.
    ///
    /// Order matters for fingerprinting determinism: callers must **not**
    /// assume this list is pre-sorted — [`crate::Target::sorted_sources`]
    /// exists precisely because fingerprinting needs a canonical order while
    /// build systems often want to preserve declaration order for
    /// diagnostics.
    pub sources: Vec<String>,
    /// Declared dependency identifiers. Must resolve to other targets in the
    /// same workspace; unresolved entries are a `GraphError::UnknownTarget`
    /// at build time, not at construction time.
    pub deps: Vec<TargetId>,
    /// Opaque, language-specific configuration. Handlers interpret this;
    /// the core only ever hashes it.
    pub language_config: BTreeMap<String, String>,
    /// Optional override of the default output path a handler would pick.
    pub output_path: Option<String>,
}

impl Target {
    /// Source paths in a canonical, deterministic order for fingerprinting.
    pub fn sorted_sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = self.sources.iter().map(String::as_str).collect();
        sources.sort_unstable();
        sources
    }
}
