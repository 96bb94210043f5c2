//! Toolchain identity lookup, consulted during fingerprinting so that a
//! compiler/runtime upgrade invalidates every fingerprint that depended on
//! it, without the graph knowing anything about how toolchains are
//! detected or installed.

use anvil_types::error::GraphError;
use anvil_types::target::Language;
use std::collections::BTreeMap;

/// Opaque identifier for an installed toolchain (e.g. a compiler version
/// string). Two nodes built with the same `ToolchainId` are guaranteed
/// fingerprint-compatible with respect to the toolchain; anvil does not
/// interpret its contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ToolchainId(pub String);

impl std::fmt::Display for ToolchainId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Resolves the toolchain identifier used for a given language. Real
/// toolchain detection (probing `$PATH`, reading version manifests) is out
/// of scope here; callers provide an implementation appropriate to their
/// environment.
pub trait ToolchainRegistry {
    /// Resolve the toolchain identifier for `language`, or
    /// `ToolchainUnavailable` if no toolchain is registered for it.
    fn resolve(&self, language: &Language) -> Result<ToolchainId, GraphError>;
}

/// A fixed in-memory registry, useful for tests and for environments that
/// pin toolchain identities via config rather than probing the host.
#[derive(Debug, Default, Clone)]
pub struct StaticToolchainRegistry {
    by_language: BTreeMap<String, ToolchainId>,
}

impl StaticToolchainRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a toolchain id for a language tag (matched via
    /// `Language`'s `Display`-equivalent tag, see [`language_tag`]).
    #[must_use]
    pub fn with(mut self, language: &Language, id: impl Into<String>) -> Self {
        self.by_language
            .insert(language_tag(language), ToolchainId(id.into()));
        self
    }
}

impl ToolchainRegistry for StaticToolchainRegistry {
    fn resolve(&self, language: &Language) -> Result<ToolchainId, GraphError> {
        self.by_language
            .get(&language_tag(language))
            .cloned()
            .ok_or_else(|| GraphError::ToolchainUnavailable {
                target: anvil_types::target::TargetId::from(String::new()),
                language: language_tag(language),
            })
    }
}

/// Stable string tag for a language, used as a fingerprint input and as a
/// lookup key independent of the enum's `Other(String)` internals.
#[must_use]
pub fn language_tag(language: &Language) -> String {
    match language {
        Language::Cpp => "cpp".to_owned(),
        Language::Rust => "rust".to_owned(),
        Language::Go => "go".to_owned(),
        Language::TypeScript => "typescript".to_owned(),
        Language::Jvm => "jvm".to_owned(),
        Language::Other(tag) => format!("other:{tag}"),
    }
}
