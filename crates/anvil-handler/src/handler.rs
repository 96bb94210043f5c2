//! The five-operation language-handler interface (§6): `build`,
//! `get_outputs`, `needs_rebuild`, `analyze_imports`, plus an optional
//! sub-action recorder callback for handlers that want sub-target
//! granularity caching.
//!
//! Flattened per §9's "deep inheritance in language handler hierarchies"
//! design note: one trait, no base-class hierarchy, common helpers as free
//! functions a handler may call but never must inherit from.

use crate::error::HandlerError;
use anvil_types::action::Action;
use anvil_types::target::Target;
use anvil_types::workspace::WorkspaceConfig;
use async_trait::async_trait;

/// BLAKE3 hash of a handler's aggregate build output, returned by
/// [`LanguageHandler::build`] so the caller can fold it into downstream
/// fingerprints without re-reading every output file.
pub type OutputHash = [u8; 32];

/// One import statement a handler found while scanning a target's sources,
/// used by incremental dependency analysis upstream of this crate (the
/// core only defines the shape; discovering imports is the handler's job).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// The imported module/package path, as written in the source file.
    pub module: String,
    /// The source file the import was found in, relative to the
    /// workspace root.
    pub from_source: String,
}

/// Callback a handler may use to record a sub-target action as it builds,
/// so the scheduler can cache at finer granularity than one action per
/// target. Implemented as a narrow trait object rather than a mixin/base
/// class, per §9's "mixins for caching handler" design note — any handler
/// can be wrapped with a decorator that supplies one of these without the
/// handler itself needing to know a recorder exists.
pub trait ActionRecorder: Send + Sync {
    /// Record one sub-action discovered during a build.
    fn record(&self, action: Action);
}

/// A recorder that discards everything, for handlers and callers that
/// don't need sub-target granularity.
pub struct NullRecorder;

impl ActionRecorder for NullRecorder {
    fn record(&self, _action: Action) {}
}

/// Implemented by each language plug-in. The core calls these through
/// [`crate::HandlerRegistry`], keyed by `Target::language`; it never calls
/// a real toolchain itself (§1, §6).
#[async_trait]
pub trait LanguageHandler: Send + Sync {
    /// Build `target`, returning a hash summarizing its outputs.
    /// `recorder` receives one [`Action`] per sub-unit of work the handler
    /// chooses to expose at finer granularity than the whole target; a
    /// handler that doesn't support sub-target actions may ignore it.
    async fn build(
        &self,
        target: &Target,
        workspace: &WorkspaceConfig,
        recorder: &dyn ActionRecorder,
    ) -> Result<OutputHash, HandlerError>;

    /// The output paths this target will produce, relative to the
    /// workspace's output directory.
    fn get_outputs(&self, target: &Target, workspace: &WorkspaceConfig) -> Vec<String>;

    /// Whether `target` needs to rebuild. The default implementation
    /// answers "any declared output missing", per §6's documented default;
    /// handlers with cheaper or more precise staleness checks (e.g. a
    /// native incremental compiler) may override it.
    fn needs_rebuild(&self, target: &Target, workspace: &WorkspaceConfig) -> bool {
        self.get_outputs(target, workspace)
            .iter()
            .any(|path| !workspace.root.join(path).exists())
    }

    /// Scan `sources` for import/dependency statements, for incremental
    /// analysis upstream of the graph builder.
    fn analyze_imports(&self, sources: &[String]) -> Vec<Import>;
}
