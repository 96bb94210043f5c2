//! A scripted [`LanguageHandler`] test double, standing in for a real
//! language plug-in in the scheduler/cache end-to-end tests (§8's scenario
//! tests use this in place of a real compiler).

use crate::error::HandlerError;
use crate::handler::{ActionRecorder, Import, LanguageHandler, OutputHash};
use anvil_types::target::Target;
use anvil_types::workspace::WorkspaceConfig;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A handler that always "succeeds", hashing the target id as a stand-in
/// output, and lets a test pin `needs_rebuild`'s answer instead of
/// touching the filesystem.
pub struct MockHandler {
    rebuild_needed: bool,
    build_calls: AtomicUsize,
}

impl Default for MockHandler {
    fn default() -> Self {
        Self {
            rebuild_needed: true,
            build_calls: AtomicUsize::new(0),
        }
    }
}

impl MockHandler {
    /// Override what [`LanguageHandler::needs_rebuild`] answers, instead
    /// of deferring to the default "declared output missing" check.
    #[must_use]
    pub fn with_rebuild_needed(mut self, needed: bool) -> Self {
        self.rebuild_needed = needed;
        self
    }

    /// How many times [`LanguageHandler::build`] has been called so far.
    pub fn build_call_count(&self) -> usize {
        self.build_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LanguageHandler for MockHandler {
    async fn build(
        &self,
        target: &Target,
        _workspace: &WorkspaceConfig,
        _recorder: &dyn ActionRecorder,
    ) -> Result<OutputHash, HandlerError> {
        self.build_calls.fetch_add(1, Ordering::SeqCst);
        Ok(stand_in_hash(target.id.0.as_bytes()))
    }

    fn get_outputs(&self, target: &Target, workspace: &WorkspaceConfig) -> Vec<String> {
        vec![workspace
            .options
            .output_dir
            .join(&target.id.0)
            .display()
            .to_string()]
    }

    fn needs_rebuild(&self, _target: &Target, _workspace: &WorkspaceConfig) -> bool {
        self.rebuild_needed
    }

    fn analyze_imports(&self, sources: &[String]) -> Vec<Import> {
        sources
            .iter()
            .map(|s| Import {
                module: format!("mock-import-of-{s}"),
                from_source: s.clone(),
            })
            .collect()
    }
}

/// A deterministic, non-cryptographic stand-in hash for test fixtures —
/// real handlers hash actual output bytes; this mock has no outputs to
/// hash, only the target id.
fn stand_in_hash(bytes: &[u8]) -> OutputHash {
    let mut out = [0u8; 32];
    for (i, b) in bytes.iter().enumerate() {
        out[i % 32] ^= *b;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_types::target::{OutputKind, TargetId};
    use anvil_types::workspace::WorkspaceOptions;
    use std::collections::BTreeMap;

    fn target() -> Target {
        Target {
            id: TargetId::from("app"),
            language: anvil_types::target::Language::Rust,
            kind: OutputKind::Executable,
            sources: vec!["main.rs".to_owned()],
            deps: vec![],
            language_config: BTreeMap::new(),
            output_path: None,
        }
    }

    fn workspace() -> WorkspaceConfig {
        WorkspaceConfig {
            root: std::env::temp_dir(),
            options: WorkspaceOptions::default(),
            targets: vec![],
        }
    }

    #[tokio::test]
    async fn build_increments_the_call_counter_and_succeeds() {
        let handler = MockHandler::default();
        let outcome = handler.build(&target(), &workspace(), &crate::handler::NullRecorder).await;
        assert!(outcome.is_ok());
        assert_eq!(handler.build_call_count(), 1);
    }

    #[test]
    fn with_rebuild_needed_overrides_the_default_check() {
        let handler = MockHandler::default().with_rebuild_needed(false);
        assert!(!handler.needs_rebuild(&target(), &workspace()));
    }

    #[test]
    fn analyze_imports_produces_one_import_per_source() {
        let handler = MockHandler::default();
        let imports = handler.analyze_imports(&["a.rs".to_owned(), "b.rs".to_owned()]);
        assert_eq!(imports.len(), 2);
    }
}
