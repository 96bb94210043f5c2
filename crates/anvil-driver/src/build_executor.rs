//! Bridges `anvil-sched`'s [`Executor`] boundary to the action cache and
//! the language handler registry (§4.1, §4.2, §6). The scheduler only
//! ever sees [`Action`]s; this type is what actually consults the cache,
//! dispatches to a [`LanguageHandler`], and persists a fresh result.

use anvil_cache::{ActionCache, LookupResult};
use anvil_handler::{ActionRecorder, HandlerRegistry};
use anvil_types::action::{Action, ActionId, ActionOutcome};
use anvil_types::target::{Target, TargetId};
use anvil_types::workspace::WorkspaceConfig;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// An [`ActionRecorder`] that simply logs sub-target actions a handler
/// reports. Full recursive re-dispatch of recorded actions through the
/// scheduler is out of scope for this driver (§9 non-goal); handlers that
/// need multi-step builds perform them internally instead.
struct LoggingRecorder;

impl ActionRecorder for LoggingRecorder {
    fn record(&self, action: Action) {
        info!(action = %action.id, "handler recorded a sub-target action (not re-dispatched)");
    }
}

/// Bridges the scheduler to the action cache and handler registry.
pub struct HandlerExecutor {
    cache: Arc<ActionCache>,
    handlers: Arc<HandlerRegistry>,
    workspace: WorkspaceConfig,
    targets_by_action: BTreeMap<ActionId, Target>,
    cache_hits: Mutex<BTreeSet<ActionId>>,
}

impl HandlerExecutor {
    /// Build an executor around `cache` and `handlers`, given the mapping
    /// from each action's id to the target it was derived from.
    #[must_use]
    pub fn new(
        cache: Arc<ActionCache>,
        handlers: Arc<HandlerRegistry>,
        workspace: WorkspaceConfig,
        targets_by_action: BTreeMap<ActionId, Target>,
    ) -> Self {
        Self {
            cache,
            handlers,
            workspace,
            targets_by_action,
            cache_hits: Mutex::new(BTreeSet::new()),
        }
    }

    /// Whether `id` was served from the action cache during this run.
    #[must_use]
    pub fn was_cache_hit(&self, id: ActionId) -> bool {
        self.cache_hits.lock().contains(&id)
    }

    fn target_id_for(&self, action_id: ActionId) -> Option<TargetId> {
        self.targets_by_action.get(&action_id).map(|t| t.id.clone())
    }
}

#[async_trait]
impl anvil_sched::Executor for HandlerExecutor {
    async fn execute(&self, action: &Action) -> ActionOutcome {
        if let LookupResult::Hit(body) = self.cache.lookup(action.id) {
            self.cache_hits.lock().insert(action.id);
            let dest = self.workspace.root.join(&self.workspace.options.output_dir);
            if let Err(err) = self.cache.materialize(action.id, &body, &dest) {
                warn!(action = %action.id, %err, "cache hit but materialization failed, rebuilding");
            } else {
                return body.outcome;
            }
        }

        let Some(target) = self.targets_by_action.get(&action.id).cloned() else {
            return ActionOutcome::Failed {
                kind: "unknown-action".to_owned(),
                message: format!("no target registered for action {}", action.id),
            };
        };

        let Some(handler) = self.handlers.get(&target.language) else {
            return ActionOutcome::Failed {
                kind: "tool-missing".to_owned(),
                message: format!("no handler registered for language of target {}", target.id),
            };
        };

        let started = Instant::now();
        let recorder = LoggingRecorder;
        let result = handler.build(&target, &self.workspace, &recorder).await;
        let duration = started.elapsed();

        match result {
            Ok(output_hash) => {
                let outputs = self.collect_outputs(&target, &handler);
                let outcome = ActionOutcome::Success {
                    output_hashes: outputs.iter().map(|(_, bytes)| anvil_crypto::hash(bytes)).collect(),
                    duration,
                };
                let _ = output_hash;
                if let Err(err) = self.cache.store(action.id, &outputs, outcome.clone()) {
                    warn!(action = %action.id, %err, "failed to persist cache entry");
                }
                outcome
            }
            Err(err) => map_handler_error(&target.id, &err),
        }
    }
}

impl HandlerExecutor {
    fn collect_outputs(
        &self,
        target: &Target,
        handler: &Arc<dyn anvil_handler::LanguageHandler>,
    ) -> Vec<(String, Vec<u8>)> {
        handler
            .get_outputs(target, &self.workspace)
            .into_iter()
            .filter_map(|path| {
                let full = self.workspace.root.join(&path);
                std::fs::read(&full).ok().map(|bytes| (path, bytes))
            })
            .collect()
    }
}

fn map_handler_error(target: &TargetId, err: &anvil_handler::HandlerError) -> ActionOutcome {
    match err {
        anvil_handler::HandlerError::FileNotFound(path) => ActionOutcome::Failed {
            kind: "tool-missing".to_owned(),
            message: format!("file not found for target {target}: {path}"),
        },
        anvil_handler::HandlerError::ToolNotFound(tool) => ActionOutcome::Failed {
            kind: "tool-missing".to_owned(),
            message: format!("toolchain not found for target {target}: {tool}"),
        },
        anvil_handler::HandlerError::BuildFailed { target, message } => ActionOutcome::Failed {
            kind: "build-failed".to_owned(),
            message: format!("{target}: {message}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_handler::MockHandler;
    use anvil_types::target::{Language, OutputKind};
    use anvil_types::workspace::WorkspaceOptions;
    use std::path::PathBuf;

    fn workspace() -> WorkspaceConfig {
        WorkspaceConfig {
            root: PathBuf::from("."),
            options: WorkspaceOptions::default(),
            targets: vec![],
        }
    }

    fn target() -> Target {
        Target {
            id: TargetId::from("t".to_owned()),
            language: Language::Rust,
            kind: OutputKind::Library,
            sources: vec![],
            deps: vec![],
            language_config: BTreeMap::new(),
            output_path: None,
        }
    }

    #[tokio::test]
    async fn a_registered_handler_builds_and_populates_the_cache() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ActionCache::open(dir.path(), [1u8; 32], None, None).unwrap());
        let handlers = Arc::new(HandlerRegistry::new());
        handlers.register(Language::Rust, Arc::new(MockHandler::default()));

        let action_id = ActionId([7; 32]);
        let mut targets = BTreeMap::new();
        targets.insert(action_id, target());

        let executor = HandlerExecutor::new(cache.clone(), handlers, workspace(), targets);
        let action = Action {
            id: action_id,
            command: vec![],
            env: BTreeMap::new(),
            inputs: vec![],
            outputs: vec![],
            sandbox_spec: String::new(),
            timeout: None,
            priority: 0,
            deps: vec![],
        };

        let outcome = anvil_sched::Executor::execute(&executor, &action).await;
        assert!(matches!(outcome, ActionOutcome::Success { .. }));
    }

    #[tokio::test]
    async fn a_missing_handler_reports_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ActionCache::open(dir.path(), [1u8; 32], None, None).unwrap());
        let handlers = Arc::new(HandlerRegistry::new());

        let action_id = ActionId([8; 32]);
        let mut targets = BTreeMap::new();
        targets.insert(action_id, target());

        let executor = HandlerExecutor::new(cache, handlers, workspace(), targets);
        let action = Action {
            id: action_id,
            command: vec![],
            env: BTreeMap::new(),
            inputs: vec![],
            outputs: vec![],
            sandbox_spec: String::new(),
            timeout: None,
            priority: 0,
            deps: vec![],
        };

        let outcome = anvil_sched::Executor::execute(&executor, &action).await;
        assert!(matches!(
            outcome,
            ActionOutcome::Failed { kind, .. } if kind == "tool-missing"
        ));
    }
}
