//! Orchestrates one `anvil build` invocation (§6): load the workspace,
//! build and fingerprint the graph, lower it into a flat action list, run
//! the scheduler against a [`HandlerExecutor`], and assemble the final
//! [`BuildReport`].

use crate::build_executor::HandlerExecutor;
use crate::workspace_load;
use anvil_cache::ActionCache;
use anvil_graph::fingerprint::{FsSourceReader, SourceReader};
use anvil_graph::graph::Graph;
use anvil_graph::toolchain::{language_tag, StaticToolchainRegistry};
use anvil_handler::HandlerRegistry;
use anvil_sandbox::{InputMapping, NetworkPolicy, ResourceLimits, SandboxSpec};
use anvil_sched::{Scheduler, SchedulerConfig};
use anvil_types::action::{Action, ActionId, ActionInput};
use anvil_types::report::{BuildReport, TargetReport};
use anvil_types::target::{Language, Target, TargetId};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Environment variable overriding the scheduler's worker-thread count,
/// taking precedence over the workspace's own `maxParallelism` option when
/// set to a positive integer (§6).
const ENV_MAX_PARALLELISM: &str = "ANVIL_MAX_PARALLELISM";

/// Environment variable carrying the hex-encoded 32-byte MAC key for a
/// shared cache directory (§4.2, §6). When unset, the key is derived
/// locally from the workspace root and machine identity instead.
const ENV_CACHE_KEY: &str = "ANVIL_CACHE_KEY";

/// Best-effort machine identifier used to derive a local cache key when no
/// shared-cache keying material is provided. Falls back to a fixed string
/// rather than failing the build outright if the host doesn't expose one.
const ENV_MACHINE_ID: &str = "ANVIL_MACHINE_ID";

/// A fixed stand-in toolchain identity for every language present in the
/// graph. Real toolchain probing (compiler discovery, version detection)
/// is a handler-plug-in concern, out of scope for the core driver (§1).
const GENERIC_TOOLCHAIN: &str = "generic-1.0.0";

/// Run a full build of `targets` (or every target, if empty) in the
/// workspace described at `workspace_path`.
///
/// # Errors
///
/// Returns an error if the workspace file can't be loaded, the graph
/// can't be built (cycle, unknown target, duplicate id), or fingerprinting
/// fails (missing declared source).
#[instrument(skip(workspace_path, targets))]
pub async fn run(
    workspace_path: &Path,
    targets: &[String],
    fail_fast: bool,
) -> anyhow::Result<BuildReport> {
    // Real language handlers are plug-ins registered by whatever crate
    // wires this binary together for a specific ecosystem (§1 non-goal);
    // none are built in here.
    run_with_handlers(workspace_path, targets, fail_fast, Arc::new(HandlerRegistry::new())).await
}

/// Same as [`run`], but with the handler registry supplied by the caller
/// instead of an always-empty one. This is the seam the end-to-end
/// scenario tests (§8) use to register a [`anvil_handler::MockHandler`] in
/// place of a real language plug-in.
pub async fn run_with_handlers(
    workspace_path: &Path,
    targets: &[String],
    fail_fast: bool,
    handlers: Arc<HandlerRegistry>,
) -> anyhow::Result<BuildReport> {
    info!(dispatch = ?anvil_crypto::current_dispatch(), "hash dispatch initialized");

    let config = workspace_load::load(workspace_path)?;
    let selector: Vec<TargetId> = targets.iter().cloned().map(TargetId::from).collect();

    let mut graph = Graph::build(&config, &selector)?;

    let languages: Vec<Language> = {
        let mut seen = Vec::new();
        for id in graph.node_ids() {
            let Some(node) = graph.node(id) else {
                continue;
            };
            if !seen.contains(&node.target.language) {
                seen.push(node.target.language.clone());
            }
        }
        seen
    };
    let toolchains = languages
        .iter()
        .fold(StaticToolchainRegistry::new(), |registry, language| {
            registry.with(language, GENERIC_TOOLCHAIN)
        });

    let reader = FsSourceReader::new(config.root.clone());
    graph.fingerprint_all(&toolchains, &reader)?;

    let node_order: Vec<TargetId> = graph.node_ids().cloned().collect();

    // Per-node fields that feed `ActionId` derivation (§3/§8). `node_order`
    // is wave order (dependencies before dependents, per
    // `Graph::node_ids`), so by the time a node is assembled every one of
    // its `deps` already has an entry in `assembled` — which is what lets
    // `dependency_inputs_for` fold each dependency's own `ActionId` into
    // this node's inputs below, so a source change propagates to every
    // transitive dependent's `ActionId` and not just the node it touched
    // directly.
    let mut assembled: BTreeMap<TargetId, (ActionId, AssembledAction)> = BTreeMap::new();
    for id in &node_order {
        let node = graph
            .node(id)
            .ok_or_else(|| anyhow::anyhow!("node {id} vanished from its own graph"))?;
        let target = &node.target;

        let command = vec![
            "build".to_owned(),
            language_tag(&target.language),
            target.id.0.clone(),
        ];
        let env = target.language_config.clone();
        let inputs = collect_inputs(target, &reader)?;
        let outputs = handlers
            .get(&target.language)
            .map(|handler| handler.get_outputs(target, &config))
            .unwrap_or_default();
        let sandbox_spec = encode_sandbox_spec(&inputs, &outputs)?;

        // `ActionId` is derived from the node's own inputs plus each
        // dependency's already-resolved `ActionId`, not just its own
        // sandbox spec — a source change must change the `ActionId` of
        // every transitive dependent, not only the node it touched
        // directly. These synthetic entries are id-derivation-only: they
        // never enter `Action.inputs` or the sandbox mapping, since
        // nothing on disk backs a path like that.
        let mut id_inputs = inputs.clone();
        id_inputs.extend(dependency_inputs_for(&node.deps, &assembled)?);
        id_inputs.sort_by(|a, b| a.path.cmp(&b.path));

        let action_id = Action::derive_id(&command, &id_inputs, &env, &sandbox_spec);
        assembled.insert(
            id.clone(),
            (
                action_id,
                AssembledAction {
                    command,
                    env,
                    inputs,
                    outputs,
                    sandbox_spec,
                },
            ),
        );
    }

    let mut actions = Vec::with_capacity(node_order.len());
    let mut targets_by_action: BTreeMap<ActionId, Target> = BTreeMap::new();
    let mut action_id_of: BTreeMap<TargetId, ActionId> = BTreeMap::new();
    for id in &node_order {
        let node = graph
            .node(id)
            .ok_or_else(|| anyhow::anyhow!("node {id} vanished from its own graph"))?;
        let (action_id, fields) = &assembled[id];
        let deps = node
            .deps
            .iter()
            .map(|dep| assembled[dep].0)
            .collect::<Vec<_>>();
        targets_by_action.insert(*action_id, node.target.clone());
        action_id_of.insert(id.clone(), *action_id);
        actions.push(Action {
            id: *action_id,
            command: fields.command.clone(),
            env: fields.env.clone(),
            inputs: fields.inputs.clone(),
            outputs: fields.outputs.clone(),
            sandbox_spec: fields.sandbox_spec.clone(),
            timeout: None,
            priority: 0,
            deps,
        });
    }

    let cache_key = shared_cache_key(&config);
    let cache_dir = config.root.join(&config.options.cache_dir);
    let cache = Arc::new(ActionCache::open(cache_dir, cache_key, None, None)?);

    let executor = Arc::new(HandlerExecutor::new(
        cache,
        handlers,
        config.clone(),
        targets_by_action,
    ));
    let workers = worker_count(&config);
    let failure_mode = if fail_fast {
        anvil_sched::FailureMode::FailFast
    } else {
        anvil_sched::FailureMode::KeepGoing
    };
    let scheduler_config = SchedulerConfig {
        workers,
        failure_mode,
        ..SchedulerConfig::default()
    };
    let scheduler = Scheduler::new(ExecutorHandle(executor.clone()), scheduler_config);

    let started = Instant::now();
    let report = scheduler.run(actions).await;
    info!(elapsed = ?started.elapsed(), succeeded = report.succeeded.len(), failed = report.failed.len(), "build finished");

    let mut targets_report = Vec::with_capacity(node_order.len());
    for id in &node_order {
        let action_id = action_id_of[id];
        let cached = executor.was_cache_hit(action_id);
        let succeeded = report.succeeded.contains(&action_id);
        targets_report.push(TargetReport {
            target: id.clone(),
            action: action_id,
            cached,
            duration: started.elapsed(),
            succeeded,
        });
    }

    Ok(BuildReport {
        targets: targets_report,
    })
}

/// The `ActionId`-deriving fields of an [`Action`], assembled per node
/// before dependency ids are known.
struct AssembledAction {
    command: Vec<String>,
    env: BTreeMap<String, String>,
    inputs: Vec<ActionInput>,
    outputs: Vec<String>,
    sandbox_spec: String,
}

/// Expand `target`'s declared sources and hash each one, for the
/// `ActionId` derivation's "sorted inputs with hashes" component (§3).
/// Sorted by path so permuting declaration order never changes the
/// resulting `ActionId`.
fn collect_inputs(target: &Target, reader: &dyn SourceReader) -> anyhow::Result<Vec<ActionInput>> {
    let mut inputs = Vec::new();
    for pattern in target.sorted_sources() {
        for path in reader.expand(pattern)? {
            let bytes = reader.read(&path)?;
            inputs.push(ActionInput {
                content_hash: anvil_crypto::hash(&bytes),
                path,
            });
        }
    }
    inputs.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(inputs)
}

/// Synthetic `ActionInput`s standing in for `deps`' already-resolved
/// `ActionId`s, folded into a node's own inputs before `ActionId`
/// derivation so the id changes whenever any transitive dependency's does.
/// The path prefix can't collide with a real source path (those are always
/// workspace-relative and never start with a NUL byte).
fn dependency_inputs_for(
    deps: &[TargetId],
    assembled: &BTreeMap<TargetId, (ActionId, AssembledAction)>,
) -> anyhow::Result<Vec<ActionInput>> {
    deps.iter()
        .map(|dep| {
            let (action_id, _) = assembled
                .get(dep)
                .ok_or_else(|| anyhow::anyhow!("dependency {dep} assembled after its dependent"))?;
            Ok(ActionInput {
                path: format!("\0dep:{dep}"),
                content_hash: *action_id.as_bytes(),
            })
        })
        .collect()
}

/// Build the hermetic envelope for one action — every input read-only at
/// its own path, the handler's declared outputs writable, network off, no
/// resource ceilings beyond the worker's own defaults — and serialize it
/// to the stable string `Action::sandbox_spec` carries (§4.6; `anvil-types`
/// can't depend on `anvil-sandbox` without a cycle, so the driver is what
/// encodes the real `SandboxSpec`).
fn encode_sandbox_spec(inputs: &[ActionInput], outputs: &[String]) -> anyhow::Result<String> {
    let spec = SandboxSpec {
        inputs: inputs
            .iter()
            .map(|input| InputMapping {
                host_path: input.path.clone(),
                sandbox_path: input.path.clone(),
            })
            .collect(),
        declared_outputs: outputs.to_vec(),
        network: NetworkPolicy::Off,
        limits: ResourceLimits::default(),
        env_allowlist: BTreeSet::new(),
    };
    Ok(serde_json::to_string(&spec)?)
}

/// Resolve the signing key for the action cache (§4.2): external keying
/// material from [`ENV_CACHE_KEY`] when operating against a shared cache,
/// otherwise a key derived locally from the workspace root and a best-effort
/// machine identifier.
fn shared_cache_key(config: &anvil_types::workspace::WorkspaceConfig) -> [u8; 32] {
    if let Ok(hex_key) = std::env::var(ENV_CACHE_KEY) {
        match decode_hex_key(&hex_key) {
            Some(key) => return key,
            None => warn!(
                "{ENV_CACHE_KEY} must be 64 hex characters (32 bytes); ignoring and deriving a local key instead"
            ),
        }
    }
    let machine_id = std::env::var(ENV_MACHINE_ID).unwrap_or_else(|_| "unknown-machine".to_owned());
    anvil_cache::derive_local_key(&config.root, &machine_id)
}

fn decode_hex_key(s: &str) -> Option<[u8; 32]> {
    if s.len() != 64 {
        return None;
    }
    let mut key = [0u8; 32];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).ok()?;
    }
    Some(key)
}

/// Scheduler worker-thread count (§6): [`ENV_MAX_PARALLELISM`] overrides
/// the workspace's own `maxParallelism` option when set to a positive
/// integer; otherwise `maxParallelism` is honored, falling back to the
/// host's CPU count when the workspace also leaves it at zero.
fn worker_count(config: &anvil_types::workspace::WorkspaceConfig) -> usize {
    if let Some(n) = std::env::var(ENV_MAX_PARALLELISM)
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|&n| n > 0)
    {
        return n;
    }
    if config.options.max_parallelism == 0 {
        num_cpus::get().max(1)
    } else {
        config.options.max_parallelism
    }
}

/// `Scheduler` needs to own its executor by value; this forwards to the
/// shared `Arc<HandlerExecutor>` so `build::run` can also consult
/// `was_cache_hit` after the run completes.
struct ExecutorHandle(Arc<HandlerExecutor>);

#[async_trait::async_trait]
impl anvil_sched::Executor for ExecutorHandle {
    async fn execute(&self, action: &Action) -> anvil_types::action::ActionOutcome {
        anvil_sched::Executor::execute(self.0.as_ref(), action).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_types::target::OutputKind;
    use anvil_types::workspace::{TargetSpec, WorkspaceOptions};
    use std::io::Write;

    fn write_workspace(dir: &Path) -> std::path::PathBuf {
        let root = dir.to_path_buf();
        std::fs::write(root.join("a.rs"), b"fn a() {}").unwrap();
        let config = anvil_types::workspace::WorkspaceConfig {
            root: root.clone(),
            options: WorkspaceOptions {
                output_dir: std::path::PathBuf::from("out"),
                cache_dir: std::path::PathBuf::from(".anvil-cache"),
                max_parallelism: 1,
            },
            targets: vec![TargetSpec {
                id: TargetId::from("a".to_owned()),
                language: Language::Rust,
                kind: OutputKind::Library,
                sources: vec!["a.rs".to_owned()],
                deps: vec![],
                flags: vec![],
                language_config: BTreeMap::new(),
                output_path: None,
            }],
        };
        let path = root.join("anvil-workspace.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();
        path
    }

    #[tokio::test]
    async fn a_workspace_with_no_registered_handler_reports_tool_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workspace(dir.path());
        let report = run(&path, &[], false).await.unwrap();
        assert_eq!(report.targets.len(), 1);
        assert!(!report.all_succeeded());
        assert_eq!(report.exit_code(), 1);
    }

    #[tokio::test]
    async fn an_unknown_target_selector_fails_the_graph_build() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_workspace(dir.path());
        let err = run(&path, &["missing".to_owned()], false).await.unwrap_err();
        assert!(err.to_string().contains("unknown target") || err.to_string().contains("missing"));
    }

    /// End-to-end scenarios (§8): a `lib` target (sources `a.x`, `b.x`)
    /// depended on by an `app` target (source `m.x`), built against a
    /// [`anvil_handler::MockHandler`] standing in for a real toolchain.
    mod scenarios {
        use super::*;
        use anvil_handler::MockHandler;

        fn write_lib_app_workspace(dir: &Path) -> std::path::PathBuf {
            let root = dir.to_path_buf();
            std::fs::write(root.join("a.x"), b"alpha").unwrap();
            std::fs::write(root.join("b.x"), b"bravo").unwrap();
            std::fs::write(root.join("m.x"), b"main").unwrap();
            let config = anvil_types::workspace::WorkspaceConfig {
                root: root.clone(),
                options: WorkspaceOptions {
                    output_dir: std::path::PathBuf::from("out"),
                    cache_dir: std::path::PathBuf::from(".anvil-cache"),
                    max_parallelism: 2,
                },
                targets: vec![
                    TargetSpec {
                        id: TargetId::from("lib".to_owned()),
                        language: Language::Rust,
                        kind: OutputKind::Library,
                        sources: vec!["a.x".to_owned(), "b.x".to_owned()],
                        deps: vec![],
                        flags: vec![],
                        language_config: BTreeMap::new(),
                        output_path: None,
                    },
                    TargetSpec {
                        id: TargetId::from("app".to_owned()),
                        language: Language::Rust,
                        kind: OutputKind::Executable,
                        sources: vec!["m.x".to_owned()],
                        deps: vec![TargetId::from("lib".to_owned())],
                        flags: vec![],
                        language_config: BTreeMap::new(),
                        output_path: None,
                    },
                ],
            };
            let path = root.join("anvil-workspace.json");
            let mut file = std::fs::File::create(&path).unwrap();
            write!(file, "{}", serde_json::to_string(&config).unwrap()).unwrap();
            path
        }

        fn handlers() -> Arc<HandlerRegistry> {
            let registry = HandlerRegistry::new();
            registry.register(Language::Rust, Arc::new(MockHandler::default()));
            Arc::new(registry)
        }

        #[tokio::test]
        async fn scenario_1_small_graph_cold_cache_builds_both_targets_once() {
            let dir = tempfile::tempdir().unwrap();
            let path = write_lib_app_workspace(dir.path());

            let report = run_with_handlers(&path, &[], false, handlers()).await.unwrap();

            assert!(report.all_succeeded());
            assert_eq!(report.targets.len(), 2);
            assert_eq!(report.cache_hits(), 0);
            assert_eq!(report.cache_misses(), 2);
        }

        #[tokio::test]
        async fn scenario_2_warm_cache_rerun_hits_cache_for_everything() {
            let dir = tempfile::tempdir().unwrap();
            let path = write_lib_app_workspace(dir.path());

            run_with_handlers(&path, &[], false, handlers()).await.unwrap();
            let report = run_with_handlers(&path, &[], false, handlers()).await.unwrap();

            assert!(report.all_succeeded());
            assert_eq!(report.cache_hits(), 2);
            assert_eq!(report.cache_misses(), 0);
        }

        #[tokio::test]
        async fn scenario_3_source_change_rebuilds_lib_and_its_dependent_app() {
            let dir = tempfile::tempdir().unwrap();
            let path = write_lib_app_workspace(dir.path());

            run_with_handlers(&path, &[], false, handlers()).await.unwrap();

            std::fs::write(dir.path().join("b.x"), b"bravo-changed").unwrap();
            let report = run_with_handlers(&path, &[], false, handlers()).await.unwrap();

            assert!(report.all_succeeded());
            // both lib and app get a new fingerprint: lib because its own
            // source changed, app because lib's fingerprint feeds its own.
            assert_eq!(report.cache_misses(), 2);
            assert_eq!(report.cache_hits(), 0);
        }

        #[tokio::test]
        async fn scenario_4_tampered_cache_entry_is_treated_as_miss_and_rebuilt() {
            let dir = tempfile::tempdir().unwrap();
            let path = write_lib_app_workspace(dir.path());

            run_with_handlers(&path, &[], false, handlers()).await.unwrap();

            let entries_dir = dir.path().join(".anvil-cache").join("entries");
            let mut tampered = false;
            for shard in std::fs::read_dir(&entries_dir).unwrap() {
                let shard = shard.unwrap().path();
                if !shard.is_dir() {
                    continue;
                }
                for entry in std::fs::read_dir(&shard).unwrap() {
                    let entry_path = entry.unwrap().path();
                    let mut bytes = std::fs::read(&entry_path).unwrap();
                    if let Some(last) = bytes.last_mut() {
                        *last ^= 0xFF;
                    }
                    std::fs::write(&entry_path, bytes).unwrap();
                    tampered = true;
                    break;
                }
                if tampered {
                    break;
                }
            }
            assert!(tampered, "expected at least one cache entry on disk to tamper with");

            let report = run_with_handlers(&path, &[], false, handlers()).await.unwrap();

            assert!(report.all_succeeded());
            assert!(
                report.cache_misses() >= 1,
                "the tampered entry must be rejected and rebuilt rather than trusted"
            );
        }

        #[tokio::test]
        async fn scenario_5_concurrent_identical_builds_both_observe_success() {
            let dir = tempfile::tempdir().unwrap();
            let path = write_lib_app_workspace(dir.path());

            let (first, second) = tokio::join!(
                run_with_handlers(&path, &[], false, handlers()),
                run_with_handlers(&path, &[], false, handlers())
            );

            let first = first.unwrap();
            let second = second.unwrap();
            assert!(first.all_succeeded());
            assert!(second.all_succeeded());
        }
    }
}
