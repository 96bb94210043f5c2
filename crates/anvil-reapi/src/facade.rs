//! The REAPI façade itself (§4.4): a synchronous `execute` call layered
//! over the coordinator's asynchronous dispatch, plus the deliberately
//! unimplemented streaming/wait RPCs REAPI defines beyond that subset.

use crate::error::ReapiError;
use crate::types::{ExecuteRequest, ExecuteResponse};
use anvil_coordinator::{ActionRequest, CoordinatorState};
use anvil_types::action::{ActionId, ActionOutcome};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::watch;
use tracing::instrument;

type Waiter = watch::Sender<Option<ActionOutcome>>;

/// REAPI surface over a coordinator. Construct with `enabled = false` to
/// have every call return [`ReapiError::Disabled`] — the default for a
/// coordinator that never opted into the REAPI feature flag.
pub struct ReapiFacade {
    enabled: bool,
    coordinator: Arc<CoordinatorState>,
    waiters: Mutex<BTreeMap<ActionId, Waiter>>,
    default_timeout: Duration,
}

impl ReapiFacade {
    /// Build a façade over `coordinator`. `enabled` mirrors the
    /// coordinator's REAPI feature flag.
    #[must_use]
    pub fn new(coordinator: Arc<CoordinatorState>, enabled: bool) -> Self {
        Self {
            enabled,
            coordinator,
            waiters: Mutex::new(BTreeMap::new()),
            default_timeout: Duration::from_secs(300),
        }
    }

    /// Record the terminal outcome for `action_id`. Called by the
    /// transport layer's message dispatch whenever a worker's `Result`
    /// message arrives, so any in-flight `execute` call waiting on it can
    /// complete.
    pub fn record_outcome(&self, action_id: ActionId, outcome: ActionOutcome) {
        if let Some(waiter) = self.waiters.lock().remove(&action_id) {
            let _ = waiter.send(Some(outcome));
        }
    }

    /// The single synchronous RPC this façade implements: submit `request`
    /// for dispatch and block until a worker reports its terminal outcome
    /// or `default_timeout` elapses.
    #[instrument(skip(self, request))]
    pub async fn execute(&self, request: ExecuteRequest) -> Result<ExecuteResponse, ReapiError> {
        if !self.enabled {
            return Err(ReapiError::Disabled);
        }

        let action_id = request.action.id;
        let (tx, mut rx) = watch::channel(None);
        self.waiters.lock().insert(action_id, tx);

        let wire_request = ActionRequest {
            action: request.action,
            required_capabilities: request.required_capabilities,
        };
        self.coordinator.submit(wire_request, SystemTime::now());

        let result = tokio::time::timeout(self.default_timeout, async {
            loop {
                if let Some(outcome) = rx.borrow_and_update().clone() {
                    return outcome;
                }
                if rx.changed().await.is_err() {
                    return ActionOutcome::Cancelled;
                }
            }
        })
        .await;

        self.waiters.lock().remove(&action_id);

        match result {
            Ok(outcome) => Ok(ExecuteResponse { outcome }),
            Err(_) => Err(ReapiError::Timeout),
        }
    }

    /// REAPI's `WaitExecution` (reattach to a previously-submitted,
    /// still-running action). Not implemented — this façade's REAPI
    /// subset is limited to the single synchronous `Execute` call (§4.4's
    /// recorded open-question decision).
    pub fn wait_execution(&self) -> Result<ExecuteResponse, ReapiError> {
        Err(ReapiError::Unsupported("WaitExecution"))
    }

    /// REAPI's streaming operation-status updates. Not implemented for
    /// the same reason as [`ReapiFacade::wait_execution`].
    pub fn execute_streaming(&self) -> Result<ExecuteResponse, ReapiError> {
        Err(ReapiError::Unsupported("Execute (streaming)"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anvil_types::action::Action;
    use anvil_types::worker::Capabilities;
    use std::collections::BTreeMap as Map;

    fn sample_action() -> Action {
        Action {
            id: ActionId([9; 32]),
            command: vec!["true".to_owned()],
            env: Map::new(),
            inputs: vec![],
            outputs: vec![],
            sandbox_spec: String::new(),
            timeout: None,
            priority: 0,
            deps: vec![],
        }
    }

    #[tokio::test]
    async fn disabled_facade_rejects_execute() {
        let coordinator = Arc::new(CoordinatorState::new());
        let facade = ReapiFacade::new(coordinator, false);
        let result = facade
            .execute(ExecuteRequest {
                action: sample_action(),
                required_capabilities: Capabilities::default(),
                skip_cache_lookup: false,
            })
            .await;
        assert_eq!(result.unwrap_err(), ReapiError::Disabled);
    }

    #[tokio::test]
    async fn execute_resolves_once_an_outcome_is_recorded() {
        let coordinator = Arc::new(CoordinatorState::new());
        let facade = Arc::new(ReapiFacade::new(coordinator, true));

        let action = sample_action();
        let action_id = action.id;
        let facade_for_recorder = Arc::clone(&facade);
        let recorder = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            facade_for_recorder.record_outcome(
                action_id,
                ActionOutcome::Success {
                    output_hashes: vec![],
                    duration: Duration::from_millis(5),
                },
            );
        });

        let response = facade
            .execute(ExecuteRequest {
                action,
                required_capabilities: Capabilities::default(),
                skip_cache_lookup: false,
            })
            .await
            .unwrap();

        recorder.await.unwrap();
        assert!(matches!(response.outcome, ActionOutcome::Success { .. }));
    }

    #[test]
    fn wait_execution_and_streaming_are_explicitly_unsupported() {
        let coordinator = Arc::new(CoordinatorState::new());
        let facade = ReapiFacade::new(coordinator, true);
        assert_eq!(
            facade.wait_execution().unwrap_err(),
            ReapiError::Unsupported("WaitExecution")
        );
        assert_eq!(
            facade.execute_streaming().unwrap_err(),
            ReapiError::Unsupported("Execute (streaming)")
        );
    }
}
