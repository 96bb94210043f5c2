//! REAPI-shaped request/response types, translated to and from anvil's
//! native [`Action`]/[`ActionOutcome`] model at the façade boundary so the
//! rest of the crate never has to think in REAPI vocabulary.

use anvil_types::action::{Action, ActionOutcome};
use anvil_types::worker::Capabilities;

/// A REAPI `ExecuteRequest`, trimmed to the fields this façade honors.
#[derive(Debug, Clone)]
pub struct ExecuteRequest {
    /// The action to run, already resolved to anvil's native model.
    pub action: Action,
    /// Capabilities the selected worker must satisfy.
    pub required_capabilities: Capabilities,
    /// If true, the façade may return a cached result without dispatching
    /// (mirrors REAPI's `skip_cache_lookup = false` default). The façade
    /// itself does not consult the cache — callers (the driver binary,
    /// which owns the `anvil-cache` handle) do that before calling
    /// `execute` at all — so this field is carried through only for
    /// parity with the wire shape and is currently unused.
    pub skip_cache_lookup: bool,
}

/// A REAPI `ExecuteResponse`, trimmed to the fields this façade produces.
#[derive(Debug, Clone)]
pub struct ExecuteResponse {
    /// The terminal outcome reported by the worker that ran the action.
    pub outcome: ActionOutcome,
}
