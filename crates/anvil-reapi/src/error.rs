//! Error taxonomy for the REAPI façade.

use thiserror::Error;

/// Errors the façade can return. Distinct from [`anvil_types::error::CoordinatorError`]
/// since most REAPI-specific failures (feature disabled, unsupported RPC)
/// have no coordinator-side counterpart.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReapiError {
    /// The façade was constructed with REAPI support disabled.
    #[error("REAPI support is not enabled on this coordinator")]
    Disabled,
    /// The RPC named is a real part of REAPI but this façade only
    /// implements the synchronous `Execute` subset (§4.4's open question
    /// on REAPI scope).
    #[error("REAPI method `{0}` is not supported by this façade")]
    Unsupported(&'static str),
    /// `Execute` was called but no worker ever completed the action within
    /// the deadline.
    #[error("execute timed out waiting for a result")]
    Timeout,
    /// The underlying coordinator rejected the request.
    #[error("coordinator error: {0}")]
    Coordinator(#[from] anvil_types::error::CoordinatorError),
}
