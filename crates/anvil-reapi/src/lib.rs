//! REAPI (Bazel Remote Execution API) façade over [`anvil_coordinator`]
//! (§4.4), gated behind an opt-in flag on the coordinator binary. Only the
//! synchronous `Execute` RPC is implemented; `WaitExecution` and streaming
//! status updates are explicitly unsupported (§9 open question).
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod facade;
pub mod types;

pub use error::ReapiError;
pub use facade::ReapiFacade;
pub use types::{ExecuteRequest, ExecuteResponse};
