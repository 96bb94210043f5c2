//! The external language-handler interface (§6) and a registry keyed by
//! language tag.
//!
//! Handler *implementations* (an actual C/C++, Rust, Go, TypeScript, or
//! JVM toolchain invocation) are out of scope per §1 — this crate defines
//! only the narrow trait the scheduler dispatches through
//! ([`LanguageHandler`]), the registry that resolves a `Target`'s language
//! tag to a handler ([`HandlerRegistry`]), and a scripted test double
//! ([`MockHandler`], behind `test-support`) used by the end-to-end
//! scenario tests in `anvil-sched`/`anvil-cache`.
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod handler;
pub mod registry;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use error::HandlerError;
pub use handler::{ActionRecorder, Import, LanguageHandler, NullRecorder, OutputHash};
pub use registry::HandlerRegistry;

#[cfg(any(test, feature = "test-support"))]
pub use mock::MockHandler;
