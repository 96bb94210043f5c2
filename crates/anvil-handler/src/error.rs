//! Errors a [`crate::LanguageHandler`] raises. §9's open question on
//! `FileNotFound`/`ToolNotFound` mapping is resolved here: both surface
//! through this enum so callers get a single taxonomy to match on instead
//! of each handler inventing its own error codes.

use anvil_types::target::TargetId;
use thiserror::Error;

/// Errors a language handler implementation may raise from any of its four
/// operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandlerError {
    /// A source file the target declared does not exist on disk.
    #[error("handler: file not found: {0}")]
    FileNotFound(String),
    /// The language's real toolchain (compiler, linker, interpreter) could
    /// not be located. During fingerprinting this maps to
    /// `GraphError::ToolchainUnavailable`; during dispatch it maps to a
    /// non-retryable `ActionOutcome::Failed{kind: "tool-missing"}` (§9).
    #[error("handler: tool not found: {0}")]
    ToolNotFound(String),
    /// The build itself failed for a reason specific to this language
    /// (compile error, link error, etc.) — always non-retryable.
    #[error("handler: build failed for target {target}: {message}")]
    BuildFailed {
        /// The target that failed to build.
        target: TargetId,
        /// Handler-supplied failure detail, including any captured
        /// compiler output.
        message: String,
    },
}
