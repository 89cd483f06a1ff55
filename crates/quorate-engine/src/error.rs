//! Error types for the coordination engine.

use thiserror::Error;

use quorate_client::ClientError;

/// Errors that can occur while coordinating membership operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// `begin` was called while a phase was still in flight.
    #[error("a coordination phase is already active")]
    AlreadyActive,

    /// A completion arrived with no phase active: expected completion
    /// counts were miscounted somewhere.
    #[error("no coordination phase is active")]
    NotActive,

    /// The phase deadline elapsed before all operations completed.
    #[error("deadline elapsed with {pending} of {expected} completions outstanding")]
    DeadlineExceeded { expected: u64, pending: u64 },

    /// One of the fanned-out operations failed; the first failure wins and
    /// is surfaced verbatim.
    #[error("operation failed: {0}")]
    Operation(#[from] ClientError),

    /// A bounded retry loop exhausted its deadline without convergence.
    #[error("convergence not reached before deadline: {0}")]
    ConvergenceTimeout(String),
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
