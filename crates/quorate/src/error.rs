//! Error types for the Verifier.

use thiserror::Error;

use quorate_client::ClientError;
use quorate_core::ValidationError;
use quorate_engine::EngineError;

/// Errors that can occur during verification.
#[derive(Debug, Error)]
pub enum VerifierError {
    /// A snapshot failed structural validation.
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The coordination engine failed: barrier misuse, deadline, or a
    /// surfaced operation failure.
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),

    /// A direct endpoint call failed.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// An operation needs registered peers and found none.
    #[error("no peers registered")]
    NoPeers,
}

impl VerifierError {
    /// True when verification failed because a bounded retry loop
    /// exhausted its deadline.
    pub fn is_convergence_timeout(&self) -> bool {
        matches!(
            self,
            VerifierError::Engine(EngineError::ConvergenceTimeout(_))
        )
    }
}

/// Result type for verifier operations.
pub type Result<T> = std::result::Result<T, VerifierError>;
