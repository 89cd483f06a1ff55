//! Error types for membership endpoint calls.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured error body a membership endpoint may return alongside a
/// failure status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceErrorBody {
    /// Human-readable description from the remote service.
    pub message: String,
    /// Service-specific error code, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u32>,
}

/// What is known about a failed endpoint call: every transport must supply
/// at least a timeout flag and an HTTP-like status code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFailure {
    /// True when the call timed out rather than completing with an error.
    pub timeout: bool,
    /// HTTP-like status code (0 when the call never reached the service).
    pub status: u16,
    /// Structured error body, if the service produced one.
    pub body: Option<ServiceErrorBody>,
}

impl TransportFailure {
    /// The call timed out.
    pub fn timed_out() -> Self {
        Self {
            timeout: true,
            status: 0,
            body: None,
        }
    }

    /// The call completed with a failure status.
    pub fn status(status: u16) -> Self {
        Self {
            timeout: false,
            status,
            body: None,
        }
    }

    /// The call never reached the service.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            timeout: false,
            status: 503,
            body: Some(ServiceErrorBody {
                message: message.into(),
                error_code: None,
            }),
        }
    }
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timeout {
            write!(f, "timed out")?;
        } else {
            write!(f, "status {}", self.status)?;
        }
        if let Some(body) = &self.body {
            write!(f, ": {}", body.message)?;
        }
        Ok(())
    }
}

/// Errors that can occur talking to a membership endpoint.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The call failed at the transport level.
    #[error("transport failure: {0}")]
    Transport(TransportFailure),

    /// The response body could not be decoded into a membership snapshot.
    #[error("decode error: {0}")]
    Decode(String),

    /// The convergence probe rejected a snapshot.
    #[error("convergence probe rejected snapshot: {0}")]
    Convergence(String),
}

impl ClientError {
    /// Shorthand for an unreachable-member failure.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::Transport(TransportFailure::unreachable(message))
    }
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;
