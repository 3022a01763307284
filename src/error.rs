//! Error types for the safelock client.
//!
//! Uses thiserror for derive macros. Variants follow the lock client's
//! failure taxonomy: which failures are absorbed by the retry loop and which
//! surface to the caller immediately is decided in [`crate::client`].

use crate::exit_codes;
use thiserror::Error;

/// Main error type for safelock operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SafelockError {
    /// No lock server could be reached (connection refused, unresolvable
    /// address or connect timeout).
    #[error("No lock server at {0}")]
    ServerUnavailable(String),

    /// The deadline passed while the lock stayed contended or unreleased.
    #[error("{0}")]
    LockTimeout(String),

    /// The server refused the request and retrying cannot fix it.
    #[error("{0}")]
    LockFailed(String),

    /// The server reply was empty, malformed, oversized or inconsistent
    /// with the request.
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// The connection broke after it was established.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The caller asked for something that cannot be sent.
    #[error("Invalid lock request: {0}")]
    InvalidRequest(String),

    /// Configuration or command-line problem.
    #[error("{0}")]
    UserError(String),
}

impl SafelockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            SafelockError::ServerUnavailable(_) => exit_codes::SERVER_UNAVAILABLE,
            SafelockError::LockTimeout(_) => exit_codes::LOCK_TIMEOUT,
            SafelockError::LockFailed(_) => exit_codes::LOCK_FAILED,
            SafelockError::ProtocolError(_) => exit_codes::PROTOCOL_FAILURE,
            SafelockError::Transport(_) => exit_codes::PROTOCOL_FAILURE,
            SafelockError::InvalidRequest(_) => exit_codes::USER_ERROR,
            SafelockError::UserError(_) => exit_codes::USER_ERROR,
        }
    }

    /// Whether the retry loop may absorb this error as a failed attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SafelockError::ProtocolError(_) | SafelockError::Transport(_)
        )
    }
}

/// Result type alias for safelock operations.
pub type Result<T> = std::result::Result<T, SafelockError>;
