//! Wire format for lock server requests and responses.
//!
//! Every request and response is a single JSON object sent over its own
//! TCP connection (see [`crate::transport`]).
//!
//! # Request
//!
//! - `action`: `"lock"` or `"unlock"`
//! - `lockname`: the lock name
//! - `pid`: process id of the requester
//! - `nonce`: the grant's nonce (`unlock` only)
//!
//! # Response
//!
//! - `ok`: whether the server granted the request
//! - `action`, `lockname`: echoed from the request
//! - `nonce`: the granted nonce (`lock`), or the released one (`unlock`)
//! - `message`: why the server refused (only when `ok` is false)
//!
//! Unknown response fields are ignored.

use crate::error::{Result, SafelockError};
use serde::{Deserialize, Serialize};

/// Reason reported when a refusal carries no message.
pub const WHY_UNKNOWN: &str = "safelock did not say why";

/// Request action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Lock,
    Unlock,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Lock => write!(f, "lock"),
            Action::Unlock => write!(f, "unlock"),
        }
    }
}

/// A lock or unlock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub action: Action,

    pub lockname: String,

    pub pid: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,
}

/// A server reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub ok: bool,

    pub action: Action,

    pub lockname: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nonce: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl Response {
    /// The server's refusal reason, or [`WHY_UNKNOWN`].
    pub fn reason(&self) -> &str {
        self.message
            .as_deref()
            .filter(|m| !m.trim().is_empty())
            .unwrap_or(WHY_UNKNOWN)
    }
}

/// Encode a request as JSON bytes.
///
/// `unlock` requires a nonce and `lock` must not carry one. The encoded
/// request must fit in `max_packet_size` bytes.
///
/// # Returns
///
/// * `Ok(Vec<u8>)` - The encoded request
/// * `Err(SafelockError::InvalidRequest)` - Empty name, nonce misuse, or oversized request
pub fn encode_request(
    action: Action,
    lock_name: &str,
    pid: u32,
    nonce: Option<&str>,
    max_packet_size: usize,
) -> Result<Vec<u8>> {
    if lock_name.trim().is_empty() {
        return Err(SafelockError::InvalidRequest(
            "lock name is empty".to_string(),
        ));
    }

    match (action, nonce) {
        (Action::Unlock, None) => {
            return Err(SafelockError::InvalidRequest(format!(
                "unlock of \"{}\" requires a nonce",
                lock_name
            )));
        }
        (Action::Lock, Some(_)) => {
            return Err(SafelockError::InvalidRequest(format!(
                "lock of \"{}\" must not carry a nonce",
                lock_name
            )));
        }
        _ => {}
    }

    let request = Request {
        action,
        lockname: lock_name.to_string(),
        pid,
        nonce: nonce.map(str::to_string),
    };

    let bytes = serde_json::to_vec(&request).map_err(|e| {
        SafelockError::InvalidRequest(format!("failed to encode {} request: {}", action, e))
    })?;

    if bytes.len() > max_packet_size {
        return Err(SafelockError::InvalidRequest(format!(
            "{} request for \"{}\" is {} bytes, more than the {} byte packet limit",
            action,
            lock_name,
            bytes.len(),
            max_packet_size
        )));
    }

    Ok(bytes)
}

/// Decode a server reply.
///
/// # Returns
///
/// * `Ok(Response)` - A well-formed reply
/// * `Err(SafelockError::ProtocolError)` - Empty or unparseable bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(SafelockError::ProtocolError(
            "empty response from lock server".to_string(),
        ));
    }

    serde_json::from_slice(bytes).map_err(|e| {
        SafelockError::ProtocolError(format!(
            "unparseable response from lock server ({}): {}",
            e,
            String::from_utf8_lossy(bytes)
        ))
    })
}

/// Whether a refusal message means the presented nonce does not match the
/// current grant. Retrying such a request can never succeed.
pub fn is_nonce_mismatch(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("wrong nonce") || message.contains("nonce mismatch")
}
