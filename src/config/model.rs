//! ClientConfig struct definition and default implementation.

use super::types::*;
use crate::deadline::Timeout;
use crate::error::Result;
use crate::transport::TransportLimits;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the lock client.
///
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    // =========================================================================
    // Server settings
    // =========================================================================
    /// Host of the lock server (default: "localhost").
    #[serde(default = "default_host")]
    pub host: String,

    /// Port of the lock server (default: 8674).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Largest request or response, in bytes (default: 1024).
    #[serde(default = "default_max_packet_size")]
    pub max_packet_size: usize,

    // =========================================================================
    // Retry settings
    // =========================================================================
    /// Pause between attempts while a lock is contended.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on connecting to the server, per attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,

    /// Upper bound on each read or write, per attempt.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,

    /// Timeout used by the CLI when `--timeout` is not given (none waits forever).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_timeout_secs: Option<f64>,

    /// What the CLI does when the server cannot be reached.
    #[serde(default)]
    pub on_server_unavailable: UnavailablePolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_packet_size: default_max_packet_size(),
            poll_interval_ms: default_poll_interval_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            io_timeout_ms: default_io_timeout_ms(),
            default_timeout_secs: None,
            on_server_unavailable: UnavailablePolicy::default(),
        }
    }
}

impl ClientConfig {
    /// `host:port` of the lock server.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Per-request transport limits.
    pub fn transport_limits(&self) -> TransportLimits {
        TransportLimits {
            max_response_size: self.max_packet_size,
            connect_timeout: self.connect_timeout(),
            io_timeout: Duration::from_millis(self.io_timeout_ms),
        }
    }

    /// The configured default timeout.
    pub fn default_timeout(&self) -> Result<Timeout> {
        Timeout::from_optional_secs(self.default_timeout_secs)
    }

    pub fn server_required(&self) -> bool {
        self.on_server_unavailable.server_required()
    }
}
