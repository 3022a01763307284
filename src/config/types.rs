//! Configuration types and defaults for safelock.
//!
//! This module defines enums, constants, and default value functions
//! used by the ClientConfig struct.

use serde::{Deserialize, Serialize};

/// Host of the lock server when nothing else is configured.
pub const DEFAULT_HOST: &str = "localhost";

/// Port of the lock server when nothing else is configured.
pub const DEFAULT_PORT: u16 = 8674;

/// Environment variable overriding the server host.
pub const HOST_ENV: &str = "SAFELOCK_HOST";

/// Environment variable overriding the server port.
pub const PORT_ENV: &str = "SAFELOCK_PORT";

/// Environment variable naming a config file to load.
pub const CONFIG_ENV: &str = "SAFELOCK_CONFIG";

/// Smallest packet size that still fits a lock request with a short name.
pub const MIN_PACKET_SIZE: usize = 64;

/// Largest packet size accepted from configuration.
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;

/// What to do when the lock server cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnavailablePolicy {
    /// Fail the lock operation (default, safest).
    #[default]
    Fail,
    /// Log a warning and run the critical section without a lock.
    RunUnlocked,
}

impl UnavailablePolicy {
    /// Whether the lock server is required under this policy.
    pub fn server_required(self) -> bool {
        self == Self::Fail
    }
}

// Default value functions for serde
pub(crate) fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
pub(crate) fn default_port() -> u16 {
    DEFAULT_PORT
}
pub(crate) fn default_max_packet_size() -> usize {
    1024
}
pub(crate) fn default_poll_interval_ms() -> u64 {
    100
}
pub(crate) fn default_connect_timeout_ms() -> u64 {
    2000
}
pub(crate) fn default_io_timeout_ms() -> u64 {
    5000
}
