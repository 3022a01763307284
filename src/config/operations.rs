//! Config loading, validation, and environment overrides.

use super::model::ClientConfig;
use super::types::{CONFIG_ENV, HOST_ENV, MAX_PACKET_SIZE, MIN_PACKET_SIZE, PORT_ENV};
use crate::deadline::Timeout;
use crate::error::{Result, SafelockError};
use std::path::{Path, PathBuf};

impl ClientConfig {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the config file
    ///
    /// # Returns
    ///
    /// * `Ok(ClientConfig)` - Successfully loaded and validated config
    /// * `Err(SafelockError::UserError)` - Read error, parse error or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            SafelockError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ClientConfig = serde_yaml::from_str(yaml).map_err(|e| {
            SafelockError::UserError(format!("failed to parse config YAML: {}", e))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize config to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| {
            SafelockError::UserError(format!("failed to serialize config to YAML: {}", e))
        })
    }

    /// Resolve the effective configuration.
    ///
    /// The file is `path` if given, else `$SAFELOCK_CONFIG` if set, else
    /// built-in defaults. `$SAFELOCK_HOST` and `$SAFELOCK_PORT` override the
    /// file either way.
    pub fn resolve(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply `$SAFELOCK_HOST` / `$SAFELOCK_PORT` if set.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(host) = std::env::var(HOST_ENV)
            && !host.trim().is_empty()
        {
            self.host = host.trim().to_string();
        }

        if let Ok(port) = std::env::var(PORT_ENV) {
            self.port = port.trim().parse().map_err(|_| {
                SafelockError::UserError(format!(
                    "{} must be a port number, not '{}'",
                    PORT_ENV, port
                ))
            })?;
        }

        self.validate()
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `host` must be non-empty and `port` non-zero
    /// - `max_packet_size` must be between 64 bytes and 1 MiB
    /// - `poll_interval_ms`, `connect_timeout_ms` and `io_timeout_ms` must be positive
    /// - `default_timeout_secs`, if set, must be a non-negative number
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(SafelockError::UserError(
                "config validation failed: host must not be empty".to_string(),
            ));
        }

        if self.port == 0 {
            return Err(SafelockError::UserError(
                "config validation failed: port must be greater than 0".to_string(),
            ));
        }

        if self.max_packet_size < MIN_PACKET_SIZE {
            return Err(SafelockError::UserError(format!(
                "config validation failed: max_packet_size must be at least {} (found {})",
                MIN_PACKET_SIZE, self.max_packet_size
            )));
        }

        if self.max_packet_size > MAX_PACKET_SIZE {
            return Err(SafelockError::UserError(format!(
                "config validation failed: max_packet_size must be at most {} (found {})",
                MAX_PACKET_SIZE, self.max_packet_size
            )));
        }

        for (name, value) in [
            ("poll_interval_ms", self.poll_interval_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("io_timeout_ms", self.io_timeout_ms),
        ] {
            if value == 0 {
                return Err(SafelockError::UserError(format!(
                    "config validation failed: {} must be greater than 0",
                    name
                )));
            }
        }

        if let Some(secs) = self.default_timeout_secs {
            Timeout::from_secs(secs).map_err(|_| {
                SafelockError::UserError(format!(
                    "config validation failed: default_timeout_secs must be a non-negative number (found {})",
                    secs
                ))
            })?;
        }

        Ok(())
    }
}
