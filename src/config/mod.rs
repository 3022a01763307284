//! Configuration for the safelock client.
//!
//! This module defines the ClientConfig struct, read from an optional YAML
//! file. It supports forward-compatible YAML parsing (unknown fields are
//! ignored), sensible defaults for every field, environment overrides for
//! the server address, and validation of config values.

mod model;
mod operations;
pub mod types;


// Re-export public API
pub use model::ClientConfig;
pub use types::UnavailablePolicy;
