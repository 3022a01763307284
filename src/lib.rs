//! Safelock: client for a network advisory lock server.
//!
//! A separate, always-running lock server grants named mutual-exclusion
//! locks to processes on any machine that can reach it. This crate asks it
//! for grants and releases, retries while a lock is held elsewhere, gives up
//! at a deadline, and proves ownership on release with the nonce the server
//! chose at grant time.
//!
//! ```no_run
//! use safelock::{ClientConfig, LockClient, LockOptions, SafelockError};
//! use std::time::Duration;
//!
//! let client = LockClient::new(ClientConfig::default());
//! let report = client.with_lock(
//!     LockOptions::named("nightly-report").timeout(Duration::from_secs(30)),
//!     || Ok::<_, SafelockError>("generated"),
//! )?;
//! println!("{}", report);
//! # Ok::<(), SafelockError>(())
//! ```

pub mod cli;
pub mod client;
pub mod commands;
pub mod config;
pub mod deadline;
pub mod error;
pub mod exit_codes;
pub mod identity;
pub mod protocol;
pub mod scoped;
pub mod synchronized;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_support;

pub use client::{Acquisition, LockClient, LockOwnership};
pub use config::ClientConfig;
pub use deadline::{Deadline, Timeout};
pub use error::{Result, SafelockError};
pub use identity::ProcessIdentity;
pub use scoped::{LockGuard, LockOptions, default_lock_name};
pub use synchronized::SynchronizedLocks;
