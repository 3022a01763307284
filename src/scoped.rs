//! Scoped locking: hold a lock for the extent of a block.
//!
//! [`LockClient::with_lock`] acquires a lock, runs a closure and releases the
//! lock on every exit path: normal return, error return, or panic.
//! [`LockClient::lock`] returns the underlying RAII [`LockGuard`] for callers
//! who want to manage the extent themselves.
//!
//! # Default names
//!
//! A lock without an explicit name is named after the call site,
//! `file:line`, so every caller of the same line contends for the same
//! lock. Callers needing per-instance locks must build their own names
//! (e.g., `format!("Worker {}", self.id)`).

use crate::client::{Acquisition, LockClient, LockOwnership};
use crate::deadline::Timeout;
use crate::error::{Result, SafelockError};
use std::panic::Location;

/// How a scoped lock is acquired and released.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOptions {
    /// Lock name; `None` derives one from the call site.
    pub name: Option<String>,

    /// Applies to acquiring and, separately, to releasing.
    pub timeout: Timeout,

    /// Whether an unreachable server is an error (default) or means
    /// running the block unlocked.
    pub server_required: bool,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            name: None,
            timeout: Timeout::Never,
            server_required: true,
        }
    }
}

impl LockOptions {
    /// Options with a call-site name, no timeout, server required.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for the lock called `name`.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn timeout(mut self, timeout: impl Into<Timeout>) -> Self {
        self.timeout = timeout.into();
        self
    }

    pub fn server_required(mut self, server_required: bool) -> Self {
        self.server_required = server_required;
        self
    }

    /// The explicit name, or the default derived from `location`.
    pub fn resolve_name(&self, location: &Location<'_>) -> Result<String> {
        match &self.name {
            Some(name) if !name.trim().is_empty() => Ok(name.clone()),
            Some(_) => Err(SafelockError::InvalidRequest(
                "lock name is empty".to_string(),
            )),
            None => default_lock_name(&call_site(location)),
        }
    }
}

/// `file:line` of `location`.
pub fn call_site(location: &Location<'_>) -> String {
    format!("{}:{}", location.file(), location.line())
}

/// Default lock name for a calling context such as `src/jobs.rs:42`.
pub fn default_lock_name(context: &str) -> Result<String> {
    let context = context.trim();
    if context.is_empty() {
        return Err(SafelockError::InvalidRequest(
            "cannot derive a lock name from an empty calling context".to_string(),
        ));
    }
    Ok(context.to_string())
}

/// RAII guard for a server lock.
///
/// When dropped, the lock is released. If releasing fails, a warning is
/// logged but no panic occurs.
#[derive(Debug)]
pub struct LockGuard<'a> {
    client: &'a LockClient,
    acquisition: Acquisition,
    timeout: Timeout,
    server_required: bool,
    released: bool,
}

impl<'a> LockGuard<'a> {
    fn new(client: &'a LockClient, acquisition: Acquisition, options: &LockOptions) -> Self {
        Self {
            client,
            acquisition,
            timeout: options.timeout,
            server_required: options.server_required,
            released: false,
        }
    }

    pub fn lock_name(&self) -> &str {
        self.acquisition.lock_name()
    }

    /// False when running without a server (`server_required = false`).
    pub fn is_locked(&self) -> bool {
        self.acquisition.is_locked()
    }

    pub fn ownership(&self) -> Option<&LockOwnership> {
        self.acquisition.ownership()
    }

    /// Release the lock now and report failures.
    ///
    /// Returns `Ok(false)` when there was nothing to release.
    pub fn release(mut self) -> Result<bool> {
        self.released = true;
        self.release_held()
    }

    fn release_held(&self) -> Result<bool> {
        match &self.acquisition {
            Acquisition::Locked(ownership) => {
                self.client
                    .release_ownership(ownership, self.timeout, self.server_required)
            }
            Acquisition::Unlocked { .. } => Ok(false),
        }
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if !self.released
            && let Err(e) = self.release_held()
        {
            log::warn!("failed to release lock \"{}\": {}", self.lock_name(), e);
        }
    }
}

impl LockClient {
    /// Acquire a lock and return a guard that releases it when dropped.
    ///
    /// Without a name in `options`, the lock is named after the caller's
    /// source location.
    #[track_caller]
    pub fn lock(&self, options: LockOptions) -> Result<LockGuard<'_>> {
        let lock_name = options
            .resolve_name(Location::caller())
            .inspect_err(|e| log::error!("{}", e))?;

        let acquisition = self.acquire(&lock_name, options.timeout, options.server_required)?;
        if let Acquisition::Unlocked { reason, .. } = &acquisition {
            log::warn!("running \"{}\" without a lock: {}", lock_name, reason);
        }

        Ok(LockGuard::new(self, acquisition, &options))
    }

    /// Run `body` while holding a lock.
    ///
    /// 1. Resolve the lock name (explicit, or the caller's `file:line`).
    /// 2. Acquire; on failure return the error without running `body`.
    /// 3. Run `body`.
    /// 4. Release exactly once, whether `body` returned `Ok`, returned `Err`
    ///    or panicked.
    ///
    /// A release failure after `body` failed is logged and `body`'s error is
    /// returned unchanged. A release failure after `body` succeeded is
    /// returned.
    #[track_caller]
    pub fn with_lock<T, E, F>(&self, options: LockOptions, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<SafelockError>,
    {
        let guard = self.lock(options)?;

        match body() {
            Ok(value) => {
                guard.release()?;
                Ok(value)
            }
            Err(err) => {
                let lock_name = guard.lock_name().to_string();
                if let Err(release_err) = guard.release() {
                    log::error!(
                        "failed to release lock \"{}\" after its locked section failed: {}",
                        lock_name,
                        release_err
                    );
                }
                Err(err)
            }
        }
    }
}
