//! In-process locks for `synchronized` sections.
//!
//! Threads of one process that enter the same synchronized section queue on
//! a local mutex before asking the lock server, so only one of them at a time
//! polls the server. The server lock is still what provides mutual
//! exclusion across processes.

use crate::client::LockClient;
use crate::error::SafelockError;
use crate::scoped::LockOptions;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Map of section name to local mutex, owned by one [`LockClient`].
#[derive(Debug, Default)]
pub struct SynchronizedLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SynchronizedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The local mutex for `name`, created on first use.
    pub fn get(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = recover(self.locks.lock());
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Number of sections seen so far.
    pub fn len(&self) -> usize {
        recover(self.locks.lock()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl LockClient {
    /// Run `body` so each call completes before another call with the same
    /// `name` starts, in this process or any other.
    ///
    /// Waits without timeout and requires the lock server.
    pub fn synchronized<T, E, F>(&self, name: &str, body: F) -> std::result::Result<T, E>
    where
        F: FnOnce() -> std::result::Result<T, E>,
        E: From<SafelockError>,
    {
        let local = self.synchronized_locks().get(name);
        let _local_guard = recover(local.lock());

        self.with_lock(LockOptions::named(name), body)
    }
}

/// A panic inside a synchronized section poisons its local mutex; the
/// server lock was already released during unwinding, so keep going.
fn recover<T>(result: std::sync::LockResult<MutexGuard<'_, T>>) -> MutexGuard<'_, T> {
    result.unwrap_or_else(|poison| poison.into_inner())
}
