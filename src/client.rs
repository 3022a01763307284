//! Lock client: the acquire/release retry loops.
//!
//! Each operation polls the lock server until it succeeds, its deadline
//! passes, or a failure occurs that retrying cannot fix:
//!
//! - **Granted / released**: return immediately.
//! - **Refused** (the lock is held elsewhere, or the server is busy): log
//!   the reason once, sleep the poll interval, retry.
//! - **Wrong nonce**: fail with [`SafelockError::LockFailed`] at once.
//! - **Malformed reply or broken connection**: log, count as a failed
//!   attempt, retry.
//! - **No server**: fail with [`SafelockError::ServerUnavailable`] at once,
//!   unless the caller set `server_required = false`, in which case the
//!   operation reports that it ran without the server.
//!
//! When the deadline passes while retrying, the operation fails with
//! [`SafelockError::LockTimeout`].

use crate::config::ClientConfig;
use crate::deadline::{Deadline, Timeout};
use crate::error::{Result, SafelockError};
use crate::identity::ProcessIdentity;
use crate::protocol::{self, Action, Response};
use crate::synchronized::SynchronizedLocks;
use crate::transport;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Proof of holding a lock, returned by a successful acquire.
///
/// The nonce must be presented unchanged to release the lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOwnership {
    /// Name of the held lock.
    #[serde(rename = "lockname")]
    pub lock_name: String,

    /// Opaque token chosen by the server at grant time.
    pub nonce: String,

    /// Process id of the acquiring process.
    pub pid: u32,

    /// When the grant was received.
    pub acquired_at: DateTime<Utc>,
}

impl LockOwnership {
    fn granted(lock_name: &str, nonce: String, pid: u32) -> Self {
        Self {
            lock_name: lock_name.to_string(),
            nonce,
            pid,
            acquired_at: Utc::now(),
        }
    }

    /// How long the lock has been held.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.acquired_at)
    }

    /// Format the age as a human-readable string.
    pub fn age_string(&self) -> String {
        let age = self.age();
        let seconds = age.num_seconds();
        let minutes = age.num_minutes();
        let hours = age.num_hours();

        if hours > 0 {
            format!("{}h {}m", hours, minutes % 60)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds % 60)
        } else {
            format!("{}s", seconds)
        }
    }
}

impl std::fmt::Display for LockOwnership {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (nonce: {}, pid: {}, held: {})",
            self.lock_name,
            self.nonce,
            self.pid,
            self.age_string()
        )
    }
}

/// Result of [`LockClient::acquire`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquisition {
    /// The server granted the lock.
    Locked(LockOwnership),

    /// No server was reachable and the caller allowed running unlocked.
    Unlocked { lock_name: String, reason: String },
}

impl Acquisition {
    pub fn is_locked(&self) -> bool {
        matches!(self, Acquisition::Locked(_))
    }

    pub fn lock_name(&self) -> &str {
        match self {
            Acquisition::Locked(ownership) => &ownership.lock_name,
            Acquisition::Unlocked { lock_name, .. } => lock_name,
        }
    }

    pub fn ownership(&self) -> Option<&LockOwnership> {
        match self {
            Acquisition::Locked(ownership) => Some(ownership),
            Acquisition::Unlocked { .. } => None,
        }
    }

    pub fn into_ownership(self) -> Option<LockOwnership> {
        match self {
            Acquisition::Locked(ownership) => Some(ownership),
            Acquisition::Unlocked { .. } => None,
        }
    }
}

/// How a retry loop ended without an error.
enum Outcome<T> {
    Done(T),
    /// The server was unreachable and not required; carries its address.
    ServerMissing(String),
}

/// How the server answered one well-formed request.
enum Reply<T> {
    Accepted(T),
    /// Held elsewhere; worth asking again.
    Refused(String),
}

/// Client for one lock server.
///
/// A client holds no per-lock state and can be shared between threads;
/// every call talks to the server on its own connection.
#[derive(Debug)]
pub struct LockClient {
    config: ClientConfig,
    identity: ProcessIdentity,
    synchronized: SynchronizedLocks,
}

impl LockClient {
    /// Create a client for the server described by `config`.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_identity(config, ProcessIdentity::current())
    }

    /// Create a client that reports `identity` to the server.
    pub fn with_identity(config: ClientConfig, identity: ProcessIdentity) -> Self {
        Self {
            config,
            identity,
            synchronized: SynchronizedLocks::new(),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn identity(&self) -> &ProcessIdentity {
        &self.identity
    }

    /// In-process locks backing [`LockClient::synchronized`].
    pub fn synchronized_locks(&self) -> &SynchronizedLocks {
        &self.synchronized
    }

    /// Acquire `lock_name`, retrying while it is held elsewhere.
    ///
    /// # Arguments
    ///
    /// * `lock_name` - The lock to acquire
    /// * `timeout` - How long to keep retrying ([`Timeout::Never`] waits forever)
    /// * `server_required` - Whether an unreachable server is an error
    ///
    /// # Returns
    ///
    /// * `Ok(Acquisition::Locked)` - The lock is held; keep the ownership for release
    /// * `Ok(Acquisition::Unlocked)` - No server and `server_required` was false
    /// * `Err(SafelockError::LockTimeout)` - Still held elsewhere when the deadline passed
    /// * `Err(SafelockError::LockFailed)` - The server reported a nonce mismatch
    /// * `Err(SafelockError::ServerUnavailable)` - No server and `server_required` was true
    /// * `Err(SafelockError::InvalidRequest)` - Empty or oversized lock name
    pub fn acquire(
        &self,
        lock_name: &str,
        timeout: impl Into<Timeout>,
        server_required: bool,
    ) -> Result<Acquisition> {
        let timeout = timeout.into();
        let deadline = Deadline::start(timeout);
        let pid = self.identity.pid;

        let request = protocol::encode_request(
            Action::Lock,
            lock_name,
            pid,
            None,
            self.config.max_packet_size,
        )
        .inspect_err(|e| log::error!("{}", e))?;

        log::debug!(
            "lock \"{}\" requested by {} with {}",
            lock_name,
            self.identity,
            timeout
        );

        let outcome = self.retry(
            Action::Lock,
            lock_name,
            deadline,
            server_required,
            &mut Warnings::default(),
            |deadline| {
                let response = self.exchange(&request, deadline)?;
                granted_nonce(&response, lock_name)
            },
        )?;

        match outcome {
            Outcome::Done(nonce) => {
                log::debug!("locked \"{}\" with nonce {}", lock_name, nonce);
                Ok(Acquisition::Locked(LockOwnership::granted(
                    lock_name, nonce, pid,
                )))
            }
            Outcome::ServerMissing(address) => Ok(Acquisition::Unlocked {
                lock_name: lock_name.to_string(),
                reason: format!("no lock server at {}", address),
            }),
        }
    }

    /// Release `lock_name` using the nonce from its grant.
    ///
    /// Call exactly once per successful acquire: the server forgets the
    /// nonce on release, so a second release fails with `LockFailed`.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The server confirmed the release
    /// * `Ok(false)` - No server and `server_required` was false; nothing was released
    /// * `Err(SafelockError::LockFailed)` - Wrong nonce (double release or stale ownership)
    /// * `Err(SafelockError::LockTimeout)` - Not confirmed before the deadline
    /// * `Err(SafelockError::ServerUnavailable)` - No server and `server_required` was true
    pub fn release(
        &self,
        lock_name: &str,
        nonce: &str,
        pid: u32,
        timeout: impl Into<Timeout>,
        server_required: bool,
    ) -> Result<bool> {
        let deadline = Deadline::start(timeout.into());

        let request = protocol::encode_request(
            Action::Unlock,
            lock_name,
            pid,
            Some(nonce),
            self.config.max_packet_size,
        )
        .inspect_err(|e| log::error!("{}", e))?;

        let outcome = self.retry(
            Action::Unlock,
            lock_name,
            deadline,
            server_required,
            &mut Warnings::default(),
            |deadline| {
                let response = self.exchange(&request, deadline)?;
                confirmed_release(&response, lock_name, nonce)
            },
        )?;

        match outcome {
            Outcome::Done(()) => {
                log::debug!("unlocked \"{}\"", lock_name);
                Ok(true)
            }
            Outcome::ServerMissing(_) => Ok(false),
        }
    }

    /// Release the lock described by `ownership`.
    pub fn release_ownership(
        &self,
        ownership: &LockOwnership,
        timeout: impl Into<Timeout>,
        server_required: bool,
    ) -> Result<bool> {
        self.release(
            &ownership.lock_name,
            &ownership.nonce,
            ownership.pid,
            timeout,
            server_required,
        )
    }

    /// Check that the lock server accepts connections.
    pub fn ping(&self) -> Result<SocketAddr> {
        transport::probe(
            &self.config.host,
            self.config.port,
            self.config.connect_timeout(),
        )
        .inspect_err(|e| log::warn!("{}", e))
    }

    /// Run `attempt` until it is accepted, fails fatally, or `deadline` passes.
    fn retry<T>(
        &self,
        action: Action,
        lock_name: &str,
        deadline: Deadline,
        server_required: bool,
        warnings: &mut Warnings,
        mut attempt: impl FnMut(&Deadline) -> Result<Reply<T>>,
    ) -> Result<Outcome<T>> {
        loop {
            match attempt(&deadline) {
                Ok(Reply::Accepted(value)) => return Ok(Outcome::Done(value)),

                Ok(Reply::Refused(message)) => warnings.note(message),

                Err(SafelockError::ServerUnavailable(address)) => {
                    if server_required {
                        log::error!(
                            "{} \"{}\" requires a running lock server. No lock server at {}",
                            action,
                            lock_name,
                            address
                        );
                        return Err(SafelockError::ServerUnavailable(address));
                    }
                    log::warn!(
                        "No lock server at {}, but server_required=false; {} \"{}\" skipped",
                        address,
                        action,
                        lock_name
                    );
                    return Ok(Outcome::ServerMissing(address));
                }

                Err(err) if err.is_transient() => warnings.note(err.to_string()),

                Err(err) => {
                    log::error!("{}", err);
                    return Err(err);
                }
            }

            if deadline.has_passed() {
                let message = format!("{} timed out: {}", action, lock_name);
                log::debug!("{} distinct refusals before timing out", warnings.logged);
                log::warn!("{}", message);
                return Err(SafelockError::LockTimeout(message));
            }

            std::thread::sleep(deadline.next_pause(self.config.poll_interval()));
        }
    }

    /// One round trip. Socket timeouts shrink with the deadline but never
    /// below one poll interval, so a nearly expired deadline still gets a
    /// real attempt instead of a spurious connect failure.
    fn exchange(&self, request: &[u8], deadline: &Deadline) -> Result<Response> {
        let poll_interval = self.config.poll_interval();
        let limits = self
            .config
            .transport_limits()
            .clamped_to(deadline.remaining().map(|r| r.max(poll_interval)));

        let raw = transport::send_and_receive(&self.config.host, self.config.port, request, &limits)?;
        protocol::decode_response(&raw)
    }
}

/// Warnings raised while retrying one operation. A message repeated on
/// consecutive attempts is logged only the first time.
#[derive(Debug, Default)]
struct Warnings {
    last: Option<String>,
    logged: usize,
}

impl Warnings {
    fn note(&mut self, message: String) {
        if self.last.as_deref() != Some(message.as_str()) {
            log::warn!("{}", message);
            self.logged += 1;
            self.last = Some(message);
        }
    }
}

/// Refusal for `action` on `lock_name`. A nonce mismatch is fatal; any other
/// reason means the lock is busy and the request may be repeated.
///
/// Servers often quote the lock name in the reason, so the name is left out
/// when looking for a mismatch.
fn refusal<T>(action: Action, response: &Response, lock_name: &str) -> Result<Reply<T>> {
    let reason = response.reason();
    let message = format!(
        "safelock rejected \"{}\" {} request: {}",
        lock_name, action, reason
    );

    if protocol::is_nonce_mismatch(&reason.replace(lock_name, "")) {
        Err(SafelockError::LockFailed(message))
    } else {
        Ok(Reply::Refused(message))
    }
}

/// The nonce of a valid grant for `lock_name`.
fn granted_nonce(response: &Response, lock_name: &str) -> Result<Reply<String>> {
    if !response.ok {
        return refusal(Action::Lock, response, lock_name);
    }

    if response.action != Action::Lock || response.lockname != lock_name {
        return Err(SafelockError::ProtocolError(format!(
            "lock server answered {} \"{}\" to a lock request for \"{}\"",
            response.action, response.lockname, lock_name
        )));
    }

    match response.nonce.as_deref() {
        Some(nonce) if !nonce.is_empty() => Ok(Reply::Accepted(nonce.to_string())),
        _ => Err(SafelockError::ProtocolError(format!(
            "lock server granted \"{}\" without a nonce",
            lock_name
        ))),
    }
}

/// Whether `response` confirms releasing `lock_name` held with `nonce`.
fn confirmed_release(response: &Response, lock_name: &str, nonce: &str) -> Result<Reply<()>> {
    if !response.ok {
        return refusal(Action::Unlock, response, lock_name);
    }

    let echoed_nonce_matches = response.nonce.as_deref().is_none_or(|echoed| echoed == nonce);
    if response.action != Action::Unlock || response.lockname != lock_name || !echoed_nonce_matches
    {
        return Err(SafelockError::ProtocolError(format!(
            "lock server answered {} \"{}\" to an unlock request for \"{}\"",
            response.action, response.lockname, lock_name
        )));
    }

    Ok(Reply::Accepted(()))
}
