//! Implementation of the `safelock lock` and `safelock unlock` commands.
//!
//! `lock` prints the ownership as a single JSON line so scripts can keep
//! the nonce and pid for the matching `unlock`.

use super::wait_policy;
use crate::cli::{LockArgs, UnlockArgs};
use crate::client::{Acquisition, LockClient, LockOwnership};
use crate::error::{Result, SafelockError};

/// Execute the `safelock lock` command.
///
/// Returns the ownership, or `None` when running without a server was
/// allowed and no server was reachable.
pub fn cmd_lock(client: &LockClient, args: &LockArgs) -> Result<Option<LockOwnership>> {
    let (timeout, server_required) = wait_policy(client.config(), &args.wait)?;

    match client.acquire(&args.name, timeout, server_required)? {
        Acquisition::Locked(ownership) => {
            let json = serde_json::to_string(&ownership).map_err(|e| {
                SafelockError::UserError(format!("failed to serialize lock ownership: {}", e))
            })?;
            println!("{}", json);
            Ok(Some(ownership))
        }
        Acquisition::Unlocked { lock_name, reason } => {
            eprintln!("Warning: \"{}\" is NOT locked: {}", lock_name, reason);
            Ok(None)
        }
    }
}

/// Execute the `safelock unlock` command.
pub fn cmd_unlock(client: &LockClient, args: &UnlockArgs) -> Result<bool> {
    let (timeout, server_required) = wait_policy(client.config(), &args.wait)?;

    let released = client.release(&args.name, &args.nonce, args.pid, timeout, server_required)?;
    if released {
        println!("Unlocked \"{}\"", args.name);
    } else {
        eprintln!("Warning: \"{}\" was not released: no lock server", args.name);
    }
    Ok(released)
}
