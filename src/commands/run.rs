//! Implementation of the `safelock run` command.
//!
//! Runs a child process inside a scoped lock. The lock is released when the
//! child exits, and `safelock` exits with the child's exit code.

use super::wait_policy;
use crate::cli::RunArgs;
use crate::client::LockClient;
use crate::error::{Result, SafelockError};
use crate::scoped::{LockOptions, default_lock_name};
use std::process::Command;

/// Exit code reported when the child was terminated by a signal.
const KILLED_BY_SIGNAL: i32 = 128;

/// Execute the `safelock run` command.
///
/// Returns the child's exit code.
pub fn cmd_run(client: &LockClient, args: &RunArgs) -> Result<i32> {
    let Some((program, program_args)) = args.command.split_first() else {
        return Err(SafelockError::UserError(
            "run needs a command after `--`".to_string(),
        ));
    };

    let lock_name = match &args.name {
        Some(name) => name.clone(),
        None => default_lock_name(&args.command.join(" "))?,
    };

    let (timeout, server_required) = wait_policy(client.config(), &args.wait)?;
    let options = LockOptions::named(lock_name.as_str())
        .timeout(timeout)
        .server_required(server_required);

    client.with_lock(options, || {
        log::info!("running {:?} under lock \"{}\"", args.command, lock_name);

        let status = Command::new(program)
            .args(program_args)
            .status()
            .map_err(|e| SafelockError::UserError(format!("failed to run '{}': {}", program, e)))?;

        Ok(status.code().unwrap_or(KILLED_BY_SIGNAL))
    })
}
