//! CLI argument parsing for safelock.
//!
//! Uses clap derive macros for declarative argument definitions.
//! This module defines the command structure; actual implementations
//! are in the `commands` module.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Safelock: named locks shared across processes and machines.
///
/// Talks to a running lock server. Each lock name is a mutual-exclusion
/// domain: while one holder has it, every other request for the same name
/// waits.
#[derive(Parser, Debug)]
#[command(name = "safelock")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Config file (default: $SAFELOCK_CONFIG, else built-in defaults).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Lock server host (overrides config and $SAFELOCK_HOST).
    #[arg(long, global = true)]
    pub host: Option<String>,

    /// Lock server port (overrides config and $SAFELOCK_PORT).
    #[arg(long, global = true)]
    pub port: Option<u16>,

    /// More diagnostics on stderr (-v info, -vv debug).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands for safelock.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Acquire a lock and print its ownership.
    ///
    /// The lock stays held after this command exits. Release it with
    /// `safelock unlock` using the printed nonce and pid.
    Lock(LockArgs),

    /// Release a lock acquired with `safelock lock`.
    Unlock(UnlockArgs),

    /// Run a command while holding a lock.
    ///
    /// The lock is released when the command exits, whatever its status.
    /// Exits with the command's exit code.
    Run(RunArgs),

    /// Check whether the lock server is reachable.
    Ping,

    /// Print the effective configuration as YAML.
    Config,
}

/// Options shared by commands that wait on the server.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct WaitArgs {
    /// Give up after this many seconds (default: config, else wait forever).
    #[arg(long)]
    pub timeout: Option<f64>,

    /// Carry on without a lock if no server is reachable.
    #[arg(long)]
    pub optional: bool,
}

/// Arguments for the `lock` command.
#[derive(Parser, Debug)]
pub struct LockArgs {
    /// Name of the lock.
    pub name: String,

    #[command(flatten)]
    pub wait: WaitArgs,
}

/// Arguments for the `unlock` command.
#[derive(Parser, Debug)]
pub struct UnlockArgs {
    /// Name of the lock.
    pub name: String,

    /// Nonce printed by `safelock lock`.
    #[arg(long)]
    pub nonce: String,

    /// Pid printed by `safelock lock`.
    #[arg(long)]
    pub pid: u32,

    #[command(flatten)]
    pub wait: WaitArgs,
}

/// Arguments for the `run` command.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Name of the lock (default: the command line).
    #[arg(long)]
    pub name: Option<String>,

    #[command(flatten)]
    pub wait: WaitArgs,

    /// Command to run, after `--`.
    #[arg(required = true, last = true)]
    pub command: Vec<String>,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
