//! Command implementations for safelock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations, and the shared setup every command needs: the
//! effective configuration and how long to wait on the server.

mod lock;
mod run;
mod status;

use crate::cli::{Cli, Command, WaitArgs};
use crate::client::LockClient;
use crate::config::ClientConfig;
use crate::deadline::Timeout;
use crate::error::Result;
use crate::exit_codes;

pub use lock::{cmd_lock, cmd_unlock};
pub use run::cmd_run;
pub use status::{cmd_config, cmd_ping};

/// Dispatch a command to its implementation.
///
/// Returns the process exit code on success; errors carry their own.
pub fn dispatch(cli: Cli) -> Result<i32> {
    let config = effective_config(&cli)?;

    match cli.command {
        Command::Lock(args) => cmd_lock(&LockClient::new(config), &args).map(|_| exit_codes::SUCCESS),
        Command::Unlock(args) => {
            cmd_unlock(&LockClient::new(config), &args).map(|_| exit_codes::SUCCESS)
        }
        Command::Run(args) => cmd_run(&LockClient::new(config), &args),
        Command::Ping => cmd_ping(&LockClient::new(config)).map(|_| exit_codes::SUCCESS),
        Command::Config => cmd_config(&config).map(|_| exit_codes::SUCCESS),
    }
}

/// Config file and environment, then `--host` / `--port`.
pub(crate) fn effective_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = ClientConfig::resolve(cli.config.as_deref())?;

    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }

    config.validate()?;
    Ok(config)
}

/// Timeout and server requirement for one command.
pub(crate) fn wait_policy(config: &ClientConfig, wait: &WaitArgs) -> Result<(Timeout, bool)> {
    let timeout = match wait.timeout {
        Some(secs) => Timeout::from_secs(secs)?,
        None => config.default_timeout()?,
    };
    let server_required = !wait.optional && config.server_required();
    Ok((timeout, server_required))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UnavailablePolicy;
    use crate::error::SafelockError;
    use crate::test_support::MockLockServer;
    use clap::Parser;
    use serial_test::serial;
    use std::time::Duration;

    #[test]
    fn test_wait_policy_prefers_flags() {
        let config = ClientConfig {
            default_timeout_secs: Some(10.0),
            ..ClientConfig::default()
        };

        let wait = WaitArgs {
            timeout: Some(0.5),
            optional: true,
        };
        let (timeout, required) = wait_policy(&config, &wait).unwrap();
        assert_eq!(timeout, Timeout::After(Duration::from_millis(500)));
        assert!(!required);

        let (timeout, required) = wait_policy(&config, &WaitArgs::default()).unwrap();
        assert_eq!(timeout, Timeout::After(Duration::from_secs(10)));
        assert!(required);
    }

    #[test]
    fn test_wait_policy_honours_config_policy() {
        let config = ClientConfig {
            on_server_unavailable: UnavailablePolicy::RunUnlocked,
            ..ClientConfig::default()
        };
        let (timeout, required) = wait_policy(&config, &WaitArgs::default()).unwrap();
        assert_eq!(timeout, Timeout::Never);
        assert!(!required);
    }

    #[test]
    fn test_wait_policy_rejects_negative_timeout() {
        let wait = WaitArgs {
            timeout: Some(-2.0),
            optional: false,
        };
        let err = wait_policy(&ClientConfig::default(), &wait).unwrap_err();
        assert!(matches!(err, SafelockError::InvalidRequest(_)));
    }

    #[test]
    #[serial]
    fn test_flags_override_config() {
        let cli = Cli::try_parse_from(["safelock", "--host", "127.0.0.1", "--port", "9999", "ping"])
            .unwrap();
        let config = effective_config(&cli).unwrap();
        assert_eq!(config.address(), "127.0.0.1:9999");
    }

    #[test]
    #[serial]
    fn test_dispatch_ping_and_lock() {
        let server = MockLockServer::start();
        let port = server.port().to_string();

        let cli = Cli::try_parse_from(["safelock", "--host", "127.0.0.1", "--port", &port, "ping"])
            .unwrap();
        assert_eq!(dispatch(cli).unwrap(), exit_codes::SUCCESS);

        let cli = Cli::try_parse_from([
            "safelock", "--host", "127.0.0.1", "--port", &port, "lock", "cli-lock",
        ])
        .unwrap();
        assert_eq!(dispatch(cli).unwrap(), exit_codes::SUCCESS);
        assert!(server.holder("cli-lock").is_some());
    }
}
