//! Implementation of the `safelock ping` and `safelock config` commands.

use crate::client::LockClient;
use crate::config::ClientConfig;
use crate::error::Result;

/// Execute the `safelock ping` command.
pub fn cmd_ping(client: &LockClient) -> Result<()> {
    let peer = client.ping()?;
    println!(
        "Lock server at {} is reachable ({})",
        client.config().address(),
        peer
    );
    Ok(())
}

/// Execute the `safelock config` command.
pub fn cmd_config(config: &ClientConfig) -> Result<()> {
    print!("{}", config.to_yaml()?);
    Ok(())
}
