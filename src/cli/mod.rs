pub mod authorize;
pub mod invoke;
pub mod serve;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A3S Relay - Live translation fan-out relay
#[derive(Debug, Parser)]
#[command(name = "a3s-relay", version, about)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true, env = "A3S_RELAY_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the WebSocket/HTTP server
    Serve {
        /// Host address to bind to (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Handle one gateway event read from stdin and print the response
    Invoke,

    /// Decide one connect authorizer event read from stdin and print the policy
    Authorize,
}

/// Read all of stdin as a string.
pub(crate) async fn read_stdin() -> crate::error::Result<String> {
    use tokio::io::AsyncReadExt;

    let mut input = String::new();
    tokio::io::stdin().read_to_string(&mut input).await?;
    Ok(input)
}
