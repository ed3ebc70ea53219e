use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_relay::cli::{Cli, Commands};
use a3s_relay::config::RelayConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; `invoke` and `authorize` print their result on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RelayConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            a3s_relay::cli::serve::execute(config, host, port).await?;
        }
        Commands::Invoke => {
            a3s_relay::cli::invoke::execute(config).await?;
        }
        Commands::Authorize => {
            a3s_relay::cli::authorize::execute(config).await?;
        }
    }

    Ok(())
}
