pub mod http;
pub mod router;
pub mod state;
pub mod ws;

use std::sync::Arc;

use crate::auth::{ConnectAuthorizer, SharedSecret};
use crate::config::{DirectoryBackend, RelayConfig};
use crate::directory;
use crate::dispatcher::Dispatcher;
use crate::error::{RelayError, Result};
use crate::transport::DirectTransport;

/// Build the application state for the long-running server.
pub async fn build_state(config: RelayConfig) -> Result<state::AppState> {
    if config.directory.backend != DirectoryBackend::Local {
        return Err(RelayError::Config(
            "serve holds live sockets and needs the local directory backend".to_string(),
        ));
    }

    let directory = directory::connect(&config.directory).await?;
    let dispatcher = Dispatcher::from_config(&config, directory, Arc::new(DirectTransport))?;
    let authorizer = ConnectAuthorizer::new(SharedSecret::new(config.api_key.clone()));

    Ok(state::AppState::new(
        Arc::new(dispatcher),
        Arc::new(authorizer),
        Arc::new(config),
    ))
}

/// Start the HTTP server with the given configuration.
pub async fn start(config: RelayConfig) -> Result<()> {
    let bind_addr = config.bind_address();
    let app_state = build_state(config).await?;
    let dispatcher = app_state.dispatcher.clone();

    tracing::info!(
        translation = dispatcher.translation().is_available(),
        credentials = dispatcher.credentials().is_available(),
        directory = dispatcher.directory().name(),
        "Relay initialized"
    );

    let app = router::build(app_state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| RelayError::Server(format!("Failed to bind to {bind_addr}: {e}")))?;

    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| RelayError::Server(format!("Server error: {e}")))?;

    let drained = dispatcher.directory().drain().await;
    tracing::info!(connections = drained, "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
