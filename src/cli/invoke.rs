use std::sync::Arc;

use crate::config::{DirectoryBackend, RelayConfig};
use crate::directory;
use crate::dispatcher::Dispatcher;
use crate::error::{RelayError, Result};
use crate::invocation::{self, GatewayEvent};
use crate::transport::{DirectTransport, GatewayTransport, Transport};

/// Execute the `invoke` command: handle one gateway event and print the response.
pub async fn execute(config: RelayConfig) -> Result<()> {
    let input = super::read_stdin().await?;
    let event: GatewayEvent = serde_json::from_str(&input)?;

    let dispatcher = build_dispatcher(&config, &event).await?;

    let response = invocation::handle_event(&dispatcher, &event).await;
    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}

/// Wire a dispatcher for one event.
///
/// WebSocket routes need the replicated directory: a local one would not
/// outlive this process. Plain HTTP requests never touch the directory.
pub async fn build_dispatcher(config: &RelayConfig, event: &GatewayEvent) -> Result<Dispatcher> {
    let is_http = event.request_context.http.is_some();
    if !is_http && config.directory.backend != DirectoryBackend::Replicated {
        return Err(RelayError::Config(
            "invoke handles one event per process and needs the replicated directory backend"
                .to_string(),
        ));
    }

    let mut gateway = config.gateway.clone();
    if gateway.endpoint.is_none() {
        gateway.endpoint = event.gateway_endpoint();
    }

    let transport: Arc<dyn Transport> = match GatewayTransport::new(&gateway) {
        Ok(transport) => Arc::new(transport),
        // Plain HTTP requests never push to a connection
        Err(_) if is_http => Arc::new(DirectTransport),
        Err(e) => return Err(e),
    };

    let directory = directory::connect(&config.directory).await?;
    Dispatcher::from_config(config, directory, transport)
}
