use crate::auth::{ConnectAuthorizer, SharedSecret};
use crate::config::RelayConfig;
use crate::error::Result;
use crate::invocation::{self, GatewayEvent};

/// Execute the `authorize` command: print the policy for one authorizer event.
pub async fn execute(config: RelayConfig) -> Result<()> {
    let input = super::read_stdin().await?;
    let event: GatewayEvent = serde_json::from_str(&input)?;

    let authorizer = ConnectAuthorizer::new(SharedSecret::new(config.api_key));
    let response = invocation::authorize_connect(&authorizer, &event);

    println!("{}", serde_json::to_string(&response)?);
    Ok(())
}
