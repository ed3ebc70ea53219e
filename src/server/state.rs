use std::sync::Arc;

use crate::auth::ConnectAuthorizer;
use crate::config::RelayConfig;
use crate::dispatcher::Dispatcher;

/// Shared application state accessible to all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub authorizer: Arc<ConnectAuthorizer>,
    pub config: Arc<RelayConfig>,
}

impl AppState {
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        authorizer: Arc<ConnectAuthorizer>,
        config: Arc<RelayConfig>,
    ) -> Self {
        Self {
            dispatcher,
            authorizer,
            config,
        }
    }
}
