//! Stateless entry point: one API-gateway event per call
//!
//! Each invocation sees only the durable directory; replies and fan-out go
//! through the gateway's push API. The connect-time authorizer renders an
//! IAM-style policy document.

use crate::auth::ConnectAuthorizer;
use crate::dispatcher::Dispatcher;
use crate::envelope::{Inbound, Outbound};
use crate::error::ErrorKind;
use crate::token;
use crate::types::AuthorizationTier;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// API-gateway event (WebSocket route or HTTP request)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    #[serde(default)]
    pub request_context: RequestContext,

    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,

    #[serde(default)]
    pub body: Option<String>,

    /// Present on authorizer events
    #[serde(default)]
    pub method_arn: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub route_key: Option<String>,

    #[serde(default)]
    pub connection_id: Option<String>,

    #[serde(default)]
    pub domain_name: Option<String>,

    #[serde(default)]
    pub stage: Option<String>,

    #[serde(default)]
    pub authorizer: Option<AuthorizerContext>,

    #[serde(default)]
    pub http: Option<HttpContext>,
}

/// Context the authorizer attached at connect time
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerContext {
    /// Boolean, or the string "true" once the gateway has stringified it
    #[serde(default)]
    pub is_authorized_sender: serde_json::Value,
}

impl AuthorizerContext {
    pub fn tier(&self) -> AuthorizationTier {
        let authorized = match &self.is_authorized_sender {
            serde_json::Value::Bool(b) => *b,
            serde_json::Value::String(s) => s.eq_ignore_ascii_case("true"),
            _ => false,
        };
        AuthorizationTier::from_authorized(authorized)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpContext {
    #[serde(default)]
    pub method: String,

    #[serde(default)]
    pub path: String,
}

impl GatewayEvent {
    /// Header value by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .as_ref()?
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Push endpoint derived from the event (`https://{domainName}/{stage}`)
    pub fn gateway_endpoint(&self) -> Option<String> {
        let ctx = &self.request_context;
        match (&ctx.domain_name, &ctx.stage) {
            (Some(domain), Some(stage)) => Some(format!("https://{}/{}", domain, stage)),
            _ => None,
        }
    }
}

/// `{statusCode, body}` returned to the gateway
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationResponse {
    pub status_code: u16,
    pub body: String,
}

impl InvocationResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }
}

/// Handle one gateway event
pub async fn handle_event(dispatcher: &Dispatcher, event: &GatewayEvent) -> InvocationResponse {
    if let Some(http) = &event.request_context.http {
        return handle_http(dispatcher, event, http).await;
    }

    let route = event.request_context.route_key.as_deref().unwrap_or_default();
    tracing::info!(route = %route, "Processing route");

    let Some(connection_id) = event.request_context.connection_id.as_deref() else {
        tracing::warn!(route = %route, "Event without connection id");
        return InvocationResponse::new(400, "Missing connection id");
    };

    match route {
        "$connect" => handle_connect(dispatcher, event, connection_id).await,
        "$disconnect" => {
            dispatcher.disconnect(connection_id).await;
            InvocationResponse::new(200, "Disconnected")
        }
        "$default" => handle_message(dispatcher, event, connection_id).await,
        other => {
            tracing::warn!(route = %other, "Unknown route");
            InvocationResponse::new(400, format!("Unknown route: {}", other))
        }
    }
}

async fn handle_http(
    dispatcher: &Dispatcher,
    event: &GatewayEvent,
    http: &HttpContext,
) -> InvocationResponse {
    if http.method.eq_ignore_ascii_case("POST") && http.path == "/generate_token" {
        let (status, reply) = token::respond(dispatcher, event.header("authorization")).await;
        return match serde_json::to_string(&reply) {
            Ok(body) => InvocationResponse::new(status, body),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode token reply");
                InvocationResponse::new(500, "Internal server error")
            }
        };
    }

    tracing::warn!(method = %http.method, path = %http.path, "Unknown HTTP route");
    InvocationResponse::new(404, "Not found")
}

async fn handle_connect(
    dispatcher: &Dispatcher,
    event: &GatewayEvent,
    connection_id: &str,
) -> InvocationResponse {
    let tier = event
        .request_context
        .authorizer
        .as_ref()
        .map(AuthorizerContext::tier)
        .unwrap_or_default();

    // The gateway cannot push during $connect; status goes out after set_language
    match dispatcher.connect(connection_id, tier, None).await {
        Ok(_) => InvocationResponse::new(200, "Connected"),
        Err(e) => {
            tracing::error!(connection = %connection_id, error = %e, "Error handling connect");
            InvocationResponse::new(500, "Failed to connect")
        }
    }
}

async fn handle_message(
    dispatcher: &Dispatcher,
    event: &GatewayEvent,
    connection_id: &str,
) -> InvocationResponse {
    let body = event.body.as_deref().unwrap_or("{}");
    let value: serde_json::Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) => {
            tracing::error!(connection = %connection_id, error = %e, "Invalid JSON");
            return InvocationResponse::new(400, "Invalid JSON");
        }
    };

    let message = match Inbound::from_value(value) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(connection = %connection_id, error = %e, "Rejected envelope");
            dispatcher.send_to(connection_id, &Outbound::from(&e)).await;
            return InvocationResponse::new(200, "Message processed");
        }
    };

    let is_set_language = matches!(message, Inbound::SetLanguage { .. });
    tracing::info!(connection = %connection_id, kind = message.kind(), "Received message");

    match dispatcher.handle_envelope(connection_id, message).await {
        Ok(Some(reply)) => {
            dispatcher.send_to(connection_id, &reply).await;
        }
        Ok(None) => {}
        Err(e) => match e.kind() {
            ErrorKind::Authorization => {
                dispatcher.send_to(connection_id, &Outbound::from(&e)).await;
                return InvocationResponse::new(401, "Unauthorized");
            }
            ErrorKind::Internal => {
                tracing::error!(
                    connection = %connection_id,
                    error = %e,
                    "Error processing message"
                );
                return InvocationResponse::new(500, "Internal server error");
            }
            _ => {
                dispatcher.send_to(connection_id, &Outbound::from(&e)).await;
            }
        },
    }

    if is_set_language {
        dispatcher.send_to(connection_id, &dispatcher.status()).await;
    }

    InvocationResponse::new(200, "Message processed")
}

/// IAM-style policy returned by the connect authorizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizerResponse {
    pub principal_id: String,
    pub policy_document: PolicyDocument,
    pub context: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyDocument {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub action: String,
    pub effect: String,
    pub resource: String,
}

impl AuthorizerResponse {
    fn policy(effect: &str, resource: &str) -> Self {
        Self {
            principal_id: "user".to_string(),
            policy_document: PolicyDocument {
                version: "2012-10-17".to_string(),
                statement: vec![PolicyStatement {
                    action: "execute-api:Invoke".to_string(),
                    effect: effect.to_string(),
                    resource: resource.to_string(),
                }],
            },
            context: serde_json::Map::new(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.policy_document
            .statement
            .iter()
            .all(|s| s.effect == "Allow")
    }
}

/// Decide a `$connect` authorizer event from its `X-API-Key` header
pub fn authorize_connect(
    authorizer: &ConnectAuthorizer,
    event: &GatewayEvent,
) -> AuthorizerResponse {
    let resource = event.method_arn.as_deref().unwrap_or_default();

    match authorizer.decide(event.header("x-api-key")) {
        Ok(tier) => {
            let mut response = AuthorizerResponse::policy("Allow", resource);
            response.context.insert(
                "isAuthorizedSender".to_string(),
                serde_json::Value::Bool(tier == AuthorizationTier::AuthorizedSender),
            );
            response
        }
        Err(_) => AuthorizerResponse::policy("Deny", resource),
    }
}
