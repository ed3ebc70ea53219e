//! `POST /generate_token` handling shared by the server and invocation entry points

use crate::dispatcher::Dispatcher;
use crate::types::Credential;
use serde::{Deserialize, Serialize};

/// Body of a token endpoint response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TokenReply {
    Success {
        credentials: Credential,
        region: String,
    },
    Error {
        error: String,
    },
}

/// Authorize the bearer key and issue credentials, returning status and body
pub async fn respond(dispatcher: &Dispatcher, authorization: Option<&str>) -> (u16, TokenReply) {
    match dispatcher.token_request(authorization).await {
        Ok(credential) => {
            let region = credential.region.clone();
            (
                200,
                TokenReply::Success {
                    credentials: credential,
                    region,
                },
            )
        }
        Err(e) => (
            e.http_status(),
            TokenReply::Error {
                error: e.to_string(),
            },
        ),
    }
}
