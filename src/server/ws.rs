//! WebSocket endpoint: connect-time authorization, then one session per socket

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use futures::{future, SinkExt, StreamExt};
use tokio_stream::wrappers::ReceiverStream;

use super::state::AppState;
use crate::session::Session;
use crate::transport::ConnectionHandle;
use crate::types::AuthorizationTier;

/// GET /ws
pub async fn upgrade(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let provided_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());

    let tier = match state.authorizer.decide(provided_key) {
        Ok(tier) => tier,
        Err(e) => return (StatusCode::UNAUTHORIZED, e.to_string()).into_response(),
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, tier))
}

async fn handle_socket(socket: WebSocket, state: AppState, tier: AuthorizationTier) {
    let (mut sink, stream) = socket.split();
    let (handle, rx) = ConnectionHandle::channel(state.config.outbound_queue.max(1));

    // Ends once every clone of the handle is dropped
    tokio::spawn(async move {
        let mut outbound = ReceiverStream::new(rx);
        while let Some(frame) = outbound.next().await {
            if sink.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    let frames = stream
        .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
        .filter_map(|msg| {
            future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(_) => None,
                Err(e) => Some(Err(e)),
            })
        });

    let session = Session::new(state.dispatcher.clone(), tier, handle);
    let id = session.id().to_string();
    tracing::info!(connection = %id, tier = ?tier, "WebSocket connection established");

    session.run(frames).await;
    tracing::info!(connection = %id, "WebSocket connection closed");
}
