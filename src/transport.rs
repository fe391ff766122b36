//! WebSocket transport.
//!
//! Each connection gets a [`ClientRef`] whose outbound queue is drained by a
//! writer task. Inbound text and binary frames are submitted to the dispatch
//! queue unchanged; closing the socket submits [`Inbound::Closed`].

use crate::client::ClientRef;
use crate::server::{Inbound, ServerHandle};
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
    routing::get,
};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Shared state for the WebSocket routes.
#[derive(Debug, Clone)]
pub struct TransportState {
    server: ServerHandle,
    send_capacity: usize,
}

impl TransportState {
    /// Creates transport state submitting to `server`.
    pub fn new(server: ServerHandle, send_capacity: usize) -> Self {
        Self {
            server,
            send_capacity,
        }
    }
}

/// Builds the HTTP router with the `/ws` endpoint.
#[instrument(skip(state))]
pub fn router(state: TransportState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(|| async { "ok" }))
        .with_state(Arc::new(state))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<TransportState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<TransportState>) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (client, mut outbound) = ClientRef::new(state.send_capacity);
    let client_id = client.id();
    info!(client = %client_id, "WebSocket connection established");

    let send_task = tokio::spawn(async move {
        while let Some(bytes) = outbound.recv().await {
            let text = match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(e) => {
                    warn!(client = %client_id, error = %e, "Skipping non-UTF-8 outbound message");
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(result) = ws_receiver.next().await {
        let bytes = match result {
            Ok(Message::Text(text)) => text.as_str().as_bytes().to_vec(),
            Ok(Message::Binary(data)) => data.to_vec(),
            Ok(Message::Close(_)) => {
                debug!(client = %client_id, "WebSocket closed by client");
                break;
            }
            Ok(_) => continue,
            Err(e) => {
                error!(client = %client_id, error = %e, "WebSocket error");
                break;
            }
        };
        if let Err(e) = state.server.submit(client.clone(), Inbound::Message(bytes)).await {
            warn!(client = %client_id, error = %e, "Server stopped accepting messages");
            break;
        }
    }

    if let Err(e) = state.server.submit(client, Inbound::Closed).await {
        debug!(client = %client_id, error = %e, "Disconnect not delivered");
    }
    send_task.abort();
    info!(client = %client_id, "WebSocket connection terminated");
}
