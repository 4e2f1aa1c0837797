//! WebSocket signaling core.
//!
//! Accepts connections on `/signaling`, decodes JSON command frames and
//! drives a [`session::Session`] per connection. Rooms, clients and
//! identity live behind trait objects so the transport layer stays
//! storage- and provider-agnostic.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use greenroom_common::events::ClientCommand;
use greenroom_common::id;
use greenroom_store::{ClientStore, RoomStore};

pub mod hub;
pub mod identity;
pub mod locks;
pub mod mesh;
pub mod relay;
pub mod session;

use hub::ConnectionHub;
use identity::IdentityGate;
use locks::RoomLocks;

/// Everything a session needs, shared across all connections.
pub struct SignalingState {
    pub rooms: Arc<dyn RoomStore>,
    pub clients: Arc<dyn ClientStore>,
    pub identity: Arc<dyn IdentityGate>,
    pub hub: ConnectionHub,
    pub locks: RoomLocks,
}

impl SignalingState {
    pub fn new(
        rooms: Arc<dyn RoomStore>,
        clients: Arc<dyn ClientStore>,
        identity: Arc<dyn IdentityGate>,
    ) -> Self {
        Self {
            rooms,
            clients,
            identity,
            hub: ConnectionHub::new(),
            locks: RoomLocks::new(),
        }
    }
}

/// Build the signaling router. Mounted by the server binary next to its
/// plain HTTP routes.
pub fn build_router(state: Arc<SignalingState>) -> Router {
    Router::new()
        .route("/signaling", get(ws_handler))
        .with_state(state)
}

async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SignalingState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(state, socket))
}

/// Own one connection for its whole life: register with the hub, pump
/// outbound events, decode and dispatch inbound frames, tear down on EOF.
async fn handle_connection(state: Arc<SignalingState>, socket: WebSocket) {
    let socket_id = id::socket_id();
    tracing::debug!(socket = %socket_id, "Connection opened");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    state.hub.register(&socket_id, tx).await;

    // Outbound pump: hub events become JSON text frames.
    let send_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let frame = match serde_json::to_string(&event) {
                Ok(frame) => frame,
                Err(error) => {
                    tracing::error!(%error, "Failed to encode outbound event");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(frame.into())).await.is_err() {
                break;
            }
        }
    });

    let mut session = session::Session::new(state.clone(), socket_id.clone());

    while let Some(frame) = ws_rx.next().await {
        let frame = match frame {
            Ok(frame) => frame,
            Err(error) => {
                tracing::debug!(socket = %socket_id, %error, "Connection errored");
                break;
            }
        };
        match frame {
            Message::Text(text) => match serde_json::from_str::<ClientCommand>(text.as_str()) {
                Ok(command) => session.handle(command).await,
                Err(error) => {
                    // Malformed frames are dropped, the connection lives on.
                    tracing::debug!(socket = %socket_id, %error, "Discarding malformed frame");
                }
            },
            Message::Close(_) => break,
            // Pings are answered by axum itself; binary frames have no
            // meaning in this protocol.
            _ => {}
        }
    }

    session.on_disconnect().await;
    state.hub.unregister(&socket_id).await;
    send_task.abort();
    tracing::debug!(socket = %socket_id, "Connection closed");
}
