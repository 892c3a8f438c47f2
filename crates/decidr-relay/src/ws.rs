//! WebSocket endpoints and per-connection forwarding loops.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use decidr_common::{encode_targeted, split_targeted};
use decidr_crypto::{ChannelPeer, Peer};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{AppState, RelayConfig};

#[derive(Debug, Deserialize)]
pub struct AdminQuery {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ClientQuery {
    id: Option<String>,
    admin: Option<String>,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

pub async fn admin_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<AdminQuery>,
) -> Response {
    let Some(admin_id) = required(query.id) else {
        return (StatusCode::BAD_REQUEST, "missing admin id").into_response();
    };
    info!(%admin_id, "new admin connection");

    limit(ws, &state.config)
        .on_upgrade(move |socket| handle_admin(socket, state, admin_id))
        .into_response()
}

pub async fn client_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<ClientQuery>,
) -> Response {
    let (Some(client_id), Some(admin_id)) = (required(query.id), required(query.admin)) else {
        return (StatusCode::BAD_REQUEST, "missing id or admin").into_response();
    };
    info!(%client_id, %admin_id, "new client connection");

    limit(ws, &state.config)
        .on_upgrade(move |socket| handle_client(socket, state, client_id, admin_id))
        .into_response()
}

fn limit(ws: WebSocketUpgrade, config: &RelayConfig) -> WebSocketUpgrade {
    ws.max_message_size(config.max_frame_bytes)
        .max_frame_size(config.max_frame_bytes)
}

/// Admin frames are `"<clientId>\n<payload>"`; only the payload goes on.
async fn handle_admin(socket: WebSocket, state: AppState, admin_id: String) {
    let peer = bridge(socket, state.config.outbox_capacity);
    state.router.register_admin(admin_id.clone(), peer.clone());
    let cancel = state.shutdown.child_token();

    loop {
        let frame = match peer.receive(&cancel).await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(%admin_id, "admin receive ended: {}", e);
                break;
            }
        };

        let (client_id, payload) = match parse_admin_frame(&frame) {
            Ok(parts) => parts,
            Err(e) => {
                debug!(%admin_id, "dropping frame: {}", e);
                continue;
            }
        };

        if let Err(e) = state
            .router
            .route_to_client(&cancel, client_id, payload)
            .await
        {
            warn!(%admin_id, %client_id, "route error: {}", e);
        }
    }

    state.router.remove_admin_if_current(&admin_id, &peer);
    info!(%admin_id, "admin disconnected");
}

/// Client frames are forwarded to the named admin tagged with the client id.
async fn handle_client(socket: WebSocket, state: AppState, client_id: String, admin_id: String) {
    let peer = bridge(socket, state.config.outbox_capacity);
    state.router.register_client(client_id.clone(), peer.clone());
    let cancel = state.shutdown.child_token();

    loop {
        let frame = match peer.receive(&cancel).await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(%client_id, "client receive ended: {}", e);
                break;
            }
        };

        let tagged = encode_targeted(&client_id, &frame);
        if let Err(e) = state
            .router
            .route_to_admin(&cancel, &admin_id, &tagged)
            .await
        {
            warn!(%client_id, %admin_id, "route error: {}", e);
        }
    }

    state.router.remove_client_if_current(&client_id, &peer);
    info!(%client_id, "client disconnected");
}

fn parse_admin_frame(frame: &[u8]) -> decidr_common::Result<(&str, &[u8])> {
    split_targeted(frame)
        .ok_or_else(|| decidr_common::Error::protocol("admin frame has no client target"))
}

/// Put a [`ChannelPeer`] in front of the socket.
///
/// A writer task drains the outbox into the socket and a reader task feeds
/// binary and text messages into the inbox. Closing the socket disconnects
/// the peer; dropping the last handle to the peer closes the socket.
fn bridge(socket: WebSocket, capacity: usize) -> Arc<dyn Peer> {
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(capacity);
    let (in_tx, in_rx) = mpsc::channel::<Vec<u8>>(capacity);

    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sender.send(Message::Binary(frame)).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let frame = match msg {
                Ok(Message::Binary(data)) => data,
                Ok(Message::Text(text)) => text.into_bytes(),
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
                Ok(Message::Close(_)) | Err(_) => break,
            };
            if in_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    Arc::new(ChannelPeer::new(out_tx, in_rx))
}
