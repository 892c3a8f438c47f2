//! WebSocket transport for endpoints.

use std::sync::Arc;

use anyhow::{Context, Result};
use decidr_common::{encode_targeted, split_targeted};
use decidr_crypto::{CancellationToken, ChannelPeer, FnPeer, Peer, TransportError};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

const OUTBOX_CAPACITY: usize = 32;

/// Dial `url` and put a [`ChannelPeer`] in front of the socket.
pub async fn connect(url: &str) -> Result<Arc<ChannelPeer>> {
    let (ws, _) = connect_async(url)
        .await
        .with_context(|| format!("failed to connect to {url}"))?;
    debug!(%url, "connected to relay");

    let (mut sender, mut receiver) = ws.split();
    let (out_tx, mut out_rx) = mpsc::channel::<Vec<u8>>(OUTBOX_CAPACITY);
    let (in_tx, in_rx) = mpsc::channel::<Vec<u8>>(OUTBOX_CAPACITY);

    tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            if sender.send(Message::binary(frame)).await.is_err() {
                break;
            }
        }
        let _ = sender.close().await;
    });

    tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            let frame = match msg {
                Ok(Message::Binary(data)) => data.to_vec(),
                Ok(Message::Text(text)) => text.as_str().as_bytes().to_vec(),
                Ok(Message::Close(_)) | Err(_) => break,
                Ok(_) => continue,
            };
            if in_tx.send(frame).await.is_err() {
                break;
            }
        }
    });

    Ok(Arc::new(ChannelPeer::new(out_tx, in_rx)))
}

/// Wrap an admin's relay connection so it talks to one client only.
///
/// Outgoing frames get the `"<clientId>\n"` prefix the relay routes on.
/// Incoming frames from other clients, or without a tag, are skipped.
pub fn targeted(inner: Arc<ChannelPeer>, client_id: String) -> FnPeer {
    let send_inner = inner.clone();
    let send_target = client_id.clone();
    FnPeer::new(
        move |cancel: CancellationToken, data: Vec<u8>| {
            let inner = send_inner.clone();
            let frame = encode_targeted(&send_target, &data);
            async move { inner.send(&cancel, &frame).await }
        },
        move |cancel: CancellationToken| {
            let inner = inner.clone();
            let client_id = client_id.clone();
            async move {
                loop {
                    let frame = inner.receive(&cancel).await?;
                    match split_targeted(&frame) {
                        Some((from, payload)) if from == client_id => {
                            return Ok::<_, TransportError>(payload.to_vec())
                        }
                        Some((from, _)) => debug!(%from, "skipping frame from another client"),
                        None => debug!("skipping untagged frame"),
                    }
                }
            }
        },
    )
}
