//! Admin and client endpoint flows.
//!
//! ```text
//! Client                         Relay                          Admin
//!   |-- join ---------------------->|-- client-1\njoin ----------->|
//!   |<------------------------------|<----------- client-1\n<key> -|
//!   |-- handshake message 1 ------->|----------------------------->|
//!   |<------------------------------|<------- handshake message 2 -|
//!   |== encrypted application frames ============================>|
//! ```
//!
//! The relay drops frames addressed to an id that is not connected, so the
//! client repeats `join` every [`JOIN_RETRY_INTERVAL`] until the key arrives.
//! The Admin answers the first `join` and ignores the repeats. Handshake and
//! ciphertext frames are never four bytes long, so they cannot be mistaken
//! for a `join`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use decidr_crypto::{
    admin_client_pair_from_keypair, generate_static_keypair, CancellationToken, ChannelPeer,
    FnPeer, Handshake, Identity, Peer, SecurePeer, StaticKeypair, TransportError,
    DEFAULT_WORD_COUNT,
};
use tracing::{debug, info};

use crate::transport;

/// Client's first frame, telling the Admin it is ready for the key.
pub const JOIN_FRAME: &[u8] = b"join";

/// How long the client waits for the Admin key before joining again.
pub const JOIN_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// What a finished exchange looked like from one side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReport {
    pub verification_code: String,
    pub received: Vec<u8>,
}

/// Admin side, connected to the relay.
pub struct AdminEndpoint {
    peer: Arc<FnPeer>,
    identity: Identity,
    client_id: String,
    handshake: Handshake,
}

impl AdminEndpoint {
    /// Generate a fresh identity and connect as `admin_id`, serving `client_id`.
    pub async fn connect(relay_url: &str, admin_id: &str, client_id: &str) -> Result<Self> {
        let keypair = generate_static_keypair().context("failed to generate keypair")?;
        Self::connect_with_keypair(relay_url, admin_id, client_id, keypair).await
    }

    /// Connect as `admin_id` using a saved static keypair.
    pub async fn connect_with_keypair(
        relay_url: &str,
        admin_id: &str,
        client_id: &str,
        keypair: StaticKeypair,
    ) -> Result<Self> {
        let (_, identity) = admin_client_pair_from_keypair(keypair);
        let url = format!("{}/ws/admin?id={}", relay_url.trim_end_matches('/'), admin_id);
        let inner = transport::connect(&url).await?;
        info!(%admin_id, %client_id, "admin connected");

        Ok(Self {
            peer: Arc::new(transport::targeted(inner, client_id.to_string())),
            identity,
            client_id: client_id.to_string(),
            handshake: Handshake::default(),
        })
    }

    pub fn with_handshake(mut self, handshake: Handshake) -> Self {
        self.handshake = handshake;
        self
    }

    /// Admin static public key handed to the client.
    pub fn public_key(&self) -> &[u8; 32] {
        self.identity.public_key()
    }

    /// Wait for the client, hand it our key, run the handshake, then read one
    /// message and answer with `reply`.
    pub async fn run(self, cancel: &CancellationToken, reply: &[u8]) -> Result<ExchangeReport> {
        let client_id = &self.client_id;

        await_join(cancel, &*self.peer)
            .await
            .context("client never joined")?;
        info!(%client_id, "client joined, sending public key");

        self.peer
            .send(cancel, self.identity.public_key())
            .await
            .context("failed to send public key to client")?;

        let peer = ignore_joins(self.peer);
        let outcome = self
            .handshake
            .perform(cancel, &peer, &self.identity)
            .await
            .context("admin handshake failed")?;
        let secure = SecurePeer::new(peer, outcome);
        let verification_code = secure.verification_code(DEFAULT_WORD_COUNT);
        info!(%client_id, %verification_code, "admin handshake succeeded");

        let received = secure
            .receive(cancel)
            .await
            .context("failed to receive message")?;
        info!(%client_id, len = received.len(), "admin message received");
        secure
            .send(cancel, reply)
            .await
            .context("failed to send reply")?;

        Ok(ExchangeReport {
            verification_code,
            received,
        })
    }
}

/// Client side, connected to the relay.
pub struct ClientEndpoint {
    peer: Arc<ChannelPeer>,
    pinned_key: Option<Vec<u8>>,
    handshake: Handshake,
}

impl ClientEndpoint {
    pub async fn connect(relay_url: &str, client_id: &str, admin_id: &str) -> Result<Self> {
        let url = format!(
            "{}/ws/client?id={}&admin={}",
            relay_url.trim_end_matches('/'),
            client_id,
            admin_id
        );
        let peer = transport::connect(&url).await?;
        info!(%client_id, %admin_id, "client connected");

        Ok(Self {
            peer,
            pinned_key: None,
            handshake: Handshake::default(),
        })
    }

    /// Refuse any Admin key other than `key`.
    pub fn pin_admin_key(mut self, key: Vec<u8>) -> Self {
        self.pinned_key = Some(key);
        self
    }

    pub fn with_handshake(mut self, handshake: Handshake) -> Self {
        self.handshake = handshake;
        self
    }

    /// Join, learn the Admin key, run the handshake, send `message` and wait
    /// for the reply.
    pub async fn run(self, cancel: &CancellationToken, message: &[u8]) -> Result<ExchangeReport> {
        let key = loop {
            self.peer
                .send(cancel, JOIN_FRAME)
                .await
                .context("failed to join")?;
            match tokio::time::timeout(JOIN_RETRY_INTERVAL, self.peer.receive(cancel)).await {
                Ok(key) => break key.context("admin public key never arrived")?,
                Err(_) => debug!("no admin key yet, joining again"),
            }
        };
        let identity = client_identity(&key, self.pinned_key.as_deref())?;
        info!(admin_key = %hex::encode(identity.public_key()), "received admin public key");

        let outcome = self
            .handshake
            .perform(cancel, &self.peer, &identity)
            .await
            .context("client handshake failed")?;
        let secure = SecurePeer::new(self.peer, outcome);
        let verification_code = secure.verification_code(DEFAULT_WORD_COUNT);
        info!(%verification_code, "client handshake succeeded");

        secure
            .send(cancel, message)
            .await
            .context("failed to send message")?;
        let received = secure
            .receive(cancel)
            .await
            .context("failed to receive reply")?;

        Ok(ExchangeReport {
            verification_code,
            received,
        })
    }
}

/// Wait for the client's `join`, skipping anything else it sends first.
async fn await_join<P: Peer + ?Sized>(
    cancel: &CancellationToken,
    peer: &P,
) -> Result<(), TransportError> {
    loop {
        let frame = peer.receive(cancel).await?;
        if frame == JOIN_FRAME {
            return Ok(());
        }
        debug!(len = frame.len(), "skipping frame before join");
    }
}

/// Drop the repeated `join` frames a client sends until the key reaches it.
fn ignore_joins<P: Peer + 'static>(inner: Arc<P>) -> FnPeer {
    let send_inner = inner.clone();
    FnPeer::new(
        move |cancel: CancellationToken, data: Vec<u8>| {
            let inner = send_inner.clone();
            async move { inner.send(&cancel, &data).await }
        },
        move |cancel: CancellationToken| {
            let inner = inner.clone();
            async move {
                loop {
                    let frame = inner.receive(&cancel).await?;
                    if frame != JOIN_FRAME {
                        return Ok::<_, TransportError>(frame);
                    }
                    debug!("skipping repeated join");
                }
            }
        },
    )
}

/// Build the client identity from the key frame, checking it against a
/// pinned key when there is one.
fn client_identity(key: &[u8], pinned: Option<&[u8]>) -> Result<Identity> {
    let identity = Identity::client_from_bytes(key)
        .map_err(|e| decidr_common::Error::protocol(format!("malformed admin key: {e}")))?;
    if let Some(pinned) = pinned {
        if pinned != identity.public_key().as_slice() {
            return Err(decidr_common::Error::crypto("admin key does not match pinned key").into());
        }
    }
    Ok(identity)
}
