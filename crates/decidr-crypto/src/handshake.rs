//! Handshake engine.
//!
//! Drives the role's [`Step`] sequence against a [`Peer`], one Noise message
//! per step. A handshake is atomic: either every step succeeds and the caller
//! gets both cipher states and the fingerprint, or the first failure is
//! returned and the session is dropped. There is no retry here; callers that
//! want another attempt start over with a fresh session.

use std::fmt;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::identity::Identity;
use crate::noise::{CipherState, HandshakeSession, NoiseConfig, NoiseError};
use crate::peer::{Peer, TransportError};
use crate::steps::{cipher_states_for, steps_for, Role, Step};

/// Where in the handshake a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    Construct,
    Write,
    TransportSend,
    TransportReceive,
    Read,
}

impl fmt::Display for HandshakeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandshakeStage::Construct => "construct",
            HandshakeStage::Write => "write",
            HandshakeStage::TransportSend => "transport-send",
            HandshakeStage::TransportReceive => "transport-receive",
            HandshakeStage::Read => "read",
        };
        f.write_str(s)
    }
}

/// Underlying reason for a failed handshake.
#[derive(Debug, Error)]
pub enum HandshakeCause {
    #[error(transparent)]
    Noise(#[from] NoiseError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// A handshake step failed.
#[derive(Debug, Error)]
#[error("handshake failed at {stage}: {cause}")]
pub struct HandshakeError {
    pub stage: HandshakeStage,
    #[source]
    pub cause: HandshakeCause,
}

impl HandshakeError {
    fn new(stage: HandshakeStage, cause: impl Into<HandshakeCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }

    /// True when the attempt was aborted by its cancellation token.
    pub fn is_cancelled(&self) -> bool {
        matches!(&self.cause, HandshakeCause::Transport(e) if e.is_cancelled())
    }
}

/// Result of a completed handshake.
#[derive(Debug)]
pub struct HandshakeOutcome {
    /// Encrypts our outbound traffic.
    pub send: CipherState,
    /// Decrypts inbound traffic from the peer.
    pub receive: CipherState,
    /// Handshake hash, identical on both sides.
    pub fingerprint: Vec<u8>,
}

/// Handshake engine bound to one cipher suite configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct Handshake {
    config: NoiseConfig,
}

impl Handshake {
    pub fn new(config: NoiseConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &NoiseConfig {
        &self.config
    }

    /// Run a full handshake for `identity` over `peer`.
    pub async fn perform<P>(
        &self,
        cancel: &CancellationToken,
        peer: &P,
        identity: &Identity,
    ) -> Result<HandshakeOutcome, HandshakeError>
    where
        P: Peer + ?Sized,
    {
        let role = identity.role();
        let mut session = HandshakeSession::new(&self.config, identity.handshake_parameters())
            .map_err(|e| fail(role, HandshakeStage::Construct, e))?;

        let mut split = None;
        let mut last_stage = HandshakeStage::Construct;

        for step in steps_for(role) {
            split = match step {
                Step::Send => {
                    last_stage = HandshakeStage::Write;
                    let (message, split) = session
                        .write_message()
                        .map_err(|e| fail(role, HandshakeStage::Write, e))?;
                    debug!(%role, len = message.len(), "sending handshake message");
                    peer.send(cancel, &message)
                        .await
                        .map_err(|e| fail(role, HandshakeStage::TransportSend, e))?;
                    split
                }
                Step::Receive => {
                    last_stage = HandshakeStage::Read;
                    let message = peer
                        .receive(cancel)
                        .await
                        .map_err(|e| fail(role, HandshakeStage::TransportReceive, e))?;
                    debug!(%role, len = message.len(), "received handshake message");
                    session
                        .read_message(&message)
                        .map_err(|e| fail(role, HandshakeStage::Read, e))?
                }
            };
        }

        let (first, second) =
            split.ok_or_else(|| fail(role, last_stage, NoiseError::HandshakeNotComplete))?;
        let fingerprint = session
            .fingerprint()
            .map_err(|e| fail(role, last_stage, e))?;
        let (send, receive) = cipher_states_for(role, first, second);

        debug!(%role, "handshake complete");
        Ok(HandshakeOutcome {
            send,
            receive,
            fingerprint,
        })
    }
}

fn fail(role: Role, stage: HandshakeStage, cause: impl Into<HandshakeCause>) -> HandshakeError {
    let err = HandshakeError::new(stage, cause);
    warn!(%role, %stage, "handshake aborted: {}", err.cause);
    err
}

/// Run a handshake with the default cipher suite.
pub async fn perform<P>(
    cancel: &CancellationToken,
    peer: &P,
    identity: &Identity,
) -> Result<HandshakeOutcome, HandshakeError>
where
    P: Peer + ?Sized,
{
    Handshake::default().perform(cancel, peer, identity).await
}
