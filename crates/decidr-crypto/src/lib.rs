//! Handshake core for Decidr.
//!
//! This crate provides:
//! - Admin/Client identities with jointly generated static keys
//! - The Noise NK handshake engine and its role-ordered steps
//! - Cancellable peers, including the encrypting [`SecurePeer`]
//! - Verification codes for out-of-band authentication
//! - The [`Router`] that relays opaque frames between admins and clients
//!
//! # Design
//!
//! Uses the Noise NK pattern (`Noise_NK_25519_ChaChaPoly_SHA256`):
//! the Client knows the Admin's static public key ahead of time, the Admin
//! does not know anything about the Client. One round trip establishes the
//! session:
//!
//! ```text
//! Client (Initiator)                    Admin (Responder)
//!     |  -> e, es                             |
//!     |-------------------------------------->|
//!     |  <- e, ee                             |
//!     |<--------------------------------------|
//!     [   send/receive cipher states split    ]
//! ```
//!
//! The relay in between only ever sees these two messages and ciphertext.

#![forbid(unsafe_code)]

pub mod handshake;
pub mod identity;
pub mod keys;
pub mod noise;
pub mod peer;
pub mod router;
pub mod steps;
pub mod verification;

pub use handshake::{perform, Handshake, HandshakeError, HandshakeOutcome, HandshakeStage};
pub use identity::{Identity, InvalidIdentity};
pub use keys::{
    admin_client_pair_from_keypair, generate_admin_client_pair, generate_static_keypair,
    StaticKeypair,
};
pub use noise::{CipherError, CipherState, HashFunction, NoiseConfig, NoiseError};
pub use peer::{ChannelPeer, FnPeer, Peer, SecurePeer, TransportError};
pub use router::{PeerKind, RouteError, Router};
pub use steps::{Role, Step};
pub use verification::{verification_code, verification_words, DEFAULT_WORD_COUNT};

/// Cancellation signal accepted by every peer operation.
pub use tokio_util::sync::CancellationToken;
