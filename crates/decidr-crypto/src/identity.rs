//! Role-bound identities.
//!
//! An [`Identity`] is either a Client, which only knows the Admin's static
//! public key, or an Admin, which owns the static keypair. The variant
//! decides the handshake role and which key material goes into the Noise
//! session.

use thiserror::Error;

use crate::keys::{StaticKeypair, KEY_LEN};
use crate::noise::Pattern;
use crate::steps::Role;

/// Malformed or missing key material.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvalidIdentity {
    #[error("invalid public key length: expected {expected} bytes, got {actual}")]
    PublicKeyLength { expected: usize, actual: usize },

    #[error("public key is all zeroes")]
    ZeroPublicKey,

    #[error("invalid private key length: expected {expected} bytes, got {actual}")]
    PrivateKeyLength { expected: usize, actual: usize },

    #[error("key generation failed: {0}")]
    KeyGeneration(String),
}

/// Client side: holds only the Admin's public key.
///
/// It can encrypt toward the Admin and check that it is talking to the key
/// holder, but it can never act as the Admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    admin_public_key: [u8; KEY_LEN],
}

impl ClientIdentity {
    pub(crate) fn new(admin_public_key: [u8; KEY_LEN]) -> Self {
        Self { admin_public_key }
    }

    pub fn admin_public_key(&self) -> &[u8; KEY_LEN] {
        &self.admin_public_key
    }
}

/// Admin side: owns the static keypair.
#[derive(Debug, Clone)]
pub struct AdminIdentity {
    keypair: StaticKeypair,
}

impl AdminIdentity {
    pub(crate) fn new(keypair: StaticKeypair) -> Self {
        Self { keypair }
    }

    pub fn keypair(&self) -> &StaticKeypair {
        &self.keypair
    }
}

/// Key material and role for one handshake participant.
#[derive(Debug, Clone)]
pub enum Identity {
    Client(ClientIdentity),
    Admin(AdminIdentity),
}

/// Everything the Noise session needs from an identity.
#[derive(Debug, Clone, Copy)]
pub struct HandshakeParameters<'a> {
    pub pattern: Pattern,
    pub role: Role,
    /// Our own static keypair (responder only).
    pub local_static: Option<&'a StaticKeypair>,
    /// The peer's static public key we expect (initiator only).
    pub remote_static: Option<&'a [u8; KEY_LEN]>,
}

impl Identity {
    /// Build a Client identity from an Admin public key received out of band
    /// or over the relay.
    pub fn client_from_bytes(admin_public_key: &[u8]) -> Result<Self, InvalidIdentity> {
        let key: [u8; KEY_LEN] =
            admin_public_key
                .try_into()
                .map_err(|_| InvalidIdentity::PublicKeyLength {
                    expected: KEY_LEN,
                    actual: admin_public_key.len(),
                })?;

        if key.iter().all(|b| *b == 0) {
            return Err(InvalidIdentity::ZeroPublicKey);
        }

        Ok(Identity::Client(ClientIdentity::new(key)))
    }

    /// Handshake role implied by the variant.
    pub fn role(&self) -> Role {
        match self {
            Identity::Client(_) => Role::Initiator,
            Identity::Admin(_) => Role::Responder,
        }
    }

    /// The Admin's static public key, as known by either side.
    pub fn public_key(&self) -> &[u8; KEY_LEN] {
        match self {
            Identity::Client(client) => client.admin_public_key(),
            Identity::Admin(admin) => admin.keypair().public_key(),
        }
    }

    pub fn handshake_parameters(&self) -> HandshakeParameters<'_> {
        match self {
            Identity::Client(client) => HandshakeParameters {
                pattern: Pattern::NK,
                role: Role::Initiator,
                local_static: None,
                remote_static: Some(client.admin_public_key()),
            },
            Identity::Admin(admin) => HandshakeParameters {
                pattern: Pattern::NK,
                role: Role::Responder,
                local_static: Some(admin.keypair()),
                remote_static: None,
            },
        }
    }
}
