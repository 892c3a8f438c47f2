//! Noise handshake core.
//!
//! Thin adapter over `snow` that exposes exactly what the handshake engine
//! needs: write one message, read one message, and once the pattern is
//! complete, the split cipher states and the handshake hash.
//!
//! The split pair is returned in transcript order (initiator-to-responder
//! first), never in send/receive order. Mapping it onto a role is the job of
//! [`crate::steps::cipher_states_for`].

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Key, Nonce,
};
use snow::{Builder, HandshakeState};
use thiserror::Error;
use zeroize::Zeroize;

use crate::identity::HandshakeParameters;
use crate::steps::Role;

/// Maximum Noise message size.
const MAX_HANDSHAKE_MSG_SIZE: usize = 65535;

/// ChaCha20-Poly1305 tag length.
pub const TAG_LEN: usize = 16;

/// Noise handshake errors
#[derive(Debug, Error)]
pub enum NoiseError {
    #[error("handshake not complete")]
    HandshakeNotComplete,

    #[error("missing {0} for {1} role")]
    MissingKey(&'static str, Role),

    #[error("snow error: {0}")]
    Snow(#[from] snow::Error),
}

/// Post-handshake encryption errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    #[error("ciphertext too short: {0} bytes")]
    CiphertextTooShort(usize),

    #[error("nonce space exhausted")]
    NonceExhausted,
}

/// Handshake pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pattern {
    /// Responder static key known to the initiator in advance.
    NK,
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::NK => f.write_str("NK"),
        }
    }
}

/// Transcript hash function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HashFunction {
    #[default]
    Sha256,
    Blake2s,
}

impl fmt::Display for HashFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashFunction::Sha256 => f.write_str("SHA256"),
            HashFunction::Blake2s => f.write_str("BLAKE2s"),
        }
    }
}

/// Cipher suite configuration handed to the handshake engine.
///
/// DH is always X25519 and the AEAD is always ChaCha20-Poly1305; only the
/// transcript hash is selectable. Both parties must agree on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NoiseConfig {
    pub hash: HashFunction,
}

impl NoiseConfig {
    pub fn new(hash: HashFunction) -> Self {
        Self { hash }
    }

    /// Full Noise protocol name, e.g. `Noise_NK_25519_ChaChaPoly_SHA256`.
    pub fn protocol_name(&self, pattern: Pattern) -> String {
        format!("Noise_{}_25519_ChaChaPoly_{}", pattern, self.hash)
    }
}

/// In-progress handshake for a single attempt.
///
/// Never reused: once the pattern completes the caller takes the split
/// states and the fingerprint and drops the session.
pub struct HandshakeSession {
    state: Box<HandshakeState>,
    role: Role,
}

impl HandshakeSession {
    /// Build a fresh session from an identity's parameters.
    pub fn new(config: &NoiseConfig, params: HandshakeParameters<'_>) -> Result<Self, NoiseError> {
        let builder = Builder::new(config.protocol_name(params.pattern).parse()?);

        let state = match params.role {
            Role::Initiator => {
                let remote = params
                    .remote_static
                    .ok_or(NoiseError::MissingKey("remote static key", params.role))?;
                builder.remote_public_key(remote).build_initiator()?
            }
            Role::Responder => {
                let local = params
                    .local_static
                    .ok_or(NoiseError::MissingKey("local static keypair", params.role))?;
                builder
                    .local_private_key(local.private_key())
                    .build_responder()?
            }
        };

        Ok(Self {
            state: Box::new(state),
            role: params.role,
        })
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_handshake_finished()
    }

    /// Produce the next handshake message.
    ///
    /// Returns the wire bytes, plus the split pair when this message
    /// completed the pattern.
    pub fn write_message(
        &mut self,
    ) -> Result<(Vec<u8>, Option<(CipherState, CipherState)>), NoiseError> {
        let mut buf = vec![0u8; MAX_HANDSHAKE_MSG_SIZE];
        let len = self.state.write_message(&[], &mut buf)?;
        buf.truncate(len);
        Ok((buf, self.split_if_finished()))
    }

    /// Consume a handshake message from the peer.
    ///
    /// Returns the split pair when this message completed the pattern.
    pub fn read_message(
        &mut self,
        message: &[u8],
    ) -> Result<Option<(CipherState, CipherState)>, NoiseError> {
        let mut buf = vec![0u8; MAX_HANDSHAKE_MSG_SIZE];
        self.state.read_message(message, &mut buf)?;
        Ok(self.split_if_finished())
    }

    /// Handshake hash over the full transcript.
    pub fn fingerprint(&self) -> Result<Vec<u8>, NoiseError> {
        if !self.is_finished() {
            return Err(NoiseError::HandshakeNotComplete);
        }
        Ok(self.state.get_handshake_hash().to_vec())
    }

    fn split_if_finished(&mut self) -> Option<(CipherState, CipherState)> {
        if !self.state.is_handshake_finished() {
            return None;
        }
        let (first, second) = self.state.dangerously_get_raw_split();
        Some((CipherState::new(first), CipherState::new(second)))
    }
}

impl fmt::Debug for HandshakeSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeSession")
            .field("role", &self.role)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Keyed state for one direction of post-handshake traffic.
///
/// Uses the Noise nonce layout: four zero bytes followed by a little-endian
/// 64-bit counter. Messages must be decrypted in the order they were
/// encrypted.
pub struct CipherState {
    cipher: ChaCha20Poly1305,
    nonce: u64,
}

impl CipherState {
    pub(crate) fn new(mut key: [u8; 32]) -> Self {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        key.zeroize();
        Self { cipher, nonce: 0 }
    }

    /// Next nonce to be used.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        let nonce = self.next_nonce()?;
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CipherError::EncryptionFailed)?;
        self.nonce += 1;
        Ok(ciphertext)
    }

    /// Decrypt the next message. The counter only advances on success.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if ciphertext.len() < TAG_LEN {
            return Err(CipherError::CiphertextTooShort(ciphertext.len()));
        }
        let nonce = self.next_nonce()?;
        let plaintext = self
            .cipher
            .decrypt(&nonce, ciphertext)
            .map_err(|_| CipherError::DecryptionFailed)?;
        self.nonce += 1;
        Ok(plaintext)
    }

    fn next_nonce(&self) -> Result<Nonce, CipherError> {
        // u64::MAX is reserved by Noise
        if self.nonce == u64::MAX {
            return Err(CipherError::NonceExhausted);
        }
        let mut bytes = [0u8; 12];
        bytes[4..].copy_from_slice(&self.nonce.to_le_bytes());
        Ok(*Nonce::from_slice(&bytes))
    }

    #[cfg(test)]
    fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}

impl fmt::Debug for CipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherState")
            .field("nonce", &self.nonce)
            .finish_non_exhaustive()
    }
}
