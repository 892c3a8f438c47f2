//! Static X25519 key material.
//!
//! Admin and Client halves are always built together, either fresh by
//! [`generate_admin_client_pair`] or from a saved keypair by
//! [`admin_client_pair_from_keypair`], so a client can never be paired with a
//! public key that does not belong to its admin.

use std::fmt;

use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::Zeroizing;

use crate::identity::{AdminIdentity, ClientIdentity, Identity, InvalidIdentity};

/// Length of an X25519 key in bytes.
pub const KEY_LEN: usize = 32;

/// Long-lived X25519 keypair used by the Admin as its Noise static key.
///
/// The private half is zeroized on drop.
#[derive(Clone)]
pub struct StaticKeypair {
    public: [u8; KEY_LEN],
    private: Zeroizing<[u8; KEY_LEN]>,
}

impl StaticKeypair {
    /// Rebuild a keypair from saved private key bytes.
    pub fn from_private_key(bytes: &[u8]) -> Result<Self, InvalidIdentity> {
        let private: [u8; KEY_LEN] =
            bytes
                .try_into()
                .map_err(|_| InvalidIdentity::PrivateKeyLength {
                    expected: KEY_LEN,
                    actual: bytes.len(),
                })?;
        Ok(Self::from_private(Zeroizing::new(private)))
    }

    fn from_private(private: Zeroizing<[u8; KEY_LEN]>) -> Self {
        let secret = x25519_dalek::StaticSecret::from(*private);
        let public = x25519_dalek::PublicKey::from(&secret);
        Self {
            public: *public.as_bytes(),
            private,
        }
    }

    /// Public key bytes.
    pub fn public_key(&self) -> &[u8; KEY_LEN] {
        &self.public
    }

    /// Private key bytes.
    ///
    /// # Security
    /// Handle with care! Only the handshake session needs these.
    pub(crate) fn private_key(&self) -> &[u8; KEY_LEN] {
        &self.private
    }

    /// Copy of the private key for persisting to disk.
    pub fn export_private_key(&self) -> Zeroizing<[u8; KEY_LEN]> {
        self.private.clone()
    }
}

impl fmt::Debug for StaticKeypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeypair")
            .field("public", &hex_short(&self.public))
            .field("private", &"<redacted>")
            .finish()
    }
}

/// Generate a random X25519 keypair using the OS CSPRNG.
pub fn generate_static_keypair() -> Result<StaticKeypair, InvalidIdentity> {
    let mut private = Zeroizing::new([0u8; KEY_LEN]);
    OsRng
        .try_fill_bytes(&mut private[..])
        .map_err(|e| InvalidIdentity::KeyGeneration(e.to_string()))?;

    Ok(StaticKeypair::from_private(private))
}

/// Generate a matching Client/Admin identity pair.
///
/// Returns `(client, admin)`. Both halves carry the same public key: the
/// client holds only that public key, the admin holds the full keypair.
pub fn generate_admin_client_pair() -> Result<(Identity, Identity), InvalidIdentity> {
    Ok(admin_client_pair_from_keypair(generate_static_keypair()?))
}

/// Build the Client/Admin pair around an existing Admin keypair.
///
/// Returns `(client, admin)`, same as [`generate_admin_client_pair`].
pub fn admin_client_pair_from_keypair(keypair: StaticKeypair) -> (Identity, Identity) {
    let client = ClientIdentity::new(*keypair.public_key());
    let admin = AdminIdentity::new(keypair);

    (Identity::Client(client), Identity::Admin(admin))
}

fn hex_short(bytes: &[u8]) -> String {
    bytes.iter().take(4).map(|b| format!("{b:02x}")).collect::<String>() + ".."
}
