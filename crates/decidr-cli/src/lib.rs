//! Decidr endpoints.
//!
//! - [`endpoint::AdminEndpoint`]: owns the static keypair and answers a client
//! - [`endpoint::ClientEndpoint`]: learns the Admin key over the relay and
//!   initiates the handshake
//! - [`keyfile`]: saving and loading the Admin static keypair

#![forbid(unsafe_code)]

pub mod endpoint;
pub mod keyfile;
pub mod transport;

pub use endpoint::{AdminEndpoint, ClientEndpoint, ExchangeReport};
