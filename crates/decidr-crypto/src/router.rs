//! Blind frame router between admins and clients.
//!
//! The router keeps two independent tables, admin id → peer and client id →
//! peer, each behind its own lock. It never frames, inspects or decrypts the
//! bytes it forwards and holds no key material.
//!
//! # Locking
//!
//! - Register/remove take the write lock of one table only
//! - Routing clones the target peer under the read lock and releases it
//!   before sending, so a slow peer never stalls registrations or other routes
//! - The two locks are never held at the same time

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::peer::{Peer, TransportError};

/// Which table a peer lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerKind {
    Admin,
    Client,
}

impl fmt::Display for PeerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PeerKind::Admin => f.write_str("admin"),
            PeerKind::Client => f.write_str("client"),
        }
    }
}

/// Routing errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
    #[error("{kind} {id} not connected")]
    NotFound { kind: PeerKind, id: String },

    #[error("delivery failed: {0}")]
    Delivery(#[from] TransportError),
}

type PeerTable = RwLock<HashMap<String, Arc<dyn Peer>>>;

/// Registry of live admin and client peers.
#[derive(Default)]
pub struct Router {
    admins: PeerTable,
    clients: PeerTable,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the peer for an admin connection, replacing any previous one.
    pub fn register_admin(&self, id: impl Into<String>, peer: Arc<dyn Peer>) {
        register(&self.admins, PeerKind::Admin, id.into(), peer);
    }

    /// Register the peer for a client connection, replacing any previous one.
    pub fn register_client(&self, id: impl Into<String>, peer: Arc<dyn Peer>) {
        register(&self.clients, PeerKind::Client, id.into(), peer);
    }

    /// Remove an admin. Unknown ids are ignored.
    pub fn remove_admin(&self, id: &str) {
        remove(&self.admins, PeerKind::Admin, id, None);
    }

    /// Remove a client. Unknown ids are ignored.
    pub fn remove_client(&self, id: &str) {
        remove(&self.clients, PeerKind::Client, id, None);
    }

    /// Remove an admin only if `peer` is still the registered one.
    ///
    /// Connection teardown uses this so that a connection that was replaced
    /// by a reconnect does not evict its replacement.
    pub fn remove_admin_if_current(&self, id: &str, peer: &Arc<dyn Peer>) -> bool {
        remove(&self.admins, PeerKind::Admin, id, Some(peer))
    }

    /// Client counterpart of [`Router::remove_admin_if_current`].
    pub fn remove_client_if_current(&self, id: &str, peer: &Arc<dyn Peer>) -> bool {
        remove(&self.clients, PeerKind::Client, id, Some(peer))
    }

    /// Forward `data` to the named admin.
    pub async fn route_to_admin(
        &self,
        cancel: &CancellationToken,
        admin_id: &str,
        data: &[u8],
    ) -> Result<(), RouteError> {
        let peer = lookup(&self.admins, PeerKind::Admin, admin_id)?;
        peer.send(cancel, data).await?;
        Ok(())
    }

    /// Forward `data` to the named client.
    pub async fn route_to_client(
        &self,
        cancel: &CancellationToken,
        client_id: &str,
        data: &[u8],
    ) -> Result<(), RouteError> {
        let peer = lookup(&self.clients, PeerKind::Client, client_id)?;
        peer.send(cancel, data).await?;
        Ok(())
    }

    pub fn admin_count(&self) -> usize {
        self.admins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn client_count(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("admins", &self.admin_count())
            .field("clients", &self.client_count())
            .finish()
    }
}

fn register(table: &PeerTable, kind: PeerKind, id: String, peer: Arc<dyn Peer>) {
    let replaced = table
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .insert(id.clone(), peer)
        .is_some();
    if replaced {
        info!(%kind, %id, "replaced existing registration");
    } else {
        debug!(%kind, %id, "registered");
    }
}

fn remove(table: &PeerTable, kind: PeerKind, id: &str, expected: Option<&Arc<dyn Peer>>) -> bool {
    let mut guard = table.write().unwrap_or_else(PoisonError::into_inner);
    let matches = match (guard.get(id), expected) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(current), Some(expected)) => Arc::ptr_eq(current, expected),
    };
    if matches {
        guard.remove(id);
        debug!(%kind, %id, "removed");
    }
    matches
}

fn lookup(table: &PeerTable, kind: PeerKind, id: &str) -> Result<Arc<dyn Peer>, RouteError> {
    table
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .get(id)
        .cloned()
        .ok_or_else(|| RouteError::NotFound {
            kind,
            id: id.to_string(),
        })
}
