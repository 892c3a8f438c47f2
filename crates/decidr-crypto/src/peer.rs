//! Transport-agnostic peers.
//!
//! A [`Peer`] moves discrete frames and nothing else. Every call takes a
//! [`CancellationToken`] and returns [`TransportError::Cancelled`] as soon as
//! it fires, even while blocked waiting for bytes.
//!
//! - [`ChannelPeer`]: raw frames over a pair of tokio channels
//! - [`FnPeer`]: raw frames over a pair of async closures
//! - [`SecurePeer`]: encrypts/decrypts on top of any raw peer, bound to the
//!   cipher states of one completed handshake

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::handshake::HandshakeOutcome;
use crate::noise::{CipherError, CipherState};
use crate::verification;

/// Transport errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("peer disconnected")]
    Disconnected,

    #[error("send failed: {0}")]
    SendFailed(String),

    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    #[error("encryption failed: {0}")]
    Encrypt(#[source] CipherError),

    #[error("decryption failed: {0}")]
    Decrypt(#[source] CipherError),

    #[error("secure channel unusable after a failed send")]
    SendStateLost,
}

impl TransportError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

/// Cancellable frame transport.
#[async_trait]
pub trait Peer: Send + Sync {
    /// Send one frame to the other side.
    async fn send(&self, cancel: &CancellationToken, data: &[u8]) -> Result<(), TransportError>;

    /// Receive the next frame.
    ///
    /// Blocks until a frame arrives, the transport closes, or `cancel` fires.
    async fn receive(&self, cancel: &CancellationToken) -> Result<Vec<u8>, TransportError>;
}

#[async_trait]
impl<P: Peer + ?Sized> Peer for Arc<P> {
    async fn send(&self, cancel: &CancellationToken, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(cancel, data).await
    }

    async fn receive(&self, cancel: &CancellationToken) -> Result<Vec<u8>, TransportError> {
        (**self).receive(cancel).await
    }
}

/// Run `fut` unless `cancel` fires first. An already cancelled token wins
/// before `fut` is polled.
async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T, TransportError>
where
    F: Future<Output = Result<T, TransportError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled),
        res = fut => res,
    }
}

async fn lock_cancellable<'a, T>(
    cancel: &CancellationToken,
    mutex: &'a Mutex<T>,
) -> Result<MutexGuard<'a, T>, TransportError> {
    cancellable(cancel, async { Ok(mutex.lock().await) }).await
}

/// Raw transport peer over tokio mpsc channels.
///
/// This is the in-memory wire used by tests, and the bridge the relay and
/// the endpoints put in front of their WebSocket pumps.
#[derive(Debug)]
pub struct ChannelPeer {
    tx: mpsc::Sender<Vec<u8>>,
    rx: Mutex<mpsc::Receiver<Vec<u8>>>,
}

impl ChannelPeer {
    pub fn new(tx: mpsc::Sender<Vec<u8>>, rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Create two connected ends. What one side sends the other receives.
    pub fn pair(capacity: usize) -> (ChannelPeer, ChannelPeer) {
        let (tx_a, rx_a) = mpsc::channel(capacity);
        let (tx_b, rx_b) = mpsc::channel(capacity);
        (ChannelPeer::new(tx_a, rx_b), ChannelPeer::new(tx_b, rx_a))
    }
}

#[async_trait]
impl Peer for ChannelPeer {
    async fn send(&self, cancel: &CancellationToken, data: &[u8]) -> Result<(), TransportError> {
        cancellable(cancel, async {
            self.tx
                .send(data.to_vec())
                .await
                .map_err(|_| TransportError::Disconnected)
        })
        .await
    }

    async fn receive(&self, cancel: &CancellationToken) -> Result<Vec<u8>, TransportError> {
        cancellable(cancel, async {
            let mut rx = self.rx.lock().await;
            rx.recv().await.ok_or(TransportError::Disconnected)
        })
        .await
    }
}

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send + 'static>>;
type SendFn = Box<dyn Fn(CancellationToken, Vec<u8>) -> BoxFuture<Result<(), TransportError>> + Send + Sync>;
type ReceiveFn = Box<dyn Fn(CancellationToken) -> BoxFuture<Result<Vec<u8>, TransportError>> + Send + Sync>;

/// Raw transport peer built from two async closures.
///
/// Handy for adding framing around another peer, e.g. an Admin prefixing
/// every frame with the target client id.
pub struct FnPeer {
    send: SendFn,
    receive: ReceiveFn,
}

impl FnPeer {
    pub fn new<S, SF, R, RF>(send: S, receive: R) -> Self
    where
        S: Fn(CancellationToken, Vec<u8>) -> SF + Send + Sync + 'static,
        SF: Future<Output = Result<(), TransportError>> + Send + 'static,
        R: Fn(CancellationToken) -> RF + Send + Sync + 'static,
        RF: Future<Output = Result<Vec<u8>, TransportError>> + Send + 'static,
    {
        Self {
            send: Box::new(move |cancel, data| Box::pin(send(cancel, data))),
            receive: Box::new(move |cancel| Box::pin(receive(cancel))),
        }
    }
}

impl std::fmt::Debug for FnPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnPeer").finish_non_exhaustive()
    }
}

#[async_trait]
impl Peer for FnPeer {
    async fn send(&self, cancel: &CancellationToken, data: &[u8]) -> Result<(), TransportError> {
        cancellable(cancel, (self.send)(cancel.clone(), data.to_vec())).await
    }

    async fn receive(&self, cancel: &CancellationToken) -> Result<Vec<u8>, TransportError> {
        cancellable(cancel, (self.receive)(cancel.clone())).await
    }
}

/// Encrypting peer bound to one completed handshake.
///
/// Outgoing frames are encrypted with the send state before the inner send,
/// incoming frames are decrypted with the receive state after the inner
/// receive. The send lock is held across the inner send so nonces hit the
/// wire in order.
///
/// A send that fails or is cancelled after encryption has spent a nonce the
/// other side never saw. Every later send returns
/// [`TransportError::SendStateLost`]; the session has to be redone.
/// Cancelling before the send lock is taken spends nothing.
pub struct SecurePeer<P> {
    inner: P,
    send_failed: AtomicBool,
    send_state: Mutex<CipherState>,
    receive_state: Mutex<CipherState>,
    fingerprint: Vec<u8>,
}

impl<P: Peer> SecurePeer<P> {
    /// Wrap `inner` with the cipher states of a finished handshake.
    pub fn new(inner: P, outcome: HandshakeOutcome) -> Self {
        let HandshakeOutcome {
            send,
            receive,
            fingerprint,
        } = outcome;
        Self {
            inner,
            send_failed: AtomicBool::new(false),
            send_state: Mutex::new(send),
            receive_state: Mutex::new(receive),
            fingerprint,
        }
    }

    /// Transcript fingerprint of the handshake this peer is bound to.
    pub fn fingerprint(&self) -> &[u8] {
        &self.fingerprint
    }

    /// Verification code to compare out of band.
    pub fn verification_code(&self, word_count: usize) -> String {
        verification::verification_code(&self.fingerprint, word_count)
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: Peer> Peer for SecurePeer<P> {
    async fn send(&self, cancel: &CancellationToken, data: &[u8]) -> Result<(), TransportError> {
        let mut state = lock_cancellable(cancel, &self.send_state).await?;
        if self.send_failed.load(Ordering::Acquire) {
            return Err(TransportError::SendStateLost);
        }
        let ciphertext = state.encrypt(data).map_err(TransportError::Encrypt)?;

        // Dropping this future mid-send also spends the nonce
        let failed = FailOnDrop(&self.send_failed);
        let res = self.inner.send(cancel, &ciphertext).await;
        if res.is_ok() {
            std::mem::forget(failed);
        }
        res
    }

    async fn receive(&self, cancel: &CancellationToken) -> Result<Vec<u8>, TransportError> {
        let mut state = lock_cancellable(cancel, &self.receive_state).await?;
        let ciphertext = self.inner.receive(cancel).await?;
        state.decrypt(&ciphertext).map_err(TransportError::Decrypt)
    }
}

/// Marks the send direction lost unless defused with `mem::forget`.
struct FailOnDrop<'a>(&'a AtomicBool);

impl Drop for FailOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(true, Ordering::Release);
    }
}
