//! Decidr relay - blind WebSocket forwarder between admins and clients.
//!
//! The relay:
//! 1. Accepts admin connections on `/ws/admin?id=<adminId>`
//! 2. Accepts client connections on `/ws/client?id=<clientId>&admin=<adminId>`
//! 3. Forwards frames between them through a shared [`decidr_crypto::Router`]
//!
//! It holds no keys and never looks inside a payload. The only framing it
//! understands is the `"<clientId>\n"` target prefix.

#![forbid(unsafe_code)]

pub mod ws;

use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use decidr_common::{env_usize, HealthReport};
use tokio_util::sync::CancellationToken;

/// Default per-connection outbox depth.
pub const DEFAULT_OUTBOX_CAPACITY: usize = 128;
/// Default maximum WebSocket message size.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 64 * 1024;

/// Per-connection tunables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayConfig {
    pub outbox_capacity: usize,
    pub max_frame_bytes: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            outbox_capacity: DEFAULT_OUTBOX_CAPACITY,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl RelayConfig {
    /// Read `DECIDR_WS_OUTBOX` and `DECIDR_WS_MAX_FRAME_BYTES`.
    pub fn from_env() -> Self {
        Self {
            outbox_capacity: env_usize("DECIDR_WS_OUTBOX", DEFAULT_OUTBOX_CAPACITY).max(1),
            max_frame_bytes: env_usize("DECIDR_WS_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES),
        }
    }
}

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    pub router: Arc<decidr_crypto::Router>,
    pub config: RelayConfig,
    /// Fired on shutdown; every forwarding loop watches it.
    pub shutdown: CancellationToken,
}

impl AppState {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            router: Arc::new(decidr_crypto::Router::new()),
            config,
            shutdown: CancellationToken::new(),
        }
    }
}

/// Build the relay's HTTP application.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "Decidr Relay Online" }))
        .route("/health", get(health))
        .route("/ws/admin", get(ws::admin_handler))
        .route("/ws/client", get(ws::client_handler))
        .with_state(state)
}

/// Live admin and client counts.
pub async fn health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        admins: state.router.admin_count(),
        clients: state.router.client_count(),
    })
}
