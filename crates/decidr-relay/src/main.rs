#![forbid(unsafe_code)]

//! Decidr relay server.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use decidr_common::env_bool;
use decidr_relay::{app, AppState, RelayConfig};
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "decidr-relay")]
#[command(about = "Decidr relay - forwards encrypted frames between admins and clients")]
struct Args {
    /// Listen address
    #[arg(long, env = "DECIDR_RELAY_LISTEN", default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    /// Log level
    #[arg(long, env = "DECIDR_LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn check_public_bind_allowed(addr: SocketAddr) -> Result<()> {
    if addr.ip().is_loopback() || env_bool("DECIDR_RELAY_ALLOW_PUBLIC_BIND", false) {
        return Ok(());
    }
    Err(decidr_common::Error::config(format!(
        "refusing non-loopback bind {addr} without DECIDR_RELAY_ALLOW_PUBLIC_BIND=1"
    ))
    .into())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    decidr_common::init_tracing_with_default(&args.log_level);

    info!("Starting decidr-relay v{}", env!("CARGO_PKG_VERSION"));
    check_public_bind_allowed(args.listen)?;

    let config = RelayConfig::from_env();
    let state = AppState::new(config);
    let shutdown = state.shutdown.clone();

    let listener = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    info!(
        "relay listening on {} (outbox {}, max frame {} bytes)",
        listener.local_addr()?,
        config.outbox_capacity,
        config.max_frame_bytes
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
            shutdown.cancel();
        })
        .await?;

    Ok(())
}
