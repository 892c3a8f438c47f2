//! Relay forwarding over real WebSocket connections.

use std::net::SocketAddr;
use std::time::Duration;

use decidr_relay::{app, AppState, RelayConfig};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{sleep, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const TEST_TIMEOUT: Duration = Duration::from_secs(5);

async fn spawn_relay() -> (SocketAddr, AppState) {
    let state = AppState::new(RelayConfig::default());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

async fn connect(url: String) -> Ws {
    let (ws, _) = connect_async(url).await.expect("websocket connect failed");
    ws
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(TEST_TIMEOUT, async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn next_binary(ws: &mut Ws) -> Vec<u8> {
    timeout(TEST_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {other:?}"),
            }
        }
    })
    .await
    .expect("no frame received")
}

async fn connected_pair(addr: SocketAddr, state: &AppState) -> (Ws, Ws) {
    let admin = connect(format!("ws://{addr}/ws/admin?id=admin-1")).await;
    wait_until(|| state.router.admin_count() == 1).await;
    let client = connect(format!("ws://{addr}/ws/client?id=client-1&admin=admin-1")).await;
    wait_until(|| state.router.client_count() == 1).await;
    (admin, client)
}

#[tokio::test]
async fn test_client_frames_reach_admin_tagged() {
    let (addr, state) = spawn_relay().await;
    let (mut admin, mut client) = connected_pair(addr, &state).await;

    client
        .send(Message::binary(b"hello admin".to_vec()))
        .await
        .unwrap();
    assert_eq!(next_binary(&mut admin).await, b"client-1\nhello admin");
}

#[tokio::test]
async fn test_admin_frames_reach_client_untagged() {
    let (addr, state) = spawn_relay().await;
    let (mut admin, mut client) = connected_pair(addr, &state).await;

    admin
        .send(Message::binary(b"client-1\nhello\nclient".to_vec()))
        .await
        .unwrap();
    assert_eq!(next_binary(&mut client).await, b"hello\nclient");
}

#[tokio::test]
async fn test_untargeted_admin_frame_is_dropped() {
    let (addr, state) = spawn_relay().await;
    let (mut admin, mut client) = connected_pair(addr, &state).await;

    admin
        .send(Message::binary(b"nobody to send this to".to_vec()))
        .await
        .unwrap();
    admin
        .send(Message::binary(b"client-404\nlost".to_vec()))
        .await
        .unwrap();
    admin
        .send(Message::binary(b"client-1\nstill here".to_vec()))
        .await
        .unwrap();

    assert_eq!(next_binary(&mut client).await, b"still here");
}

#[tokio::test]
async fn test_disconnect_deregisters() {
    let (addr, state) = spawn_relay().await;
    let (mut admin, mut client) = connected_pair(addr, &state).await;

    client.close(None).await.unwrap();
    wait_until(|| state.router.client_count() == 0).await;
    assert_eq!(state.router.admin_count(), 1);

    admin.close(None).await.unwrap();
    wait_until(|| state.router.admin_count() == 0).await;
}

#[tokio::test]
async fn test_reconnect_survives_old_teardown() {
    let (addr, state) = spawn_relay().await;
    let (mut admin, mut old_client) = connected_pair(addr, &state).await;

    let mut new_client = connect(format!("ws://{addr}/ws/client?id=client-1&admin=admin-1")).await;
    // Give the replacement time to register before tearing down the original
    sleep(Duration::from_millis(100)).await;
    old_client.close(None).await.unwrap();
    sleep(Duration::from_millis(100)).await;
    assert_eq!(state.router.client_count(), 1);

    admin
        .send(Message::binary(b"client-1\nfor the new one".to_vec()))
        .await
        .unwrap();
    assert_eq!(next_binary(&mut new_client).await, b"for the new one");
}

#[tokio::test]
async fn test_missing_query_params_rejected() {
    let (addr, _state) = spawn_relay().await;

    assert!(connect_async(format!("ws://{addr}/ws/admin")).await.is_err());
    assert!(connect_async(format!("ws://{addr}/ws/admin?id=")).await.is_err());
    assert!(connect_async(format!("ws://{addr}/ws/client?id=client-1"))
        .await
        .is_err());
    assert!(connect_async(format!("ws://{addr}/ws/client?admin=admin-1"))
        .await
        .is_err());
}

#[tokio::test]
async fn test_shutdown_closes_connections() {
    let (addr, state) = spawn_relay().await;
    let (_admin, _client) = connected_pair(addr, &state).await;

    state.shutdown.cancel();
    wait_until(|| state.router.admin_count() == 0 && state.router.client_count() == 0).await;
}
