//! Handshakes and encrypted traffic through a shared Router.

use std::sync::Arc;
use std::time::Duration;

use decidr_crypto::{
    generate_admin_client_pair, perform, CancellationToken, ChannelPeer, HandshakeOutcome, Peer,
    PeerKind, RouteError, Router, SecurePeer,
};
use tokio::time::timeout;

const TEST_TIMEOUT: Duration = Duration::from_secs(2);

/// Wire one admin/client pair through `router` and start the forwarding
/// loops the relay would run. Returns the endpoint-side peers.
fn setup_pair(
    router: &Arc<Router>,
    cancel: &CancellationToken,
    admin_id: &str,
    client_id: &str,
) -> (Arc<ChannelPeer>, Arc<ChannelPeer>) {
    let (admin_side, relay_admin) = ChannelPeer::pair(4);
    let (client_side, relay_client) = ChannelPeer::pair(4);
    let relay_admin: Arc<dyn Peer> = Arc::new(relay_admin);
    let relay_client: Arc<dyn Peer> = Arc::new(relay_client);

    router.register_admin(admin_id, relay_admin.clone());
    router.register_client(client_id, relay_client.clone());

    {
        let router = router.clone();
        let cancel = cancel.clone();
        let client_id = client_id.to_string();
        tokio::spawn(async move {
            while let Ok(msg) = relay_admin.receive(&cancel).await {
                let _ = router.route_to_client(&cancel, &client_id, &msg).await;
            }
        });
    }
    {
        let router = router.clone();
        let cancel = cancel.clone();
        let admin_id = admin_id.to_string();
        tokio::spawn(async move {
            while let Ok(msg) = relay_client.receive(&cancel).await {
                let _ = router.route_to_admin(&cancel, &admin_id, &msg).await;
            }
        });
    }

    (Arc::new(admin_side), Arc::new(client_side))
}

async fn handshake_through(
    admin_side: Arc<ChannelPeer>,
    client_side: Arc<ChannelPeer>,
    cancel: &CancellationToken,
) -> (HandshakeOutcome, HandshakeOutcome) {
    let (client_id, admin_id) = generate_admin_client_pair().unwrap();

    let client = {
        let cancel = cancel.clone();
        tokio::spawn(async move { perform(&cancel, &*client_side, &client_id).await })
    };
    let admin = {
        let cancel = cancel.clone();
        tokio::spawn(async move { perform(&cancel, &*admin_side, &admin_id).await })
    };

    let client = timeout(TEST_TIMEOUT, client).await.unwrap().unwrap();
    let admin = timeout(TEST_TIMEOUT, admin).await.unwrap().unwrap();
    (
        admin.expect("admin handshake failed"),
        client.expect("client handshake failed"),
    )
}

#[tokio::test]
async fn test_e2e_handshake_through_router() {
    let router = Arc::new(Router::new());
    let cancel = CancellationToken::new();

    let (admin_side, client_side) = setup_pair(&router, &cancel, "admin-1", "client-1");
    let (admin, client) = handshake_through(admin_side, client_side, &cancel).await;

    assert_eq!(client.fingerprint, admin.fingerprint);
    cancel.cancel();
}

#[tokio::test]
async fn test_multiple_admins_handshake() {
    let router = Arc::new(Router::new());
    let cancel = CancellationToken::new();

    let (a1, c1) = setup_pair(&router, &cancel, "admin-1", "client-1");
    let (a2, c2) = setup_pair(&router, &cancel, "admin-2", "client-2");
    assert_eq!(router.admin_count(), 2);
    assert_eq!(router.client_count(), 2);

    let (pair1, pair2) = tokio::join!(
        handshake_through(a1, c1, &cancel),
        handshake_through(a2, c2, &cancel),
    );

    assert_eq!(pair1.0.fingerprint, pair1.1.fingerprint);
    assert_eq!(pair2.0.fingerprint, pair2.1.fingerprint);
    assert_ne!(
        pair1.0.fingerprint, pair2.0.fingerprint,
        "different admin pairs produced identical handshake hashes"
    );
    cancel.cancel();
}

#[tokio::test]
async fn test_post_handshake_communication_through_router() {
    let router = Arc::new(Router::new());
    let cancel = CancellationToken::new();

    let (admin_side, client_side) = setup_pair(&router, &cancel, "admin-1", "client-1");
    let (admin, client) =
        handshake_through(admin_side.clone(), client_side.clone(), &cancel).await;

    let admin = SecurePeer::new(admin_side, admin);
    let client = SecurePeer::new(client_side, client);

    // Client -> Admin
    client.send(&cancel, b"secret vote cast").await.unwrap();
    let received = timeout(TEST_TIMEOUT, admin.receive(&cancel))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, b"secret vote cast");

    // Admin -> Client
    admin.send(&cancel, b"confirmation: received").await.unwrap();
    let received = timeout(TEST_TIMEOUT, client.receive(&cancel))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(received, b"confirmation: received");

    cancel.cancel();
}

#[tokio::test]
async fn test_unregistered_route_does_not_disturb_others() {
    let router = Arc::new(Router::new());
    let cancel = CancellationToken::new();

    let (admin_side, client_side) = setup_pair(&router, &cancel, "admin-1", "client-1");

    let err = router
        .route_to_admin(&cancel, "admin-404", b"lost")
        .await
        .unwrap_err();
    assert!(matches!(err, RouteError::NotFound { kind: PeerKind::Admin, .. }));
    let err = router
        .route_to_client(&cancel, "client-404", b"lost")
        .await
        .unwrap_err();
    assert!(matches!(err, RouteError::NotFound { kind: PeerKind::Client, .. }));

    // The registered pair still works end to end
    let (admin, client) = handshake_through(admin_side, client_side, &cancel).await;
    assert_eq!(admin.fingerprint, client.fingerprint);
    cancel.cancel();
}

#[tokio::test]
async fn test_disconnect_cleanup() {
    let router = Arc::new(Router::new());
    let cancel = CancellationToken::new();

    let (_admin_side, _client_side) = setup_pair(&router, &cancel, "admin-1", "client-1");

    router.remove_client("client-1");
    router.remove_client("client-1");
    router.remove_admin("admin-1");
    router.remove_admin("never-registered");

    assert_eq!(router.admin_count(), 0);
    assert_eq!(router.client_count(), 0);
    assert!(router
        .route_to_client(&cancel, "client-1", b"gone")
        .await
        .is_err());
    cancel.cancel();
}
