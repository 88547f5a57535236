//! Live-state subscriptions against a hand-driven SSE server.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use capgate::{
    CredentialStore, Gateway, LoginCredentials, stream::MAX_LINE_BYTES,
    testing::MockAuthorizationFlow,
};

use crate::common::{SseServer, eventually, init_tracing};

async fn logged_in_gateway(server: &SseServer) -> Gateway {
    init_tracing();
    let gateway = Gateway::builder()
        .url(server.url())
        .authorization_flow(MockAuthorizationFlow::new().with_user("alice", "pw"))
        .credential_store(CredentialStore::in_memory())
        .build()
        .expect("gateway");
    gateway
        .login(&LoginCredentials::new("alice", "pw"))
        .await
        .expect("login");
    gateway
}

fn counter() -> (Arc<AtomicUsize>, impl Fn() + Send + Sync + 'static) {
    let count = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&count);
    (count, move || {
        seen.fetch_add(1, Ordering::SeqCst);
    })
}

/// Test that state events notify and the channel carries the bearer token
#[tokio::test]
async fn test_state_events_notify() {
    let server = SseServer::start(200).await.expect("sse server");
    let gateway = logged_in_gateway(&server).await;
    let (count, on_notify) = counter();

    let subscription = gateway.subscribe_states(on_notify).expect("subscribe");
    assert!(eventually(|| subscription.is_active()).await, "channel should open");

    let head = server.last_request.lock().clone().unwrap_or_default().to_lowercase();
    assert!(head.starts_with("get /api/streams/states "));
    assert!(head.contains("authorization: bearer access-1"));
    assert!(head.contains("accept: text/event-stream"));

    server.send("event: state\ndata: {\"@id\":\"d1\"}\n\n");
    server.send("data: unnamed\n\n");
    server.send("event: heartbeat\ndata: ping\n\n");
    server.send(": comment only\n\n");
    assert!(eventually(|| count.load(Ordering::SeqCst) == 2).await);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 2, "other events are ignored");
}

/// Test that nothing is delivered after unsubscribe and the connection closes
#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let server = SseServer::start(200).await.expect("sse server");
    let gateway = logged_in_gateway(&server).await;
    let (count, on_notify) = counter();

    let subscription = gateway.subscribe_states(on_notify).expect("subscribe");
    assert!(eventually(|| subscription.is_active()).await);
    server.send("data: first\n\n");
    assert!(eventually(|| count.load(Ordering::SeqCst) == 1).await);

    subscription.unsubscribe();
    assert!(!subscription.is_active());

    server.send("data: second\n\n");
    server.send("event: state\ndata: third\n\n");
    assert!(eventually(|| server.client_disconnected()).await, "client should hang up");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    subscription.unsubscribe();
    assert_eq!(server.connections(), 1);
}

/// Test that dropping the subscription unsubscribes
#[tokio::test]
async fn test_drop_unsubscribes() {
    let server = SseServer::start(200).await.expect("sse server");
    let gateway = logged_in_gateway(&server).await;
    let (count, on_notify) = counter();

    let subscription = gateway.subscribe_states(on_notify).expect("subscribe");
    assert!(eventually(|| subscription.is_active()).await);
    drop(subscription);

    assert!(eventually(|| server.client_disconnected()).await);
    server.send("data: late\n\n");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

/// Test that a server-closed channel turns inactive and is not reopened
#[tokio::test]
async fn test_server_close_is_not_reconnected() {
    let server = SseServer::start(200).await.expect("sse server");
    let gateway = logged_in_gateway(&server).await;
    let (_count, on_notify) = counter();

    let subscription = gateway.subscribe_states(on_notify).expect("subscribe");
    let mut liveness = subscription.liveness();
    assert!(eventually(|| subscription.is_active()).await);

    server.close();
    let closed = tokio::time::timeout(Duration::from_secs(5), liveness.wait_for(|live| !*live))
        .await
        .expect("liveness should change")
        .is_ok();
    assert!(closed);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!subscription.is_active());
    assert_eq!(server.connections(), 1, "no reconnect attempt");
}

/// Test that a rejected channel stays inactive
#[tokio::test]
async fn test_rejected_channel_stays_inactive() {
    let server = SseServer::start(401).await.expect("sse server");
    let gateway = logged_in_gateway(&server).await;
    let (count, on_notify) = counter();

    let subscription = gateway.subscribe_states(on_notify).expect("subscribe");
    assert!(eventually(|| server.connections() == 1).await);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!subscription.is_active());
    assert_eq!(server.connections(), 1, "no reconnect attempt");
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

/// Test that an endless line ends the channel instead of buffering forever
#[tokio::test]
async fn test_oversized_line_closes_channel() {
    let server = SseServer::start(200).await.expect("sse server");
    let gateway = logged_in_gateway(&server).await;
    let (count, on_notify) = counter();

    let subscription = gateway.subscribe_states(on_notify).expect("subscribe");
    assert!(eventually(|| subscription.is_active()).await);

    server.send("data: ");
    server.send(&"x".repeat(MAX_LINE_BYTES + 1));
    assert!(eventually(|| !subscription.is_active()).await, "channel should close");
    assert!(eventually(|| server.client_disconnected()).await, "client should hang up");

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(server.connections(), 1, "no reconnect attempt");
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
