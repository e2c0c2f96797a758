//! Subscription lifecycle tests
//!
//! The binder decides when the shared connection exists. These tests watch
//! what the in-memory server side sees as subscriptions come and go.

use k8slab::models::{AuthToken, CachedResource, CollectionKey, ResourceStatus};
use k8slab::services::{Interest, SubscriptionBinder};
use k8slab::transport::{
    CloseCode, ConnectionConfig, ConnectionState, ConnectionStatus, DisconnectReason, FrameCodec,
    MemoryConnector, OutboundFrame, ReconnectPolicy, RemoteEnd, TransportError,
};
use k8slab::watcher::{CacheEvent, CacheSink, ResourceCache};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use url::Url;

const WAIT: Duration = Duration::from_secs(120);

fn config() -> ConnectionConfig {
    ConnectionConfig {
        endpoint: Url::parse("ws://lab.test/ws").unwrap(),
        policy: ReconnectPolicy {
            base_delay: Duration::from_millis(1000),
            max_attempts: 3,
        },
        codec: FrameCodec::Envelope,
    }
}

fn token() -> AuthToken {
    AuthToken::new("secret").unwrap()
}

struct Fixture {
    connector: Arc<MemoryConnector>,
    remotes: mpsc::UnboundedReceiver<RemoteEnd>,
    binder: SubscriptionBinder,
    setups: Arc<AtomicUsize>,
}

fn fixture(token: Option<AuthToken>) -> Fixture {
    let (connector, remotes) = MemoryConnector::new();
    let connector = Arc::new(connector);
    let setups = Arc::new(AtomicUsize::new(0));
    let counter = setups.clone();
    let binder = SubscriptionBinder::new(connector.clone(), config(), token, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    Fixture {
        connector,
        remotes,
        binder,
        setups,
    }
}

async fn next_remote(remotes: &mut mpsc::UnboundedReceiver<RemoteEnd>) -> RemoteEnd {
    timeout(WAIT, remotes.recv())
        .await
        .expect("timed out waiting for a connect")
        .expect("connector dropped")
}

async fn next_frame(remote: &mut RemoteEnd) -> Option<OutboundFrame> {
    timeout(WAIT, remote.recv())
        .await
        .expect("timed out waiting for a frame")
}

fn status_rx(binder: &SubscriptionBinder) -> watch::Receiver<ConnectionStatus> {
    binder
        .connection_handle()
        .expect("binder should hold a connection")
        .watch()
}

async fn wait_status(
    rx: &mut watch::Receiver<ConnectionStatus>,
    pred: impl FnMut(&ConnectionStatus) -> bool,
) {
    timeout(WAIT, rx.wait_for(pred))
        .await
        .expect("timed out waiting for status")
        .expect("connection actor stopped");
}

#[tokio::test(start_paused = true)]
async fn test_subscriptions_share_one_connection() {
    let mut fx = fixture(Some(token()));

    let clusters = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let teams = fx.binder.subscribe(Interest::Collection(CollectionKey::Teams));
    assert!(clusters.is_active());
    assert!(teams.is_active());
    assert_eq!(fx.binder.active_count(), 2);

    let mut remote = next_remote(&mut fx.remotes).await;
    assert_eq!(remote.token().as_deref(), Some("secret"));
    let mut status = status_rx(&fx.binder);
    wait_status(&mut status, |s| s.state == ConnectionState::Open).await;

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fx.connector.attempts(), 1);
    assert_eq!(fx.setups.load(Ordering::SeqCst), 1);

    // Disposing one of two keeps the connection
    clusters.dispose();
    assert!(!clusters.is_active());
    assert!(fx.binder.has_connection());
    assert!(remote.try_recv().is_none());

    // Disposing the last closes it normally
    teams.dispose();
    assert!(!fx.binder.has_connection());
    assert_eq!(
        next_frame(&mut remote).await,
        Some(OutboundFrame::Close(
            CloseCode::NORMAL,
            "no active subscriptions".to_string()
        ))
    );
}

#[tokio::test(start_paused = true)]
async fn test_dispose_is_idempotent() {
    let mut fx = fixture(Some(token()));
    let first = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let second = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let _remote = next_remote(&mut fx.remotes).await;

    first.dispose();
    first.dispose();
    drop(first);

    assert_eq!(fx.binder.active_count(), 1);
    assert!(second.is_active());
    assert!(fx.binder.has_connection());
}

#[tokio::test(start_paused = true)]
async fn test_dropping_last_handle_closes_connection() {
    let mut fx = fixture(Some(token()));
    let handle = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let mut remote = next_remote(&mut fx.remotes).await;
    let mut status = status_rx(&fx.binder);
    wait_status(&mut status, |s| s.state == ConnectionState::Open).await;

    drop(handle);

    assert!(matches!(
        next_frame(&mut remote).await,
        Some(OutboundFrame::Close(CloseCode::NORMAL, _))
    ));
    wait_status(&mut status, |s| s.is_terminal()).await;
}

#[tokio::test(start_paused = true)]
async fn test_no_token_means_no_connection() {
    let fx = fixture(None);

    let handle = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let again = fx.binder.subscribe(Interest::Terminal("c1".to_string()));

    assert!(!handle.is_active());
    assert!(!again.is_active());
    assert_eq!(handle.interest(), &Interest::Collection(CollectionKey::Clusters));
    assert!(!fx.binder.has_connection());
    assert_eq!(fx.binder.active_count(), 0);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(fx.connector.attempts(), 0);
    assert_eq!(fx.setups.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_logout_closes_and_deactivates_everything() {
    let mut fx = fixture(Some(token()));
    let a = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let b = fx.binder.subscribe(Interest::Terminal("c1".to_string()));
    let mut remote = next_remote(&mut fx.remotes).await;
    let mut status = status_rx(&fx.binder);
    wait_status(&mut status, |s| s.state == ConnectionState::Open).await;

    fx.binder.logout();

    assert_eq!(
        next_frame(&mut remote).await,
        Some(OutboundFrame::Close(CloseCode::NORMAL, "logout".to_string()))
    );
    assert!(!a.is_active());
    assert!(!b.is_active());
    assert!(fx.binder.token().is_none());
    assert!(!fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters)).is_active());

    // Old handles disposing later must not disturb a new identity
    fx.binder.login(AuthToken::new("fresh").unwrap());
    let c = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let fresh = next_remote(&mut fx.remotes).await;
    assert_eq!(fresh.token().as_deref(), Some("fresh"));
    drop(a);
    drop(b);
    assert!(c.is_active());
    assert!(fx.binder.has_connection());
}

#[tokio::test(start_paused = true)]
async fn test_rejected_handshake_stops_subscribing() {
    let fx = fixture(Some(token()));
    fx.connector.fail_next(TransportError::Unauthorized(401));

    let handle = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let mut status = status_rx(&fx.binder);
    wait_status(&mut status, |s| {
        s.outcome == Some(DisconnectReason::Unauthorized)
    })
    .await;

    assert!(fx.binder.is_rejected());
    assert!(fx.binder.token().is_none());
    assert!(!handle.is_active());
    assert!(!fx.binder.has_connection());

    let later = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    assert!(!later.is_active());

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(fx.connector.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_ended_connection_is_reopened_for_new_interest() {
    let mut fx = fixture(Some(token()));
    let first = fx.binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let remote = next_remote(&mut fx.remotes).await;
    let mut status = status_rx(&fx.binder);
    wait_status(&mut status, |s| s.state == ConnectionState::Open).await;

    // A normal server close is final for the current connection
    remote.close(CloseCode::NORMAL);
    wait_status(&mut status, |s| {
        s.outcome == Some(DisconnectReason::RemoteClosed)
    })
    .await;
    assert!(first.is_active());

    let _second = fx.binder.subscribe(Interest::Collection(CollectionKey::Teams));
    let _reopened = next_remote(&mut fx.remotes).await;
    wait_status(&mut status, |s| s.state == ConnectionState::Open).await;

    assert_eq!(fx.connector.attempts(), 2);
    // Same connection object, so setup ran once
    assert_eq!(fx.setups.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_setup_handlers_feed_the_cache() {
    let (connector, mut remotes) = MemoryConnector::new();
    let cache = ResourceCache::new();
    cache.apply(CacheEvent::Seeded {
        collection: CollectionKey::Clusters,
        records: vec![CachedResource::new("c1", Some(ResourceStatus::Provisioning))],
    });
    let sink_cache = cache.clone();
    let binder = SubscriptionBinder::new(Arc::new(connector), config(), Some(token()), move |c| {
        c.on_frame(CacheSink::new(sink_cache.clone()));
    });

    let _handle = binder.subscribe(Interest::Collection(CollectionKey::Clusters));
    let remote = next_remote(&mut remotes).await;
    let mut changes = cache.changes();
    changes.borrow_and_update();

    remote.send_text(r#"{"type": "cluster_status_update", "payload": {"cluster_id": "c1", "status": "RUNNING"}}"#);

    timeout(WAIT, changes.changed())
        .await
        .expect("timed out waiting for a cache change")
        .unwrap();
    assert_eq!(
        cache.get(CollectionKey::Clusters, "c1").and_then(|r| r.status),
        Some(ResourceStatus::Running)
    );
}
