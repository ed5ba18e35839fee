//! Integration Tests for Remote Sharding
//!
//! Spreads a keyspace over two live servers through `RemoteCache`.

use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use layercache::cache::{Sharder, Value};
use layercache::{api::create_router, AppState, Cache, CacheBuilder, CacheError, Credentials, RemoteCache};
use serde_json::json;

// == Helper Functions ==

async fn spawn_server(credentials: Option<Credentials>) -> (SocketAddr, Arc<dyn Cache>) {
    let cache = CacheBuilder::new().shards(2).build().await.unwrap();
    let mut state = AppState::new(cache.clone());
    if let Some(credentials) = credentials {
        state = state.with_credentials(credentials);
    }

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, create_router(state)).await.unwrap();
    });
    (addr, cache)
}

fn remote(addr: SocketAddr, credentials: Option<Credentials>) -> Arc<dyn Cache> {
    let base = format!("http://{}", addr);
    Arc::new(RemoteCache::new(&base, StdDuration::from_secs(5), credentials).unwrap())
}

#[tokio::test]
async fn test_sharder_over_remote_caches() {
    let (left_addr, left) = spawn_server(None).await;
    let (right_addr, right) = spawn_server(None).await;
    let sharder = Sharder::over(vec![remote(left_addr, None), remote(right_addr, None)], None, false).unwrap();

    let keys: Vec<String> = (0..20).map(|i| format!("key {}", i)).collect();
    for key in &keys {
        let entry = sharder.set(key, Value::from(key.as_str()), Duration::zero()).await.unwrap();
        assert_eq!(entry.expires, 0);
    }

    // Each server holds exactly the keys routed to it.
    let on_left: BTreeSet<String> = left.keys().await.unwrap().into_iter().collect();
    let on_right: BTreeSet<String> = right.keys().await.unwrap().into_iter().collect();
    assert!(on_left.is_disjoint(&on_right));
    for key in &keys {
        let owner = if sharder.shard_index(key) == 0 { &on_left } else { &on_right };
        assert!(owner.contains(key), "{} on wrong server", key);
    }

    let all: BTreeSet<String> = sharder.keys().await.unwrap().into_iter().collect();
    assert_eq!(all, keys.iter().cloned().collect());

    assert_eq!(sharder.get("key 3").await.unwrap().data, Value::from("key 3"));
    sharder.remove("key 3").await.unwrap();
    assert!(matches!(sharder.get("key 3").await, Err(CacheError::KeyNotFound)));
}

#[tokio::test]
async fn test_remote_errors_keep_their_kind() {
    let (addr, _) = spawn_server(None).await;
    let cache = remote(addr, None);

    let list = Value::try_from(json!(["a", {"b": 1}])).unwrap();
    cache.set("list/with/slashes", list, Duration::minutes(1)).await.unwrap();

    assert_eq!(cache.get_at_index("list/with/slashes", "1").await.unwrap(), json!({"b": 1}));
    assert!(matches!(
        cache.get_at_index("list/with/slashes", "9").await,
        Err(CacheError::IndexAccess(_))
    ));
    assert!(matches!(
        cache.set("k", Value::from("v"), Duration::seconds(-1)).await,
        Err(CacheError::InvalidTtl)
    ));
    assert!(matches!(cache.get("absent").await, Err(CacheError::KeyNotFound)));
}

#[tokio::test]
async fn test_remote_ttl_expires_on_server() {
    let (addr, local) = spawn_server(None).await;
    let cache = remote(addr, None);

    let entry = cache.set("short", Value::from("v"), Duration::milliseconds(50)).await.unwrap();
    assert!(entry.expires > 0);

    tokio::time::sleep(StdDuration::from_millis(200)).await;
    assert!(local.keys().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remote_basic_auth() {
    let creds = Credentials::new("user", "pass");
    let (addr, _) = spawn_server(Some(creds.clone())).await;

    let authorized = remote(addr, Some(creds));
    authorized.set("k", Value::from("v"), Duration::zero()).await.unwrap();
    assert_eq!(authorized.keys().await.unwrap(), vec!["k".to_string()]);

    let anonymous = remote(addr, None);
    assert!(matches!(anonymous.keys().await, Err(CacheError::Remote(_))));
}
