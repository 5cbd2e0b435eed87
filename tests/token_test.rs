use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use rusty_warden::config::AuthConfig;
use rusty_warden::error::{Result, WardenError};
use rusty_warden::service::AuthService;
use rusty_warden::storage::{
    Document, DocumentStore, Durability, MemoryDocumentStore, StoredDocument,
};

fn roles(names: &[&str]) -> Vec<String> {
    names.iter().map(|r| r.to_string()).collect()
}

/// Expired tokens are removed in the background; wait for it to land
async fn removed_eventually(store: &MemoryDocumentStore, id: &str) -> bool {
    for _ in 0..100 {
        if store.get("auth", "token", id).await.unwrap().is_none() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

fn stale_token() -> Document {
    let stale = Utc::now() - chrono::Duration::seconds(5);
    json!({"roles": ["admin"], "lastModified": stale})
        .as_object()
        .cloned()
        .unwrap()
}

fn service_with_timeout(timeout: Duration) -> (Arc<MemoryDocumentStore>, AuthService) {
    let store = Arc::new(MemoryDocumentStore::new());
    let config = AuthConfig {
        session_timeout: timeout,
        ..AuthConfig::default()
    };
    let service = AuthService::new(config, store.clone()).unwrap();
    (store, service)
}

#[tokio::test]
async fn test_token_grants_any_of_required_roles() {
    let (_store, service) = service_with_timeout(Duration::from_secs(60));
    let token = service.create_token(&roles(&["admin", "reader"])).await.unwrap();

    assert!(service.authenticate(&token, &roles(&["admin"])).await.unwrap());
    assert!(service.authenticate(&token, &roles(&["writer", "reader"])).await.unwrap());
    assert!(!service.authenticate(&token, &roles(&["writer"])).await.unwrap());
    assert!(!service.authenticate(&token, &[]).await.unwrap());
}

#[tokio::test]
async fn test_unknown_token_is_rejected() {
    let (_store, service) = service_with_timeout(Duration::from_secs(60));
    assert!(!service.authenticate("no-such-token", &roles(&["admin"])).await.unwrap());
}

#[tokio::test]
async fn test_token_expires_after_idle_timeout() {
    let (store, service) = service_with_timeout(Duration::from_millis(100));
    let token = service.create_token(&roles(&["admin"])).await.unwrap();

    assert!(service.authenticate(&token, &roles(&["admin"])).await.unwrap());

    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(!service.authenticate(&token, &roles(&["admin"])).await.unwrap());
    // Expired record is cleaned up after access
    assert!(removed_eventually(&store, &token).await);
    assert!(!service.authenticate(&token, &roles(&["admin"])).await.unwrap());
}

#[tokio::test]
async fn test_record_without_timestamp_is_expired_and_removed() {
    let (store, service) = service_with_timeout(Duration::from_secs(60));
    let doc = json!({"roles": ["admin"]}).as_object().cloned().unwrap();
    store
        .put("auth", "token", "legacy", doc, Durability::Immediate)
        .await
        .unwrap();

    assert!(!service.authenticate("legacy", &roles(&["admin"])).await.unwrap());
    assert!(removed_eventually(&store, "legacy").await);
}

#[tokio::test]
async fn test_stale_record_is_expired() {
    let (store, service) = service_with_timeout(Duration::from_millis(1000));
    store
        .put("auth", "token", "stale", stale_token(), Durability::Immediate)
        .await
        .unwrap();

    assert!(!service.authenticate("stale", &roles(&["admin"])).await.unwrap());
    assert!(removed_eventually(&store, "stale").await);
}

#[tokio::test]
async fn test_delete_token() {
    let (_store, service) = service_with_timeout(Duration::from_secs(60));
    let token = service.create_token(&roles(&["admin"])).await.unwrap();

    service.delete_token(&token).await.unwrap();
    assert!(!service.authenticate(&token, &roles(&["admin"])).await.unwrap());

    match service.delete_token(&token).await {
        Err(WardenError::TokenNotFound(_)) => {}
        other => panic!("expected TokenNotFound, got {:?}", other),
    }
}

#[tokio::test]
async fn test_tokens_use_configured_location() {
    let store = Arc::new(MemoryDocumentStore::new());
    let config = AuthConfig {
        token_table: "sessions".to_string(),
        token_kind: "session".to_string(),
        ..AuthConfig::default()
    };
    let service = AuthService::new(config, store.clone()).unwrap();
    let token = service.create_token(&roles(&["admin"])).await.unwrap();

    let raw = store.get("sessions", "session", &token).await.unwrap().unwrap();
    assert_eq!(raw.get("roles"), Some(&json!(["admin"])));
    assert!(raw.contains_key("lastModified"));
}

#[tokio::test]
async fn test_concurrent_create_then_validate() {
    let (_store, service) = service_with_timeout(Duration::from_secs(60));
    let service = Arc::new(service);

    let handles: Vec<_> = (0..64)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                let role = format!("role{}", i % 4);
                let token = service.create_token(&[role.clone()]).await.unwrap();
                service.authenticate(&token, &[role]).await.unwrap()
            })
        })
        .collect();

    let results = futures_util::future::join_all(handles).await;
    assert!(results.into_iter().all(|r| r.unwrap()));
}

/// Memory store whose deletes either fail or never complete
struct BrokenDeletes {
    inner: MemoryDocumentStore,
    stall: bool,
}

#[async_trait]
impl DocumentStore for BrokenDeletes {
    async fn put(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        document: Document,
        durability: Durability,
    ) -> Result<()> {
        self.inner.put(table, kind, id, document, durability).await
    }

    async fn insert(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        document: Document,
        durability: Durability,
    ) -> Result<bool> {
        self.inner.insert(table, kind, id, document, durability).await
    }

    async fn get(&self, table: &str, kind: &str, id: &str) -> Result<Option<Document>> {
        self.inner.get(table, kind, id).await
    }

    async fn delete(&self, _: &str, _: &str, _: &str, _: Durability) -> Result<bool> {
        if self.stall {
            std::future::pending().await
        } else {
            Err(WardenError::StorageError("delete refused".to_string()))
        }
    }

    async fn search(&self, table: &str, kind: &str) -> Result<Vec<StoredDocument>> {
        self.inner.search(table, kind).await
    }
}

async fn service_with_broken_deletes(stall: bool) -> (Arc<BrokenDeletes>, AuthService) {
    let store = Arc::new(BrokenDeletes {
        inner: MemoryDocumentStore::new(),
        stall,
    });
    store
        .put("auth", "token", "stale", stale_token(), Durability::Immediate)
        .await
        .unwrap();
    let config = AuthConfig {
        session_timeout: Duration::from_millis(1000),
        store_timeout: Duration::from_secs(2),
        ..AuthConfig::default()
    };
    let service = AuthService::new(config, store.clone()).unwrap();
    (store, service)
}

#[tokio::test]
async fn test_failed_cleanup_still_rejects_expired_token() {
    let (store, service) = service_with_broken_deletes(false).await;

    assert!(!service.authenticate("stale", &roles(&["admin"])).await.unwrap());
    tokio::time::sleep(Duration::from_millis(20)).await;

    // The delete failed, so the record stays but keeps being rejected
    assert!(store.get("auth", "token", "stale").await.unwrap().is_some());
    assert!(!service.authenticate("stale", &roles(&["admin"])).await.unwrap());
}

#[tokio::test]
async fn test_stalled_cleanup_does_not_delay_answer() {
    let (_store, service) = service_with_broken_deletes(true).await;

    let started = Instant::now();
    let result = service.authenticate("stale", &roles(&["admin"])).await;
    let elapsed = started.elapsed();

    assert!(matches!(result, Ok(false)));
    assert!(elapsed < Duration::from_millis(500), "took {:?}", elapsed);

    let started = Instant::now();
    assert!(!service.authenticate("stale", &roles(&["admin"])).await.unwrap());
    assert!(started.elapsed() < Duration::from_millis(500));
}
