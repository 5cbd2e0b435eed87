use std::sync::Arc;

use serde_json::{json, Value};

use rusty_warden::config::AuthConfig;
use rusty_warden::constraint::{ConstraintOrder, PathMatch};
use rusty_warden::error::WardenError;
use rusty_warden::service::{AccessDecision, AuthService};
use rusty_warden::storage::{DocumentStore, Durability, MemoryDocumentStore};

async fn put_constraint(store: &MemoryDocumentStore, id: &str, record: Value) {
    let doc = record.as_object().cloned().unwrap();
    store
        .put("security", "constraint", id, doc, Durability::Immediate)
        .await
        .unwrap();
}

fn service(store: &Arc<MemoryDocumentStore>, order: ConstraintOrder, path_match: PathMatch) -> AuthService {
    let config = AuthConfig {
        constraint_order: order,
        path_match,
        ..AuthConfig::default()
    };
    AuthService::new(config, store.clone()).unwrap()
}

fn paths(service: &AuthService) -> Vec<String> {
    service
        .constraints()
        .constraints()
        .iter()
        .map(|c| c.path.clone())
        .collect()
}

#[tokio::test]
async fn test_reload_expands_and_sorts() {
    let store = Arc::new(MemoryDocumentStore::new());
    put_constraint(
        &store,
        "c1",
        json!({"paths": ["/index/_search", "/b"], "roles": ["reader"], "authenticator": "index"}),
    )
    .await;
    put_constraint(
        &store,
        "c2",
        json!({"paths": ["/a", "/admin"], "roles": ["admin"], "authenticator": "index"}),
    )
    .await;
    put_constraint(
        &store,
        "c3",
        json!({"paths": ["/"], "roles": ["any"], "authenticator": "index"}),
    )
    .await;

    let service = service(&store, ConstraintOrder::ShortestFirst, PathMatch::Prefix);
    let stats = service.start().await.unwrap();

    assert_eq!(stats.accepted, 3);
    assert_eq!(stats.skipped, 0);
    assert_eq!(stats.constraints, 5);
    assert_eq!(paths(&service), vec!["/", "/a", "/b", "/admin", "/index/_search"]);

    let admin = service
        .constraints()
        .constraints()
        .iter()
        .find(|c| c.path == "/admin")
        .cloned()
        .unwrap();
    assert_eq!(admin.roles, vec!["admin"]);
    assert_eq!(admin.authenticator, "index");
}

#[tokio::test]
async fn test_malformed_records_are_skipped() {
    let store = Arc::new(MemoryDocumentStore::new());
    put_constraint(
        &store,
        "good",
        json!({"paths": ["/a"], "roles": ["r1"], "authenticator": "index"}),
    )
    .await;
    put_constraint(
        &store,
        "no-roles",
        json!({"paths": ["/b"], "roles": [], "authenticator": "index"}),
    )
    .await;
    put_constraint(
        &store,
        "no-paths",
        json!({"roles": ["r1"], "authenticator": "index"}),
    )
    .await;
    put_constraint(
        &store,
        "bad-auth",
        json!({"paths": ["/c"], "roles": ["r1"], "authenticator": "ldap"}),
    )
    .await;
    put_constraint(
        &store,
        "also-good",
        json!({"paths": ["/d"], "roles": ["r2"], "authenticator": "index"}),
    )
    .await;

    let service = service(&store, ConstraintOrder::ShortestFirst, PathMatch::Prefix);
    let stats = service.start().await.unwrap();

    assert_eq!(stats.accepted, 2);
    assert_eq!(stats.skipped, 3);
    assert_eq!(paths(&service), vec!["/a", "/d"]);
}

#[tokio::test]
async fn test_empty_path_covers_every_request() {
    let store = Arc::new(MemoryDocumentStore::new());
    put_constraint(
        &store,
        "everything",
        json!({"paths": [""], "roles": ["staff"], "authenticator": "index"}),
    )
    .await;

    let service = service(&store, ConstraintOrder::ShortestFirst, PathMatch::Prefix);
    let stats = service.start().await.unwrap();

    assert_eq!(stats.accepted, 1);
    assert_eq!(service.match_constraint("/any/path").unwrap().roles, vec!["staff"]);
    assert!(service.match_constraint("").is_some());
}

#[tokio::test]
async fn test_missing_backing_is_fatal() {
    let store = Arc::new(MemoryDocumentStore::new());
    let service = service(&store, ConstraintOrder::ShortestFirst, PathMatch::Prefix);

    match service.start().await {
        Err(WardenError::ConstraintBackingMissing { table, kind }) => {
            assert_eq!(table, "security");
            assert_eq!(kind, "constraint");
        }
        other => panic!("expected ConstraintBackingMissing, got {:?}", other),
    }
    assert!(service.constraints().is_empty());
}

#[tokio::test]
async fn test_failed_reload_keeps_previous_set() {
    let store = Arc::new(MemoryDocumentStore::new());
    put_constraint(
        &store,
        "c1",
        json!({"paths": ["/a"], "roles": ["r1"], "authenticator": "index"}),
    )
    .await;

    let service = service(&store, ConstraintOrder::ShortestFirst, PathMatch::Prefix);
    service.start().await.unwrap();

    store.drop_table("security").await;
    assert!(service.reload().await.is_err());
    assert_eq!(paths(&service), vec!["/a"]);
}

#[tokio::test]
async fn test_reload_picks_up_changes() {
    let store = Arc::new(MemoryDocumentStore::new());
    store.create_table("security").await;

    let service = service(&store, ConstraintOrder::ShortestFirst, PathMatch::Prefix);
    assert_eq!(service.start().await.unwrap().constraints, 0);
    assert!(service.match_constraint("/a").is_none());

    put_constraint(
        &store,
        "c1",
        json!({"paths": ["/a"], "roles": ["r1"], "authenticator": "index"}),
    )
    .await;
    let before = service.constraints();
    service.reload().await.unwrap();

    // A snapshot taken before the reload is unaffected by it
    assert!(before.is_empty());
    assert_eq!(service.match_constraint("/a").unwrap().roles, vec!["r1"]);
}

async fn two_rule_store() -> Arc<MemoryDocumentStore> {
    let store = Arc::new(MemoryDocumentStore::new());
    put_constraint(
        &store,
        "c1",
        json!({"paths": ["/a"], "roles": ["r1"], "authenticator": "index"}),
    )
    .await;
    put_constraint(
        &store,
        "c2",
        json!({"paths": ["/ab"], "roles": ["r2"], "authenticator": "index"}),
    )
    .await;
    store
}

#[tokio::test]
async fn test_shortest_first_prefix_matches_broader_rule() {
    let store = two_rule_store().await;
    let service = service(&store, ConstraintOrder::ShortestFirst, PathMatch::Prefix);
    service.start().await.unwrap();

    assert_eq!(paths(&service), vec!["/a", "/ab"]);
    // "/ab" starts with "/a", and "/a" sorts first
    assert_eq!(service.match_constraint("/ab").unwrap().roles, vec!["r1"]);
    assert!(service.match_constraint("/b").is_none());
}

#[tokio::test]
async fn test_longest_first_prefix_matches_specific_rule() {
    let store = two_rule_store().await;
    let service = service(&store, ConstraintOrder::LongestFirst, PathMatch::Prefix);
    service.start().await.unwrap();

    assert_eq!(paths(&service), vec!["/ab", "/a"]);
    assert_eq!(service.match_constraint("/ab").unwrap().roles, vec!["r2"]);
    assert_eq!(service.match_constraint("/a/x").unwrap().roles, vec!["r1"]);
}

#[tokio::test]
async fn test_exact_match_policy() {
    let store = two_rule_store().await;
    let service = service(&store, ConstraintOrder::ShortestFirst, PathMatch::Exact);
    service.start().await.unwrap();

    assert_eq!(service.match_constraint("/ab").unwrap().roles, vec!["r2"]);
    assert!(service.match_constraint("/abc").is_none());
}

#[tokio::test]
async fn test_authorize_decisions() {
    let store = two_rule_store().await;
    let service = service(&store, ConstraintOrder::LongestFirst, PathMatch::Prefix);
    service.start().await.unwrap();

    let r2 = service.create_token(&["r2".to_string()]).await.unwrap();

    assert_eq!(
        service.authorize("/open", None).await.unwrap(),
        AccessDecision::Unconstrained
    );
    assert!(matches!(
        service.authorize("/ab", Some(r2.as_str())).await.unwrap(),
        AccessDecision::Granted(_)
    ));
    let denied = service.authorize("/a", Some(r2.as_str())).await.unwrap();
    assert!(matches!(denied, AccessDecision::Denied(_)));
    assert!(!denied.is_allowed());
    assert!(matches!(
        service.authorize("/ab", None).await.unwrap(),
        AccessDecision::Denied(_)
    ));
}

#[tokio::test]
async fn test_matching_during_concurrent_reloads() {
    let store = two_rule_store().await;
    let service = Arc::new(service(&store, ConstraintOrder::ShortestFirst, PathMatch::Prefix));
    service.start().await.unwrap();

    let reloader = {
        let service = Arc::clone(&service);
        tokio::spawn(async move {
            for _ in 0..50 {
                service.reload().await.unwrap();
            }
        })
    };

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                for _ in 0..200 {
                    // Every snapshot is complete, never half-built
                    let snapshot = service.constraints();
                    assert_eq!(snapshot.len(), 2);
                    assert_eq!(snapshot.find("/ab").unwrap().path, "/a");
                    tokio::task::yield_now().await;
                }
            })
        })
        .collect();

    reloader.await.unwrap();
    for reader in futures_util::future::join_all(readers).await {
        reader.unwrap();
    }
}
