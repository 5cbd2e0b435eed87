//! Deadline-bounded store wrapper
//!
//! Every call into the backing store is raced against a fixed timeout so a
//! stalled backend cannot hold request workers indefinitely.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use super::traits::{Document, DocumentStore, Durability, StoredDocument};
use crate::error::{Result, WardenError};

/// Wraps a store so each operation fails with `StoreTimeout` past `timeout`
pub struct DeadlineStore {
    inner: Arc<dyn DocumentStore>,
    timeout: Duration,
}

impl DeadlineStore {
    pub fn new(inner: Arc<dyn DocumentStore>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                log::warn!(
                    "Store {} exceeded deadline of {}ms",
                    operation,
                    self.timeout.as_millis()
                );
                Err(WardenError::StoreTimeout {
                    operation,
                    timeout: self.timeout,
                })
            }
        }
    }
}

#[async_trait]
impl DocumentStore for DeadlineStore {
    async fn put(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        document: Document,
        durability: Durability,
    ) -> Result<()> {
        self.bounded("put", self.inner.put(table, kind, id, document, durability))
            .await
    }

    async fn insert(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        document: Document,
        durability: Durability,
    ) -> Result<bool> {
        self.bounded("insert", self.inner.insert(table, kind, id, document, durability))
            .await
    }

    async fn get(&self, table: &str, kind: &str, id: &str) -> Result<Option<Document>> {
        self.bounded("get", self.inner.get(table, kind, id)).await
    }

    async fn delete(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        durability: Durability,
    ) -> Result<bool> {
        self.bounded("delete", self.inner.delete(table, kind, id, durability))
            .await
    }

    async fn search(&self, table: &str, kind: &str) -> Result<Vec<StoredDocument>> {
        self.bounded("search", self.inner.search(table, kind)).await
    }
}
