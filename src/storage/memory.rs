//! In-memory document store for development and testing
//!
//! Writes requested with `Durability::Eventual` are buffered per table and
//! stay invisible to readers until the table is refreshed, either
//! explicitly or by the next `Durability::Immediate` write on it. This
//! mirrors the refresh behaviour of search-engine backed stores closely
//! enough to exercise visibility races in tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::traits::{Document, DocumentStore, Durability, StoredDocument};
use crate::error::{Result, WardenError};

type DocKey = (String, String);

#[derive(Default)]
struct Table {
    visible: HashMap<DocKey, Document>,
    // None marks a pending delete
    pending: HashMap<DocKey, Option<Document>>,
}

impl Table {
    fn refresh(&mut self) -> usize {
        let count = self.pending.len();
        for (key, op) in self.pending.drain() {
            match op {
                Some(doc) => {
                    self.visible.insert(key, doc);
                }
                None => {
                    self.visible.remove(&key);
                }
            }
        }
        count
    }

    fn latest_exists(&self, key: &DocKey) -> bool {
        match self.pending.get(key) {
            Some(op) => op.is_some(),
            None => self.visible.contains_key(key),
        }
    }
}

/// In-memory document store
pub struct MemoryDocumentStore {
    tables: Arc<RwLock<HashMap<String, Table>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create an empty table; no-op if it already exists
    pub async fn create_table(&self, table: &str) {
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default();
    }

    /// Drop a table with all of its documents, returning whether it existed
    pub async fn drop_table(&self, table: &str) -> bool {
        self.tables.write().await.remove(table).is_some()
    }

    /// Publish buffered writes of a table, returning how many were applied
    pub async fn refresh(&self, table: &str) -> usize {
        let mut tables = self.tables.write().await;
        match tables.get_mut(table) {
            Some(t) => t.refresh(),
            None => 0,
        }
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn put(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        document: Document,
        durability: Durability,
    ) -> Result<()> {
        if id.is_empty() {
            return Err(WardenError::ValidationError("Document id must not be empty".to_string()));
        }

        let mut tables = self.tables.write().await;
        let t = tables.entry(table.to_string()).or_default();
        t.pending
            .insert((kind.to_string(), id.to_string()), Some(document));
        if durability == Durability::Immediate {
            t.refresh();
        }
        Ok(())
    }

    async fn insert(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        document: Document,
        durability: Durability,
    ) -> Result<bool> {
        if id.is_empty() {
            return Err(WardenError::ValidationError("Document id must not be empty".to_string()));
        }

        let mut tables = self.tables.write().await;
        let t = tables.entry(table.to_string()).or_default();
        let key = (kind.to_string(), id.to_string());
        if t.latest_exists(&key) {
            return Ok(false);
        }
        t.pending.insert(key, Some(document));
        if durability == Durability::Immediate {
            t.refresh();
        }
        Ok(true)
    }

    async fn get(&self, table: &str, kind: &str, id: &str) -> Result<Option<Document>> {
        let tables = self.tables.read().await;
        Ok(tables
            .get(table)
            .and_then(|t| t.visible.get(&(kind.to_string(), id.to_string())))
            .cloned())
    }

    async fn delete(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        durability: Durability,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let t = match tables.get_mut(table) {
            Some(t) => t,
            None => return Ok(false),
        };

        let key = (kind.to_string(), id.to_string());
        let found = t.latest_exists(&key);
        if found {
            t.pending.insert(key, None);
        }
        if durability == Durability::Immediate {
            t.refresh();
        }
        Ok(found)
    }

    async fn search(&self, table: &str, kind: &str) -> Result<Vec<StoredDocument>> {
        let tables = self.tables.read().await;
        let t = tables
            .get(table)
            .ok_or_else(|| WardenError::TableNotFound(table.to_string()))?;

        Ok(t.visible
            .iter()
            .filter(|((k, _), _)| k == kind)
            .map(|((_, id), source)| StoredDocument {
                id: id.clone(),
                source: source.clone(),
            })
            .collect())
    }
}
