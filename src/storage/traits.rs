//! Abstract document store interface for pluggable backends
//!
//! Tokens, users and constraint records all live in a key/value document
//! store addressed by `(table, kind, id)`. The backing store guarantees
//! per-key atomicity; nothing above it takes locks around token records.

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::Result;

/// A stored document: a JSON object
pub type Document = Map<String, Value>;

/// Write visibility requested from the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Durability {
    /// Visible to every subsequent read before the call returns
    Immediate,
    /// May become visible later (after the store refreshes)
    Eventual,
}

/// A document returned by a search together with its id
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub source: Document,
}

/// Document store interface
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Create or replace a document
    async fn put(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        document: Document,
        durability: Durability,
    ) -> Result<()>;

    /// Create a document only if none exists under `id`, returning whether
    /// it was written. The existence check and the write are atomic.
    async fn insert(
        &self,
        table: &str,
        kind: &str,
        id: &str,
        document: Document,
        durability: Durability,
    ) -> Result<bool>;

    /// Fetch a document, `None` if absent
    async fn get(&self, table: &str, kind: &str, id: &str) -> Result<Option<Document>>;

    /// Delete a document, returning whether it existed
    async fn delete(&self, table: &str, kind: &str, id: &str, durability: Durability)
        -> Result<bool>;

    /// Match-all search over one kind of a table, in no particular order.
    /// Fails with `TableNotFound` when the table does not exist.
    async fn search(&self, table: &str, kind: &str) -> Result<Vec<StoredDocument>>;
}
