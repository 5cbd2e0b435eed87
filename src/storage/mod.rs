//! Document store collaborator: interface, in-memory backend and deadlines

pub mod deadline;
pub mod memory;
pub mod traits;

// Re-export main components
pub use deadline::DeadlineStore;
pub use memory::MemoryDocumentStore;
pub use traits::{Document, DocumentStore, Durability, StoredDocument};

/// Shared reference to a document store
pub type SharedDocumentStore = std::sync::Arc<dyn DocumentStore>;
