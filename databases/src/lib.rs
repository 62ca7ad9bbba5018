//! PhishGuard Databases Module
//!
//! Collection-oriented document storage used as the upstream data source of the
//! training pipeline. Documents are flat JSON objects grouped by database and
//! collection name, mirroring the layout of a document database.

use thiserror::Error;

pub mod sqlite;
pub use sqlite::SqliteDocumentStore;

/// A single flat key/value record
pub type Document = serde_json::Map<String, serde_json::Value>;

/// Identity field attached to every fetched document
pub const IDENTITY_FIELD: &str = "_id";

/// Errors raised by document stores
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Document store unavailable at '{url}': {reason}")]
    Unavailable { url: String, reason: String },

    #[error("Query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("Document encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("Malformed document {id} in collection '{collection}': {reason}")]
    MalformedDocument {
        collection: String,
        id: i64,
        reason: String,
    },

    #[error("Connection lock poisoned")]
    LockPoisoned,
}

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// A queryable collection store.
///
/// Implementations are opened once per ingestion run and are not pooled.
pub trait DocumentSource {
    /// Fetch every document of a collection, in insertion order.
    fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>>;

    /// Insert documents into a collection, returning the number inserted.
    fn insert_many(&self, database: &str, collection: &str, documents: &[Document])
        -> Result<usize>;
}
