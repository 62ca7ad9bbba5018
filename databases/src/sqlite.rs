//! SQLite Document Store
//!
//! Stores JSON documents in a single table keyed by database and collection
//! name. The row id is surfaced as the document identity field on fetch.

use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info};

use crate::{Document, DocumentSource, Result, StoreError, IDENTITY_FIELD};

const URL_SCHEME: &str = "sqlite://";

/// SQLite-backed collection store
pub struct SqliteDocumentStore {
    /// Database connection
    connection: Mutex<Connection>,
    /// Connection URL the store was opened with
    url: String,
}

impl SqliteDocumentStore {
    /// Open an existing store. Fails with [`StoreError::Unavailable`] when the
    /// store file does not exist or cannot be opened.
    pub fn connect(url: &str) -> Result<Self> {
        let path = Self::path_from_url(url);
        info!("Connecting to document store at {}", path.display());

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| StoreError::Unavailable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Self::from_connection(conn, url)
    }

    /// Create the store if missing, then open it.
    pub fn create(url: &str) -> Result<Self> {
        let path = Self::path_from_url(url);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Unavailable {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
        }

        let conn = Connection::open(&path).map_err(|e| StoreError::Unavailable {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        Self::from_connection(conn, url)
    }

    fn from_connection(conn: Connection, url: &str) -> Result<Self> {
        conn.busy_timeout(std::time::Duration::from_secs(30))
            .map_err(|e| StoreError::Unavailable {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let store = Self {
            connection: Mutex::new(conn),
            url: url.to_string(),
        };
        store.initialize_schema()?;
        Ok(store)
    }

    /// Resolve `sqlite://<path>` or a bare path to a filesystem path
    pub fn path_from_url(url: &str) -> PathBuf {
        Path::new(url.strip_prefix(URL_SCHEME).unwrap_or(url)).to_path_buf()
    }

    /// Connection URL of this store
    pub fn url(&self) -> &str {
        &self.url
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.connection.lock().map_err(|_| StoreError::LockPoisoned)
    }

    fn initialize_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS documents (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                database_name TEXT NOT NULL,
                collection_name TEXT NOT NULL,
                body TEXT NOT NULL
            );",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_documents_collection
                ON documents(database_name, collection_name);",
            [],
        )?;

        Ok(())
    }

    /// Number of documents in a collection
    pub fn count(&self, database: &str, collection: &str) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE database_name = ?1 AND collection_name = ?2",
            params![database, collection],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl DocumentSource for SqliteDocumentStore {
    fn fetch_all(&self, database: &str, collection: &str) -> Result<Vec<Document>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, body FROM documents
             WHERE database_name = ?1 AND collection_name = ?2
             ORDER BY id",
        )?;

        let rows = stmt.query_map(params![database, collection], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut documents = Vec::new();
        for row in rows {
            let (id, body) = row?;
            let mut document = match serde_json::from_str::<serde_json::Value>(&body)? {
                serde_json::Value::Object(map) => map,
                other => {
                    return Err(StoreError::MalformedDocument {
                        collection: collection.to_string(),
                        id,
                        reason: format!("expected an object, found {other}"),
                    })
                }
            };
            document.insert(IDENTITY_FIELD.to_string(), serde_json::Value::from(id));
            documents.push(document);
        }

        debug!(
            "Fetched {} documents from {}.{}",
            documents.len(),
            database,
            collection
        );
        Ok(documents)
    }

    fn insert_many(
        &self,
        database: &str,
        collection: &str,
        documents: &[Document],
    ) -> Result<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO documents (database_name, collection_name, body) VALUES (?1, ?2, ?3)",
            )?;
            for document in documents {
                let body = serde_json::to_string(document)?;
                stmt.execute(params![database, collection, body])?;
            }
        }
        tx.commit()?;

        info!(
            "Inserted {} documents into {}.{}",
            documents.len(),
            database,
            collection
        );
        Ok(documents.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn document(value: serde_json::Value) -> Document {
        match value {
            serde_json::Value::Object(map) => map,
            _ => unreachable!("test documents are objects"),
        }
    }

    #[test]
    fn test_insert_then_fetch_preserves_order_and_adds_identity() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", temp_dir.path().join("store.db").display());
        let store = SqliteDocumentStore::create(&url).expect("Failed to create store");

        let docs = vec![
            document(json!({"a": 1, "Result": -1})),
            document(json!({"a": "na", "Result": 1})),
        ];
        let inserted = store.insert_many("db", "phishing", &docs).unwrap();
        assert_eq!(inserted, 2);

        let fetched = store.fetch_all("db", "phishing").unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0]["a"], json!(1));
        assert_eq!(fetched[1]["a"], json!("na"));
        assert!(fetched.iter().all(|d| d.contains_key(IDENTITY_FIELD)));
    }

    #[test]
    fn test_collections_are_isolated() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let path = temp_dir.path().join("store.db");
        let store = SqliteDocumentStore::create(path.to_str().unwrap()).unwrap();

        store
            .insert_many("db", "first", &[document(json!({"x": 1}))])
            .unwrap();

        assert_eq!(store.count("db", "first").unwrap(), 1);
        assert_eq!(store.count("db", "second").unwrap(), 0);
        assert!(store.fetch_all("other", "first").unwrap().is_empty());
    }

    #[test]
    fn test_connect_to_missing_store_is_unavailable() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let url = format!("sqlite://{}", temp_dir.path().join("absent.db").display());

        match SqliteDocumentStore::connect(&url) {
            Err(StoreError::Unavailable { url: reported, .. }) => assert_eq!(reported, url),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("connecting to a missing store should fail"),
        }
    }

    #[test]
    fn test_connect_reopens_created_store() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let url = temp_dir.path().join("store.db").display().to_string();
        {
            let store = SqliteDocumentStore::create(&url).unwrap();
            store
                .insert_many("db", "c", &[document(json!({"k": 2.5}))])
                .unwrap();
        }

        let reopened = SqliteDocumentStore::connect(&url).unwrap();
        assert_eq!(reopened.fetch_all("db", "c").unwrap()[0]["k"], json!(2.5));
    }
}
