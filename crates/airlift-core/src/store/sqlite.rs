//! SQLite-backed envelope store.

use super::EnvelopeStore;
use crate::config::StoreConfig;
use crate::error::{AirliftError, Result};
use crate::models::CacheEnvelope;
use crate::serdes;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Stores the encoded envelope as one row of a shared database.
///
/// Several stores can share a database file as long as their
/// `(namespace, key)` pairs differ. Thread-safe via an internal mutex on the
/// connection.
pub struct SqliteEnvelopeStore {
    conn: Arc<Mutex<Connection>>,
    namespace: String,
    key: String,
}

impl SqliteEnvelopeStore {
    /// Open the store under the default namespace and key.
    ///
    /// Creates the database and tables if they don't exist.
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::with_key(db_path, StoreConfig::NAMESPACE, StoreConfig::ENVELOPE_KEY)
    }

    pub fn with_key(
        db_path: impl AsRef<Path>,
        namespace: impl Into<String>,
        key: impl Into<String>,
    ) -> Result<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| AirliftError::Io {
                message: format!("Failed to create store directory: {}", e),
                path: Some(parent.to_path_buf()),
                source: Some(e),
            })?;
        }

        let conn = Connection::open(db_path).map_err(|e| AirliftError::Database {
            message: format!("Failed to open store database: {}", e),
            source: Some(e),
        })?;

        // WAL lets readers keep the previous envelope while a writer commits
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(|e| AirliftError::Database {
                message: format!("Failed to set pragmas: {}", e),
                source: Some(e),
            })?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            namespace: namespace.into(),
            key: key.into(),
        };

        store.init_schema()?;

        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| AirliftError::Database {
            message: format!("Failed to lock database: {}", e),
            source: None,
        })
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS envelopes (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value BLOB NOT NULL,
                schema_version INTEGER NOT NULL,
                size_bytes INTEGER NOT NULL,
                stored_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )
        .map_err(|e| AirliftError::Database {
            message: format!("Failed to initialize store schema: {}", e),
            source: Some(e),
        })?;

        Ok(())
    }

    /// When the current envelope was stored, if there is one.
    pub fn stored_at(&self) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;

        let stored_at: Option<String> = conn
            .query_row(
                "SELECT stored_at FROM envelopes WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, self.key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AirliftError::Database {
                message: format!("Failed to query envelope timestamp: {}", e),
                source: Some(e),
            })?;

        stored_at
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| AirliftError::Other(format!("Invalid stored_at '{}': {}", s, e)))
            })
            .transpose()
    }
}

impl EnvelopeStore for SqliteEnvelopeStore {
    fn load(&self) -> Result<Option<CacheEnvelope>> {
        let value: Option<Vec<u8>> = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT value FROM envelopes WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, self.key],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| AirliftError::Database {
                message: format!("Failed to query envelope: {}", e),
                source: Some(e),
            })?
        };

        match value {
            Some(bytes) => {
                let envelope = serdes::decode(&bytes)?;
                debug!(
                    "Loaded envelope with {} dags from '{}/{}'",
                    envelope.dag_datas().len(),
                    self.namespace,
                    self.key
                );
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }

    fn replace(&self, envelope: &CacheEnvelope) -> Result<()> {
        let bytes = serdes::encode(envelope)?;
        let now = Utc::now().to_rfc3339();
        let size_bytes = bytes.len() as i64;
        let schema_version = envelope.schema_version() as i64;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT OR REPLACE INTO envelopes
            (namespace, key, value, schema_version, size_bytes, stored_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![self.namespace, self.key, bytes, schema_version, size_bytes, now],
        )
        .map_err(|e| AirliftError::Database {
            message: format!("Failed to store envelope: {}", e),
            source: Some(e),
        })?;
        tx.commit()?;

        debug!(
            "Replaced envelope '{}/{}' ({} bytes)",
            self.namespace, self.key, size_bytes
        );
        Ok(())
    }

    fn clear(&self) -> Result<bool> {
        let conn = self.lock()?;

        let deleted = conn
            .execute(
                "DELETE FROM envelopes WHERE namespace = ?1 AND key = ?2",
                params![self.namespace, self.key],
            )
            .map_err(|e| AirliftError::Database {
                message: format!("Failed to delete envelope: {}", e),
                source: Some(e),
            })?;

        Ok(deleted > 0)
    }
}
