//! Database module for the local snapshot store
//!
//! A small key/value table holding the last known session id, history and
//! context as JSON text.

mod schema;

pub use schema::{ALL_KEYS, KEY_CONTEXT, KEY_MESSAGES, KEY_SESSION_ID};
use schema::SCHEMA;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Corrupt value for {key}: {source}")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

pub type DbResult<T> = Result<T, DbError>;

/// Thread-safe database handle
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)] // Used in tests
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run_migrations(&self) -> DbResult<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // ==================== Raw Key/Value Operations ====================

    pub fn put(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn().execute(
            "INSERT INTO snapshot (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> DbResult<Option<String>> {
        let value = self
            .conn()
            .query_row(
                "SELECT value FROM snapshot WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Remove the given keys in one transaction
    pub fn delete(&self, keys: &[&str]) -> DbResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for key in keys {
            tx.execute("DELETE FROM snapshot WHERE key = ?1", params![key])?;
        }
        tx.commit()?;
        Ok(())
    }

    // ==================== Typed JSON Operations ====================

    pub fn put_json<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> DbResult<()> {
        let json = serde_json::to_string(value).map_err(|source| DbError::Corrupt {
            key: key.to_string(),
            source,
        })?;
        self.put(key, &json)
    }

    pub fn get_json<T: serde::de::DeserializeOwned>(&self, key: &str) -> DbResult<Option<T>> {
        let Some(raw) = self.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|source| DbError::Corrupt {
                key: key.to_string(),
                source,
            })
    }
}
