//! Ordered key-value store backed by a single SQLite table
//!
//! Keys are UTF-8 strings compared bytewise, so prefix scans come back in
//! lexicographic order. Every write runs inside a transaction.

use crate::utils::StorageError;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS kv (
    key   TEXT PRIMARY KEY NOT NULL,
    value BLOB NOT NULL
) WITHOUT ROWID;";

/// Highest scalar value; every key starting with `prefix` sorts below `prefix || MAX_CHAR`
const MAX_CHAR: char = '\u{10FFFF}';

/// Durable ordered key-value store
#[derive(Clone)]
pub struct KvStore {
    conn: Arc<Mutex<Connection>>,
}

impl KvStore {
    /// Open a store backed by a file, creating it if needed
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::init(Connection::open(path)?)
    }

    /// Open a store that lives only as long as the process
    pub fn in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Insert or overwrite a single key
    pub fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        self.put_batch(&[(key.to_string(), value.to_vec())])
    }

    /// Write several entries atomically
    pub fn put_batch(&self, entries: &[(String, Vec<u8>)]) -> Result<(), StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached("INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)")?;
            for (key, value) in entries {
                stmt.execute(params![key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Read a single key
    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let conn = self.conn.lock();
        let value = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Read-modify-write a single key in one transaction
    ///
    /// `f` sees the current value (if any) and returns the bytes to store plus
    /// a result for the caller. The connection stays locked throughout, so
    /// concurrent updates of the same key serialize.
    pub fn update<T, F>(&self, key: &str, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(Option<Vec<u8>>) -> Result<(Vec<u8>, T), StorageError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let current = tx
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        let (value, out) = f(current)?;
        tx.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        tx.commit()?;
        Ok(out)
    }

    /// Remove a single key, returning whether it existed
    pub fn delete(&self, key: &str) -> Result<bool, StorageError> {
        let conn = self.conn.lock();
        let removed = conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(removed > 0)
    }

    /// All entries whose key starts with `prefix`, in key order
    pub fn scan_prefix(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT key, value FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![prefix, upper_bound(prefix)], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Vec<u8>>(1)?))
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Keys starting with `prefix`, in key order
    pub fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare_cached("SELECT key FROM kv WHERE key >= ?1 AND key < ?2 ORDER BY key")?;
        let rows = stmt.query_map(params![prefix, upper_bound(prefix)], |row| row.get(0))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of keys starting with `prefix`
    pub fn count_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM kv WHERE key >= ?1 AND key < ?2",
            params![prefix, upper_bound(prefix)],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Remove every key starting with `prefix`
    pub fn delete_prefix(&self, prefix: &str) -> Result<usize, StorageError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute(
            "DELETE FROM kv WHERE key >= ?1 AND key < ?2",
            params![prefix, upper_bound(prefix)],
        )?;
        tx.commit()?;
        Ok(removed)
    }

    /// Remove the given keys in one transaction
    pub fn delete_keys(&self, keys: &[String]) -> Result<usize, StorageError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let mut removed = 0;
        {
            let mut stmt = tx.prepare_cached("DELETE FROM kv WHERE key = ?1")?;
            for key in keys {
                removed += stmt.execute(params![key])?;
            }
        }
        tx.commit()?;
        Ok(removed)
    }

    /// Run a store call on the blocking pool
    pub async fn run<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&KvStore) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let store = self.clone();
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn upper_bound(prefix: &str) -> String {
    let mut bound = String::with_capacity(prefix.len() + MAX_CHAR.len_utf8());
    bound.push_str(prefix);
    bound.push(MAX_CHAR);
    bound
}
