//! SQLite-backed key-value store.
//!
//! Survives process restarts; holds the cooldown and service timestamps and
//! the usage counters.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection};

use super::data_dir;
use super::kv::KvStore;
use crate::error::StorageError;

/// SQLite database with a single `kv` table.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/vibtime/vibtime.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the data directory or database cannot be opened.
    pub fn open() -> Result<Self, StorageError> {
        let path = data_dir()?.join("vibtime.db");
        Self::open_at(&path)
    }

    /// Open (or create) a database file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path).map_err(|source| StorageError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if SQLite cannot allocate the connection.
    pub fn open_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, StorageError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StorageError::QueryFailed(e.to_string()))?;
        Ok(f(&conn)?)
    }

    fn migrate(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS kv (
                    key   TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );",
            )
        })
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
            let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
            match result {
                Ok(v) => Ok(Some(v)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
    }

    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
                params![key, value],
            )?;
            Ok(())
        })
    }

    pub fn kv_remove(&self, key: &str) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(())
        })
    }

    /// All keys, sorted.
    pub fn kv_keys(&self) -> Result<Vec<String>, StorageError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let keys: Result<Vec<String>, _> = rows.collect();
            keys
        })
    }
}

impl KvStore for Database {
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.kv_get(key)
    }

    fn set_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.kv_set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.kv_remove(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::kv::KEY_LAST_VIBRATION_TIME;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert_eq!(db.kv_get("foo").unwrap(), None);
        db.kv_set("foo", "bar").unwrap();
        assert_eq!(db.kv_get("foo").unwrap(), Some("bar".to_string()));
        db.kv_set("foo", "baz").unwrap();
        assert_eq!(db.kv_get("foo").unwrap(), Some("baz".to_string()));
        db.kv_remove("foo").unwrap();
        assert_eq!(db.kv_get("foo").unwrap(), None);
    }

    #[test]
    fn typed_access_through_trait() {
        let db = Database::open_memory().unwrap();
        db.set_i64(KEY_LAST_VIBRATION_TIME, 42).unwrap();
        assert_eq!(db.get_i64(KEY_LAST_VIBRATION_TIME).unwrap(), Some(42));
        assert_eq!(db.kv_keys().unwrap(), vec![KEY_LAST_VIBRATION_TIME.to_string()]);
    }

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vibtime.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.set_i64(KEY_LAST_VIBRATION_TIME, 1_234).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.get_i64(KEY_LAST_VIBRATION_TIME).unwrap(), Some(1_234));
    }
}
