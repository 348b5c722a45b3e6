// SQLite-backed credential store

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, OptionalExtension};

use super::CredentialStore;
use crate::error::{AuthError, Result};

/// Credential store persisted to a SQLite database file.
///
/// Session material lives in a single `session_kv` table. Multi-key writes
/// run inside one transaction so the access/refresh pair is never observed
/// half-updated.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| {
            AuthError::Store(format!("failed to open store at {}: {}", path.display(), e))
        })?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS session_kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .map_err(store_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        // A poisoned lock only means another thread panicked mid-operation;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn store_err(e: rusqlite::Error) -> AuthError {
    AuthError::Store(e.to_string())
}

impl CredentialStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT value FROM session_kv WHERE key = ?1",
            rusqlite::params![key],
            |row| row.get(0),
        )
        .optional()
        .map_err(store_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO session_kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            rusqlite::params![key, value],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM session_kv WHERE key = ?1",
            rusqlite::params![key],
        )
        .map_err(store_err)?;
        Ok(())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(store_err)?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO session_kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                rusqlite::params![key, value],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction().map_err(store_err)?;
        for key in keys {
            tx.execute(
                "DELETE FROM session_kv WHERE key = ?1",
                rusqlite::params![key],
            )
            .map_err(store_err)?;
        }
        tx.commit().map_err(store_err)
    }
}
