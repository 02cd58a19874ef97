use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection};

use crate::error::{AppError, AppResult};

pub const CHAT_HISTORY_KEY: &str = "graft_chat_history";
pub const USER_PROMPTS_KEY: &str = "graft_user_prompts";
pub const PINNED_PRECONFIGURED_KEY: &str = "graft_pinned_preconfigured";
pub const SETTINGS_KEY: &str = "graft_settings";

/// Minimal string key-value persistence the stores are written against.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> AppResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> AppResult<()>;
    fn remove(&self, key: &str) -> AppResult<()>;
}

/// SQLite-backed store using the `kv_store` table.
pub struct SqliteKvStore {
    db: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
        }
    }
}

impl KeyValueStore for SqliteKvStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let db = self.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
        let result = db.query_row(
            "SELECT value FROM kv_store WHERE key = ?1",
            params![key],
            |row| row.get(0),
        );

        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let db = self.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
        db.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
            params![key, value],
        )
        .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let db = self.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
        db.execute("DELETE FROM kv_store WHERE key = ?1", params![key])
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Process-local store for hosts without durable storage, and for tests.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> AppResult<Option<String>> {
        let entries = self.entries.lock().map_err(|e| AppError::Storage(e.to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> AppResult<()> {
        let mut entries = self.entries.lock().map_err(|e| AppError::Storage(e.to_string()))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> AppResult<()> {
        let mut entries = self.entries.lock().map_err(|e| AppError::Storage(e.to_string()))?;
        entries.remove(key);
        Ok(())
    }
}

/// Serializes a store's read-modify-write cycles. Clones of a store share
/// one lock, so the whole load, change and store runs as a unit.
#[derive(Clone, Default)]
pub(crate) struct WriteLock(Arc<Mutex<()>>);

impl WriteLock {
    /// The lock guards no data, so a writer that panicked leaves nothing
    /// half-updated behind it.
    pub(crate) fn acquire(&self) -> MutexGuard<'_, ()> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Read a JSON array stored under `key`. Missing keys, storage failures and
/// corrupt payloads all degrade to an empty list.
pub(crate) fn load_json_list<T>(kv: &dyn KeyValueStore, key: &str, what: &str) -> Vec<T>
where
    T: serde::de::DeserializeOwned,
{
    match kv.get(key) {
        Ok(Some(raw)) => match serde_json::from_str(&raw) {
            Ok(items) => items,
            Err(e) => {
                log::error!("Error parsing stored {}: {}", what, e);
                Vec::new()
            }
        },
        Ok(None) => Vec::new(),
        Err(e) => {
            log::error!("Error loading {}: {}", what, e);
            Vec::new()
        }
    }
}

/// Write a JSON array under `key`. Failures are logged and swallowed.
pub(crate) fn store_json_list<T>(kv: &dyn KeyValueStore, key: &str, items: &[T], what: &str)
where
    T: serde::Serialize,
{
    let raw = match serde_json::to_string(items) {
        Ok(raw) => raw,
        Err(e) => {
            log::error!("Error serializing {}: {}", what, e);
            return;
        }
    };
    if let Err(e) = kv.set(key, &raw) {
        log::error!("Error saving {}: {}", what, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrations;

    #[test]
    fn test_sqlite_roundtrip_and_remove() {
        let kv = SqliteKvStore::new(migrations::open_in_memory().unwrap());
        assert_eq!(kv.get("k").unwrap(), None);
        kv.set("k", "v1").unwrap();
        kv.set("k", "v2").unwrap();
        assert_eq!(kv.get("k").unwrap().as_deref(), Some("v2"));
        kv.remove("k").unwrap();
        assert_eq!(kv.get("k").unwrap(), None);
    }

    #[test]
    fn test_corrupt_payload_degrades_to_empty() {
        let kv = MemoryKvStore::new();
        kv.set(CHAT_HISTORY_KEY, "{not json").unwrap();
        let items: Vec<String> = load_json_list(&kv, CHAT_HISTORY_KEY, "chat history");
        assert!(items.is_empty());
    }

    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> AppResult<Option<String>> {
            Err(AppError::Storage("quota exceeded".into()))
        }
        fn set(&self, _key: &str, _value: &str) -> AppResult<()> {
            Err(AppError::Storage("quota exceeded".into()))
        }
        fn remove(&self, _key: &str) -> AppResult<()> {
            Err(AppError::Storage("quota exceeded".into()))
        }
    }

    #[test]
    fn test_failing_store_is_swallowed() {
        let items: Vec<String> = load_json_list(&BrokenStore, "x", "things");
        assert!(items.is_empty());
        store_json_list(&BrokenStore, "x", &["a".to_string()], "things");
    }
}
