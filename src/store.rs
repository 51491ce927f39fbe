//! Durable key/value storage backing the queue, failed store and cache.
//!
//! Everything the core persists goes through [`PersistentStore`] as opaque
//! blobs; callers own the key namespace (`queue:`, `cache:` prefixes).

use crate::config::{ensure_data_dir, get_data_dir};
use crate::error::{CoreError, Result};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;

/// Generic durable blob storage surviving process restarts.
///
/// `list_keys` exists for prefix invalidation; implementations must return
/// every key that starts with the given prefix.
pub trait PersistentStore: Send + Sync {
    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>>;
    fn save_blob(&self, key: &str, bytes: &[u8]) -> Result<()>;
    fn delete_blob(&self, key: &str) -> Result<()>;
    fn list_keys(&self, prefix: &str) -> Result<Vec<String>>;
}

/// SQLite-backed store. Writes go through a synchronous connection so a
/// returned call means the blob is on disk.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS blobs (
                key TEXT PRIMARY KEY,
                value BLOB NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open the store at its default location under the data directory.
    pub fn open_default() -> Result<Self> {
        ensure_data_dir()?;
        Self::open(get_data_dir()?.join("core.db"))
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CoreError::lock("sqlite store"))
    }
}

// LIKE special characters in a key prefix must not act as wildcards
fn escape_like(prefix: &str) -> String {
    prefix
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

impl PersistentStore for SqliteStore {
    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT value FROM blobs WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        match rows.next()? {
            Some(row) => Ok(Some(row.get(0)?)),
            None => Ok(None),
        }
    }

    fn save_blob(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO blobs (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = ?3",
            params![key, bytes, now],
        )?;
        Ok(())
    }

    fn delete_blob(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM blobs WHERE key = ?1", params![key])?;
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let pattern = format!("{}%", escape_like(prefix));
        let mut stmt =
            conn.prepare("SELECT key FROM blobs WHERE key LIKE ?1 ESCAPE '\\' ORDER BY key")?;
        let keys = stmt
            .query_map(params![pattern], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(keys)
    }
}

/// In-memory store for tests and diskless composition.
#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistentStore for MemoryStore {
    fn load_blob(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let map = self.map.lock().map_err(|_| CoreError::lock("memory store"))?;
        Ok(map.get(key).cloned())
    }

    fn save_blob(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| CoreError::lock("memory store"))?;
        map.insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete_blob(&self, key: &str) -> Result<()> {
        let mut map = self.map.lock().map_err(|_| CoreError::lock("memory store"))?;
        map.remove(key);
        Ok(())
    }

    fn list_keys(&self, prefix: &str) -> Result<Vec<String>> {
        let map = self.map.lock().map_err(|_| CoreError::lock("memory store"))?;
        Ok(map
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn roundtrip(store: &dyn PersistentStore) {
        assert!(store.load_blob("a").unwrap().is_none());

        store.save_blob("a", b"one").unwrap();
        store.save_blob("a", b"two").unwrap();
        assert_eq!(store.load_blob("a").unwrap().unwrap(), b"two");

        store.delete_blob("a").unwrap();
        assert!(store.load_blob("a").unwrap().is_none());
    }

    #[test]
    fn test_memory_roundtrip() {
        roundtrip(&MemoryStore::new());
    }

    #[test]
    fn test_sqlite_roundtrip() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).unwrap();
        roundtrip(&store);
    }

    #[test]
    fn test_sqlite_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.save_blob("queue:pending", b"payload").unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.load_blob("queue:pending").unwrap().unwrap(),
            b"payload"
        );
    }

    #[test]
    fn test_list_keys_prefix() {
        let store = MemoryStore::new();
        store.save_blob("cache:stocks:list:limit=25", b"1").unwrap();
        store.save_blob("cache:stocks:detail:4", b"2").unwrap();
        store.save_blob("cache:products:list:limit=25", b"3").unwrap();

        let keys = store.list_keys("cache:stocks:").unwrap();
        assert_eq!(keys.len(), 2);
        assert!(keys.iter().all(|k| k.starts_with("cache:stocks:")));

        let dir = tempdir().unwrap();
        let sqlite = SqliteStore::open(dir.path().join("test.db")).unwrap();
        sqlite.save_blob("cache:stocks:list:limit=25", b"1").unwrap();
        sqlite.save_blob("cache:stocks:detail:4", b"2").unwrap();
        sqlite.save_blob("cache:products:list:limit=25", b"3").unwrap();

        let keys = sqlite.list_keys("cache:stocks:").unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[test]
    fn test_like_escape() {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).unwrap();
        store.save_blob("a_b", b"1").unwrap();
        store.save_blob("axb", b"2").unwrap();

        // Underscore must match literally, not as a wildcard
        let keys = store.list_keys("a_").unwrap();
        assert_eq!(keys, vec!["a_b".to_string()]);
    }
}
