// Key-value persistence for keywords and per-origin scan results

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use snare_scanner::{ScanResult, Statistics};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use url::Url;

/// Key holding the active keyword list
pub const KEYWORDS_KEY: &str = "keywords";
/// Prefix for per-origin result records
pub const RESULTS_PREFIX: &str = "results:";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Opaque get/set service. Values are JSON documents.
pub trait Storage: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: Value) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
    fn keys(&self) -> Result<Vec<String>>;
}

/// What gets stored for each scanned origin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub results: Vec<ScanResult>,
    pub url: String,
    pub timestamp: DateTime<Utc>,
    pub statistics: Statistics,
}

impl PageRecord {
    pub fn new(url: &str, results: Vec<ScanResult>) -> Self {
        let statistics = Statistics::from_results(&results);
        Self {
            results,
            url: url.to_string(),
            timestamp: Utc::now(),
            statistics,
        }
    }
}

/// Storage key for a page's results: `results:` followed by the URL's origin.
///
/// Anything that does not parse as a URL with a host (local files, bare
/// labels) is used verbatim.
pub fn origin_key(url: &str) -> String {
    let origin = match Url::parse(url) {
        Ok(parsed) if parsed.has_host() => parsed.origin().ascii_serialization(),
        _ => url.trim().to_string(),
    };
    format!("{}{}", RESULTS_PREFIX, origin)
}

fn current_timestamp() -> i64 {
    Utc::now().timestamp()
}

pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn drop(path: &Path) -> std::io::Result<()> {
        fs::remove_file(path)
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let storage = SqliteStorage {
            conn: Mutex::new(conn),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    pub fn in_memory() -> Result<Self> {
        let storage = SqliteStorage {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        storage.init_schema()?;
        Ok(storage)
    }

    fn init_schema(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS kv (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at INTEGER NOT NULL
                );
                ",
            )?;
            Ok(())
        })
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock().map_err(|_| StorageError::Poisoned)?;
        f(&conn)
    }

    /// When `key` was last written, as a unix timestamp
    pub fn updated_at(&self, key: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT updated_at FROM kv WHERE key = ?1")?;
            Ok(stmt.query_row(params![key], |row| row.get(0)).optional()?)
        })
    }
}

impl Storage for SqliteStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let raw: Option<String> = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
            Ok(stmt.query_row(params![key], |row| row.get(0)).optional()?)
        })?;

        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let text = serde_json::to_string(&value)?;
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, text, current_timestamp()],
            )?;
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
            Ok(())
        })
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT key FROM kv ORDER BY key")?;
            let keys = stmt
                .query_map([], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(keys)
        })
    }
}

/// Process-local storage for tests and one-off runs
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, Value>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Value>> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.lock().map_err(|_| StorageError::Poisoned)?;
        Ok(entries.keys().cloned().collect())
    }
}

/// Read the stored keyword list, if any
pub fn load_keywords(storage: &dyn Storage) -> Result<Option<Vec<String>>> {
    match storage.get(KEYWORDS_KEY)? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub fn save_keywords(storage: &dyn Storage, keywords: &[String]) -> Result<()> {
    storage.set(KEYWORDS_KEY, serde_json::to_value(keywords)?)
}

pub fn load_page(storage: &dyn Storage, url: &str) -> Result<Option<PageRecord>> {
    match storage.get(&origin_key(url))? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

pub fn save_page(storage: &dyn Storage, record: &PageRecord) -> Result<()> {
    storage.set(&origin_key(&record.url), serde_json::to_value(record)?)
}

/// Origins that currently have stored results
pub fn stored_origins(storage: &dyn Storage) -> Result<Vec<String>> {
    Ok(storage
        .keys()?
        .into_iter()
        .filter_map(|k| k.strip_prefix(RESULTS_PREFIX).map(String::from))
        .collect())
}
