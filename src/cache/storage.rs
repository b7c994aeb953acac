//! Response cache backends: SQLite on disk, and a no-op store.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use super::key::CacheKey;
use super::traits::{CacheEntry, ResponseCache};
use crate::error::{Error, Result};

/// Storage that never hits and discards writes.
/// Used when caching is disabled.
pub struct NoopStorage;

impl ResponseCache for NoopStorage {
  fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>> {
    Ok(None) // Always miss
  }

  fn put(&self, _key: &CacheKey, _entry: &CacheEntry) -> Result<()> {
    Ok(()) // Discard
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }

  fn len(&self) -> Result<usize> {
    Ok(0)
  }
}

/// SQLite-based response cache.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

/// Database file name inside the cache directory.
pub const DATABASE_FILE: &str = "responses.db";

impl SqliteStorage {
  /// Open (or create) the cache database inside `dir`.
  pub fn open_in(dir: &Path) -> Result<Self> {
    Self::open_at(&dir.join(DATABASE_FILE))
  }

  /// Open the cache database inside `dir`, replacing it with an empty one
  /// when the existing file is not a readable cache.
  ///
  /// Everything cached in a replaced file is lost; later lookups miss and
  /// refetch.
  pub fn open_or_reset(dir: &Path) -> Result<Self> {
    let path = dir.join(DATABASE_FILE);
    match Self::open_at(&path) {
      Ok(storage) => Ok(storage),
      Err(e) if path.is_file() => {
        warn!(path = %path.display(), error = %e, "cache database unreadable, recreating it");
        std::fs::remove_file(&path)
          .map_err(|e| Error::storage("Failed to remove unreadable cache database", e))?;
        Self::open_at(&path)
      }
      Err(e) => Err(e),
    }
  }

  /// Open (or create) the cache database at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| Error::storage("Failed to create cache directory", e))?;
    }

    let conn = Connection::open(path).map_err(|e| {
      Error::storage(
        &format!("Failed to open cache database at {}", path.display()),
        e,
      )
    })?;

    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| Error::storage("Failed to open in-memory cache", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Default cache directory (platform cache dir + "jwx").
  pub fn default_dir() -> Option<PathBuf> {
    dirs::cache_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
      .map(|dir| dir.join("jwx"))
  }

  fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| Error::storage("Lock poisoned", e))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| Error::storage("Failed to run cache migrations", e))?;
    Ok(())
  }
}

/// Schema for the response cache.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS response_cache (
    cache_key TEXT PRIMARY KEY,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers TEXT NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL
);
"#;

impl ResponseCache for SqliteStorage {
  fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
    let conn = self.lock()?;

    let row: Option<(String, String, u16, String, Vec<u8>, String)> = conn
      .query_row(
        "SELECT method, url, status, headers, body, cached_at FROM response_cache
         WHERE cache_key = ?",
        params![key.as_str()],
        |row| {
          Ok((
            row.get(0)?,
            row.get(1)?,
            row.get(2)?,
            row.get(3)?,
            row.get(4)?,
            row.get(5)?,
          ))
        },
      )
      .optional()
      .map_err(|e| Error::storage("Failed to read cache entry", e))?;

    let Some((method, url, status, headers, body, cached_at)) = row else {
      return Ok(None);
    };

    let headers: BTreeMap<String, String> = serde_json::from_str(&headers)
      .map_err(|e| Error::storage("Corrupt cached headers", e))?;
    let cached_at = parse_datetime(&cached_at)?;

    Ok(Some(CacheEntry {
      method,
      url,
      status,
      headers,
      body,
      cached_at,
    }))
  }

  fn put(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()> {
    let headers = serde_json::to_string(&entry.headers)
      .map_err(|e| Error::storage("Failed to serialize headers", e))?;
    let conn = self.lock()?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (cache_key, method, url, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
        params![
          key.as_str(),
          entry.method,
          entry.url,
          entry.status,
          headers,
          entry.body,
          entry.cached_at.to_rfc3339(),
        ],
      )
      .map_err(|e| Error::storage("Failed to store cache entry", e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self.lock()?;
    conn
      .execute("DELETE FROM response_cache", [])
      .map_err(|e| Error::storage("Failed to clear cache", e))?;
    Ok(())
  }

  fn len(&self) -> Result<usize> {
    let conn = self.lock()?;
    conn
      .query_row("SELECT COUNT(*) FROM response_cache", [], |row| {
        row.get::<_, i64>(0)
      })
      .map(|n| n as usize)
      .map_err(|e| Error::storage("Failed to count cache entries", e))
  }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::storage(&format!("Failed to parse datetime '{}'", s), e))
}
