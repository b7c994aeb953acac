//! Core traits and types for the response cache.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::key::CacheKey;
use crate::error::Result;
use crate::http::HttpResponse;

/// A stored response, enough to rebuild an `HttpResponse` on replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
  pub method: String,
  pub url: String,
  pub status: u16,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
  pub cached_at: DateTime<Utc>,
}

impl CacheEntry {
  pub fn new(method: &str, url: &str, response: &HttpResponse) -> Self {
    Self {
      method: method.to_string(),
      url: url.to_string(),
      status: response.status,
      headers: response.headers.clone(),
      body: response.body.clone(),
      cached_at: Utc::now(),
    }
  }

  pub fn into_response(self) -> HttpResponse {
    HttpResponse {
      status: self.status,
      headers: self.headers,
      body: self.body,
    }
  }
}

/// Persistent key/value store for responses.
///
/// Implementations must tolerate concurrent callers: a reader sees either no
/// entry or a complete one.
pub trait ResponseCache: Send + Sync {
  /// Look up an entry. A miss is `Ok(None)`; `Err` means the store could not
  /// be read.
  fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

  /// Store an entry, replacing any previous one under the same key.
  fn put(&self, key: &CacheKey, entry: &CacheEntry) -> Result<()>;

  /// Remove every entry.
  fn clear(&self) -> Result<()>;

  /// Number of stored entries.
  fn len(&self) -> Result<usize>;
}

/// Result from a cached fetch, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  pub data: T,
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  Network,
  Cache,
}
