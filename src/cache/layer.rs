//! Caching HTTP client: consults the response cache before the network.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, warn};

use super::key::CacheKey;
use super::traits::{CacheEntry, CacheResult, ResponseCache};
use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse, Transport};

/// HTTP client that answers idempotent requests from the response cache.
///
/// Successful (2xx) responses to GET requests are stored before they are
/// returned. Failures are never cached, and other methods always go to the
/// network.
#[derive(Clone)]
pub struct CachingHttpClient {
  transport: Arc<dyn Transport>,
  cache: Arc<dyn ResponseCache>,
  stats: Arc<CacheStats>,
}

#[derive(Debug, Default)]
pub struct CacheStats {
  hits: AtomicU64,
  misses: AtomicU64,
}

impl CacheStats {
  pub fn hits(&self) -> u64 {
    self.hits.load(Ordering::Relaxed)
  }

  pub fn misses(&self) -> u64 {
    self.misses.load(Ordering::Relaxed)
  }
}

impl CachingHttpClient {
  pub fn new(transport: Arc<dyn Transport>, cache: Arc<dyn ResponseCache>) -> Self {
    Self {
      transport,
      cache,
      stats: Arc::new(CacheStats::default()),
    }
  }

  pub fn stats(&self) -> &CacheStats {
    &self.stats
  }

  /// Send a request, cache-first for idempotent methods.
  pub async fn send(&self, request: &HttpRequest) -> Result<CacheResult<HttpResponse>> {
    if !request.method.is_idempotent() {
      let response = self.transport.execute(request).await?;
      return Ok(CacheResult::from_network(response));
    }

    let key = CacheKey::for_request(request);

    match self.cache.get(&key) {
      Ok(Some(entry)) => {
        self.stats.hits.fetch_add(1, Ordering::Relaxed);
        debug!(url = %request.url, key = %key, "cache hit");
        let cached_at = entry.cached_at;
        return Ok(CacheResult::from_cache(entry.into_response(), cached_at));
      }
      Ok(None) => {}
      Err(e) => {
        warn!(url = %request.url, error = %e, "cache read failed, fetching from network");
      }
    }

    self.stats.misses.fetch_add(1, Ordering::Relaxed);
    let response = self.transport.execute(request).await?;

    if response.is_success() {
      let entry = CacheEntry::new(request.method.as_str(), request.url.as_str(), &response);
      self.cache.put(&key, &entry)?;
    } else {
      debug!(url = %request.url, status = response.status, "not caching error response");
    }

    Ok(CacheResult::from_network(response))
  }
}
