//! Content-addressed keys for cached responses.

use sha2::{Digest, Sha256};
use url::Url;

use crate::http::HttpRequest;

/// Stable identifier of a request: SHA-256 over its canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
  pub fn for_request(request: &HttpRequest) -> Self {
    let mut hasher = Sha256::new();
    hasher.update(request.method.as_str().as_bytes());
    hasher.update(b"\n");
    hasher.update(canonical_url(&request.url).as_bytes());
    hasher.update(b"\n");
    if let Some(body) = &request.body {
      hasher.update(body);
    }
    Self(hex::encode(hasher.finalize()))
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for CacheKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(&self.0)
  }
}

/// URL with query pairs sorted by name so parameter order does not matter.
/// Repeated names keep their relative order.
fn canonical_url(url: &Url) -> String {
  let mut pairs: Vec<(String, String)> = url
    .query_pairs()
    .map(|(k, v)| (k.into_owned(), v.into_owned()))
    .collect();

  let mut canonical = url.clone();
  canonical.set_fragment(None);
  if pairs.is_empty() {
    canonical.set_query(None);
  } else {
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    canonical.query_pairs_mut().clear().extend_pairs(pairs);
  }
  canonical.to_string()
}
