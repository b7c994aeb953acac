use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::cache::CachingHttpClient;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse};
use crate::jira::api_types::{ApiErrorResponse, ApiSearchResponse, ApiWorklogResponse};
use crate::jira::types::{SearchPage, WorklogEntry};

/// Page size used when walking an issue's worklog list.
const WORKLOG_PAGE_SIZE: u64 = 1000;

/// Jira REST API client on top of the caching HTTP layer
#[derive(Clone)]
pub struct JiraClient {
  http: CachingHttpClient,
  base_url: Url,
}

impl JiraClient {
  /// `endpoint` is the Jira base URL, e.g. "https://jira.example.com" or
  /// "https://example.com/jira".
  pub fn new(endpoint: &str, http: CachingHttpClient) -> Result<Self> {
    let mut base_url =
      Url::parse(endpoint).map_err(|e| Error::Endpoint(format!("{}: {}", endpoint, e)))?;
    if base_url.cannot_be_a_base() {
      return Err(Error::Endpoint(endpoint.to_string()));
    }
    // Url::join drops the last path segment unless it ends with a slash
    if !base_url.path().ends_with('/') {
      let path = format!("{}/", base_url.path());
      base_url.set_path(&path);
    }

    Ok(Self { http, base_url })
  }

  pub fn http(&self) -> &CachingHttpClient {
    &self.http
  }

  fn api_url(&self, segments: &[&str]) -> Result<Url> {
    let mut url = self
      .base_url
      .join("rest/api/2/")
      .map_err(|e| Error::Endpoint(e.to_string()))?;
    url
      .path_segments_mut()
      .map_err(|_| Error::Endpoint(self.base_url.to_string()))?
      .pop_if_empty()
      .extend(segments);
    Ok(url)
  }

  /// Search issues with JQL, one page at a time
  pub async fn search(
    &self,
    jql: &str,
    start_at: u64,
    max_results: u64,
    fields: &[&str],
  ) -> Result<SearchPage> {
    let mut url = self.api_url(&["search"])?;
    url
      .query_pairs_mut()
      .append_pair("jql", jql)
      .append_pair("startAt", &start_at.to_string())
      .append_pair("maxResults", &max_results.to_string())
      .append_pair("fields", &fields.join(","));

    let response = self.get(&url).await?;

    if response.status == 400 {
      let body: ApiErrorResponse = serde_json::from_slice(&response.body).unwrap_or_default();
      let message = body.message();
      return Err(Error::Query(if message.is_empty() {
        response.text()
      } else {
        message
      }));
    }

    let page: ApiSearchResponse = decode(&url, response.error_for_status(&url)?)?;
    debug!(start_at, returned = page.issues.len(), total = page.total, "search page");
    Ok(page.into())
  }

  /// Get all worklog entries of an issue
  pub async fn get_worklogs(&self, issue_key: &str) -> Result<Vec<WorklogEntry>> {
    let mut all_entries = Vec::new();
    let mut start_at = 0u64;

    loop {
      let mut url = self.api_url(&["issue", issue_key, "worklog"])?;
      url
        .query_pairs_mut()
        .append_pair("startAt", &start_at.to_string())
        .append_pair("maxResults", &WORKLOG_PAGE_SIZE.to_string());

      let response = self.get(&url).await?.error_for_status(&url)?;
      let page: ApiWorklogResponse = decode(&url, response)?;

      let count = page.worklogs.len() as u64;
      all_entries.extend(page.worklogs.into_iter().map(WorklogEntry::from));

      // Check if we've fetched all entries
      if count == 0 || start_at + count >= page.total {
        break;
      }
      start_at += count;
    }

    Ok(all_entries)
  }

  async fn get(&self, url: &Url) -> Result<HttpResponse> {
    let result = self.http.send(&HttpRequest::get(url.clone())).await?;
    debug!(url = %url, source = ?result.source, cached_at = ?result.cached_at, "response");
    Ok(result.data)
  }
}

fn decode<T: DeserializeOwned>(url: &Url, response: HttpResponse) -> Result<T> {
  serde_json::from_slice(&response.body).map_err(|source| Error::Decode {
    url: url.to_string(),
    source,
  })
}
