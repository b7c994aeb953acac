//! Test doubles: a scripted transport, an in-memory Jira, a progress recorder.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use url::Url;

use crate::cache::{CachingHttpClient, SqliteStorage};
use crate::error::Result;
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::jira::client::JiraClient;
use crate::report::progress::Progress;

type Responder = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync>;

/// Transport that answers every request with a closure and counts calls.
pub struct ScriptedTransport {
  responder: Responder,
  calls: AtomicUsize,
  urls: Mutex<Vec<String>>,
}

impl ScriptedTransport {
  pub fn new<F>(responder: F) -> Self
  where
    F: Fn(&HttpRequest) -> Result<HttpResponse> + Send + Sync + 'static,
  {
    Self {
      responder: Box::new(responder),
      calls: AtomicUsize::new(0),
      urls: Mutex::new(Vec::new()),
    }
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  pub fn urls(&self) -> Vec<String> {
    self.urls.lock().unwrap().clone()
  }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.urls.lock().unwrap().push(request.url.to_string());
    (self.responder)(request)
  }
}

pub fn json_response(status: u16, body: &str) -> HttpResponse {
  let mut headers = BTreeMap::new();
  headers.insert("content-type".to_string(), "application/json".to_string());
  HttpResponse {
    status,
    headers,
    body: body.as_bytes().to_vec(),
  }
}

pub fn query_param(url: &Url, name: &str) -> Option<String> {
  url
    .query_pairs()
    .find(|(k, _)| k == name)
    .map(|(_, v)| v.into_owned())
}

/// In-memory Jira serving search pages and worklogs.
///
/// The search endpoint ignores the JQL and pages over every issue; the
/// filters of the pipeline are exercised on the client side.
#[derive(Clone, Default)]
pub struct FakeJira {
  issues: Vec<Value>,
  worklogs: HashMap<String, Vec<Value>>,
  /// Serve at most this many issues per page regardless of maxResults
  page_cap: Option<usize>,
  /// Report this total instead of the real issue count
  total_override: Option<u64>,
}

impl FakeJira {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn issue(mut self, key: &str, labels: &[&str], summary: &str) -> Self {
    let project = key.rsplit_once('-').map(|(p, _)| p).unwrap_or(key);
    self.issues.push(json!({
      "key": key,
      "fields": {"project": {"key": project}, "labels": labels, "summary": summary}
    }));
    self
  }

  pub fn worklog(mut self, issue: &str, author: &str, started: &str, seconds: u64, comment: &str) -> Self {
    self.worklogs.entry(issue.to_string()).or_default().push(json!({
      "author": {"key": author},
      "started": started,
      "timeSpentSeconds": seconds,
      "comment": comment
    }));
    self
  }

  pub fn page_cap(mut self, cap: usize) -> Self {
    self.page_cap = Some(cap);
    self
  }

  pub fn total_override(mut self, total: u64) -> Self {
    self.total_override = Some(total);
    self
  }

  pub fn into_transport(self) -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::new(move |req| Ok(self.respond(req))))
  }

  fn respond(&self, req: &HttpRequest) -> HttpResponse {
    let path = req.url.path();
    if path.ends_with("/search") {
      let start: usize = param(&req.url, "startAt");
      let mut max: usize = param(&req.url, "maxResults");
      if let Some(cap) = self.page_cap {
        max = max.min(cap);
      }
      let issues: Vec<&Value> = self.issues.iter().skip(start).take(max).collect();
      let total = self.total_override.unwrap_or(self.issues.len() as u64);
      let body = json!({"startAt": start, "maxResults": max, "total": total, "issues": issues});
      return json_response(200, &body.to_string());
    }

    if let Some(key) = path
      .strip_suffix("/worklog")
      .and_then(|p| p.rsplit('/').next())
    {
      let worklogs = self.worklogs.get(key).cloned().unwrap_or_default();
      let body = json!({"startAt": 0, "maxResults": worklogs.len(), "total": worklogs.len(), "worklogs": worklogs});
      return json_response(200, &body.to_string());
    }

    json_response(404, "{\"errorMessages\": [\"not found\"]}")
  }
}

fn param(url: &Url, name: &str) -> usize {
  query_param(url, name)
    .and_then(|v| v.parse().ok())
    .unwrap_or(0)
}

/// Jira client over a transport with a fresh in-memory cache.
pub fn client_for(transport: Arc<ScriptedTransport>) -> JiraClient {
  let storage = Arc::new(SqliteStorage::open_in_memory().unwrap());
  JiraClient::new("https://jira.example.com", CachingHttpClient::new(transport, storage)).unwrap()
}

/// Progress sink that records what it was told.
#[derive(Debug, Default)]
pub struct RecordingProgress {
  pub started: Vec<u64>,
  pub advanced: u64,
  pub finished: bool,
}

impl Progress for RecordingProgress {
  fn start(&mut self, total: u64) {
    self.started.push(total);
  }

  fn advance(&mut self, delta: u64) {
    self.advanced += delta;
  }

  fn finish(&mut self) {
    self.finished = true;
  }
}
