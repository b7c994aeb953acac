//! HTTP request/response values and the network transport.
//!
//! Requests and responses are plain owned values so they can be hashed,
//! stored in the response cache and replayed without a live connection.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use url::Url;

use crate::config::JiraConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  /// Test-only; never served from the cache
  #[cfg(test)]
  Post,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      #[cfg(test)]
      Method::Post => "POST",
    }
  }

  /// Only idempotent requests may be answered from the response cache.
  pub fn is_idempotent(&self) -> bool {
    matches!(self, Method::Get)
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
  pub method: Method,
  pub url: Url,
  pub body: Option<Vec<u8>>,
}

impl HttpRequest {
  pub fn get(url: Url) -> Self {
    Self {
      method: Method::Get,
      url,
      body: None,
    }
  }

  #[cfg(test)]
  pub fn post(url: Url, body: impl Into<Vec<u8>>) -> Self {
    Self {
      method: Method::Post,
      url,
      body: Some(body.into()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  pub status: u16,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Body as text, lossy. Used for error messages.
  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }

  /// Convert a non-2xx response into the matching error.
  pub fn error_for_status(self, url: &Url) -> Result<Self> {
    match self.status {
      200..=299 => Ok(self),
      401 | 403 => Err(Error::Unauthorized {
        url: url.to_string(),
      }),
      status => Err(Error::Status {
        status,
        url: url.to_string(),
        body: truncate(&self.text(), 500),
      }),
    }
  }
}

fn truncate(s: &str, max_chars: usize) -> String {
  if s.chars().count() <= max_chars {
    s.to_string()
  } else {
    let mut out: String = s.chars().take(max_chars).collect();
    out.push('…');
    out
  }
}

/// Something that can execute an HTTP request.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Real network transport with basic authentication.
pub struct ReqwestTransport {
  client: Client,
  user: String,
  password: String,
}

impl ReqwestTransport {
  pub fn new(config: &JiraConfig) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;

    Ok(Self {
      client,
      user: config.user.clone(),
      password: config.password.clone(),
    })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
    let method = match request.method {
      Method::Get => reqwest::Method::GET,
      #[cfg(test)]
      Method::Post => reqwest::Method::POST,
    };

    let mut builder = self
      .client
      .request(method, request.url.clone())
      .basic_auth(&self.user, Some(&self.password))
      .header(ACCEPT, "application/json")
      .header(USER_AGENT, concat!("jwx/", env!("CARGO_PKG_VERSION")));

    if let Some(body) = &request.body {
      builder = builder
        .header(CONTENT_TYPE, "application/json")
        .body(body.clone());
    }

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .filter_map(|(name, value)| {
        value
          .to_str()
          .ok()
          .map(|v| (name.as_str().to_string(), v.to_string()))
      })
      .collect();
    let body = response.bytes().await?.to_vec();

    tracing::debug!(
      method = request.method.as_str(),
      url = %request.url,
      status,
      bytes = body.len(),
      "network request"
    );

    Ok(HttpResponse {
      status,
      headers,
      body,
    })
  }
}
