//! Error types for the extraction core.
//!
//! Every fatal condition of a run maps to one variant here; `kind()` groups
//! them into the categories reported to the user.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Network request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Authentication failed for {url}: check jira.user and the password")]
  Unauthorized { url: String },

  #[error("Server returned HTTP {status} for {url}: {body}")]
  Status {
    status: u16,
    url: String,
    body: String,
  },

  #[error("Failed to parse server response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: serde_json::Error,
  },

  #[error("Invalid Jira endpoint: {0}")]
  Endpoint(String),

  #[error("The server rejected the search query: {0}")]
  Query(String),

  #[error("Response cache error: {0}")]
  Storage(String),

  #[error("No matching worklogs found in the requested period with the given filters")]
  NoData,

  #[error("Failed to write report: {0}")]
  Export(#[from] rust_xlsxwriter::XlsxError),

  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
}

/// Broad error categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Transport,
  Query,
  Storage,
  NoData,
  Export,
}

impl Error {
  pub fn storage(context: &str, err: impl std::fmt::Display) -> Self {
    Error::Storage(format!("{}: {}", context, err))
  }

  pub fn kind(&self) -> ErrorKind {
    match self {
      Error::Http(_)
      | Error::Unauthorized { .. }
      | Error::Status { .. }
      | Error::Decode { .. }
      | Error::Endpoint(_) => ErrorKind::Transport,
      Error::Query(_) => ErrorKind::Query,
      Error::Storage(_) => ErrorKind::Storage,
      Error::NoData => ErrorKind::NoData,
      Error::Export(_) | Error::Io(_) => ErrorKind::Export,
    }
  }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_kinds() {
    assert_eq!(Error::NoData.kind(), ErrorKind::NoData);
    assert_eq!(Error::Query("bad".into()).kind(), ErrorKind::Query);
    assert_eq!(
      Error::storage("open", "locked").kind(),
      ErrorKind::Storage
    );
    assert_eq!(
      Error::Unauthorized {
        url: "http://x".into()
      }
      .kind(),
      ErrorKind::Transport
    );
  }

  #[test]
  fn test_storage_message_carries_context() {
    let err = Error::storage("Failed to read cache entry", "disk I/O error");
    assert_eq!(
      err.to_string(),
      "Response cache error: Failed to read cache entry: disk I/O error"
    );
  }
}
