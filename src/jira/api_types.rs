//! Serde-deserializable types matching Jira API responses.
//!
//! These types are separate from domain types to allow clean deserialization
//! while keeping domain types focused on application needs.

use serde::Deserialize;
use std::collections::HashMap;

use super::types::{Issue, SearchPage, WorklogEntry};

// ============================================================================
// Search endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiProject {
  pub key: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiIssueFields {
  #[serde(default)]
  pub summary: String,
  pub project: Option<ApiProject>,
  #[serde(default)]
  pub labels: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiIssue {
  pub key: String,
  #[serde(default)]
  pub fields: ApiIssueFields,
}

#[derive(Debug, Deserialize)]
pub struct ApiSearchResponse {
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub issues: Vec<ApiIssue>,
}

// ============================================================================
// Worklog endpoint response
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ApiUser {
  pub key: Option<String>,
  pub name: Option<String>,
  #[serde(rename = "accountId")]
  pub account_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ApiWorklog {
  pub author: Option<ApiUser>,
  #[serde(default)]
  pub started: String,
  #[serde(rename = "timeSpentSeconds", default)]
  pub time_spent_seconds: u64,
  // Plain string in API v2, an ADF document in v3
  pub comment: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ApiWorklogResponse {
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub worklogs: Vec<ApiWorklog>,
}

// ============================================================================
// Error body
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct ApiErrorResponse {
  #[serde(rename = "errorMessages", default)]
  pub error_messages: Vec<String>,
  #[serde(default)]
  pub errors: HashMap<String, String>,
}

impl ApiErrorResponse {
  /// All messages in one line, field errors sorted by field name.
  pub fn message(&self) -> String {
    let mut parts = self.error_messages.clone();
    let mut fields: Vec<_> = self.errors.iter().collect();
    fields.sort();
    parts.extend(fields.into_iter().map(|(field, msg)| format!("{}: {}", field, msg)));
    parts.join("; ")
  }
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl From<ApiIssue> for Issue {
  fn from(issue: ApiIssue) -> Self {
    let f = issue.fields;
    let project_key = f
      .project
      .map(|p| p.key)
      .unwrap_or_else(|| project_from_issue_key(&issue.key));
    Issue {
      key: issue.key,
      project_key,
      labels: f.labels,
      summary: f.summary,
    }
  }
}

impl From<ApiSearchResponse> for SearchPage {
  fn from(resp: ApiSearchResponse) -> Self {
    SearchPage {
      total: resp.total,
      issues: resp.issues.into_iter().map(Issue::from).collect(),
    }
  }
}

impl From<ApiWorklog> for WorklogEntry {
  fn from(worklog: ApiWorklog) -> Self {
    let author = worklog.author.unwrap_or_default();
    WorklogEntry {
      author_key: author
        .key
        .or(author.name)
        .or(author.account_id)
        .unwrap_or_default(),
      started: worklog.started,
      duration_seconds: worklog.time_spent_seconds,
      comment: worklog
        .comment
        .as_ref()
        .and_then(extract_comment)
        .unwrap_or_default(),
    }
  }
}

// ============================================================================
// Helpers
// ============================================================================

/// "ABC-123" -> "ABC"
fn project_from_issue_key(key: &str) -> String {
  key
    .rsplit_once('-')
    .map(|(project, _)| project.to_string())
    .unwrap_or_else(|| key.to_string())
}

/// Extract plain text from a comment in plain text or ADF format
fn extract_comment(value: &serde_json::Value) -> Option<String> {
  // If it's a string, return it directly (API v2)
  if let Some(s) = value.as_str() {
    return Some(s.to_string());
  }

  // If it's an ADF document (API v3), extract text content
  if let Some(content) = value.get("content").and_then(|v| v.as_array()) {
    let mut text = String::new();
    extract_adf_text(content, &mut text);
    let text = text.trim_end().to_string();
    if !text.is_empty() {
      return Some(text);
    }
  }

  None
}

/// Recursively extract text from ADF content
fn extract_adf_text(content: &[serde_json::Value], output: &mut String) {
  for node in content {
    let Some(node_type) = node.get("type").and_then(|v| v.as_str()) else {
      continue;
    };
    match node_type {
      "text" => {
        if let Some(text) = node.get("text").and_then(|v| v.as_str()) {
          output.push_str(text);
        }
      }
      "hardBreak" => output.push('\n'),
      _ => {
        if let Some(children) = node.get("content").and_then(|v| v.as_array()) {
          extract_adf_text(children, output);
        }
        if node_type == "paragraph" || node_type == "heading" {
          output.push('\n');
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_search_response_into_page() {
    let resp: ApiSearchResponse = serde_json::from_value(json!({
      "startAt": 0,
      "maxResults": 100,
      "total": 2,
      "issues": [
        {"key": "ABC-1", "fields": {"project": {"key": "ABC"}, "labels": ["x", "y"], "summary": "First"}},
        {"key": "XYZ-7", "fields": {"summary": "No project field"}}
      ]
    }))
    .unwrap();

    let page = SearchPage::from(resp);
    assert_eq!(page.total, 2);
    assert_eq!(page.issues[0].project_key, "ABC");
    assert_eq!(page.issues[0].labels, vec!["x", "y"]);
    assert_eq!(page.issues[1].project_key, "XYZ");
    assert!(page.issues[1].labels.is_empty());
  }

  #[test]
  fn test_worklog_author_fallbacks() {
    let server: ApiWorklog = serde_json::from_value(json!({
      "author": {"key": "jdoe", "name": "john", "displayName": "John Doe"},
      "started": "2024-03-01T09:00:00.000+0000",
      "timeSpentSeconds": 3600,
      "comment": "Reviewed PR"
    }))
    .unwrap();
    let entry = WorklogEntry::from(server);
    assert_eq!(entry.author_key, "jdoe");
    assert_eq!(entry.duration_seconds, 3600);
    assert_eq!(entry.comment, "Reviewed PR");

    let cloud: ApiWorklog = serde_json::from_value(json!({
      "author": {"accountId": "5b10a2844c20165700ede21g"},
      "started": "2024-03-01T09:00:00.000+0000",
      "timeSpentSeconds": 60
    }))
    .unwrap();
    let entry = WorklogEntry::from(cloud);
    assert_eq!(entry.author_key, "5b10a2844c20165700ede21g");
    assert_eq!(entry.comment, "");
  }

  #[test]
  fn test_adf_comment_is_flattened() {
    let worklog: ApiWorklog = serde_json::from_value(json!({
      "started": "2024-03-01T09:00:00.000+0000",
      "timeSpentSeconds": 60,
      "comment": {
        "type": "doc",
        "version": 1,
        "content": [
          {"type": "paragraph", "content": [{"type": "text", "text": "Fixed"}, {"type": "hardBreak"}, {"type": "text", "text": "the bug"}]},
          {"type": "paragraph", "content": [{"type": "text", "text": "Deployed"}]}
        ]
      }
    }))
    .unwrap();

    assert_eq!(WorklogEntry::from(worklog).comment, "Fixed\nthe bug\nDeployed");
  }

  #[test]
  fn test_error_message() {
    let err: ApiErrorResponse = serde_json::from_value(json!({
      "errorMessages": ["Error in the JQL Query: Expecting ')' but got the end of the query."],
      "errors": {"jql": "bad"}
    }))
    .unwrap();
    assert_eq!(
      err.message(),
      "Error in the JQL Query: Expecting ')' but got the end of the query.; jql: bad"
    );
  }

  #[test]
  fn test_project_from_issue_key() {
    assert_eq!(project_from_issue_key("ABC-12"), "ABC");
    assert_eq!(project_from_issue_key("MY-PROJ-3"), "MY-PROJ");
    assert_eq!(project_from_issue_key("weird"), "weird");
  }
}
