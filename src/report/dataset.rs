//! Rows grouped per project, and the finalize step that orders them.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use super::table::Sheet;
use crate::jira::types::{Issue, WorklogEntry};

/// One exported worklog line.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
  pub date: NaiveDate,
  pub issue_key: String,
  pub duration_seconds: u64,
  pub duration_minutes: i64,
  pub duration_hours: f64,
  pub author: String,
  /// Narrowed labels in issue order
  pub labels: Vec<String>,
  pub summary: String,
  pub comment: String,
}

impl ReportRow {
  pub fn new(issue: &Issue, labels: &[String], entry: &WorklogEntry, date: NaiveDate) -> Self {
    let seconds = entry.duration_seconds as f64;
    Self {
      date,
      issue_key: issue.key.clone(),
      duration_seconds: entry.duration_seconds,
      duration_minutes: (seconds / 60.0).round() as i64,
      duration_hours: (seconds / 3600.0 * 100.0).round() / 100.0,
      author: entry.author_key.clone(),
      labels: labels.to_vec(),
      summary: issue.summary.clone(),
      comment: entry.comment.clone(),
    }
  }
}

/// Rows per project in append order.
#[derive(Debug, Clone, Default)]
pub struct ReportDataset {
  projects: BTreeMap<String, Vec<ReportRow>>,
}

impl ReportDataset {
  pub fn push(&mut self, project: &str, row: ReportRow) {
    self
      .projects
      .entry(project.to_string())
      .or_default()
      .push(row);
  }

  pub fn is_empty(&self) -> bool {
    self.projects.values().all(Vec::is_empty)
  }

  pub fn row_count(&self) -> usize {
    self.projects.values().map(Vec::len).sum()
  }

  /// Projects in key order with their rows in append order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &[ReportRow])> {
    self
      .projects
      .iter()
      .filter(|(_, rows)| !rows.is_empty())
      .map(|(project, rows)| (project.as_str(), rows.as_slice()))
  }

  /// Projects sorted by key; within a project the last appended row comes
  /// first.
  pub fn finalize(self) -> Vec<Sheet> {
    self
      .projects
      .into_iter()
      .filter(|(_, rows)| !rows.is_empty())
      .map(|(project, mut rows)| {
        rows.reverse();
        Sheet::from_rows(&project, &rows)
      })
      .collect()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::report::table::Cell;

  fn issue(key: &str) -> Issue {
    Issue {
      key: key.into(),
      project_key: key.split('-').next().unwrap().into(),
      labels: vec![],
      summary: format!("Summary of {}", key),
    }
  }

  fn entry(seconds: u64) -> WorklogEntry {
    WorklogEntry {
      author_key: "u1".into(),
      started: "2024-03-01T10:00:00.000+0000".into(),
      duration_seconds: seconds,
      comment: "work".into(),
    }
  }

  fn date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
  }

  #[test]
  fn test_durations_are_rounded() {
    let row = ReportRow::new(&issue("ABC-1"), &[], &entry(5430), date());
    // 90.5 minutes rounds half away from zero
    assert_eq!(row.duration_minutes, 91);
    // 1.508333 hours
    assert_eq!(row.duration_hours, 1.51);

    let row = ReportRow::new(&issue("ABC-1"), &[], &entry(1200), date());
    assert_eq!(row.duration_minutes, 20);
    assert_eq!(row.duration_hours, 0.33);
  }

  #[test]
  fn test_row_keeps_seconds_and_labels() {
    let labels = vec!["b".to_string(), "c".to_string()];
    let row = ReportRow::new(&issue("ABC-1"), &labels, &entry(60), date());
    assert_eq!(row.duration_seconds, 60);
    assert_eq!(row.labels, labels);
  }

  #[test]
  fn test_finalize_sorts_projects_and_reverses_rows() {
    let mut dataset = ReportDataset::default();
    dataset.push("XYZ", ReportRow::new(&issue("XYZ-1"), &[], &entry(60), date()));
    dataset.push("ABC", ReportRow::new(&issue("ABC-1"), &[], &entry(60), date()));
    dataset.push("ABC", ReportRow::new(&issue("ABC-2"), &[], &entry(60), date()));

    assert_eq!(dataset.row_count(), 3);
    let projects: Vec<&str> = dataset.iter().map(|(p, _)| p).collect();
    assert_eq!(projects, vec!["ABC", "XYZ"]);

    let sheets = dataset.finalize();
    let names: Vec<&str> = sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["ABC", "XYZ"]);
    assert_eq!(sheets[0].rows[0][1], Cell::Text("ABC-2".into()));
    assert_eq!(sheets[0].rows[1][1], Cell::Text("ABC-1".into()));
  }

  #[test]
  fn test_empty_dataset() {
    let dataset = ReportDataset::default();
    assert!(dataset.is_empty());
    assert_eq!(dataset.row_count(), 0);
    assert!(dataset.finalize().is_empty());
  }
}
