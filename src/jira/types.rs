use chrono::NaiveDate;

/// An issue as returned by the worklog search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issue {
  pub key: String,
  pub project_key: String,
  pub labels: Vec<String>, // server order
  pub summary: String,
}

/// A single time entry on an issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorklogEntry {
  pub author_key: String,
  /// Raw start timestamp, e.g. "2024-03-01T09:30:00.000+0100"
  pub started: String,
  pub duration_seconds: u64,
  pub comment: String,
}

impl WorklogEntry {
  /// Calendar date of the start timestamp, ignoring time of day and offset.
  pub fn started_date(&self) -> Option<NaiveDate> {
    let date = self.started.get(..10)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
  }
}

/// One page of search results
#[derive(Debug, Clone)]
pub struct SearchPage {
  pub total: u64,
  pub issues: Vec<Issue>,
}
