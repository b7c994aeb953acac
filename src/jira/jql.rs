//! JQL for the worklog search.
//!
//! The query text is a pure function of its inputs, so identical runs
//! produce identical request URLs and therefore identical cache keys.

use chrono::NaiveDate;
use std::collections::BTreeSet;

use crate::report::filter::{DateRange, ReportFilter};

/// Upper bound for `timeSpent` that no real issue reaches (in seconds,
/// roughly 31 years). The bound is part of the query only to keep its shape
/// stable across server versions.
pub const UNBOUNDED_TIME_SPENT: u64 = 999_999_999;

/// Inputs for the worklog search query.
#[derive(Debug, Clone)]
pub struct WorklogQuery<'a> {
  pub range: &'a DateRange,
  pub filter: &'a ReportFilter,
  pub max_time_spent: u64,
}

impl<'a> WorklogQuery<'a> {
  pub fn new(range: &'a DateRange, filter: &'a ReportFilter) -> Self {
    Self {
      range,
      filter,
      max_time_spent: UNBOUNDED_TIME_SPENT,
    }
  }

  pub fn with_max_time_spent(mut self, max_time_spent: u64) -> Self {
    self.max_time_spent = max_time_spent;
    self
  }

  pub fn to_jql(&self) -> String {
    let mut jql = format!(
      "worklogDate >= {} and worklogDate <= {} and timespent > 0 and timeSpent < {}",
      date(self.range.start()),
      date(self.range.end()),
      self.max_time_spent
    );

    if let Some(labels) = &self.filter.labels {
      jql.push_str(&format!(" and labels in ({})", list(labels)));
    }

    if let Some(excluded) = &self.filter.excluded_labels {
      jql.push_str(&format!(
        " and (labels not in ({}) OR labels is EMPTY)",
        list(excluded)
      ));
    }

    if let Some(authors) = &self.filter.authors {
      jql.push_str(&format!(" and worklogAuthor in ({})", list(authors)));
    }

    if let Some(projects) = &self.filter.projects {
      jql.push_str(&format!(" and project in ({})", list(projects)));
    }

    jql
  }
}

fn date(d: NaiveDate) -> String {
  quote(&d.format("%Y-%m-%d").to_string())
}

fn list(values: &BTreeSet<String>) -> String {
  values
    .iter()
    .map(|v| quote(v))
    .collect::<Vec<_>>()
    .join(", ")
}

/// Double-quote a JQL value, escaping backslashes and quotes.
fn quote(value: &str) -> String {
  let mut out = String::with_capacity(value.len() + 2);
  out.push('"');
  for c in value.chars() {
    if c == '"' || c == '\\' {
      out.push('\\');
    }
    out.push(c);
  }
  out.push('"');
  out
}
