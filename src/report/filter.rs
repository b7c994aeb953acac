//! Date range and whitelist/blacklist filters.

use chrono::NaiveDate;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::jira::types::Issue;

#[derive(Error, Debug, PartialEq, Eq)]
#[error("Start date {start} is after end date {end}")]
pub struct InvalidRange {
  pub start: NaiveDate,
  pub end: NaiveDate,
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
  start: NaiveDate,
  end: NaiveDate,
}

impl DateRange {
  pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidRange> {
    if start > end {
      return Err(InvalidRange { start, end });
    }
    Ok(Self { start, end })
  }

  pub fn start(&self) -> NaiveDate {
    self.start
  }

  pub fn end(&self) -> NaiveDate {
    self.end
  }

  /// Both bounds included.
  pub fn contains(&self, date: NaiveDate) -> bool {
    self.start <= date && date <= self.end
  }

  /// Every day of the range in order.
  pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
    let end = self.end;
    self.start.iter_days().take_while(move |day| *day <= end)
  }
}

/// Whitelists and blacklist. `None` means "no restriction"; all filters
/// are AND-combined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
  pub authors: Option<BTreeSet<String>>,
  pub labels: Option<BTreeSet<String>>,
  pub projects: Option<BTreeSet<String>>,
  pub excluded_labels: Option<BTreeSet<String>>,
}

impl ReportFilter {
  /// Build from comma-split option values; empty lists mean no restriction.
  pub fn from_lists(
    authors: Vec<String>,
    labels: Vec<String>,
    projects: Vec<String>,
    excluded_labels: Vec<String>,
  ) -> Self {
    Self {
      authors: to_set(authors),
      labels: to_set(labels),
      projects: to_set(projects),
      excluded_labels: to_set(excluded_labels),
    }
  }

  /// Issue-level predicate: project whitelist, label blacklist, and at least
  /// one whitelisted label when a label whitelist is set.
  pub fn admits_issue(&self, issue: &Issue) -> bool {
    if let Some(projects) = &self.projects {
      if !projects.contains(&issue.project_key) {
        return false;
      }
    }

    if let Some(excluded) = &self.excluded_labels {
      if issue.labels.iter().any(|l| excluded.contains(l)) {
        return false;
      }
    }

    if self.labels.is_some() && self.narrow_labels(&issue.labels).is_empty() {
      return false;
    }

    true
  }

  /// Labels of an issue restricted to the label whitelist, in issue order.
  pub fn narrow_labels(&self, labels: &[String]) -> Vec<String> {
    match &self.labels {
      Some(whitelist) => labels
        .iter()
        .filter(|l| whitelist.contains(*l))
        .cloned()
        .collect(),
      None => labels.to_vec(),
    }
  }

  pub fn admits_author(&self, author: &str) -> bool {
    self
      .authors
      .as_ref()
      .map_or(true, |authors| authors.contains(author))
  }
}

fn to_set(values: Vec<String>) -> Option<BTreeSet<String>> {
  let set: BTreeSet<String> = values
    .into_iter()
    .map(|v| v.trim().to_string())
    .filter(|v| !v.is_empty())
    .collect();
  if set.is_empty() {
    None
  } else {
    Some(set)
  }
}
