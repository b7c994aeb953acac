//! Paged extraction of worklogs into a grouped report.
//!
//! The pipeline walks the search results page by page, fetches each
//! admitted issue's worklogs, filters the entries and appends rows per
//! project. Pages are strictly sequential; within a page up to
//! `concurrency` worklog fetches are in flight, consumed in issue order.

use futures::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use super::aggregate::ReportKind;
use super::dataset::{ReportDataset, ReportRow};
use super::filter::{DateRange, ReportFilter};
use super::progress::Progress;
use super::table::Sheet;
use crate::error::{Error, Result};
use crate::jira::client::JiraClient;
use crate::jira::jql::{WorklogQuery, UNBOUNDED_TIME_SPENT};
use crate::jira::types::Issue;

/// Issue fields requested from the search endpoint.
pub const SEARCH_FIELDS: &[&str] = &["key", "project", "labels", "summary"];

pub const DEFAULT_PAGE_SIZE: u64 = 100;

#[derive(Debug, Clone)]
pub struct PipelineOptions {
  pub page_size: u64,
  /// Worklog fetches in flight per page (at least 1)
  pub concurrency: usize,
  /// Upper `timeSpent` bound of the search query
  pub max_time_spent: u64,
}

impl Default for PipelineOptions {
  fn default() -> Self {
    Self {
      page_size: DEFAULT_PAGE_SIZE,
      concurrency: 1,
      max_time_spent: UNBOUNDED_TIME_SPENT,
    }
  }
}

/// Where a pipeline run is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineState {
  Idle,
  /// Fetching the page at `offset`; `total` is known after the first page
  Paging { offset: u64, total: Option<u64> },
  Finalizing,
  Done,
  Failed(String),
}

/// Counters collected during a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionStats {
  pub pages: u64,
  pub issues_visited: u64,
  pub issues_skipped: u64,
  pub worklogs_seen: u64,
  pub skipped_author: u64,
  pub skipped_date: u64,
  pub rows: u64,
  /// Issues whose narrowed labels had more than one entry
  pub multi_label_issues: Vec<String>,
}

/// Filtered rows of a run, before any layout.
#[derive(Debug, Clone)]
pub struct Extraction {
  pub dataset: ReportDataset,
  pub stats: ExtractionStats,
}

/// Finalized result of a run.
#[derive(Debug, Clone)]
pub struct Report {
  pub sheets: Vec<Sheet>,
  pub stats: ExtractionStats,
}

pub struct ExtractionPipeline {
  client: JiraClient,
  range: DateRange,
  filter: ReportFilter,
  options: PipelineOptions,
  state: PipelineState,
}

impl ExtractionPipeline {
  pub fn new(client: JiraClient, range: DateRange, filter: ReportFilter) -> Self {
    Self {
      client,
      range,
      filter,
      options: PipelineOptions::default(),
      state: PipelineState::Idle,
    }
  }

  pub fn with_options(mut self, options: PipelineOptions) -> Self {
    self.options = options;
    self
  }

  pub fn state(&self) -> &PipelineState {
    &self.state
  }

  /// Run the extraction and lay the rows out as `kind`.
  pub async fn run(&mut self, kind: ReportKind, progress: &mut dyn Progress) -> Result<Report> {
    let Extraction { dataset, stats } = self.extract(progress).await?;
    let sheets = kind.build(dataset, &self.range);
    debug!(?kind, sheets = sheets.len(), "report built");
    Ok(Report { sheets, stats })
  }

  /// Run the extraction to completion.
  ///
  /// Fails with `NoData` when nothing matched; any transport, query or
  /// storage error aborts the run without producing a dataset.
  pub async fn extract(&mut self, progress: &mut dyn Progress) -> Result<Extraction> {
    let (dataset, mut stats) = match self.collect(progress).await {
      Ok(collected) => collected,
      Err(e) => {
        error!(kind = ?e.kind(), error = %e, "extraction failed");
        self.state = PipelineState::Failed(e.to_string());
        return Err(e);
      }
    };

    self.state = PipelineState::Finalizing;
    if dataset.is_empty() {
      let err = Error::NoData;
      self.state = PipelineState::Failed(err.to_string());
      return Err(err);
    }

    stats.rows = dataset.row_count() as u64;
    self.state = PipelineState::Done;

    info!(
      pages = stats.pages,
      issues = stats.issues_visited,
      worklogs = stats.worklogs_seen,
      rows = stats.rows,
      cache_hits = self.client.http().stats().hits(),
      cache_misses = self.client.http().stats().misses(),
      "extraction finished"
    );

    Ok(Extraction { dataset, stats })
  }

  async fn collect(
    &mut self,
    progress: &mut dyn Progress,
  ) -> Result<(ReportDataset, ExtractionStats)> {
    let jql = WorklogQuery::new(&self.range, &self.filter)
      .with_max_time_spent(self.options.max_time_spent)
      .to_jql();
    debug!(jql = %jql, "worklog search");

    let mut dataset = ReportDataset::default();
    let mut stats = ExtractionStats::default();
    let mut offset = 0u64;
    let mut total: Option<u64> = None;

    loop {
      self.state = PipelineState::Paging { offset, total };

      let page = self
        .client
        .search(&jql, offset, self.options.page_size, SEARCH_FIELDS)
        .await?;
      stats.pages += 1;

      // Only the first page's total bounds the loop
      let bound = match total {
        Some(bound) => {
          if page.total != bound {
            warn!(first = bound, now = page.total, offset, "search total changed between pages");
          }
          bound
        }
        None => {
          progress.start(page.total);
          total = Some(page.total);
          page.total
        }
      };

      if page.issues.is_empty() {
        if offset < bound {
          warn!(offset, total = bound, "empty search page before reaching the total");
        }
        break;
      }

      offset += page.issues.len() as u64;
      self
        .process_page(page.issues, &mut dataset, &mut stats, progress)
        .await?;

      if offset >= bound {
        break;
      }
    }

    progress.finish();
    Ok((dataset, stats))
  }

  async fn process_page(
    &self,
    issues: Vec<Issue>,
    dataset: &mut ReportDataset,
    stats: &mut ExtractionStats,
    progress: &mut dyn Progress,
  ) -> Result<()> {
    let mut admitted = Vec::with_capacity(issues.len());

    for issue in issues {
      stats.issues_visited += 1;

      if !self.filter.admits_issue(&issue) {
        debug!(issue = %issue.key, "issue excluded by filters");
        stats.issues_skipped += 1;
        progress.advance(1);
        continue;
      }

      let labels = self.filter.narrow_labels(&issue.labels);
      if labels.len() > 1 {
        warn!(issue = %issue.key, labels = %labels.join(", "), "issue has multiple labels");
        stats.multi_label_issues.push(issue.key.clone());
      }
      admitted.push((issue, labels));
    }

    let mut fetches = stream::iter(admitted.into_iter().map(|(issue, labels)| {
      let client = self.client.clone();
      async move {
        let worklogs = client.get_worklogs(&issue.key).await;
        (issue, labels, worklogs)
      }
    }))
    .buffered(self.options.concurrency.max(1));

    while let Some((issue, labels, worklogs)) = fetches.next().await {
      for entry in worklogs? {
        stats.worklogs_seen += 1;

        if !self.filter.admits_author(&entry.author_key) {
          stats.skipped_author += 1;
          continue;
        }

        let Some(date) = entry.started_date() else {
          warn!(issue = %issue.key, started = %entry.started, "unparseable worklog start date");
          stats.skipped_date += 1;
          continue;
        };

        if !self.range.contains(date) {
          stats.skipped_date += 1;
          continue;
        }

        dataset.push(
          &issue.project_key,
          ReportRow::new(&issue, &labels, &entry, date),
        );
      }
      progress.advance(1);
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::report::table::Cell;
  use crate::testing::{client_for, FakeJira, RecordingProgress};
  use chrono::NaiveDate;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn march(first: u32, last: u32) -> DateRange {
    DateRange::new(date(2024, 3, first), date(2024, 3, last)).unwrap()
  }

  fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
  }

  fn many_issues(count: usize) -> FakeJira {
    (0..count).fold(FakeJira::new(), |fake, i| {
      let key = format!("ABC-{}", i + 1);
      fake
        .issue(&key, &[], "s")
        .worklog(&key, "u1", "2024-03-01T10:00:00.000+0000", 60, "")
    })
  }

  fn search_count(urls: &[String]) -> usize {
    urls.iter().filter(|u| u.contains("/search?")).count()
  }

  fn worklog_count(urls: &[String]) -> usize {
    urls.iter().filter(|u| u.contains("/worklog?")).count()
  }

  #[tokio::test]
  async fn test_end_to_end_two_projects() {
    let transport = FakeJira::new()
      .issue("ABC-1", &["dev"], "Build feature")
      .issue("ABC-2", &[], "Fix bug")
      .issue("XYZ-1", &["ops"], "Deploy")
      .worklog("ABC-1", "u1", "2024-03-01T09:00:00.000+0100", 3600, "first")
      .worklog("ABC-1", "u2", "2024-03-01T10:00:00.000+0100", 1800, "not whitelisted")
      .worklog("ABC-2", "u1", "2024-03-02T17:30:00.000+0100", 5400, "second")
      .worklog("XYZ-1", "u1", "2024-03-02T08:00:00.000+0100", 900, "deploy")
      .worklog("XYZ-1", "u1", "2024-03-03T08:00:00.000+0100", 900, "outside range")
      .into_transport();

    let filter = ReportFilter::from_lists(strings(&["u1"]), vec![], vec![], vec![]);
    let mut pipeline = ExtractionPipeline::new(client_for(transport.clone()), march(1, 2), filter);
    let mut progress = RecordingProgress::default();

    let report = pipeline.run(ReportKind::WorklogEntries, &mut progress).await.unwrap();

    assert_eq!(pipeline.state(), &PipelineState::Done);
    let names: Vec<&str> = report.sheets.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(names, vec!["ABC", "XYZ"]);
    assert_eq!(report.sheets[0].rows.len(), 2);
    assert_eq!(report.sheets[1].rows.len(), 1);
    assert_eq!(report.stats.rows, 3);
    assert_eq!(report.stats.skipped_author, 1);
    assert_eq!(report.stats.skipped_date, 1);

    // Last appended row first
    assert_eq!(report.sheets[0].rows[0][1], Cell::Text("ABC-2".into()));
    assert_eq!(report.sheets[0].rows[1][1], Cell::Text("ABC-1".into()));

    assert_eq!(report.sheets[0].totals[2], Cell::Formula("=SUM(C2:C3)".into()));
    assert_eq!(report.sheets[0].totals[3], Cell::Formula("=SUM(D2:D3)".into()));
    assert_eq!(report.sheets[1].totals[2], Cell::Formula("=SUM(C2:C2)".into()));

    assert_eq!(progress.started, vec![3]);
    assert_eq!(progress.advanced, 3);
    assert!(progress.finished);
  }

  #[tokio::test]
  async fn test_pagination_visits_each_issue_once() {
    let transport = many_issues(250).into_transport();
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport.clone()), march(1, 31), ReportFilter::default());
    let mut progress = RecordingProgress::default();

    let report = pipeline.run(ReportKind::WorklogEntries, &mut progress).await.unwrap();

    let urls = transport.urls();
    assert_eq!(search_count(&urls), 3);
    assert_eq!(worklog_count(&urls), 250);
    assert_eq!(report.stats.issues_visited, 250);
    assert_eq!(report.stats.pages, 3);
    assert_eq!(progress.advanced, 250);
  }

  #[tokio::test]
  async fn test_offset_advances_by_returned_count() {
    // Server caps pages at 40 issues although 100 were requested
    let transport = many_issues(90).page_cap(40).into_transport();
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport.clone()), march(1, 31), ReportFilter::default());

    let report = pipeline.run(ReportKind::WorklogEntries, &mut RecordingProgress::default()).await.unwrap();

    assert_eq!(report.stats.pages, 3);
    assert_eq!(report.stats.issues_visited, 90);
    assert_eq!(report.stats.rows, 90);
  }

  #[tokio::test]
  async fn test_overstated_total_stops_on_empty_page() {
    let transport = many_issues(5).total_override(500).into_transport();
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport.clone()), march(1, 31), ReportFilter::default());

    let report = pipeline.run(ReportKind::WorklogEntries, &mut RecordingProgress::default()).await.unwrap();

    assert_eq!(search_count(&transport.urls()), 2);
    assert_eq!(report.stats.issues_visited, 5);
  }

  #[tokio::test]
  async fn test_understated_total_is_the_bound() {
    // Total snapshot from the first page ends the loop even if more exist
    let transport = many_issues(150).total_override(100).into_transport();
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport.clone()), march(1, 31), ReportFilter::default());

    let report = pipeline.run(ReportKind::WorklogEntries, &mut RecordingProgress::default()).await.unwrap();

    assert_eq!(search_count(&transport.urls()), 1);
    assert_eq!(report.stats.issues_visited, 100);
  }

  #[tokio::test]
  async fn test_date_bounds_are_inclusive() {
    let transport = FakeJira::new()
      .issue("ABC-1", &[], "s")
      .worklog("ABC-1", "u1", "2024-02-29T23:59:00.000+0000", 60, "day before")
      .worklog("ABC-1", "u1", "2024-03-01T00:00:00.000+0000", 60, "start")
      .worklog("ABC-1", "u1", "2024-03-02T23:59:59.000+0000", 60, "end")
      .worklog("ABC-1", "u1", "2024-03-03T00:00:00.000+0000", 60, "day after")
      .into_transport();
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport), march(1, 2), ReportFilter::default());

    let report = pipeline.run(ReportKind::WorklogEntries, &mut RecordingProgress::default()).await.unwrap();

    let comments: Vec<&Cell> = report.sheets[0].rows.iter().map(|r| &r[7]).collect();
    assert_eq!(
      comments,
      vec![&Cell::Text("end".into()), &Cell::Text("start".into())]
    );
  }

  #[tokio::test]
  async fn test_label_whitelist_narrows_and_flags_multi_label() {
    let transport = FakeJira::new()
      .issue("ABC-1", &["a", "b", "c"], "s")
      .worklog("ABC-1", "u1", "2024-03-01T10:00:00.000+0000", 60, "")
      .into_transport();
    let filter = ReportFilter::from_lists(vec![], strings(&["b", "c"]), vec![], vec![]);
    let mut pipeline = ExtractionPipeline::new(client_for(transport), march(1, 2), filter);

    let report = pipeline.run(ReportKind::WorklogEntries, &mut RecordingProgress::default()).await.unwrap();

    assert_eq!(report.sheets[0].rows[0][5], Cell::Text("b, c".into()));
    assert_eq!(report.stats.multi_label_issues, vec!["ABC-1".to_string()]);
  }

  #[tokio::test]
  async fn test_author_whitelist() {
    let transport = FakeJira::new()
      .issue("ABC-1", &[], "s")
      .worklog("ABC-1", "u1", "2024-03-01T10:00:00.000+0000", 60, "")
      .worklog("ABC-1", "u2", "2024-03-01T11:00:00.000+0000", 60, "")
      .worklog("ABC-1", "u1", "2024-03-01T12:00:00.000+0000", 60, "")
      .into_transport();
    let filter = ReportFilter::from_lists(strings(&["u1"]), vec![], vec![], vec![]);
    let mut pipeline = ExtractionPipeline::new(client_for(transport), march(1, 2), filter);

    let report = pipeline.run(ReportKind::WorklogEntries, &mut RecordingProgress::default()).await.unwrap();

    let authors: Vec<&Cell> = report.sheets[0].rows.iter().map(|r| &r[4]).collect();
    assert_eq!(authors.len(), 2);
    assert!(authors.iter().all(|a| **a == Cell::Text("u1".into())));
  }

  #[tokio::test]
  async fn test_excluded_issues_skip_worklog_fetch() {
    let transport = FakeJira::new()
      .issue("ABC-1", &["internal"], "s")
      .issue("ABC-2", &[], "s")
      .worklog("ABC-1", "u1", "2024-03-01T10:00:00.000+0000", 60, "")
      .worklog("ABC-2", "u1", "2024-03-01T10:00:00.000+0000", 60, "")
      .into_transport();
    let filter = ReportFilter::from_lists(vec![], vec![], vec![], strings(&["internal"]));
    let mut pipeline = ExtractionPipeline::new(client_for(transport.clone()), march(1, 2), filter);
    let mut progress = RecordingProgress::default();

    let report = pipeline.run(ReportKind::WorklogEntries, &mut progress).await.unwrap();

    assert_eq!(worklog_count(&transport.urls()), 1);
    assert_eq!(report.stats.issues_skipped, 1);
    assert_eq!(report.stats.rows, 1);
    assert_eq!(progress.advanced, 2);
  }

  #[tokio::test]
  async fn test_no_matching_rows_is_no_data() {
    let transport = FakeJira::new()
      .issue("ABC-1", &[], "s")
      .worklog("ABC-1", "u1", "2023-01-01T10:00:00.000+0000", 60, "")
      .into_transport();
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport), march(1, 2), ReportFilter::default());

    let err = pipeline
      .run(ReportKind::WorklogEntries, &mut RecordingProgress::default())
      .await
      .unwrap_err();

    assert!(matches!(err, Error::NoData));
    assert!(matches!(pipeline.state(), PipelineState::Failed(_)));
  }

  #[tokio::test]
  async fn test_empty_search_is_no_data() {
    let transport = FakeJira::new().into_transport();
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport.clone()), march(1, 2), ReportFilter::default());
    let mut progress = RecordingProgress::default();

    let err = pipeline.run(ReportKind::WorklogEntries, &mut progress).await.unwrap_err();

    assert!(matches!(err, Error::NoData));
    assert_eq!(search_count(&transport.urls()), 1);
    assert_eq!(progress.started, vec![0]);
  }

  #[tokio::test]
  async fn test_transport_error_fails_the_run() {
    let transport = std::sync::Arc::new(crate::testing::ScriptedTransport::new(|_| {
      Ok(crate::testing::json_response(401, ""))
    }));
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport), march(1, 2), ReportFilter::default());

    let err = pipeline
      .run(ReportKind::WorklogEntries, &mut RecordingProgress::default())
      .await
      .unwrap_err();

    assert!(matches!(err, Error::Unauthorized { .. }));
    assert!(matches!(pipeline.state(), PipelineState::Failed(_)));
  }

  #[tokio::test]
  async fn test_concurrent_fetch_keeps_order() {
    let fake = (0..20).fold(FakeJira::new(), |fake, i| {
      let key = format!("ABC-{}", i + 1);
      fake
        .issue(&key, &[], "s")
        .worklog(&key, "u1", "2024-03-01T10:00:00.000+0000", 60, &key)
    });

    let sequential = ExtractionPipeline::new(
      client_for(fake.clone().into_transport()),
      march(1, 2),
      ReportFilter::default(),
    )
    .run(ReportKind::WorklogEntries, &mut RecordingProgress::default())
    .await
    .unwrap();

    let options = PipelineOptions {
      concurrency: 8,
      ..Default::default()
    };
    let concurrent = ExtractionPipeline::new(
      client_for(fake.into_transport()),
      march(1, 2),
      ReportFilter::default(),
    )
    .with_options(options)
    .run(ReportKind::WorklogEntries, &mut RecordingProgress::default())
    .await
    .unwrap();

    assert_eq!(sequential.sheets, concurrent.sheets);
  }

  #[tokio::test]
  async fn test_project_totals_layout() {
    let transport = FakeJira::new()
      .issue("ABC-1", &[], "s")
      .issue("XYZ-1", &[], "s")
      .worklog("ABC-1", "u1", "2024-03-01T10:00:00.000+0000", 3600, "")
      .worklog("ABC-1", "u2", "2024-03-02T10:00:00.000+0000", 1800, "")
      .worklog("XYZ-1", "u1", "2024-03-02T10:00:00.000+0000", 900, "")
      .into_transport();
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport), march(1, 2), ReportFilter::default());

    let report = pipeline
      .run(ReportKind::ProjectTotals, &mut RecordingProgress::default())
      .await
      .unwrap();

    assert_eq!(pipeline.state(), &PipelineState::Done);
    assert_eq!(report.stats.rows, 3);
    assert_eq!(report.sheets.len(), 1);
    assert_eq!(report.sheets[0].rows[0][4], Cell::Number(1.5));
    assert_eq!(report.sheets[0].rows[1][4], Cell::Number(0.25));
  }

  #[tokio::test]
  async fn test_hours_per_day_layout_covers_the_range() {
    let transport = many_issues(2).into_transport();
    let mut pipeline =
      ExtractionPipeline::new(client_for(transport), march(1, 5), ReportFilter::default());

    let report = pipeline
      .run(ReportKind::HoursPerDay, &mut RecordingProgress::default())
      .await
      .unwrap();

    assert_eq!(report.sheets[0].rows.len(), 5);
    assert_eq!(report.sheets[0].rows[0][1], Cell::Number(0.03));
  }

  #[tokio::test]
  async fn test_rerun_is_served_from_cache() {
    let transport = many_issues(3).into_transport();
    let client = client_for(transport.clone());

    ExtractionPipeline::new(client.clone(), march(1, 2), ReportFilter::default())
      .run(ReportKind::WorklogEntries, &mut RecordingProgress::default())
      .await
      .unwrap();
    let calls_after_first = transport.calls();

    let report = ExtractionPipeline::new(client.clone(), march(1, 2), ReportFilter::default())
      .run(ReportKind::WorklogEntries, &mut RecordingProgress::default())
      .await
      .unwrap();

    assert_eq!(transport.calls(), calls_after_first);
    assert_eq!(report.stats.rows, 3);
  }
}
