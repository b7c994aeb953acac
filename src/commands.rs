//! Subcommand implementations.

use chrono::{Local, NaiveDate, NaiveDateTime};
use clap::Args;
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{CachingHttpClient, NoopStorage, ResponseCache, SqliteStorage};
use crate::config::Config;
use crate::http::{ReqwestTransport, Transport};
use crate::jira::client::JiraClient;
use crate::report::aggregate::ReportKind;
use crate::report::export::{ReportWriter, XlsxWriter};
use crate::report::filter::{DateRange, ReportFilter};
use crate::report::pipeline::{ExtractionPipeline, Report};
use crate::report::progress::{Progress, TerminalProgress};

#[derive(Args, Debug, Clone)]
pub struct ReportArgs {
  /// First day of the period (YYYY-MM-DD)
  pub start_date: NaiveDate,

  /// Last day of the period, inclusive (default: today)
  pub end_date: Option<NaiveDate>,

  /// Clear the response cache before extracting
  #[arg(short, long)]
  pub clear_cache: bool,

  /// Output file (default: <output_dir>/output_<timestamp>.xlsx)
  #[arg(short, long)]
  pub output_file: Option<PathBuf>,

  /// Only include worklogs of these authors (comma separated)
  #[arg(long, value_delimiter = ',')]
  pub authors_whitelist: Vec<String>,

  /// Only include issues with one of these labels (comma separated)
  #[arg(long, value_delimiter = ',')]
  pub labels_whitelist: Vec<String>,

  /// Only include issues of these projects (comma separated)
  #[arg(long, value_delimiter = ',')]
  pub projects_whitelist: Vec<String>,

  /// Exclude issues with any of these labels (comma separated)
  #[arg(long, value_delimiter = ',')]
  pub labels_blacklist: Vec<String>,

  /// Neither read nor write the response cache
  #[arg(long)]
  pub no_cache: bool,

  /// Worklog requests in flight at once (overrides report.concurrency)
  #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
  pub concurrency: Option<u16>,

  /// No progress bar and no summary
  #[arg(short, long)]
  pub quiet: bool,
}

impl ReportArgs {
  fn filter(&self) -> ReportFilter {
    ReportFilter::from_lists(
      self.authors_whitelist.clone(),
      self.labels_whitelist.clone(),
      self.projects_whitelist.clone(),
      self.labels_blacklist.clone(),
    )
  }
}

/// Extract worklogs from Jira and write them as a `kind` spreadsheet.
pub async fn report(config: &Config, kind: ReportKind, args: ReportArgs) -> Result<PathBuf> {
  config.jira.validate()?;
  let transport = Arc::new(ReqwestTransport::new(&config.jira)?);
  let mut progress = TerminalProgress::for_stderr(args.quiet);
  extract(config, kind, args, transport, progress.as_mut()).await
}

async fn extract(
  config: &Config,
  kind: ReportKind,
  args: ReportArgs,
  transport: Arc<dyn Transport>,
  progress: &mut dyn Progress,
) -> Result<PathBuf> {
  let end = args
    .end_date
    .unwrap_or_else(|| Local::now().date_naive());
  let range = DateRange::new(args.start_date, end)?;
  let filter = args.filter();

  if args.clear_cache {
    clear_cache(config)?;
  }

  let storage = open_storage(config, args.no_cache)?;
  let client = JiraClient::new(&config.jira.endpoint, CachingHttpClient::new(transport, storage))?;

  let mut options = config.pipeline_options();
  if let Some(concurrency) = args.concurrency {
    options.concurrency = concurrency as usize;
  }

  info!(start = %range.start(), end = %range.end(), ?kind, ?filter, "extracting worklogs");
  let mut pipeline = ExtractionPipeline::new(client.clone(), range, filter).with_options(options);
  let result = pipeline.run(kind, progress).await;
  debug!(state = ?pipeline.state(), "pipeline stopped");
  let report = result?;

  let output = args
    .output_file
    .unwrap_or_else(|| default_output_path(&config.report.output_dir, Local::now().naive_local()));
  XlsxWriter::new(&config.report.author).write(&report, &output)?;

  if !args.quiet {
    print_summary(&report, &client, &output);
  }
  Ok(output)
}

/// Remove every cached response.
pub fn clear_cache(config: &Config) -> Result<usize> {
  let dir = config
    .cache_dir()
    .ok_or_else(|| eyre!("No cache directory available; set cache.dir in the config file"))?;
  let storage = SqliteStorage::open_or_reset(&dir)?;
  let removed = storage.len()?;
  storage.clear()?;
  info!(removed, dir = %dir.display(), "response cache cleared");
  Ok(removed)
}

fn open_storage(config: &Config, no_cache: bool) -> Result<Arc<dyn ResponseCache>> {
  if no_cache || !config.cache.enabled {
    return Ok(Arc::new(NoopStorage));
  }
  match config.cache_dir() {
    Some(dir) => Ok(Arc::new(SqliteStorage::open_or_reset(&dir)?)),
    None => {
      warn!("no cache directory available, running without response cache");
      Ok(Arc::new(NoopStorage))
    }
  }
}

/// `<dir>/output_<YYYYmmddHHMMSS>.xlsx`
fn default_output_path(dir: &Path, now: NaiveDateTime) -> PathBuf {
  dir.join(format!("output_{}.xlsx", now.format("%Y%m%d%H%M%S")))
}

fn print_summary(report: &Report, client: &JiraClient, output: &Path) {
  let stats = &report.stats;
  let cache = client.http().stats();
  println!(
    "Wrote {} worklog entries in {} sheets to {}",
    stats.rows,
    report.sheets.len(),
    output.display()
  );
  println!(
    "Visited {} issues on {} pages ({} excluded), {} worklogs ({} other authors, {} outside the period)",
    stats.issues_visited,
    stats.pages,
    stats.issues_skipped,
    stats.worklogs_seen,
    stats.skipped_author,
    stats.skipped_date
  );
  println!(
    "Responses: {} from cache, {} from the server",
    cache.hits(),
    cache.misses()
  );
  if !stats.multi_label_issues.is_empty() {
    println!(
      "Issues with more than one matching label: {}",
      stats.multi_label_issues.join(", ")
    );
  }
}
