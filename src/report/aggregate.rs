//! Report layouts built from one extracted dataset.
//!
//! Besides the raw worklog listing, the dataset can be folded into period
//! totals per project or into day-by-day hour grids. Durations are summed
//! in seconds and rounded once per cell.

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};

use super::dataset::ReportDataset;
use super::filter::DateRange;
use super::table::{cell_ref, Cell, Column, ColumnType, Sheet};

/// Tab name for worklogs on issues without a (whitelisted) label.
pub const NO_LABEL: &str = "(no label)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
  /// One sheet per project listing every worklog
  WorklogEntries,
  /// One row per project with the period totals
  ProjectTotals,
  /// Days on the rows, projects as columns
  HoursPerDay,
  /// Days on the rows, authors as columns, one sheet per label
  HoursPerDayPerAuthor,
}

impl ReportKind {
  pub fn build(self, dataset: ReportDataset, range: &DateRange) -> Vec<Sheet> {
    match self {
      ReportKind::WorklogEntries => dataset.finalize(),
      ReportKind::ProjectTotals => vec![project_totals(&dataset)],
      ReportKind::HoursPerDay => vec![hours_per_day(&dataset, range)],
      ReportKind::HoursPerDayPerAuthor => hours_per_day_per_author(&dataset, range),
    }
  }
}

fn hours(seconds: u64) -> f64 {
  (seconds as f64 / 36.0).round() / 100.0
}

fn minutes(seconds: u64) -> i64 {
  (seconds as f64 / 60.0).round() as i64
}

pub fn project_totals(dataset: &ReportDataset) -> Sheet {
  let columns = vec![
    Column::new("Project", ColumnType::Text, false),
    Column::new("Issues", ColumnType::Integer, true),
    Column::new("Worklogs", ColumnType::Integer, true),
    Column::new("Duration (m)", ColumnType::Integer, true),
    Column::new("Duration (h)", ColumnType::Decimal2, true),
  ];

  let rows = dataset
    .iter()
    .map(|(project, rows)| {
      let issues: BTreeSet<&str> = rows.iter().map(|r| r.issue_key.as_str()).collect();
      let seconds: u64 = rows.iter().map(|r| r.duration_seconds).sum();
      vec![
        Cell::Text(project.to_string()),
        Cell::Integer(issues.len() as i64),
        Cell::Integer(rows.len() as i64),
        Cell::Integer(minutes(seconds)),
        Cell::Number(hours(seconds)),
      ]
    })
    .collect();

  Sheet::new("Project totals", columns, rows)
}

/// Seconds per (day, column key).
type DayGrid = BTreeMap<(NaiveDate, String), u64>;

pub fn hours_per_day(dataset: &ReportDataset, range: &DateRange) -> Sheet {
  let mut grid = DayGrid::new();
  let mut projects = BTreeSet::new();

  for (project, rows) in dataset.iter() {
    projects.insert(project.to_string());
    for row in rows {
      *grid.entry((row.date, project.to_string())).or_default() += row.duration_seconds;
    }
  }

  day_sheet("Hours per day", range, &projects, &grid)
}

/// One sheet per narrowed label. A worklog on an issue with several labels
/// counts on each of their sheets.
pub fn hours_per_day_per_author(dataset: &ReportDataset, range: &DateRange) -> Vec<Sheet> {
  let mut per_label: BTreeMap<String, (BTreeSet<String>, DayGrid)> = BTreeMap::new();

  for (_, rows) in dataset.iter() {
    for row in rows {
      let labels: Vec<&str> = if row.labels.is_empty() {
        vec![NO_LABEL]
      } else {
        row.labels.iter().map(String::as_str).collect()
      };

      for label in labels {
        let (authors, grid) = per_label.entry(label.to_string()).or_default();
        authors.insert(row.author.clone());
        *grid.entry((row.date, row.author.clone())).or_default() += row.duration_seconds;
      }
    }
  }

  per_label
    .iter()
    .map(|(label, (authors, grid))| day_sheet(label, range, authors, grid))
    .collect()
}

/// Date column, one hours column per key, and a per-day total.
fn day_sheet(name: &str, range: &DateRange, keys: &BTreeSet<String>, grid: &DayGrid) -> Sheet {
  let mut columns = vec![Column::new("Date", ColumnType::Date, false)];
  columns.extend(
    keys
      .iter()
      .map(|key| Column::new(key.as_str(), ColumnType::Decimal2, true)),
  );
  columns.push(Column::new("Total", ColumnType::Decimal2, true));

  let rows = range
    .days()
    .enumerate()
    .map(|(i, day)| {
      let mut cells = vec![Cell::Date(day)];
      cells.extend(keys.iter().map(|key| {
        match grid.get(&(day, key.clone())) {
          Some(&seconds) if seconds > 0 => Cell::Number(hours(seconds)),
          _ => Cell::Blank,
        }
      }));
      cells.push(row_total(i as u32 + 1, keys.len() as u16));
      cells
    })
    .collect();

  Sheet::new(name, columns, rows)
}

/// Sum of columns B..=last key column on sheet row `row`.
fn row_total(row: u32, key_count: u16) -> Cell {
  if key_count == 0 {
    return Cell::Number(0.0);
  }
  Cell::Formula(format!("=SUM({}:{})", cell_ref(row, 1), cell_ref(row, key_count)))
}
