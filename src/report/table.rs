//! Tabular report model handed to the spreadsheet writer.
//!
//! Addressing is 0-indexed; row 0 of every sheet holds the header captions,
//! data rows start at row 1 and the totals row follows the last data row.

use chrono::NaiveDate;

use super::dataset::ReportRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
  Date,
  Text,
  Integer,
  /// Numeric with two decimals
  Decimal2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
  pub caption: String,
  pub kind: ColumnType,
  /// Whether the totals row sums this column
  pub summed: bool,
}

impl Column {
  pub fn new(caption: impl Into<String>, kind: ColumnType, summed: bool) -> Self {
    Self {
      caption: caption.into(),
      kind,
      summed,
    }
  }
}

/// Columns of a worklog sheet, in output order.
pub fn worklog_columns() -> Vec<Column> {
  vec![
    Column::new("Date", ColumnType::Date, false),
    Column::new("Issue", ColumnType::Text, false),
    Column::new("Duration (m)", ColumnType::Integer, true),
    Column::new("Duration (h)", ColumnType::Decimal2, true),
    Column::new("Author", ColumnType::Text, false),
    Column::new("Labels", ColumnType::Text, false),
    Column::new("Summary", ColumnType::Text, false),
    Column::new("Comment", ColumnType::Text, false),
  ]
}

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
  Date(NaiveDate),
  Text(String),
  Integer(i64),
  Number(f64),
  Formula(String),
  Blank,
}

/// One worksheet: header definitions, data rows and the totals row.
#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
  pub name: String,
  pub columns: Vec<Column>,
  pub rows: Vec<Vec<Cell>>,
  pub totals: Vec<Cell>,
}

impl Sheet {
  /// Sheet with a totals row summing every `summed` column over all rows.
  pub fn new(name: &str, columns: Vec<Column>, rows: Vec<Vec<Cell>>) -> Self {
    let totals = totals_row(&columns, rows.len());
    Self {
      name: name.to_string(),
      columns,
      rows,
      totals,
    }
  }

  /// Build a worklog sheet from rows already in output order.
  pub fn from_rows(name: &str, rows: &[ReportRow]) -> Self {
    Self::new(name, worklog_columns(), rows.iter().map(row_cells).collect())
  }

  /// 0-indexed row of the totals line.
  pub fn totals_row_index(&self) -> u32 {
    self.rows.len() as u32 + 1
  }
}

fn row_cells(row: &ReportRow) -> Vec<Cell> {
  vec![
    Cell::Date(row.date),
    Cell::Text(row.issue_key.clone()),
    Cell::Integer(row.duration_minutes),
    Cell::Number(row.duration_hours),
    Cell::Text(row.author.clone()),
    Cell::Text(row.labels.join(", ")),
    Cell::Text(row.summary.clone()),
    Cell::Text(row.comment.clone()),
  ]
}

/// SUM formulas over the data rows (1..=row_count) for summed columns.
fn totals_row(columns: &[Column], row_count: usize) -> Vec<Cell> {
  columns
    .iter()
    .enumerate()
    .map(|(col, column)| {
      if column.summed && row_count > 0 {
        let col = col as u16;
        Cell::Formula(format!(
          "=SUM({}:{})",
          cell_ref(1, col),
          cell_ref(row_count as u32, col)
        ))
      } else {
        Cell::Blank
      }
    })
    .collect()
}

/// A1-style reference for a 0-indexed cell: (0, 0) -> "A1", (1, 2) -> "C2".
pub fn cell_ref(row: u32, col: u16) -> String {
  format!("{}{}", column_name(col), row + 1)
}

/// 0 -> "A", 25 -> "Z", 26 -> "AA".
pub fn column_name(col: u16) -> String {
  let mut n = col as u32 + 1;
  let mut name = Vec::new();
  while n > 0 {
    let rem = (n - 1) % 26;
    name.push(b'A' + rem as u8);
    n = (n - 1) / 26;
  }
  name.reverse();
  String::from_utf8(name).unwrap_or_default()
}
