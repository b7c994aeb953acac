//! Spreadsheet output of a finalized report.

use std::collections::HashSet;
use std::path::Path;

use chrono::Datelike;
use rust_xlsxwriter::{DocProperties, ExcelDateTime, Format, Workbook, Worksheet};
use tracing::info;

use super::pipeline::Report;
use super::table::{Cell, ColumnType, Sheet};
use crate::error::Result;

pub const DEFAULT_AUTHOR: &str = "jwx";

const DATE_FORMAT: &str = "yyyy-mm-dd";
const DECIMAL_FORMAT: &str = "#,##0.00";
const MAX_SHEET_NAME: usize = 31;

/// Renders a report into a file.
pub trait ReportWriter {
  fn write(&self, report: &Report, path: &Path) -> Result<()>;
}

/// Multi-sheet `.xlsx` workbook, one worksheet per report sheet.
pub struct XlsxWriter {
  author: String,
}

impl XlsxWriter {
  pub fn new(author: impl Into<String>) -> Self {
    Self {
      author: author.into(),
    }
  }
}

impl Default for XlsxWriter {
  fn default() -> Self {
    Self::new(DEFAULT_AUTHOR)
  }
}

struct Formats {
  header: Format,
  date: Format,
  decimal: Format,
}

impl ReportWriter for XlsxWriter {
  fn write(&self, report: &Report, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
      std::fs::create_dir_all(parent)?;
    }

    let formats = Formats {
      header: Format::new().set_bold(),
      date: Format::new().set_num_format(DATE_FORMAT),
      decimal: Format::new().set_num_format(DECIMAL_FORMAT),
    };

    let mut workbook = Workbook::new();
    workbook.set_properties(&DocProperties::new().set_author(&self.author));

    let mut taken = HashSet::new();
    for sheet in &report.sheets {
      let worksheet = workbook.add_worksheet();
      worksheet.set_name(unique_sheet_name(&sheet.name, &mut taken))?;
      write_sheet(worksheet, sheet, &formats)?;
    }

    workbook.save(path)?;
    info!(path = %path.display(), sheets = report.sheets.len(), "report written");
    Ok(())
  }
}

fn write_sheet(worksheet: &mut Worksheet, sheet: &Sheet, formats: &Formats) -> Result<()> {
  for (col, column) in sheet.columns.iter().enumerate() {
    worksheet.write_string_with_format(0, col as u16, &column.caption, &formats.header)?;
  }

  for (i, row) in sheet.rows.iter().enumerate() {
    for (col, cell) in row.iter().enumerate() {
      let kind = sheet.columns.get(col).map(|c| c.kind);
      write_cell(worksheet, i as u32 + 1, col as u16, cell, kind, formats)?;
    }
  }

  let totals_row = sheet.totals_row_index();
  for (col, cell) in sheet.totals.iter().enumerate() {
    let kind = sheet.columns.get(col).map(|c| c.kind);
    write_cell(worksheet, totals_row, col as u16, cell, kind, formats)?;
  }

  worksheet.autofit();
  Ok(())
}

fn write_cell(
  worksheet: &mut Worksheet,
  row: u32,
  col: u16,
  cell: &Cell,
  kind: Option<ColumnType>,
  formats: &Formats,
) -> Result<()> {
  match cell {
    Cell::Date(date) => {
      let value = ExcelDateTime::from_ymd(date.year() as u16, date.month() as u8, date.day() as u8)?;
      worksheet.write_datetime_with_format(row, col, &value, &formats.date)?;
    }
    Cell::Text(text) => {
      worksheet.write_string(row, col, text)?;
    }
    Cell::Integer(value) => {
      worksheet.write_number(row, col, *value as f64)?;
    }
    Cell::Number(value) => {
      worksheet.write_number_with_format(row, col, *value, &formats.decimal)?;
    }
    Cell::Formula(formula) if kind == Some(ColumnType::Decimal2) => {
      worksheet.write_formula_with_format(row, col, formula.as_str(), &formats.decimal)?;
    }
    Cell::Formula(formula) => {
      worksheet.write_formula(row, col, formula.as_str())?;
    }
    Cell::Blank => {}
  }
  Ok(())
}

/// Replace characters Excel forbids in sheet names and cut to 31 chars.
pub fn sanitize_sheet_name(name: &str) -> String {
  let cleaned: String = name
    .chars()
    .map(|c| match c {
      '[' | ']' | ':' | '*' | '?' | '/' | '\\' => '_',
      c => c,
    })
    .take(MAX_SHEET_NAME)
    .collect();
  let cleaned = cleaned.trim_matches('\'');
  if cleaned.is_empty() {
    "Sheet".to_string()
  } else {
    cleaned.to_string()
  }
}

/// Sanitized name not yet in `taken`, suffixed `_2`, `_3`, ... on a clash.
/// Excel compares sheet names case-insensitively.
fn unique_sheet_name(name: &str, taken: &mut HashSet<String>) -> String {
  let base = sanitize_sheet_name(name);
  let mut candidate = base.clone();
  let mut n = 2;
  while !taken.insert(candidate.to_lowercase()) {
    let suffix = format!("_{}", n);
    let stem: String = base.chars().take(MAX_SHEET_NAME - suffix.len()).collect();
    candidate = format!("{}{}", stem, suffix);
    n += 1;
  }
  candidate
}
