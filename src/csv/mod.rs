//! Bulk exchange format: validate, parse and write issue spreadsheets.
//!
//! The format is UTF-8 comma-separated text with an optional byte-order
//! mark and a header row. Fifteen columns are recognized (see
//! [`columns::COLUMNS`]); header matching ignores case and surrounding
//! whitespace, and unrecognized columns are ignored on read. Labels,
//! assignees and dependencies are single fields holding comma-joined values.
//!
//! Structural problems are [`CsvFormatError`]s and are detected before any
//! row is interpreted. Row parsing is strict about titles but lenient about
//! scalars: an unparseable number or timestamp becomes its zero value.

pub mod columns;
mod reader;

pub use columns::{column, Column, COLUMNS};
pub use reader::escape_field;

use serde::Serialize;
use std::path::Path;

use crate::error::{CsvFormatError, Error, Result};
use crate::model::{Issue, STATE_OPEN};
use reader::{decode, read_records, Record};

/// The one column every file must carry.
pub const REQUIRED_COLUMN: &str = "title";

/// What a successful validation saw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CsvSummary {
    /// Header names as written in the file.
    pub columns: Vec<String>,
    /// Data rows, excluding the header.
    pub rows: usize,
}

/// Header row plus data rows, structurally checked.
struct Table {
    header: Record,
    rows: Vec<Record>,
}

/// Check the file's structure without interpreting any row.
///
/// # Errors
///
/// - `CsvFormat(EmptyFile)` for a zero-length file
/// - `CsvFormat(MissingColumn("title"))` when no header matches `title`
/// - `CsvFormat(ColumnCountMismatch { line, .. })` for a ragged row
/// - `CsvFormat(NoDataRows)` when only the header is present
/// - `Io` if the file cannot be read
pub fn validate(path: &Path) -> Result<CsvSummary> {
    validate_bytes(&std::fs::read(path)?)
}

/// [`validate`] on in-memory content.
///
/// # Errors
///
/// See [`validate`].
pub fn validate_bytes(bytes: &[u8]) -> Result<CsvSummary> {
    let table = load_table(bytes)?;
    if table.rows.is_empty() {
        return Err(CsvFormatError::NoDataRows.into());
    }
    Ok(CsvSummary {
        columns: table.header.fields,
        rows: table.rows.len(),
    })
}

/// Parse every data row into an [`Issue`], in file order.
///
/// A header-only file yields no issues.
///
/// # Errors
///
/// Structural errors as for [`validate`] (except `NoDataRows`), and
/// `RowParse` with the row's line number for a blank title. Any row error
/// aborts the whole parse.
pub fn parse(path: &Path) -> Result<Vec<Issue>> {
    parse_bytes(&std::fs::read(path)?)
}

/// [`parse`] on in-memory content.
///
/// # Errors
///
/// See [`parse`].
pub fn parse_bytes(bytes: &[u8]) -> Result<Vec<Issue>> {
    let table = load_table(bytes)?;
    let mapping: Vec<Option<&'static Column>> =
        table.header.fields.iter().map(|h| column(h)).collect();

    table
        .rows
        .iter()
        .map(|row| {
            let mut issue = Issue {
                state: STATE_OPEN.to_string(),
                ..Issue::default()
            };
            for (value, col) in row.fields.iter().zip(&mapping) {
                if let Some(col) = col {
                    col.set(&mut issue, value);
                }
            }
            if issue.title.trim().is_empty() {
                return Err(Error::RowParse {
                    line: row.line,
                    message: format!("{REQUIRED_COLUMN} is required"),
                });
            }
            Ok(issue)
        })
        .collect()
}

/// Write issues with the given columns, or all fifteen when `fields` is
/// `None` or empty. The file is replaced atomically.
///
/// # Errors
///
/// Returns `InvalidArgument` for an unknown column name, or an I/O error.
pub fn write(issues: &[Issue], path: &Path, fields: Option<&[&str]>) -> Result<()> {
    let content = render(issues, fields)?;
    crate::file::atomic_write(path, &content)
}

/// Render issues to exchange-format text.
///
/// # Errors
///
/// Returns `InvalidArgument` for an unknown column name.
pub fn render(issues: &[Issue], fields: Option<&[&str]>) -> Result<String> {
    let selected = select_columns(fields)?;

    let mut out = String::new();
    out.push_str(
        &selected
            .iter()
            .map(|c| c.name)
            .collect::<Vec<_>>()
            .join(","),
    );
    out.push('\n');

    for issue in issues {
        let row = selected
            .iter()
            .map(|c| escape_field(&c.get(issue)))
            .collect::<Vec<_>>()
            .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    Ok(out)
}

/// Resolve a caller's column selection against the static table.
///
/// # Errors
///
/// Returns `InvalidArgument` naming the first unknown column.
pub fn select_columns(fields: Option<&[&str]>) -> Result<Vec<&'static Column>> {
    match fields {
        Some(names) if !names.is_empty() => names
            .iter()
            .map(|name| {
                column(name).ok_or_else(|| {
                    Error::InvalidArgument(format!("unknown column '{}'", name.trim()))
                })
            })
            .collect(),
        _ => Ok(COLUMNS.iter().collect()),
    }
}

fn load_table(bytes: &[u8]) -> Result<Table> {
    let text = decode(bytes)?;
    let mut records = read_records(text)?.into_iter();
    let header = records.next().ok_or(CsvFormatError::EmptyFile)?;

    if !header
        .fields
        .iter()
        .any(|h| h.trim().eq_ignore_ascii_case(REQUIRED_COLUMN))
    {
        return Err(CsvFormatError::MissingColumn(REQUIRED_COLUMN.to_string()).into());
    }

    let expected = header.fields.len();
    let rows: Vec<Record> = records.collect();
    if let Some(bad) = rows.iter().find(|r| r.fields.len() != expected) {
        return Err(CsvFormatError::ColumnCountMismatch {
            line: bad.line,
            expected,
            found: bad.fields.len(),
        }
        .into());
    }

    Ok(Table { header, rows })
}
