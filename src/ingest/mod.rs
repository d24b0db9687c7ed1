//! Parses uploaded transaction files into the canonical record set.
//!
//! Both delimited text and spreadsheet files are first read into a
//! [RawTable], which is then normalized into [TransactionRecord]s by the same
//! code path so that format quirks do not leak into the rest of the pipeline.

mod columns;
mod delimited;
mod spreadsheet;
mod values;

use std::{collections::HashMap, fmt::Display, path::Path};

use serde::Serialize;
use time::PrimitiveDateTime;

use crate::{Error, transaction::TransactionRecord};

pub use columns::{Column, normalize_header};
pub use values::{create_transaction_id, parse_amount, parse_date_time};

use columns::ColumnMap;

/// The file formats accepted for upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    /// Delimited text with the given field delimiter.
    Delimited(u8),
    /// An Excel or OpenDocument workbook, only the first sheet is read.
    Spreadsheet,
}

impl FileFormat {
    /// Pick the format from the extension of `file_name`.
    ///
    /// # Errors
    /// Returns [Error::UnsupportedFormat] if the extension is missing or not
    /// one of the supported formats.
    pub fn from_file_name(file_name: &str) -> Result<Self, Error> {
        let extension = Path::new(file_name)
            .extension()
            .and_then(|extension| extension.to_str())
            .map(|extension| extension.to_ascii_lowercase())
            .ok_or_else(|| Error::UnsupportedFormat(file_name.to_owned()))?;

        match extension.as_str() {
            "csv" | "txt" => Ok(FileFormat::Delimited(b',')),
            "tsv" => Ok(FileFormat::Delimited(b'\t')),
            "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => Ok(FileFormat::Spreadsheet),
            _ => Err(Error::UnsupportedFormat(extension)),
        }
    }
}

/// A single cell as read from the source file, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum RawCell {
    Empty,
    Text(String),
    Number(f64),
    DateTime(PrimitiveDateTime),
}

impl RawCell {
    fn is_empty(&self) -> bool {
        match self {
            RawCell::Empty => true,
            RawCell::Text(text) => text.trim().is_empty(),
            _ => false,
        }
    }
}

impl Display for RawCell {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RawCell::Empty => Ok(()),
            RawCell::Text(text) => f.write_str(text.trim()),
            // Whole numbers print without a trailing ".0" so that IDs read
            // from spreadsheets match the same IDs read from CSV.
            RawCell::Number(number) if number.fract() == 0.0 && number.abs() < 1e15 => {
                write!(f, "{}", *number as i64)
            }
            RawCell::Number(number) => write!(f, "{number}"),
            RawCell::DateTime(date_time) => write!(f, "{date_time}"),
        }
    }
}

/// The header row and data rows of an uploaded file.
#[derive(Debug, Default)]
pub(crate) struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<RawCell>>,
}

/// A non-fatal problem found while reading a single row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestWarning {
    /// The 1-based data row number, not counting the header row.
    pub row: usize,
    /// The canonical name of the column holding the bad value.
    pub column: &'static str,
    /// The value as it appeared in the file.
    pub value: String,
}

impl Display for IngestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "row {}: could not parse '{}' as {}, the value was ignored",
            self.row, self.value, self.column
        )
    }
}

/// The records found in an uploaded file.
#[derive(Debug)]
pub struct ParsedUpload {
    /// The normalized records, in file order.
    pub records: Vec<TransactionRecord>,
    /// Cells that were present but could not be parsed.
    pub warnings: Vec<IngestWarning>,
    /// The number of fully blank rows that were skipped.
    pub blank_rows_skipped: usize,
}

/// Parse the content of an uploaded file into transaction records.
///
/// The format is chosen from the extension of `file_name`. Column names are
/// normalized (see [normalize_header]) and mapped onto the canonical schema.
///
/// # Errors
/// This function will return a:
/// - [Error::UnsupportedFormat] if the extension is not supported,
/// - [Error::Parse] if the file cannot be read or has no data rows,
/// - or [Error::Schema] if a required column is missing.
pub fn parse_upload(file_name: &str, content: &[u8]) -> Result<ParsedUpload, Error> {
    let table = match FileFormat::from_file_name(file_name)? {
        FileFormat::Delimited(delimiter) => delimited::read_table(content, delimiter)?,
        FileFormat::Spreadsheet => spreadsheet::read_table(content)?,
    };

    tracing::debug!(
        "Read {} columns and {} rows from '{file_name}'",
        table.headers.len(),
        table.rows.len()
    );

    normalize_table(table)
}

fn normalize_table(table: RawTable) -> Result<ParsedUpload, Error> {
    let columns = ColumnMap::from_headers(&table.headers)?;

    let mut records = Vec::with_capacity(table.rows.len());
    let mut warnings = Vec::new();
    let mut blank_rows_skipped = 0;
    // Counts identical rows so that derived IDs stay unique within a file.
    let mut occurrences: HashMap<String, u32> = HashMap::new();

    for (index, row) in table.rows.iter().enumerate() {
        let row_number = index + 1;

        if row.iter().all(RawCell::is_empty) {
            blank_rows_skipped += 1;
            continue;
        }

        let text = |column: Column| {
            columns
                .get(column, row)
                .filter(|cell| !cell.is_empty())
                .map(|cell| cell.to_string())
        };

        let amount = match columns.get(Column::Amount, row) {
            Some(cell) if !cell.is_empty() => {
                let amount = values::amount_from_cell(cell);
                if amount.is_none() {
                    warnings.push(IngestWarning {
                        row: row_number,
                        column: Column::Amount.name(),
                        value: cell.to_string(),
                    });
                }
                amount
            }
            _ => None,
        };

        let transaction_date = match columns.get(Column::TransactionDate, row) {
            Some(cell) if !cell.is_empty() => {
                let date = values::date_time_from_cell(cell);
                if date.is_none() {
                    warnings.push(IngestWarning {
                        row: row_number,
                        column: Column::TransactionDate.name(),
                        value: cell.to_string(),
                    });
                }
                date
            }
            _ => None,
        };

        let mut record = TransactionRecord {
            transaction_id: String::new(),
            customer_id: text(Column::CustomerId),
            amount,
            channel: text(Column::Channel),
            city: text(Column::City),
            transaction_date,
        };

        record.transaction_id = match text(Column::TransactionId) {
            Some(transaction_id) => transaction_id,
            None => {
                let content = values::canonical_row_text(&record);
                let occurrence = occurrences.entry(content.clone()).or_insert(0);
                *occurrence += 1;
                create_transaction_id(&content, *occurrence)
            }
        };

        records.push(record);
    }

    if records.is_empty() {
        return Err(Error::Parse("the file does not contain any rows".to_owned()));
    }

    for warning in &warnings {
        tracing::warn!("{warning}");
    }

    Ok(ParsedUpload {
        records,
        warnings,
        blank_rows_skipped,
    })
}
