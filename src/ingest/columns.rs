//! Maps source file headers onto the canonical column schema.

use crate::{Error, ingest::RawCell};

/// The canonical columns of an uploaded transaction file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    /// Optional, derived from the row content when absent.
    TransactionId,
    /// Required.
    CustomerId,
    /// Required.
    Amount,
    /// Optional.
    Channel,
    /// Optional.
    City,
    /// Optional, may also appear as `date`.
    TransactionDate,
}

const COLUMN_COUNT: usize = 6;

impl Column {
    const ALL: [Column; COLUMN_COUNT] = [
        Column::TransactionId,
        Column::CustomerId,
        Column::Amount,
        Column::Channel,
        Column::City,
        Column::TransactionDate,
    ];

    /// The canonical, normalized column name.
    pub fn name(&self) -> &'static str {
        match self {
            Column::TransactionId => "transaction_id",
            Column::CustomerId => "customer_id",
            Column::Amount => "amount",
            Column::Channel => "channel",
            Column::City => "city",
            Column::TransactionDate => "transaction_date",
        }
    }

    /// Whether the classifier needs this column to exist in the file.
    pub fn is_required(&self) -> bool {
        matches!(self, Column::CustomerId | Column::Amount)
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Column::TransactionId => &["txn_id"],
            Column::CustomerId => &["customer"],
            Column::TransactionDate => &["date", "txn_date"],
            _ => &[],
        }
    }

    fn from_header(header: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|column| column.name() == header || column.aliases().contains(&header))
    }
}

/// Normalize a header so that e.g. `" Customer ID"` and `"customer-id"` both
/// become `"customer_id"`.
pub fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// The position of each canonical column within a source row.
#[derive(Debug)]
pub(crate) struct ColumnMap {
    positions: [Option<usize>; COLUMN_COUNT],
}

impl ColumnMap {
    /// Build the map from the header row of a file.
    ///
    /// Unknown headers are ignored. If a column appears more than once the
    /// first occurrence wins.
    ///
    /// # Errors
    /// Returns [Error::Schema] listing every required column that is missing.
    pub fn from_headers(headers: &[String]) -> Result<Self, Error> {
        let mut positions = [None; COLUMN_COUNT];

        for (position, header) in headers.iter().enumerate() {
            let normalized = normalize_header(header);
            match Column::from_header(&normalized) {
                Some(column) if positions[column as usize].is_none() => {
                    positions[column as usize] = Some(position);
                }
                Some(_) => {
                    tracing::debug!("Ignoring duplicate column '{header}' at position {position}");
                }
                None => tracing::debug!("Ignoring unknown column '{header}'"),
            }
        }

        let missing: Vec<String> = Column::ALL
            .into_iter()
            .filter(|column| column.is_required() && positions[*column as usize].is_none())
            .map(|column| column.name().to_owned())
            .collect();

        if !missing.is_empty() {
            return Err(Error::Schema(missing));
        }

        Ok(Self { positions })
    }

    /// Get the cell for `column` in `row`, if the column exists and the row is
    /// long enough.
    pub fn get<'a>(&self, column: Column, row: &'a [RawCell]) -> Option<&'a RawCell> {
        self.positions[column as usize].and_then(|position| row.get(position))
    }
}
