//! Card misuse analytics is a batch pipeline for monitoring credit card
//! transactions.
//!
//! Uploaded transaction files (CSV or spreadsheet) are parsed into a
//! canonical record set, each transaction is given a rule-based risk label,
//! and the labelled batch is written atomically to a SQLite database. The
//! dashboard side reads the latest transactions back through a TTL cache and
//! filters and aggregates them client-side.

#![warn(missing_docs)]

pub mod config;
pub mod dashboard;
pub mod ingest;
pub mod logging;
pub mod pipeline;
pub mod risk;
pub mod store;
pub mod transaction;

pub use config::{ReaderSettings, Settings};
pub use ingest::{IngestWarning, ParsedUpload, parse_upload};
pub use pipeline::{IngestReport, RiskCounts, ingest_file, ingest_upload};
pub use risk::{ClassificationWarning, RiskPolicy, RiskSignal};
pub use store::{LatestTransactionsReader, LoadSummary, Store, load_batch};
pub use transaction::{ClassifiedTransaction, RiskLevel, StoredTransaction, TransactionRecord};

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The uploaded file could not be read, or it contained no data rows.
    #[error("could not parse the uploaded file: {0}")]
    Parse(String),

    /// The uploaded file is missing one or more required columns.
    ///
    /// Holds the canonical names of the missing columns.
    #[error("the uploaded file is missing required columns: {}", .0.join(", "))]
    Schema(Vec<String>),

    /// The file extension does not match a supported format.
    #[error("unsupported file format \"{0}\", expected CSV, TSV or a spreadsheet")]
    UnsupportedFormat(String),

    /// A database error, e.g. the database could not be opened or a batch
    /// write failed and was rolled back.
    #[error("a database error occurred: {0}")]
    Store(rusqlite::Error),

    /// A file could not be read from disk.
    #[error("could not read file: {0}")]
    Io(String),

    /// The configuration could not be loaded.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        tracing::error!("an SQL error occurred: {}", value);
        Error::Store(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value.to_string())
    }
}
