//! The SQLite system of record and the queries run against it.
//!
//! A [Store] owns the database connection for the lifetime of the process.
//! It is opened explicitly, passed to the loader and reader, and closed at
//! shutdown.

mod loader;
mod reader;

use std::path::Path;

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, Type, ValueRef},
};
use serde::Serialize;
use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::{
    Error,
    transaction::{DATE_TIME_FORMAT, RiskLevel, TransactionRecord},
};

pub use loader::{LoadSummary, load_batch};
pub use reader::{LatestTransactionsReader, latest_transactions};

/// A client for the transaction database.
#[derive(Debug)]
pub struct Store {
    connection: Connection,
}

impl Store {
    /// Open (or create) the database at `path` and make sure the schema
    /// exists.
    ///
    /// # Errors
    /// Returns [Error::Store] if the database cannot be opened or initialized.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        tracing::debug!("Opening database at {path:?}");
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a new in-memory database, mostly useful for testing.
    ///
    /// # Errors
    /// Returns [Error::Store] if the database cannot be initialized.
    pub fn open_in_memory() -> Result<Self, Error> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    /// Wrap an existing connection, creating the schema if needed.
    ///
    /// # Errors
    /// Returns [Error::Store] if the schema cannot be created.
    pub fn from_connection(connection: Connection) -> Result<Self, Error> {
        initialize(&connection)?;
        Ok(Self { connection })
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub(crate) fn connection_mut(&mut self) -> &mut Connection {
        &mut self.connection
    }

    /// Close the database connection.
    ///
    /// # Errors
    /// Returns [Error::Store] if SQLite reports an error while closing.
    pub fn close(self) -> Result<(), Error> {
        self.connection
            .close()
            .map_err(|(_connection, error)| Error::from(error))
    }

    /// Get the total number of transactions in the database.
    ///
    /// # Errors
    /// This function will return a [Error::Store] if there is some SQL error.
    pub fn count_transactions(&self) -> Result<u32, Error> {
        self.connection
            .query_row("SELECT COUNT(id) FROM card_transaction", [], |row| {
                row.get(0)
            })
            .map_err(|error| error.into())
    }

    /// Get the stored transactions of the given customers.
    ///
    /// # Errors
    /// This function will return a [Error::Store] if there is some SQL error.
    pub fn customer_history<'a>(
        &self,
        customer_ids: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<TransactionRecord>, Error> {
        let mut statement = self.connection.prepare(
            "SELECT transaction_id, customer_id, amount, channel, city, transaction_date
             FROM card_transaction
             WHERE customer_id = ?1",
        )?;

        let mut records = Vec::new();
        for customer_id in customer_ids {
            let rows = statement.query_map([customer_id], |row| map_record_row(row, 0))?;
            for row in rows {
                records.push(row?);
            }
        }

        Ok(records)
    }

    /// Get every ingest batch, oldest first.
    ///
    /// # Errors
    /// This function will return a [Error::Store] if there is some SQL error.
    pub fn batches(&self) -> Result<Vec<IngestBatch>, Error> {
        self.connection
            .prepare(
                "SELECT b.id, b.source_name, b.ingested_at, b.rows_received, COUNT(t.id)
                 FROM ingest_batch b
                 LEFT JOIN card_transaction t ON t.batch_id = b.id
                 GROUP BY b.id
                 ORDER BY b.id",
            )?
            .query_map([], |row| {
                Ok(IngestBatch {
                    id: row.get(0)?,
                    source_name: row.get(1)?,
                    ingested_at: row.get(2)?,
                    rows_received: row.get(3)?,
                    rows_written: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, rusqlite::Error>>()
            .map_err(|error| error.into())
    }
}

/// A file that was loaded into the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestBatch {
    /// The ID of the batch.
    pub id: i64,
    /// The name of the file the batch was loaded from.
    pub source_name: String,
    /// When the batch was committed.
    pub ingested_at: OffsetDateTime,
    /// The number of records in the file.
    pub rows_received: u32,
    /// The number of records that were new to the store.
    pub rows_written: u32,
}

/// Create the tables, index and view if they do not exist yet.
///
/// # Errors
/// Returns an error if the schema cannot be created.
pub fn initialize(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute_batch(
        "PRAGMA foreign_keys = ON;

        CREATE TABLE IF NOT EXISTS ingest_batch (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_name TEXT NOT NULL,
            ingested_at TEXT NOT NULL,
            rows_received INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS card_transaction (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            transaction_id TEXT NOT NULL UNIQUE,
            customer_id TEXT,
            amount REAL,
            channel TEXT,
            city TEXT,
            transaction_date TEXT,
            risk_level TEXT NOT NULL
                CHECK (risk_level IN ('Normal', 'Medium Risk', 'High Risk', 'Unclassified')),
            batch_id INTEGER NOT NULL,
            FOREIGN KEY(batch_id) REFERENCES ingest_batch(id)
        );

        CREATE INDEX IF NOT EXISTS idx_card_transaction_customer_date
            ON card_transaction(customer_id, transaction_date);

        CREATE VIEW IF NOT EXISTS vw_latest_transactions AS
            SELECT
                t.id,
                t.transaction_id,
                t.customer_id,
                t.amount,
                t.channel,
                t.city,
                t.transaction_date,
                t.risk_level,
                t.batch_id,
                b.source_name,
                b.ingested_at
            FROM card_transaction t
            INNER JOIN ingest_batch b ON b.id = t.batch_id
            ORDER BY t.id DESC;",
    )
}

impl ToSql for RiskLevel {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for RiskLevel {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let label = value.as_str()?;
        RiskLevel::from_label(label)
            .ok_or_else(|| FromSqlError::Other(format!("unknown risk level '{label}'").into()))
    }
}

/// Transaction dates are stored to the nanosecond with a fixed width so that
/// text order matches date order.
const STORED_DATE_TIME_FORMAT: &[BorrowedFormatItem] = format_description!(
    "[year]-[month]-[day] [hour]:[minute]:[second].[subsecond digits:9]"
);

pub(crate) fn date_to_sql(date: Option<PrimitiveDateTime>) -> rusqlite::Result<Option<String>> {
    date.map(|date| date.format(STORED_DATE_TIME_FORMAT))
        .transpose()
        .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))
}

fn date_from_sql(row: &Row, index: usize) -> rusqlite::Result<Option<PrimitiveDateTime>> {
    let text: Option<String> = row.get(index)?;

    let Some(text) = text else {
        return Ok(None);
    };

    // Rows written without a fractional part are still accepted.
    PrimitiveDateTime::parse(&text, STORED_DATE_TIME_FORMAT)
        .or_else(|_| PrimitiveDateTime::parse(&text, DATE_TIME_FORMAT))
        .map(Some)
        .map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error))
        })
}

/// Map the six record columns starting at `offset` to a [TransactionRecord].
pub(crate) fn map_record_row(row: &Row, offset: usize) -> rusqlite::Result<TransactionRecord> {
    Ok(TransactionRecord {
        transaction_id: row.get(offset)?,
        customer_id: row.get(offset + 1)?,
        amount: row.get(offset + 2)?,
        channel: row.get(offset + 3)?,
        city: row.get(offset + 4)?,
        transaction_date: date_from_sql(row, offset + 5)?,
    })
}
