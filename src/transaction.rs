//! Defines the transaction records that flow through the pipeline.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use time::{
    OffsetDateTime, PrimitiveDateTime, format_description::BorrowedFormatItem,
    macros::format_description,
};

use crate::risk::RiskSignal;

/// The whole-second transaction date format, e.g. "2024-03-01 10:15:00".
pub const DATE_TIME_FORMAT: &[BorrowedFormatItem] =
    format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");

/// A card transaction after it has been parsed from an uploaded file.
///
/// Every column other than `transaction_id` may be absent, the classifier
/// decides what to do with incomplete records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique identifier of the transaction, either taken from the file or
    /// derived from the row content.
    pub transaction_id: String,
    /// The account holder the transaction belongs to.
    pub customer_id: Option<String>,
    /// The monetary value of the transaction.
    pub amount: Option<f64>,
    /// Where the transaction originated, e.g. "POS", "Online" or "ATM".
    pub channel: Option<String>,
    /// Where the transaction took place.
    pub city: Option<String>,
    /// When the transaction took place.
    pub transaction_date: Option<PrimitiveDateTime>,
}

impl TransactionRecord {
    /// Create a record with only the transaction ID set.
    pub fn new(transaction_id: &str) -> Self {
        Self {
            transaction_id: transaction_id.to_owned(),
            customer_id: None,
            amount: None,
            channel: None,
            city: None,
            transaction_date: None,
        }
    }

    /// Set the customer ID.
    pub fn customer_id(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_owned());
        self
    }

    /// Set the amount.
    pub fn amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }

    /// Set the channel.
    pub fn channel(mut self, channel: &str) -> Self {
        self.channel = Some(channel.to_owned());
        self
    }

    /// Set the city.
    pub fn city(mut self, city: &str) -> Self {
        self.city = Some(city.to_owned());
        self
    }

    /// Set the transaction date.
    pub fn transaction_date(mut self, transaction_date: PrimitiveDateTime) -> Self {
        self.transaction_date = Some(transaction_date);
        self
    }
}

/// The risk label assigned to a transaction at ingest time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    /// No risk signals fired.
    #[serde(rename = "Normal")]
    Normal,
    /// One or two risk signals fired.
    #[serde(rename = "Medium Risk")]
    MediumRisk,
    /// Three or more risk signals fired, or the amount was severe.
    #[serde(rename = "High Risk")]
    HighRisk,
    /// The record lacked the data needed for classification.
    #[serde(rename = "Unclassified")]
    Unclassified,
}

impl RiskLevel {
    /// All risk levels in display order.
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::Normal,
        RiskLevel::MediumRisk,
        RiskLevel::HighRisk,
        RiskLevel::Unclassified,
    ];

    /// The label stored in the database and shown on the dashboard.
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Normal => "Normal",
            RiskLevel::MediumRisk => "Medium Risk",
            RiskLevel::HighRisk => "High Risk",
            RiskLevel::Unclassified => "Unclassified",
        }
    }

    /// Parse a stored label, returns `None` for unknown labels.
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == label)
    }
}

impl Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A transaction record together with the outcome of risk classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedTransaction {
    /// The classified record.
    pub record: TransactionRecord,
    /// The label written to the store.
    pub risk_level: RiskLevel,
    /// The signals that contributed points, in evaluation order.
    pub signals: Vec<RiskSignal>,
    /// The number of risk points scored.
    pub points: u8,
}

/// A transaction as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredTransaction {
    /// The row ID, increasing with ingestion order.
    pub id: i64,
    /// The stored record.
    #[serde(flatten)]
    pub record: TransactionRecord,
    /// The label assigned when the record was ingested.
    pub risk_level: RiskLevel,
    /// The batch the record was loaded in.
    pub batch_id: i64,
    /// The file the batch was loaded from.
    pub source_name: String,
    /// When the batch was committed.
    pub ingested_at: OffsetDateTime,
}
