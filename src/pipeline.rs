//! Runs an uploaded file through parsing, classification and loading.

use std::{collections::BTreeSet, fs, path::Path};

use serde::Serialize;

use crate::{
    Error,
    ingest::{IngestWarning, parse_upload},
    risk::{ClassificationWarning, CustomerHistory, RiskPolicy, classify_batch},
    store::{Store, load_batch},
    transaction::{ClassifiedTransaction, RiskLevel},
};

/// The number of transactions in a batch at each risk level.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RiskCounts {
    /// Normal transactions.
    pub normal: usize,
    /// Medium Risk transactions.
    pub medium_risk: usize,
    /// High Risk transactions.
    pub high_risk: usize,
    /// Transactions that could not be classified.
    pub unclassified: usize,
}

impl RiskCounts {
    fn from_transactions(transactions: &[ClassifiedTransaction]) -> Self {
        let mut counts = Self::default();

        for transaction in transactions {
            match transaction.risk_level {
                RiskLevel::Normal => counts.normal += 1,
                RiskLevel::MediumRisk => counts.medium_risk += 1,
                RiskLevel::HighRisk => counts.high_risk += 1,
                RiskLevel::Unclassified => counts.unclassified += 1,
            }
        }

        counts
    }
}

/// What happened to an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngestReport {
    /// The ID of the `ingest_batch` row recording this upload.
    pub batch_id: i64,
    /// The uploaded file name.
    pub source_name: String,
    /// The number of records read from the file, excluding blank rows.
    pub rows_read: usize,
    /// The number of records written to the store.
    pub rows_written: usize,
    /// The number of records already in the store.
    pub duplicates_skipped: usize,
    /// The number of blank rows ignored.
    pub blank_rows_skipped: usize,
    /// The labels given to the records read, including duplicates.
    pub risk_counts: RiskCounts,
    /// Values that could not be parsed.
    pub ingest_warnings: Vec<IngestWarning>,
    /// Records that were labelled `Unclassified`.
    pub classification_warnings: Vec<ClassificationWarning>,
}

/// Parse, classify and load the uploaded file `content`.
///
/// The batch is classified against the stored history of every customer in
/// the file so velocity and anomaly signals span uploads. The format is
/// chosen from the extension of `file_name`.
///
/// # Errors
/// Returns [Error::UnsupportedFormat], [Error::Parse] or [Error::Schema] if
/// the file cannot be read, in which case nothing is written. Returns
/// [Error::Store] if the history query or the batch write fails, in which
/// case the batch is rolled back.
pub fn ingest_upload(
    store: &mut Store,
    file_name: &str,
    content: &[u8],
    policy: &RiskPolicy,
) -> Result<IngestReport, Error> {
    let parsed = parse_upload(file_name, content)?;
    let rows_read = parsed.records.len();

    let customer_ids: BTreeSet<&str> = parsed
        .records
        .iter()
        .filter_map(|record| record.customer_id.as_deref())
        .collect();
    let stored_history = store.customer_history(customer_ids)?;
    tracing::debug!(
        "Classifying {rows_read} records from '{file_name}' against {} stored transactions",
        stored_history.len()
    );

    let history = CustomerHistory::from_records(&stored_history);
    let classified = classify_batch(parsed.records, history, policy);
    let risk_counts = RiskCounts::from_transactions(&classified.transactions);

    let summary = load_batch(store, file_name, &classified.transactions)?;

    Ok(IngestReport {
        batch_id: summary.batch_id,
        source_name: file_name.to_owned(),
        rows_read,
        rows_written: summary.rows_written,
        duplicates_skipped: summary.duplicates_skipped,
        blank_rows_skipped: parsed.blank_rows_skipped,
        risk_counts,
        ingest_warnings: parsed.warnings,
        classification_warnings: classified.warnings,
    })
}

/// Read the file at `path` and ingest it with [ingest_upload], using the file
/// name as the source name.
///
/// # Errors
/// Returns [Error::Io] if the file cannot be read, otherwise the errors of
/// [ingest_upload].
pub fn ingest_file(
    store: &mut Store,
    path: impl AsRef<Path>,
    policy: &RiskPolicy,
) -> Result<IngestReport, Error> {
    let path = path.as_ref();
    let content = fs::read(path).map_err(|error| {
        tracing::error!("could not read {}: {error}", path.display());
        Error::Io(format!("{}: {error}", path.display()))
    })?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    ingest_upload(store, &file_name, &content, policy)
}
