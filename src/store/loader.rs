//! Writes classified batches to the store.

use serde::Serialize;
use time::OffsetDateTime;

use crate::{
    Error,
    store::{Store, date_to_sql},
    transaction::ClassifiedTransaction,
};

/// The outcome of loading a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadSummary {
    /// The ID of the new `ingest_batch` row.
    pub batch_id: i64,
    /// The number of transactions written.
    pub rows_written: usize,
    /// The number of transactions skipped because their transaction ID was
    /// already in the store (or earlier in the same batch).
    pub duplicates_skipped: usize,
}

/// Append a classified batch to the store.
///
/// The batch record and all of its transactions are written in a single SQL
/// transaction, so either the whole batch is committed or nothing is.
/// Transactions whose ID already exists are skipped rather than duplicated.
///
/// # Errors
/// Returns [Error::Store] if any write fails, in which case the store is left
/// unchanged.
pub fn load_batch(
    store: &mut Store,
    source_name: &str,
    transactions: &[ClassifiedTransaction],
) -> Result<LoadSummary, Error> {
    let tx = store
        .connection_mut()
        .transaction()
        .inspect_err(|error| tracing::error!("could not start transaction: {error}"))?;

    let rows_received = i64::try_from(transactions.len()).unwrap_or(i64::MAX);
    let batch_id: i64 = tx.query_row(
        "INSERT INTO ingest_batch (source_name, ingested_at, rows_received)
         VALUES (?1, ?2, ?3)
         RETURNING id",
        (source_name, OffsetDateTime::now_utc(), rows_received),
        |row| row.get(0),
    )?;

    let mut rows_written = 0;
    let mut duplicates_skipped = 0;

    {
        // Existing IDs are left untouched and counted as duplicates.
        let mut stmt = tx.prepare(
            "INSERT INTO card_transaction
                (transaction_id, customer_id, amount, channel, city, transaction_date, risk_level, batch_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(transaction_id) DO NOTHING",
        )?;

        for transaction in transactions {
            let record = &transaction.record;
            let inserted = stmt
                .execute((
                    &record.transaction_id,
                    &record.customer_id,
                    record.amount,
                    &record.channel,
                    &record.city,
                    date_to_sql(record.transaction_date)?,
                    transaction.risk_level,
                    batch_id,
                ))
                .inspect_err(|error| {
                    tracing::error!(
                        "could not insert transaction {}, rolling back batch {batch_id}: {error}",
                        record.transaction_id
                    )
                })?;

            if inserted == 0 {
                tracing::debug!(
                    "Skipping transaction {} which is already in the store",
                    record.transaction_id
                );
                duplicates_skipped += 1;
            } else {
                rows_written += 1;
            }
        }
    }

    tx.commit()
        .inspect_err(|error| tracing::error!("could not commit batch {batch_id}: {error}"))?;

    tracing::info!(
        "Loaded batch {batch_id} from '{source_name}': {rows_written} rows written, {duplicates_skipped} duplicates skipped"
    );

    Ok(LoadSummary {
        batch_id,
        rows_written,
        duplicates_skipped,
    })
}

#[cfg(test)]
mod load_batch_tests {
    use crate::{
        Error,
        store::{Store, latest_transactions, load_batch},
        transaction::{ClassifiedTransaction, RiskLevel, TransactionRecord},
    };

    fn classified(id: &str, risk_level: RiskLevel) -> ClassifiedTransaction {
        ClassifiedTransaction {
            record: TransactionRecord::new(id).customer_id("C1").amount(10.0),
            risk_level,
            signals: Vec::new(),
            points: 0,
        }
    }

    fn batch(ids: &[&str]) -> Vec<ClassifiedTransaction> {
        ids.iter()
            .map(|id| classified(id, RiskLevel::Normal))
            .collect()
    }

    #[test]
    fn writes_all_rows_and_batch_record() {
        let mut store = Store::open_in_memory().unwrap();

        let summary = load_batch(&mut store, "a.csv", &batch(&["T1", "T2", "T3"]))
            .expect("Could not load batch");

        assert_eq!(summary.rows_written, 3);
        assert_eq!(summary.duplicates_skipped, 0);
        assert_eq!(store.count_transactions(), Ok(3));

        let batches = store.batches().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].id, summary.batch_id);
        assert_eq!(batches[0].source_name, "a.csv");
        assert_eq!(batches[0].rows_received, 3);
        assert_eq!(batches[0].rows_written, 3);
    }

    #[test]
    fn skips_existing_transaction_ids() {
        let mut store = Store::open_in_memory().unwrap();
        load_batch(&mut store, "a.csv", &batch(&["T1", "T2"])).unwrap();

        let summary = load_batch(&mut store, "b.csv", &batch(&["T2", "T3", "T3"])).unwrap();

        assert_eq!(summary.rows_written, 1);
        assert_eq!(summary.duplicates_skipped, 2);
        assert_eq!(store.count_transactions(), Ok(3));
    }

    #[test]
    fn failure_mid_batch_rolls_back_everything() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .connection()
            .execute_batch(
                "CREATE TRIGGER fail_on_t3 BEFORE INSERT ON card_transaction
                 WHEN NEW.transaction_id = 'T3'
                 BEGIN
                    SELECT RAISE(ABORT, 'simulated store failure');
                 END;",
            )
            .unwrap();

        let result = load_batch(&mut store, "a.csv", &batch(&["T1", "T2", "T3", "T4"]));

        assert!(matches!(result, Err(Error::Store(_))));
        assert_eq!(store.count_transactions(), Ok(0));
        assert_eq!(store.batches(), Ok(vec![]));
    }

    #[test]
    fn stores_labels_and_batch_details() {
        let mut store = Store::open_in_memory().unwrap();

        load_batch(
            &mut store,
            "a.csv",
            &[
                classified("T1", RiskLevel::HighRisk),
                classified("T2", RiskLevel::Unclassified),
            ],
        )
        .unwrap();

        let stored = latest_transactions(store.connection()).unwrap();
        let labels: Vec<_> = stored
            .iter()
            .map(|t| (t.record.transaction_id.as_str(), t.risk_level))
            .collect();
        assert_eq!(
            labels,
            vec![("T2", RiskLevel::Unclassified), ("T1", RiskLevel::HighRisk)]
        );
        assert!(stored.iter().all(|t| t.source_name == "a.csv"));
    }
}
