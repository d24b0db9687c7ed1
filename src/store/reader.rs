//! Reads the latest transactions for the dashboard.

use std::{sync::Arc, time::Duration};

use moka::sync::Cache;
use rusqlite::Connection;

use crate::{
    Error,
    store::{Store, map_record_row},
    transaction::StoredTransaction,
};

/// Get every stored transaction from `vw_latest_transactions`, newest first.
///
/// # Errors
/// Returns [Error::Store] if there is some SQL error.
pub fn latest_transactions(connection: &Connection) -> Result<Vec<StoredTransaction>, Error> {
    connection
        .prepare(
            "SELECT id, transaction_id, customer_id, amount, channel, city, transaction_date,
                risk_level, batch_id, source_name, ingested_at
             FROM vw_latest_transactions",
        )?
        .query_map([], |row| {
            Ok(StoredTransaction {
                id: row.get(0)?,
                record: map_record_row(row, 1)?,
                risk_level: row.get(7)?,
                batch_id: row.get(8)?,
                source_name: row.get(9)?,
                ingested_at: row.get(10)?,
            })
        })?
        .collect::<Result<Vec<_>, rusqlite::Error>>()
        .map_err(|error| error.into())
}

/// Caches the latest transactions for a fixed time-to-live.
///
/// Newly loaded batches become visible once the cached read expires. Call
/// [LatestTransactionsReader::refresh] to read through the cache immediately
/// after a write. A TTL of zero disables caching.
#[derive(Debug, Clone)]
pub struct LatestTransactionsReader {
    ttl: Duration,
    cache: Option<Cache<(), Arc<Vec<StoredTransaction>>>>,
}

impl LatestTransactionsReader {
    /// Create a reader whose cached read expires after `ttl`.
    pub fn new(ttl: Duration) -> Self {
        let cache = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(1)
                .time_to_live(ttl)
                .build()
        });

        Self { ttl, cache }
    }

    /// How long a read stays cached.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the latest transactions, from the cache if it has not expired.
    ///
    /// # Errors
    /// Returns [Error::Store] if the cache is empty and the query fails.
    pub fn read(&self, store: &Store) -> Result<Arc<Vec<StoredTransaction>>, Error> {
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&())) {
            tracing::debug!("Serving {} transactions from the cache", cached.len());
            return Ok(cached);
        }

        self.refresh(store)
    }

    /// Query the store, bypassing and then replacing the cached read.
    ///
    /// # Errors
    /// Returns [Error::Store] if the query fails, the cached read is left as
    /// it was.
    pub fn refresh(&self, store: &Store) -> Result<Arc<Vec<StoredTransaction>>, Error> {
        let transactions = Arc::new(latest_transactions(store.connection())?);
        tracing::debug!("Read {} transactions from the store", transactions.len());

        if let Some(cache) = &self.cache {
            cache.insert((), transactions.clone());
        }

        Ok(transactions)
    }

    /// Drop the cached read so the next [LatestTransactionsReader::read]
    /// queries the store.
    pub fn invalidate(&self) {
        if let Some(cache) = &self.cache {
            cache.invalidate_all();
        }
    }
}

#[cfg(test)]
mod reader_tests {
    use std::{thread, time::Duration};

    use crate::{
        store::{LatestTransactionsReader, Store, load_batch},
        transaction::{ClassifiedTransaction, RiskLevel, TransactionRecord},
    };

    fn load(store: &mut Store, ids: &[&str]) {
        let transactions: Vec<_> = ids
            .iter()
            .map(|id| ClassifiedTransaction {
                record: TransactionRecord::new(id).customer_id("C1").amount(1.0),
                risk_level: RiskLevel::Normal,
                signals: Vec::new(),
                points: 0,
            })
            .collect();
        load_batch(store, "test.csv", &transactions).expect("Could not load batch");
    }

    #[test]
    fn cached_read_hides_new_rows_until_refresh() {
        let mut store = Store::open_in_memory().unwrap();
        let reader = LatestTransactionsReader::new(Duration::from_secs(3600));
        load(&mut store, &["T1"]);
        assert_eq!(reader.read(&store).unwrap().len(), 1);

        load(&mut store, &["T2"]);

        assert_eq!(reader.read(&store).unwrap().len(), 1);
        assert_eq!(reader.refresh(&store).unwrap().len(), 2);
        assert_eq!(reader.read(&store).unwrap().len(), 2);
    }

    #[test]
    fn invalidate_forces_next_read_to_query() {
        let mut store = Store::open_in_memory().unwrap();
        let reader = LatestTransactionsReader::new(Duration::from_secs(3600));
        load(&mut store, &["T1"]);
        reader.read(&store).unwrap();
        load(&mut store, &["T2"]);

        reader.invalidate();

        assert_eq!(reader.read(&store).unwrap().len(), 2);
    }

    #[test]
    fn zero_ttl_always_reads_the_store() {
        let mut store = Store::open_in_memory().unwrap();
        let reader = LatestTransactionsReader::new(Duration::ZERO);
        load(&mut store, &["T1"]);
        reader.read(&store).unwrap();

        load(&mut store, &["T2"]);

        assert_eq!(reader.read(&store).unwrap().len(), 2);
    }

    #[test]
    fn cached_read_expires_after_ttl() {
        let mut store = Store::open_in_memory().unwrap();
        let reader = LatestTransactionsReader::new(Duration::from_millis(50));
        load(&mut store, &["T1"]);
        reader.read(&store).unwrap();
        load(&mut store, &["T2"]);

        thread::sleep(Duration::from_millis(200));

        assert_eq!(reader.read(&store).unwrap().len(), 2);
    }

    #[test]
    fn newest_rows_come_first() {
        let mut store = Store::open_in_memory().unwrap();
        load(&mut store, &["T1", "T2"]);
        load(&mut store, &["T3"]);

        let reader = LatestTransactionsReader::new(Duration::ZERO);
        let ids: Vec<_> = reader
            .read(&store)
            .unwrap()
            .iter()
            .map(|t| t.record.transaction_id.clone())
            .collect();

        assert_eq!(ids, vec!["T3", "T2", "T1"]);
    }
}
