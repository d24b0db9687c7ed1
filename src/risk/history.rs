//! The per-customer transaction history used as classification context.

use std::collections::{HashMap, HashSet};

use time::PrimitiveDateTime;

use crate::transaction::TransactionRecord;

/// What the classifier needs to know about one of a customer's transactions.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Observation {
    pub transaction_id: String,
    pub date: Option<PrimitiveDateTime>,
    /// Lower-cased so that "POS" and "pos" count as the same channel.
    pub channel: Option<String>,
    /// Lower-cased so that "Pune" and "PUNE" count as the same city.
    pub city: Option<String>,
}

/// The known transactions of each customer.
///
/// Built from the incoming batch plus the transactions already in the store
/// for the customers in that batch. A transaction ID is only counted once, so
/// a re-uploaded row does not count against its own customer twice.
#[derive(Debug, Default)]
pub struct CustomerHistory {
    customers: HashMap<String, Vec<Observation>>,
    seen: HashSet<String>,
}

impl CustomerHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a history from `records`.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a TransactionRecord>) -> Self {
        let mut history = Self::new();
        history.extend(records);
        history
    }

    /// Add `records` to the history, skipping records without a customer ID
    /// and transaction IDs that are already known.
    pub fn extend<'a>(&mut self, records: impl IntoIterator<Item = &'a TransactionRecord>) {
        for record in records {
            let Some(customer_id) = &record.customer_id else {
                continue;
            };

            if !self.seen.insert(record.transaction_id.clone()) {
                continue;
            }

            self.customers
                .entry(customer_id.clone())
                .or_default()
                .push(Observation {
                    transaction_id: record.transaction_id.clone(),
                    date: record.transaction_date,
                    channel: record.channel.as_deref().map(str::to_lowercase),
                    city: record.city.as_deref().map(str::to_lowercase),
                });
        }
    }

    /// The number of distinct transactions in the history.
    pub fn len(&self) -> usize {
        self.seen.len()
    }

    /// Whether the history holds no transactions.
    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// The customer's transactions other than `transaction_id`.
    pub(super) fn others<'a>(
        &'a self,
        customer_id: &str,
        transaction_id: &'a str,
    ) -> impl Iterator<Item = &'a Observation> {
        self.customers
            .get(customer_id)
            .into_iter()
            .flatten()
            .filter(move |observation| observation.transaction_id != transaction_id)
    }
}

/// The most frequent value, ties go to the lexicographically smallest value
/// so the result does not depend on the order the values were seen in.
pub(super) fn most_common<'a>(values: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .max_by(|(left_value, left_count), (right_value, right_count)| {
            left_count
                .cmp(right_count)
                .then_with(|| right_value.cmp(left_value))
        })
        .map(|(value, _)| value)
}
