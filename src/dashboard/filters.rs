//! Client-side filtering of the latest transactions.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::transaction::{RiskLevel, StoredTransaction};

/// The filters a dashboard user can apply.
///
/// Unset fields match everything. The exact-match fields compare the whole
/// value, `search` is a case-insensitive substring match against the
/// customer ID, city and channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Free-text search.
    pub search: Option<String>,
    /// Only show this customer.
    pub customer_id: Option<String>,
    /// Only show this risk level.
    pub risk_level: Option<RiskLevel>,
    /// Only show this channel.
    pub channel: Option<String>,
    /// Only show this city.
    pub city: Option<String>,
}

impl TransactionFilter {
    /// Whether `transaction` passes every filter.
    pub fn matches(&self, transaction: &StoredTransaction) -> bool {
        let record = &transaction.record;

        let search_matches = match self.search.as_deref().map(str::trim) {
            Some(search) if !search.is_empty() => {
                let needle = search.to_lowercase();
                [&record.customer_id, &record.city, &record.channel]
                    .into_iter()
                    .flatten()
                    .any(|value| value.to_lowercase().contains(&needle))
            }
            _ => true,
        };

        search_matches
            && exact_match(&self.customer_id, &record.customer_id)
            && self
                .risk_level
                .is_none_or(|risk_level| risk_level == transaction.risk_level)
            && exact_match(&self.channel, &record.channel)
            && exact_match(&self.city, &record.city)
    }

    /// Get the transactions that pass every filter, in their original order.
    pub fn apply<'a>(&self, transactions: &'a [StoredTransaction]) -> Vec<&'a StoredTransaction> {
        transactions
            .iter()
            .filter(|transaction| self.matches(transaction))
            .collect()
    }
}

fn exact_match(filter: &Option<String>, value: &Option<String>) -> bool {
    match filter {
        Some(wanted) => value.as_ref() == Some(wanted),
        None => true,
    }
}

/// The distinct values available in each filter drop-down, sorted.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FilterOptions {
    /// Every customer ID.
    pub customer_ids: Vec<String>,
    /// Every risk level present.
    pub risk_levels: Vec<RiskLevel>,
    /// Every channel.
    pub channels: Vec<String>,
    /// Every city.
    pub cities: Vec<String>,
}

impl FilterOptions {
    /// Collect the filter options from `transactions`, ignoring missing values.
    pub fn from_transactions<'a>(
        transactions: impl IntoIterator<Item = &'a StoredTransaction>,
    ) -> Self {
        let mut customer_ids = BTreeSet::new();
        let mut risk_levels = BTreeSet::new();
        let mut channels = BTreeSet::new();
        let mut cities = BTreeSet::new();

        for transaction in transactions {
            let record = &transaction.record;
            customer_ids.extend(record.customer_id.clone());
            risk_levels.insert(transaction.risk_level);
            channels.extend(record.channel.clone());
            cities.extend(record.city.clone());
        }

        Self {
            customer_ids: customer_ids.into_iter().collect(),
            risk_levels: risk_levels.into_iter().collect(),
            channels: channels.into_iter().collect(),
            cities: cities.into_iter().collect(),
        }
    }
}
