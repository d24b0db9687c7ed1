//! Aggregates the filtered transactions into the dashboard figures.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::transaction::{RiskLevel, StoredTransaction};

/// How many cities the "top cities" chart shows.
pub const TOP_CITY_COUNT: usize = 10;

/// The number of transactions with a given label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelCount {
    /// The city or channel.
    pub label: String,
    /// The number of transactions.
    pub count: usize,
}

/// The number of transactions at a risk level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskCount {
    /// The risk level.
    pub risk_level: RiskLevel,
    /// The number of transactions.
    pub count: usize,
}

/// The number of transactions in a calendar year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearCount {
    /// The year.
    pub year: i32,
    /// The number of transactions.
    pub count: usize,
}

/// The metric cards and chart series for a set of transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSummary {
    /// The number of transactions.
    pub total_transactions: usize,
    /// The sum of every known amount.
    pub total_amount: f64,
    /// The number of Normal transactions.
    pub normal_transactions: usize,
    /// The number of High Risk transactions.
    pub high_risk_transactions: usize,
    /// Counts for every risk level, in severity order, including zeroes.
    pub by_risk_level: Vec<RiskCount>,
    /// Counts per year of the transaction date, oldest first. Undated
    /// transactions are left out.
    pub by_year: Vec<YearCount>,
    /// The busiest cities, most transactions first, ties broken by name.
    pub top_cities: Vec<LabelCount>,
    /// Counts per channel, sorted by channel name.
    pub by_channel: Vec<LabelCount>,
}

impl DashboardSummary {
    /// Summarise `transactions`.
    pub fn from_transactions<'a>(
        transactions: impl IntoIterator<Item = &'a StoredTransaction>,
    ) -> Self {
        let mut total_transactions = 0;
        let mut total_amount = 0.0;
        let mut risk_counts: HashMap<RiskLevel, usize> = HashMap::new();
        let mut year_counts: BTreeMap<i32, usize> = BTreeMap::new();
        let mut city_counts: HashMap<&str, usize> = HashMap::new();
        let mut channel_counts: BTreeMap<&str, usize> = BTreeMap::new();

        for transaction in transactions {
            let record = &transaction.record;
            total_transactions += 1;
            total_amount += record.amount.unwrap_or(0.0);
            *risk_counts.entry(transaction.risk_level).or_default() += 1;

            if let Some(date) = record.transaction_date {
                *year_counts.entry(date.year()).or_default() += 1;
            }
            if let Some(city) = &record.city {
                *city_counts.entry(city).or_default() += 1;
            }
            if let Some(channel) = &record.channel {
                *channel_counts.entry(channel).or_default() += 1;
            }
        }

        let count_for = |risk_level| risk_counts.get(&risk_level).copied().unwrap_or(0);

        let mut top_cities: Vec<_> = city_counts.into_iter().collect();
        top_cities.sort_by(|(a_city, a_count), (b_city, b_count)| {
            b_count.cmp(a_count).then_with(|| a_city.cmp(b_city))
        });
        top_cities.truncate(TOP_CITY_COUNT);

        Self {
            total_transactions,
            total_amount,
            normal_transactions: count_for(RiskLevel::Normal),
            high_risk_transactions: count_for(RiskLevel::HighRisk),
            by_risk_level: RiskLevel::ALL
                .into_iter()
                .map(|risk_level| RiskCount {
                    risk_level,
                    count: count_for(risk_level),
                })
                .collect(),
            by_year: year_counts
                .into_iter()
                .map(|(year, count)| YearCount { year, count })
                .collect(),
            top_cities: to_label_counts(top_cities),
            by_channel: to_label_counts(channel_counts),
        }
    }
}

fn to_label_counts<'a>(counts: impl IntoIterator<Item = (&'a str, usize)>) -> Vec<LabelCount> {
    counts
        .into_iter()
        .map(|(label, count)| LabelCount {
            label: label.to_owned(),
            count,
        })
        .collect()
}

#[cfg(test)]
mod aggregation_tests {
    use time::macros::datetime;

    use crate::{
        dashboard::{DashboardSummary, LabelCount, RiskCount, YearCount},
        transaction::{RiskLevel, StoredTransaction, TransactionRecord},
    };

    fn stored(id: i64, record: TransactionRecord, risk_level: RiskLevel) -> StoredTransaction {
        StoredTransaction {
            id,
            record,
            risk_level,
            batch_id: 1,
            source_name: "test.csv".to_owned(),
            ingested_at: datetime!(2024-06-01 12:00:00 UTC),
        }
    }

    #[test]
    fn empty_summary_has_zero_counts_for_every_level() {
        let summary = DashboardSummary::from_transactions(&Vec::<StoredTransaction>::new());

        assert_eq!(summary.total_transactions, 0);
        assert_eq!(summary.total_amount, 0.0);
        assert_eq!(summary.by_risk_level.len(), 4);
        assert!(summary.by_risk_level.iter().all(|r| r.count == 0));
        assert!(summary.by_year.is_empty());
        assert!(summary.top_cities.is_empty());
        assert!(summary.by_channel.is_empty());
    }

    #[test]
    fn counts_metric_cards_and_series() {
        let transactions = vec![
            stored(
                1,
                TransactionRecord::new("T1")
                    .customer_id("C1")
                    .amount(100.0)
                    .channel("POS")
                    .city("Pune")
                    .transaction_date(datetime!(2023-05-01 10:00:00)),
                RiskLevel::Normal,
            ),
            stored(
                2,
                TransactionRecord::new("T2")
                    .customer_id("C1")
                    .amount(60000.0)
                    .channel("Online")
                    .city("Mumbai")
                    .transaction_date(datetime!(2024-01-02 10:00:00)),
                RiskLevel::HighRisk,
            ),
            stored(
                3,
                TransactionRecord::new("T3")
                    .customer_id("C2")
                    .amount(250.5)
                    .channel("POS")
                    .city("Pune")
                    .transaction_date(datetime!(2024-03-04 10:00:00)),
                RiskLevel::MediumRisk,
            ),
            stored(
                4,
                TransactionRecord::new("T4").customer_id("C3"),
                RiskLevel::Unclassified,
            ),
        ];

        let summary = DashboardSummary::from_transactions(&transactions);

        assert_eq!(summary.total_transactions, 4);
        assert_eq!(summary.total_amount, 60350.5);
        assert_eq!(summary.normal_transactions, 1);
        assert_eq!(summary.high_risk_transactions, 1);
        assert_eq!(
            summary.by_risk_level,
            vec![
                RiskCount {
                    risk_level: RiskLevel::Normal,
                    count: 1,
                },
                RiskCount {
                    risk_level: RiskLevel::MediumRisk,
                    count: 1,
                },
                RiskCount {
                    risk_level: RiskLevel::HighRisk,
                    count: 1,
                },
                RiskCount {
                    risk_level: RiskLevel::Unclassified,
                    count: 1,
                },
            ]
        );
        assert_eq!(
            summary.by_year,
            vec![
                YearCount {
                    year: 2023,
                    count: 1,
                },
                YearCount {
                    year: 2024,
                    count: 2,
                },
            ]
        );
        assert_eq!(
            summary.top_cities,
            vec![
                LabelCount {
                    label: "Pune".to_owned(),
                    count: 2,
                },
                LabelCount {
                    label: "Mumbai".to_owned(),
                    count: 1,
                },
            ]
        );
        assert_eq!(
            summary.by_channel,
            vec![
                LabelCount {
                    label: "Online".to_owned(),
                    count: 1,
                },
                LabelCount {
                    label: "POS".to_owned(),
                    count: 2,
                },
            ]
        );
    }

    #[test]
    fn top_cities_keeps_ten_and_breaks_ties_by_name() {
        let transactions: Vec<_> = (0..12)
            .map(|i| {
                stored(
                    i,
                    TransactionRecord::new(&format!("T{i}")).city(&format!("City{i:02}")),
                    RiskLevel::Normal,
                )
            })
            .chain(std::iter::once(stored(
                99,
                TransactionRecord::new("T99").city("City11"),
                RiskLevel::Normal,
            )))
            .collect();

        let summary = DashboardSummary::from_transactions(&transactions);

        assert_eq!(summary.top_cities.len(), 10);
        assert_eq!(
            summary.top_cities[0],
            LabelCount {
                label: "City11".to_owned(),
                count: 2,
            }
        );
        assert_eq!(summary.top_cities[1].label, "City00");
        assert_eq!(summary.top_cities[9].label, "City08");
    }
}
