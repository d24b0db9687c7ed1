//! Rule-based risk classification of card transactions.
//!
//! Each transaction is scored against an ordered set of [RiskSignal]s. Every
//! signal that fires adds one point and the total maps onto a [RiskLevel]:
//!
//! | Points | Level       |
//! |--------|-------------|
//! | 0      | Normal      |
//! | 1-2    | Medium Risk |
//! | 3+     | High Risk   |
//!
//! An amount at or above [RiskPolicy::severe_amount_threshold] is High Risk
//! regardless of the points scored.
//!
//! [RiskLevel]: crate::RiskLevel

mod classifier;
mod history;

use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::Error;

pub use classifier::{ClassifiedBatch, classify, classify_batch, level_for_points};
pub use history::CustomerHistory;

/// A single rule that may add a point to a transaction's risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskSignal {
    /// The amount is at or above the high value threshold.
    HighAmount,
    /// The customer made many transactions within the velocity window.
    Velocity,
    /// The channel differs from the customer's usual channel.
    ChannelAnomaly,
    /// The city differs from the customer's usual city.
    CityAnomaly,
}

impl RiskSignal {
    /// Every signal in evaluation order.
    pub const ALL: [RiskSignal; 4] = [
        RiskSignal::HighAmount,
        RiskSignal::Velocity,
        RiskSignal::ChannelAnomaly,
        RiskSignal::CityAnomaly,
    ];
}

/// The longest velocity window accepted, one hundred years.
pub const MAX_VELOCITY_WINDOW_HOURS: i64 = 24 * 365 * 100;

/// The thresholds used for classification.
///
/// All amount comparisons are inclusive: an amount exactly equal to a
/// threshold triggers it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskPolicy {
    /// Amounts at or above this value fire [RiskSignal::HighAmount].
    pub high_value_threshold: f64,
    /// Amounts at or above this value are High Risk regardless of points.
    pub severe_amount_threshold: f64,
    /// The length of the look-back window for [RiskSignal::Velocity].
    pub velocity_window_hours: i64,
    /// How many transactions in the window (including the one being
    /// classified) fire [RiskSignal::Velocity].
    pub velocity_threshold: usize,
    /// How many other transactions a customer needs before channel and city
    /// anomalies are considered.
    pub min_history_for_anomaly: usize,
    /// The signals to evaluate, signals not listed never fire.
    pub enabled_signals: Vec<RiskSignal>,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            high_value_threshold: 10_000.0,
            severe_amount_threshold: 50_000.0,
            velocity_window_hours: 24,
            velocity_threshold: 5,
            min_history_for_anomaly: 3,
            enabled_signals: RiskSignal::ALL.to_vec(),
        }
    }
}

impl RiskPolicy {
    /// Check that the thresholds are consistent.
    ///
    /// # Errors
    /// Returns [Error::Config] describing the first problem found.
    pub fn validate(&self) -> Result<(), Error> {
        if !self.high_value_threshold.is_finite() || self.high_value_threshold < 0.0 {
            return Err(Error::Config(
                "high_value_threshold must be a non-negative number".to_owned(),
            ));
        }

        if !self.severe_amount_threshold.is_finite()
            || self.severe_amount_threshold < self.high_value_threshold
        {
            return Err(Error::Config(
                "severe_amount_threshold must be at least high_value_threshold".to_owned(),
            ));
        }

        if self.velocity_window_hours <= 0 {
            return Err(Error::Config(
                "velocity_window_hours must be greater than zero".to_owned(),
            ));
        }

        if self.velocity_window_hours > MAX_VELOCITY_WINDOW_HOURS {
            return Err(Error::Config(format!(
                "velocity_window_hours must be at most {MAX_VELOCITY_WINDOW_HOURS}"
            )));
        }

        if self.velocity_threshold == 0 {
            return Err(Error::Config(
                "velocity_threshold must be greater than zero".to_owned(),
            ));
        }

        Ok(())
    }

    fn is_enabled(&self, signal: RiskSignal) -> bool {
        self.enabled_signals.contains(&signal)
    }
}

/// Why a record could not be classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnclassifiedReason {
    /// The record has no customer ID.
    MissingCustomerId,
    /// The record has no amount.
    MissingAmount,
    /// The amount is below zero, e.g. a refund.
    NegativeAmount,
}

/// A non-fatal, per-record classification problem.
///
/// The record is still stored, with the `Unclassified` label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationWarning {
    /// The record that could not be classified.
    pub transaction_id: String,
    /// Why it could not be classified.
    pub reason: UnclassifiedReason,
}

impl Display for ClassificationWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self.reason {
            UnclassifiedReason::MissingCustomerId => "it has no customer ID",
            UnclassifiedReason::MissingAmount => "it has no amount",
            UnclassifiedReason::NegativeAmount => "its amount is negative",
        };

        write!(
            f,
            "transaction {} is unclassified because {reason}",
            self.transaction_id
        )
    }
}
