use time::{Duration, PrimitiveDateTime};

use crate::{
    risk::{
        ClassificationWarning, MAX_VELOCITY_WINDOW_HOURS, RiskPolicy, RiskSignal,
        UnclassifiedReason,
        history::{CustomerHistory, most_common},
    },
    transaction::{ClassifiedTransaction, RiskLevel, TransactionRecord},
};

/// The outcome of classifying a batch of records.
#[derive(Debug, Default)]
pub struct ClassifiedBatch {
    /// Every record of the batch, in input order, with its label.
    pub transactions: Vec<ClassifiedTransaction>,
    /// One warning per `Unclassified` record.
    pub warnings: Vec<ClassificationWarning>,
}

/// Map a number of risk points onto a risk level.
pub fn level_for_points(points: u8) -> RiskLevel {
    match points {
        0 => RiskLevel::Normal,
        1..=2 => RiskLevel::MediumRisk,
        _ => RiskLevel::HighRisk,
    }
}

/// Classify a single record.
///
/// `history` should contain the customer's other transactions. The record
/// itself may or may not be part of `history`, it is never counted twice.
///
/// This is a pure function: the same record, history and policy always give
/// the same result.
pub fn classify(
    record: &TransactionRecord,
    history: &CustomerHistory,
    policy: &RiskPolicy,
) -> ClassifiedTransaction {
    let (customer_id, amount) = match checked_inputs(record) {
        Ok(inputs) => inputs,
        Err(_) => {
            return ClassifiedTransaction {
                record: record.clone(),
                risk_level: RiskLevel::Unclassified,
                signals: Vec::new(),
                points: 0,
            };
        }
    };

    let signals: Vec<RiskSignal> = RiskSignal::ALL
        .into_iter()
        .filter(|signal| policy.is_enabled(*signal))
        .filter(|signal| match signal {
            RiskSignal::HighAmount => amount >= policy.high_value_threshold,
            RiskSignal::Velocity => is_high_velocity(record, customer_id, history, policy),
            RiskSignal::ChannelAnomaly => is_anomalous(
                record.channel.as_deref(),
                history
                    .others(customer_id, &record.transaction_id)
                    .filter_map(|observation| observation.channel.as_deref()),
                policy,
            ),
            RiskSignal::CityAnomaly => is_anomalous(
                record.city.as_deref(),
                history
                    .others(customer_id, &record.transaction_id)
                    .filter_map(|observation| observation.city.as_deref()),
                policy,
            ),
        })
        .collect();

    let points = signals.len() as u8;
    let risk_level = if amount >= policy.severe_amount_threshold {
        RiskLevel::HighRisk
    } else {
        level_for_points(points)
    };

    ClassifiedTransaction {
        record: record.clone(),
        risk_level,
        signals,
        points,
    }
}

/// Classify every record in `records`.
///
/// The context for each record is `history` (usually the stored transactions
/// of the batch's customers) plus the whole incoming batch, so velocity and
/// anomaly signals see transactions from later rows in the same file too.
/// Records that cannot be classified are labelled `Unclassified` and reported
/// in [ClassifiedBatch::warnings], the rest of the batch is unaffected.
pub fn classify_batch(
    records: Vec<TransactionRecord>,
    mut history: CustomerHistory,
    policy: &RiskPolicy,
) -> ClassifiedBatch {
    history.extend(&records);

    let mut batch = ClassifiedBatch {
        transactions: Vec::with_capacity(records.len()),
        warnings: Vec::new(),
    };

    for record in &records {
        if let Err(reason) = checked_inputs(record) {
            let warning = ClassificationWarning {
                transaction_id: record.transaction_id.clone(),
                reason,
            };
            tracing::warn!("{warning}");
            batch.warnings.push(warning);
        }

        batch.transactions.push(classify(record, &history, policy));
    }

    batch
}

fn checked_inputs(record: &TransactionRecord) -> Result<(&str, f64), UnclassifiedReason> {
    let customer_id = record
        .customer_id
        .as_deref()
        .ok_or(UnclassifiedReason::MissingCustomerId)?;
    let amount = record
        .amount
        .filter(|amount| amount.is_finite())
        .ok_or(UnclassifiedReason::MissingAmount)?;

    if amount < 0.0 {
        return Err(UnclassifiedReason::NegativeAmount);
    }

    Ok((customer_id, amount))
}

fn is_high_velocity(
    record: &TransactionRecord,
    customer_id: &str,
    history: &CustomerHistory,
    policy: &RiskPolicy,
) -> bool {
    let Some(date) = record.transaction_date else {
        return false;
    };
    // Saturates at the earliest representable date instead of overflowing.
    let window =
        Duration::hours(policy.velocity_window_hours.clamp(0, MAX_VELOCITY_WINDOW_HOURS));
    let window_start = date.checked_sub(window).unwrap_or(PrimitiveDateTime::MIN);

    let others_in_window = history
        .others(customer_id, &record.transaction_id)
        .filter_map(|observation| observation.date)
        .filter(|other| (window_start..=date).contains(other))
        .count();

    others_in_window + 1 >= policy.velocity_threshold
}

fn is_anomalous<'a>(
    value: Option<&str>,
    others: impl Iterator<Item = &'a str>,
    policy: &RiskPolicy,
) -> bool {
    let Some(value) = value else {
        return false;
    };

    let others: Vec<&str> = others.collect();
    if others.len() < policy.min_history_for_anomaly {
        return false;
    }

    match most_common(others) {
        Some(usual) => usual != value.to_lowercase(),
        None => false,
    }
}
