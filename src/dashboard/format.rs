//! Number formatting for the metric cards and the `report` binary.

use std::sync::OnceLock;

use numfmt::{Formatter, Precision};

/// A whole-number formatter with a "," thousands separator.
fn whole_number_formatter() -> &'static Formatter {
    static FORMATTER: OnceLock<Formatter> = OnceLock::new();

    FORMATTER.get_or_init(|| {
        Formatter::new()
            .separator(',')
            .unwrap()
            .precision(Precision::Decimals(0))
    })
}

/// Format a magnitude that has already been rounded. numfmt renders zero as
/// a bare "0", so it is handled here.
fn format_whole(magnitude: f64) -> String {
    if magnitude == 0.0 {
        "0".to_owned()
    } else {
        whole_number_formatter().fmt_string(magnitude)
    }
}

/// Format `number` as whole rupees with thousands separators, e.g. "₹12,500"
/// or "-₹300".
pub fn format_rupees(number: f64) -> String {
    let rounded = number.round();
    let sign = if rounded < 0.0 { "-" } else { "" };

    format!("{sign}₹{}", format_whole(rounded.abs()))
}

/// Format a count with thousands separators, e.g. "1,234".
pub fn format_count(count: usize) -> String {
    format_whole(count as f64)
}
