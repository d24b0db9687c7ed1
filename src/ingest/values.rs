//! Functions to parse cell values into amounts and dates.

use time::{
    Date, Duration, PrimitiveDateTime, Time, format_description::BorrowedFormatItem,
    macros::{datetime, format_description},
};

use crate::{ingest::RawCell, transaction::TransactionRecord};

const DATE_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!("[year]-[month]-[day]"),
    format_description!("[year]/[month]/[day]"),
    format_description!("[day]/[month]/[year]"),
    format_description!("[day]-[month]-[year]"),
];

const TIME_FORMATS: &[&[BorrowedFormatItem]] = &[
    format_description!("[hour]:[minute]:[second]"),
    format_description!("[hour]:[minute]:[second].[subsecond]"),
    format_description!("[hour]:[minute]"),
];

/// Parse a monetary amount such as `"1,200.50"`, `"₹ 300"` or `"-12"`.
///
/// Returns `None` if the text is not a finite number.
pub fn parse_amount(text: &str) -> Option<f64> {
    let text = text
        .trim()
        .trim_start_matches(['₹', '$', '€', '£'])
        .trim_start();
    let text = text.strip_prefix("Rs.").or(text.strip_prefix("Rs")).unwrap_or(text);
    let cleaned: String = text
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
}

/// Parse a transaction date with an optional time of day.
///
/// Accepts ISO dates (`2024-03-01`), `YYYY/MM/DD`, `DD/MM/YYYY` and
/// `DD-MM-YYYY`, optionally followed by a space or `T` and a `HH:MM[:SS]`
/// time. Dates without a time are taken to be at midnight.
pub fn parse_date_time(text: &str) -> Option<PrimitiveDateTime> {
    let text = text.trim();
    let (date_text, time_text) = match text.split_once([' ', 'T']) {
        Some((date_text, time_text)) => (date_text, Some(time_text.trim())),
        None => (text, None),
    };

    let date = DATE_FORMATS
        .iter()
        .find_map(|format| Date::parse(date_text, format).ok())?;

    let time = match time_text {
        Some(time_text) => TIME_FORMATS
            .iter()
            .find_map(|format| Time::parse(time_text, format).ok())?,
        None => Time::MIDNIGHT,
    };

    Some(PrimitiveDateTime::new(date, time))
}

/// Convert an Excel serial date (days since 1899-12-30) to a date time.
pub(crate) fn excel_serial_to_date_time(serial: f64) -> Option<PrimitiveDateTime> {
    // 2958465 is 9999-12-31, the last date Excel can represent.
    if !serial.is_finite() || !(1.0..=2_958_465.0).contains(&serial) {
        return None;
    }

    let seconds = (serial * 86_400.0).round() as i64;
    datetime!(1899-12-30 00:00:00).checked_add(Duration::seconds(seconds))
}

pub(crate) fn amount_from_cell(cell: &RawCell) -> Option<f64> {
    match cell {
        RawCell::Number(number) if number.is_finite() => Some(*number),
        RawCell::Text(text) => parse_amount(text),
        _ => None,
    }
}

pub(crate) fn date_time_from_cell(cell: &RawCell) -> Option<PrimitiveDateTime> {
    match cell {
        RawCell::DateTime(date_time) => Some(*date_time),
        RawCell::Text(text) => parse_date_time(text),
        RawCell::Number(serial) => excel_serial_to_date_time(*serial),
        RawCell::Empty => None,
    }
}

/// The normalized content of a record, used for deriving transaction IDs.
pub(crate) fn canonical_row_text(record: &TransactionRecord) -> String {
    [
        record.customer_id.clone().unwrap_or_default(),
        record
            .amount
            .map(|amount| amount.to_string())
            .unwrap_or_default(),
        record.channel.clone().unwrap_or_default(),
        record.city.clone().unwrap_or_default(),
        record
            .transaction_date
            .map(|date| date.to_string())
            .unwrap_or_default(),
    ]
    .join("|")
}

/// Creates a transaction ID from the normalized row content and the number of
/// times that content has been seen in the file so far.
///
/// Re-uploading the same file produces the same IDs, which lets the store
/// skip rows it already holds.
pub fn create_transaction_id(content: &str, occurrence: u32) -> String {
    let digest = md5::compute(format!("{content}#{occurrence}"));
    let hex = format!("{digest:x}");

    format!("TX-{}", &hex[..16])
}

#[cfg(test)]
mod value_tests {
    use time::macros::datetime;

    use crate::ingest::values::{
        create_transaction_id, excel_serial_to_date_time, parse_amount, parse_date_time,
    };

    #[test]
    fn parses_plain_and_formatted_amounts() {
        assert_eq!(parse_amount("100"), Some(100.0));
        assert_eq!(parse_amount(" 1,200.50 "), Some(1200.5));
        assert_eq!(parse_amount("₹50,000"), Some(50000.0));
        assert_eq!(parse_amount("$ 12.5"), Some(12.5));
        assert_eq!(parse_amount("Rs. 300"), Some(300.0));
        assert_eq!(parse_amount("-20"), Some(-20.0));
    }

    #[test]
    fn rejects_invalid_amounts() {
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("NaN"), None);
        assert_eq!(parse_amount("inf"), None);
    }

    #[test]
    fn parses_supported_date_formats() {
        assert_eq!(
            parse_date_time("2024-03-01"),
            Some(datetime!(2024-03-01 00:00:00))
        );
        assert_eq!(
            parse_date_time("2024-03-01 10:15:30"),
            Some(datetime!(2024-03-01 10:15:30))
        );
        assert_eq!(
            parse_date_time("2024-03-01T10:15"),
            Some(datetime!(2024-03-01 10:15:00))
        );
        assert_eq!(
            parse_date_time("2024/03/01"),
            Some(datetime!(2024-03-01 00:00:00))
        );
        assert_eq!(
            parse_date_time("25/12/2023 08:00"),
            Some(datetime!(2023-12-25 08:00:00))
        );
        assert_eq!(
            parse_date_time("25-12-2023"),
            Some(datetime!(2023-12-25 00:00:00))
        );
    }

    #[test]
    fn rejects_invalid_dates() {
        assert_eq!(parse_date_time("yesterday"), None);
        assert_eq!(parse_date_time("2024-13-01"), None);
        assert_eq!(parse_date_time("2024-03-01 25:00"), None);
    }

    #[test]
    fn converts_excel_serial_dates() {
        assert_eq!(
            excel_serial_to_date_time(45352.0),
            Some(datetime!(2024-03-01 00:00:00))
        );
        assert_eq!(
            excel_serial_to_date_time(45352.5),
            Some(datetime!(2024-03-01 12:00:00))
        );
        assert_eq!(excel_serial_to_date_time(-1.0), None);
    }

    #[test]
    fn transaction_id_depends_on_content_and_occurrence() {
        let first = create_transaction_id("C1|10|POS||", 1);

        assert_eq!(first, create_transaction_id("C1|10|POS||", 1));
        assert_ne!(first, create_transaction_id("C1|10|POS||", 2));
        assert_ne!(first, create_transaction_id("C2|10|POS||", 1));
        assert!(first.starts_with("TX-"));
        assert_eq!(first.len(), 19);
    }
}
