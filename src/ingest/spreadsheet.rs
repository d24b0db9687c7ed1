//! Reads the first worksheet of an Excel or OpenDocument workbook.

use std::io::Cursor;

use calamine::{Data, Reader, open_workbook_auto_from_rs};

use crate::{
    Error,
    ingest::{RawCell, RawTable, values::excel_serial_to_date_time},
};

/// Read the first worksheet of a workbook into a [RawTable].
///
/// Leading empty rows are skipped, the first non-empty row is the header row.
///
/// # Errors
/// Returns [Error::Parse] if the content is not a workbook or it has no
/// worksheets.
pub(crate) fn read_table(content: &[u8]) -> Result<RawTable, Error> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(content.to_vec()))
        .map_err(|error| Error::Parse(format!("could not open the workbook: {error}")))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::Parse("the workbook does not contain any worksheets".to_owned()))?
        .map_err(|error| Error::Parse(format!("could not read the first worksheet: {error}")))?;

    let mut rows = range
        .rows()
        .map(|row| row.iter().map(to_raw_cell).collect::<Vec<_>>())
        .skip_while(|row| row.iter().all(RawCell::is_empty));

    let headers = match rows.next() {
        Some(header_row) => header_row.iter().map(|cell| cell.to_string()).collect(),
        None => return Err(Error::Parse("the first worksheet is empty".to_owned())),
    };

    Ok(RawTable {
        headers,
        rows: rows.collect(),
    })
}

fn to_raw_cell(cell: &Data) -> RawCell {
    match cell {
        Data::Empty => RawCell::Empty,
        Data::String(text) => RawCell::Text(text.clone()),
        Data::Float(number) => RawCell::Number(*number),
        Data::Int(number) => RawCell::Number(*number as f64),
        Data::Bool(value) => RawCell::Text(value.to_string()),
        Data::DateTime(date_time) => match excel_serial_to_date_time(date_time.as_f64()) {
            Some(date_time) => RawCell::DateTime(date_time),
            None => RawCell::Number(date_time.as_f64()),
        },
        Data::DateTimeIso(text) | Data::DurationIso(text) => RawCell::Text(text.clone()),
        Data::Error(error) => {
            tracing::debug!("Spreadsheet cell contains an error: {error:?}");
            RawCell::Empty
        }
    }
}

#[cfg(test)]
mod spreadsheet_tests {
    use calamine::{CellErrorType, Data};
    use time::macros::datetime;

    use crate::{
        Error,
        ingest::{RawCell, parse_upload, spreadsheet::read_table, spreadsheet::to_raw_cell},
        transaction::TransactionRecord,
    };

    fn ids(records: &[TransactionRecord]) -> Vec<&str> {
        records.iter().map(|r| r.transaction_id.as_str()).collect()
    }

    // Headers "Transaction ID, Customer, Amount, Channel, City, Txn Date" with
    // two data rows and an empty third row between them.
    const WORKBOOK: &[u8] = include_bytes!("../../tests/data/transactions.xlsx");
    // The same sheet without the "Transaction ID" column.
    const WORKBOOK_WITHOUT_IDS: &[u8] =
        include_bytes!("../../tests/data/transactions_without_ids.xlsx");

    #[test]
    fn converts_cells() {
        assert_eq!(to_raw_cell(&Data::Empty), RawCell::Empty);
        assert_eq!(
            to_raw_cell(&Data::String("POS".to_owned())),
            RawCell::Text("POS".to_owned())
        );
        assert_eq!(to_raw_cell(&Data::Int(7)), RawCell::Number(7.0));
        assert_eq!(to_raw_cell(&Data::Float(2.5)), RawCell::Number(2.5));
        assert_eq!(to_raw_cell(&Data::Error(CellErrorType::Div0)), RawCell::Empty);
    }

    #[test]
    fn whole_number_cells_display_without_decimals() {
        assert_eq!(RawCell::Number(1001.0).to_string(), "1001");
        assert_eq!(RawCell::Number(10.5).to_string(), "10.5");
    }

    #[test]
    fn rejects_content_that_is_not_a_workbook() {
        let result = read_table(b"customer_id,amount\nC1,10");

        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn reads_workbook_into_canonical_records() {
        let parsed = parse_upload("transactions.xlsx", WORKBOOK).expect("Could not parse workbook");

        assert_eq!(parsed.records.len(), 2);
        assert_eq!(parsed.blank_rows_skipped, 1);
        assert!(parsed.warnings.is_empty());

        let first = &parsed.records[0];
        assert_eq!(first.transaction_id, "1001");
        assert_eq!(first.customer_id.as_deref(), Some("C1"));
        assert_eq!(first.amount, Some(250.5));
        assert_eq!(first.channel.as_deref(), Some("POS"));
        assert_eq!(first.city.as_deref(), Some("Mumbai"));
        assert_eq!(first.transaction_date, Some(datetime!(2024-04-01 10:30:00)));

        let second = &parsed.records[1];
        assert_eq!(second.transaction_id, "1002");
        assert_eq!(second.amount, Some(1200.0));
        assert_eq!(second.transaction_date, Some(datetime!(2024-04-02 00:00:00)));
    }

    #[test]
    fn workbook_matches_equivalent_csv() {
        let csv = "transaction_id,customer_id,amount,channel,city,transaction_date\n\
            1001,C1,250.5,POS,Mumbai,2024-04-01 10:30:00\n\
            1002,C2,\"1,200\",Online,Pune,2024-04-02";

        let from_workbook = parse_upload("transactions.xlsx", WORKBOOK).unwrap();
        let from_csv = parse_upload("transactions.csv", csv.as_bytes()).unwrap();

        assert_eq!(from_workbook.records, from_csv.records);
    }

    #[test]
    fn reparsing_workbook_gives_identical_records() {
        let first = parse_upload("transactions.xlsx", WORKBOOK).unwrap();
        let second = parse_upload("copy.xlsx", WORKBOOK).unwrap();

        assert_eq!(first.records, second.records);
    }

    #[test]
    fn derived_ids_are_stable_across_parses_and_formats() {
        let csv = "customer,amount,channel,city,txn_date\n\
            C1,250.5,POS,Mumbai,2024-04-01 10:30:00\n\
            C2,\"1,200\",Online,Pune,2024-04-02";

        let first = parse_upload("a.xlsx", WORKBOOK_WITHOUT_IDS).unwrap();
        let second = parse_upload("b.xlsx", WORKBOOK_WITHOUT_IDS).unwrap();
        let from_csv = parse_upload("a.csv", csv.as_bytes()).unwrap();

        assert!(ids(&first.records).iter().all(|id| id.starts_with("TX-")));
        assert_ne!(first.records[0].transaction_id, first.records[1].transaction_id);
        assert_eq!(ids(&first.records), ids(&second.records));
        assert_eq!(ids(&first.records), ids(&from_csv.records));
    }
}
