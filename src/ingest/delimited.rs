//! Reads comma and tab separated files.

use csv::{ReaderBuilder, Trim};

use crate::{
    Error,
    ingest::{RawCell, RawTable},
};

/// Read delimited text into a [RawTable].
///
/// The first non-empty line is taken as the header row. Rows may have fewer
/// or more fields than the header.
///
/// # Errors
/// Returns [Error::Parse] if the content is not valid UTF-8, is malformed,
/// or has no header row.
pub(crate) fn read_table(content: &[u8], delimiter: u8) -> Result<RawTable, Error> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(Trim::All)
        .flexible(true)
        .from_reader(content);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|error| Error::Parse(format!("could not read the header row: {error}")))?
        .iter()
        .map(|header| header.to_owned())
        .collect();

    if headers.iter().all(|header| header.trim().is_empty()) {
        return Err(Error::Parse("the file is empty".to_owned()));
    }

    let mut rows = Vec::new();

    for (index, result) in reader.records().enumerate() {
        let record = result.map_err(|error| {
            Error::Parse(format!("could not read row {}: {error}", index + 1))
        })?;

        let row = record
            .iter()
            .map(|field| {
                if field.is_empty() {
                    RawCell::Empty
                } else {
                    RawCell::Text(field.to_owned())
                }
            })
            .collect();

        rows.push(row);
    }

    Ok(RawTable { headers, rows })
}

#[cfg(test)]
mod read_table_tests {
    use crate::{
        Error,
        ingest::{RawCell, delimited::read_table},
    };

    #[test]
    fn reads_headers_and_rows() {
        let table = read_table(b"a,b\n1, two \n3,", b',').expect("Could not read table");

        assert_eq!(table.headers, vec!["a", "b"]);
        assert_eq!(
            table.rows,
            vec![
                vec![RawCell::Text("1".to_owned()), RawCell::Text("two".to_owned())],
                vec![RawCell::Text("3".to_owned()), RawCell::Empty],
            ]
        );
    }

    #[test]
    fn allows_ragged_rows() {
        let table = read_table(b"a,b,c\n1\n1,2,3,4", b',').expect("Could not read table");

        assert_eq!(table.rows[0].len(), 1);
        assert_eq!(table.rows[1].len(), 4);
    }

    #[test]
    fn rejects_invalid_utf8() {
        let result = read_table(b"a,b\n\xff\xfe,1", b',');

        assert!(matches!(result, Err(Error::Parse(_))));
    }

    #[test]
    fn rejects_empty_content() {
        let result = read_table(b"", b',');

        assert!(matches!(result, Err(Error::Parse(_))));
    }
}
