use csvjet::{CsvReader, CsvReaderBuilder, Error};

/// Collects every row as materialized cell values, using the reader's own
/// quote/escape configuration, and checks the stream ended cleanly.
fn rows_of<C: csvjet::StreamCursor>(mut reader: CsvReader<C>) -> Vec<Vec<Vec<u8>>> {
    let mut rows = Vec::new();
    while reader.read_row().unwrap() {
        let row = reader.row();
        rows.push(
            row.cells()
                .iter()
                .map(|cell| cell.materialize(reader.quote(), reader.escape()))
                .collect(),
        );
    }
    reader.finish().unwrap();
    rows
}

fn rows(data: &[u8]) -> Vec<Vec<Vec<u8>>> {
    rows_of(CsvReader::new(data))
}

macro_rules! t {
    ($rows:expr, [$([$($cell:expr),*]),* $(,)?]) => {
        let expected: Vec<Vec<Vec<u8>>> = vec![
            $(vec![$($cell.to_vec()),*]),*
        ];
        assert_eq!($rows, expected);
    };
}

#[test]
fn basic() {
    let data = br#"cell 1,cell 2,cell 3,cell 4
"Hello, world!","Hi ""Quote""","""HELLO""","""name"""
"#;
    t!(
        rows(data),
        [
            [b"cell 1", b"cell 2", b"cell 3", b"cell 4"],
            [b"Hello, world!", br#"Hi "Quote""#, br#""HELLO""#, br#""name""#],
        ]
    );
}

#[test]
fn single_row() {
    t!(rows(b"a,b,c\n"), [[b"a", b"b", b"c"]]);
}

#[test]
fn empty_middle_cell_is_unescaped() {
    let mut reader = CsvReader::new(&b"a,,c\n"[..]);
    assert!(reader.read_row().unwrap());
    let row = reader.row();
    assert_eq!(row.count(), 3);
    assert!(row[1].is_empty());
    assert!(!row[1].is_escaped());
    assert_eq!(row[0].as_bytes(), b"a");
    assert_eq!(row[2].as_bytes(), b"c");
}

#[test]
fn quoted_cell_hides_delimiter() {
    t!(rows(b"a,\"b,c\",d\n"), [[b"a", b"b,c", b"d"]]);
}

#[test]
fn doubled_quotes_materialize() {
    let mut reader = CsvReader::new(&b"\"a\"\"b\",c\n"[..]);
    assert!(reader.read_row().unwrap());
    let row = reader.row();
    assert_eq!(row.count(), 2);
    assert!(row[0].is_escaped());
    assert_eq!(row[0].materialize(b'"', 0), b"a\"b");
    assert!(!row[1].is_escaped());
    assert_eq!(row[1].as_bytes(), b"c");
}

#[test]
fn quoted_sentence() {
    t!(
        rows(b"a,\"he said \"\"hi\"\"\",b\n"),
        [[b"a", b"he said \"hi\"", b"b"]]
    );
}

#[test]
fn crlf_matches_lf() {
    let crlf = rows(b"x\r\ny\r\n");
    let lf = rows(b"x\ny\n");
    assert_eq!(crlf, lf);
    t!(crlf, [[b"x"], [b"y"]]);
}

#[test]
fn lone_cr_ends_the_record() {
    t!(rows(b"a,b\rc,d\n"), [[b"a", b"b"], [b"c", b"d"]]);
}

#[test]
fn newline_only_input_yields_no_rows() {
    t!(rows(b"\n\n\n"), []);
    t!(rows(b"\r\n\r\n"), []);
}

#[test]
fn blank_lines_between_records_are_skipped() {
    t!(rows(b"a\n\n\nb\n"), [[b"a"], [b"b"]]);
}

#[test]
fn trailing_delimiter_makes_empty_cell() {
    t!(rows(b"a,b,\n"), [[b"a", b"b", b""]]);
}

#[test]
fn quoted_cell_spans_newlines() {
    t!(rows(b"\"line one\nline two\",x\n"), [[b"line one\nline two", b"x"]]);
}

#[test]
fn custom_delimiter() {
    let reader = CsvReaderBuilder::new().delimiter(b'\t').from_reader(&b"a\tb\tc\n"[..]);
    t!(rows_of(reader), [[b"a", b"b", b"c"]]);
}

#[test]
fn escape_byte_in_unquoted_cell() {
    let reader = CsvReaderBuilder::new()
        .escape(Some(b'\\'))
        .from_reader(&b"a\\,b,c\n"[..]);
    t!(rows_of(reader), [[b"a,b", b"c"]]);
}

#[test]
fn incomplete_row_is_dropped_by_default() {
    let mut reader = CsvReader::new(&b"1,2,3"[..]);
    assert!(!reader.read_row().unwrap());
    assert!(!reader.in_newline_skip());
    match reader.finish() {
        Err(Error::TrailingBytes { count }) => assert_eq!(count, 5),
        other => panic!("expected TrailingBytes, got {other:?}"),
    }
}

#[test]
fn incomplete_row_is_emitted_on_request() {
    let mut reader = CsvReaderBuilder::new()
        .yield_incomplete_row(true)
        .from_reader(&b"1,2,3"[..]);
    assert!(reader.read_row().unwrap());
    {
        let row = reader.row();
        assert_eq!(row.count(), 3);
        assert_eq!(row[2].as_bytes(), b"3");
    }
    assert!(reader.in_newline_skip());
    assert!(!reader.read_row().unwrap());
    reader.finish().unwrap();
}

#[test]
fn incomplete_quoted_row_closes_at_eof() {
    let reader = CsvReaderBuilder::new()
        .yield_incomplete_row(true)
        .from_reader(&b"a,\"b c\""[..]);
    t!(rows_of(reader), [[b"a", b"b c"]]);
}

#[test]
fn unbalanced_quote_is_trailing_garbage() {
    let mut reader = CsvReaderBuilder::new()
        .yield_incomplete_row(true)
        .from_reader(&b"good,row\n\"never closed"[..]);
    assert!(reader.read_row().unwrap());
    assert!(!reader.read_row().unwrap());
    assert!(matches!(reader.finish(), Err(Error::TrailingBytes { .. })));
}

#[test]
fn trailing_newline_is_clean() {
    let mut reader = CsvReader::new(&b"a,b\n"[..]);
    assert!(reader.read_row().unwrap());
    assert!(!reader.read_row().unwrap());
    assert!(reader.in_newline_skip());
    reader.finish().unwrap();
}

#[test]
fn header_lookup() {
    let data: &[u8] = b"name,age\nalice,30\nbob,25\n";
    let mut reader = CsvReader::new(data);
    let header = reader.read_header().unwrap();
    assert_eq!(header.get(b"name"), Some(0));
    assert_eq!(header.get(b"age"), Some(1));

    let mut seen = Vec::new();
    while reader.read_row().unwrap() {
        let row = reader.row();
        seen.push((
            row[header.get(b"name").unwrap()].as_bytes().to_vec(),
            row[header.get(b"age").unwrap()].as_bytes().to_vec(),
        ));
    }
    assert_eq!(
        seen,
        vec![
            (b"alice".to_vec(), b"30".to_vec()),
            (b"bob".to_vec(), b"25".to_vec()),
        ]
    );
}

#[test]
fn find_column_scans_the_current_row() {
    let mut reader = CsvReader::new(&b"Cost,ResourceId,RecordType\n0.25,i-123,LineItem\n"[..]);
    assert!(reader.read_row().unwrap());
    let cost = reader.find_column(b"Cost").unwrap();
    assert_eq!(cost, 0);
    assert!(reader.find_column(b"Nope").is_none());

    assert!(reader.read_row().unwrap());
    assert_eq!(reader.row()[cost].as_double(), 0.25);
}

#[test]
fn too_wide_record_errors() {
    let mut data = vec![b'x'];
    for _ in 0..csvjet::ROW_CAPACITY {
        data.extend_from_slice(b",x");
    }
    data.push(b'\n');

    let mut reader = CsvReader::new(&data[..]);
    assert!(matches!(
        reader.read_row(),
        Err(Error::RowTooWide { capacity }) if capacity == csvjet::ROW_CAPACITY
    ));
}

#[test]
fn round_trip_reproduces_canonical_input() {
    let data: &[u8] = b"plain,\"quoted,cell\",\"say \"\"hi\"\"\"\nsecond,row,here\n";
    let mut reader = CsvReader::new(data);

    let mut rendered = Vec::new();
    while reader.read_row().unwrap() {
        let row = reader.row();
        for (i, cell) in row.cells().iter().enumerate() {
            if i > 0 {
                rendered.push(b',');
            }
            let value = cell.materialize(b'"', 0);
            let needs_quoting =
                value.iter().any(|&b| b == b',' || b == b'"' || b == b'\r' || b == b'\n');
            if needs_quoting {
                rendered.push(b'"');
                for &b in &value {
                    rendered.push(b);
                    if b == b'"' {
                        rendered.push(b'"');
                    }
                }
                rendered.push(b'"');
            } else {
                rendered.extend_from_slice(&value);
            }
        }
        rendered.push(b'\n');
    }
    reader.finish().unwrap();
    assert_eq!(rendered, data);
}

#[cfg(unix)]
mod mapped {
    use super::*;
    use std::io::Write;

    fn temp_file(contents: &[u8]) -> std::path::PathBuf {
        use std::sync::atomic::{AtomicUsize, Ordering};
        static COUNTER: AtomicUsize = AtomicUsize::new(0);

        let path = std::env::temp_dir().join(format!(
            "csvjet-it-{}-{}",
            std::process::id(),
            COUNTER.fetch_add(1, Ordering::Relaxed),
        ));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents).unwrap();
        path
    }

    #[test]
    fn parses_a_mapped_file() {
        let path = temp_file(b"a,b\n\"c,d\",e\n");
        let reader = CsvReader::open_path(&path).unwrap();
        t!(rows_of(reader), [[b"a", b"b"], [b"c,d", b"e"]]);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn mapped_file_without_trailing_newline() {
        let path = temp_file(b"a,b\nc,d");

        let mut strict = CsvReader::open_path(&path).unwrap();
        assert!(strict.read_row().unwrap());
        assert!(!strict.read_row().unwrap());
        assert!(matches!(strict.finish(), Err(Error::TrailingBytes { count: 3 })));

        let lenient = CsvReaderBuilder::new()
            .yield_incomplete_row(true)
            .open_path(&path)
            .unwrap();
        t!(rows_of(lenient), [[b"a", b"b"], [b"c", b"d"]]);

        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn open_error_carries_the_path() {
        let err = CsvReader::open_path("/nonexistent/csvjet-it").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/csvjet-it"));
    }
}
