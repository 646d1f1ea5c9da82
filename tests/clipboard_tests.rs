use serde_json::json;

use gridcore::state::clipboard::{self, ClipboardOptions};
use gridcore::state::data_model::Row;
use gridcore::state::selection::{CellCoord, SelectionRange};

fn row(value: serde_json::Value) -> Row {
    serde_json::from_value(value).unwrap()
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn span(a: (usize, usize), b: (usize, usize)) -> SelectionRange {
    SelectionRange::between(CellCoord::new(a.0, a.1), CellCoord::new(b.0, b.1))
}

#[test]
fn test_cells_with_delimiter_or_newline_stay_one_record() {
    let data = [row(json!({"a": "x\ty", "b": "line1\nline2"}))];
    let rows: Vec<&Row> = data.iter().collect();

    let text = clipboard::selection_to_text(
        &[span((0, 0), (0, 1))],
        &rows,
        &fields(&["a", "b"]),
        &ClipboardOptions::default(),
    );
    assert_eq!(text, "\"x\ty\"\t\"line1\nline2\"");

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_reader(text.as_bytes());
    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(&records[0][0], "x\ty");
    assert_eq!(&records[0][1], "line1\nline2");
}

#[test]
fn test_headers_and_uncovered_cells() {
    let data = [
        row(json!({"id": 1, "name": "Alice", "qty": 3})),
        row(json!({"id": 2, "name": "Bob", "qty": null})),
    ];
    let rows: Vec<&Row> = data.iter().collect();
    let options = ClipboardOptions {
        copy_headers: true,
        ..ClipboardOptions::default()
    };

    let text = clipboard::selection_to_text(
        &[span((0, 0), (0, 0)), span((1, 2), (1, 2))],
        &rows,
        &fields(&["id", "name", "qty"]),
        &options,
    );
    assert_eq!(text, "id\tqty\n1\t\n\t");
}

#[test]
fn test_custom_delimiter_quotes_fields() {
    let data = [row(json!({"a": "x;y", "b": "say \"hi\"", "c": 2.5}))];
    let rows: Vec<&Row> = data.iter().collect();
    let options = ClipboardOptions {
        delimiter: b';',
        ..ClipboardOptions::default()
    };

    let text = clipboard::selection_to_text(
        &[span((0, 0), (0, 2))],
        &rows,
        &fields(&["a", "b", "c"]),
        &options,
    );
    assert_eq!(text, "\"x;y\";\"say \"\"hi\"\"\";2.5");
}

#[test]
fn test_out_of_range_selection_is_empty() {
    let data = [row(json!({"a": 1}))];
    let rows: Vec<&Row> = data.iter().collect();

    let text = clipboard::selection_to_text(
        &[span((3, 0), (4, 0))],
        &rows,
        &fields(&["a"]),
        &ClipboardOptions::default(),
    );
    assert!(text.is_empty());
}

#[test]
fn test_options_serde_defaults() {
    let options: ClipboardOptions = serde_json::from_str("{}").unwrap();
    assert_eq!(options, ClipboardOptions::default());
    assert_eq!(options.delimiter, b'\t');
    assert!(!options.copy_headers);
}
