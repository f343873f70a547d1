use bulk_export_report::output::{format_cell, render_report};
use bulk_export_report::Record;
use serde_json::{json, Value};

fn cell(column: &str, value: Value) -> String {
    format_cell(column, Some(&value)).unwrap()
}

fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

#[test]
fn phone_columns_become_formulas() {
    assert_eq!(cell("to", json!("+15551234567")), "=\"+15551234567\"");
    assert_eq!(cell("from", json!("+15557654321")), "=\"+15557654321\"");
}

#[test]
fn price_uses_decimal_comma() {
    assert_eq!(cell("price", json!("1.50")), "1,50");
    assert_eq!(cell("price", json!(-0.0075)), "-0,0075");
    assert_eq!(cell("price", json!("1.2.3")), "1,2.3");
}

#[test]
fn delimiter_triggers_quoting() {
    assert_eq!(cell("note", json!("a;b")), "\"a;b\"");
    assert_eq!(cell("note", json!("plain")), "plain");
}

#[test]
fn quotes_are_doubled_and_wrapped() {
    assert_eq!(cell("body", json!("say \"hi\"")), "\"say \"\"hi\"\"\"");
}

#[test]
fn line_breaks_become_spaces() {
    assert_eq!(cell("body", json!("a\r\nb\nc\rd")), "a b c d");
}

#[test]
fn null_and_missing_are_empty() {
    assert_eq!(format_cell("to", None).unwrap(), "");
    assert_eq!(cell("to", Value::Null), "");
}

#[test]
fn scalars_and_nested_values_use_json_text() {
    assert_eq!(cell("num_segments", json!(3)), "3");
    assert_eq!(cell("flag", json!(true)), "true");
    assert_eq!(cell("tags", json!(["a", "b"])), "\"[\"\"a\"\",\"\"b\"\"]\"");
    assert_eq!(cell("meta", json!({"k": 1})), "\"{\"\"k\"\":1}\"");
}

#[test]
fn formula_columns_skip_delimiter_quoting() {
    assert_eq!(cell("to", json!("x;y")), "=\"x;y\"");
}

#[test]
fn every_row_matches_header_width() {
    let records = vec![
        record(json!({"sid": "SM1", "to": "+1555", "price": "0.75"})),
        record(json!({"sid": "SM2", "note": "a;b"})),
        record(json!({"body": "hello"})),
    ];
    let report = render_report(&records);
    let lines: Vec<&str> = report.text.split('\n').collect();

    assert_eq!(lines[0], "sid;to;price;note;body");
    assert_eq!(lines[1], "SM1;=\"+1555\";0,75;;");
    assert_eq!(lines[2], "SM2;;;\"a;b\";");
    assert_eq!(lines[3], ";;;;hello");
    assert_eq!(report.columns.len(), 5);
}
