use polars::prelude::*;
use rust_xlsxwriter::{Format, Workbook};

use crate::errors::ParserError;
use crate::formats::{infer_kind, normalize_headers, DelimitedParser, InferredKind};
use crate::model::{Cell, TableFormat};
use crate::parse_table;
use crate::registry::{parse_with_parsers, TableParser};

const PRODUCTION_CSV: &str = "\
Date,cycle,Age,Live Weight,FCR
2024-01-01,A,1,42,
2024-01-02,A,2,55.5,1.1
2024-01-03,B,3,70,1.2
";

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

#[test]
fn parses_delimited_production_sheet() {
    let parsed = parse_table(PRODUCTION_CSV.as_bytes()).expect("csv parse failed");

    assert_eq!(parsed.format, TableFormat::Delimited);
    assert!(parsed.sheet_name.is_none());
    assert_eq!(parsed.height(), 3);
    assert_eq!(
        column_names(&parsed.df),
        vec!["Date", "cycle", "Age", "Live Weight", "FCR"]
    );

    assert_eq!(parsed.df.column("Date").unwrap().dtype(), &DataType::String);
    assert_eq!(parsed.df.column("cycle").unwrap().dtype(), &DataType::String);
    assert_eq!(parsed.df.column("Age").unwrap().dtype(), &DataType::Int64);
    assert_eq!(
        parsed.df.column("Live Weight").unwrap().dtype(),
        &DataType::Float64
    );

    let fcr = parsed.df.column("FCR").unwrap().f64().unwrap();
    assert_eq!(fcr.get(0), None);
    assert_eq!(fcr.get(1), Some(1.1));
}

#[test]
fn delimited_rows_shorter_than_header_are_padded() {
    let content = "Date,value_calibration_temp,THI\n2024-01-01,31.5\n2024-01-02,30.0,77\n";
    let parsed = parse_table(content.as_bytes()).unwrap();

    assert_eq!(parsed.height(), 2);
    let thi = parsed.df.column("THI").unwrap().i64().unwrap();
    assert_eq!(thi.get(0), None);
    assert_eq!(thi.get(1), Some(77));
}

#[test]
fn trailing_blank_rows_are_dropped() {
    let content = "Date,Age\n2024-01-01,1\n,\n,\n";
    let parsed = parse_table(content.as_bytes()).unwrap();
    assert_eq!(parsed.height(), 1);
}

#[test]
fn headers_are_deduplicated_and_filled() {
    let raw = vec![
        "Date".to_string(),
        " ".to_string(),
        "Date".to_string(),
        "Date".to_string(),
    ];
    assert_eq!(
        normalize_headers(&raw),
        vec!["Date", "column_2", "Date_1", "Date_2"]
    );
}

#[test]
fn mixed_cells_fall_back_to_text() {
    let cells = [Cell::Int(1), Cell::Float(2.5), Cell::Empty];
    assert_eq!(infer_kind(cells.iter()), InferredKind::Float);

    let cells = [Cell::Int(1), Cell::Text("n/a".to_string())];
    assert_eq!(infer_kind(cells.iter()), InferredKind::Text);

    let cells = [Cell::Empty, Cell::Text("  ".to_string())];
    assert_eq!(infer_kind(cells.iter()), InferredKind::Text);
}

#[test]
fn empty_payload_is_rejected() {
    assert!(matches!(parse_table(&[]), Err(ParserError::EmptyPayload)));
}

#[test]
fn binary_payload_reports_every_attempt() {
    let payload = [0xFFu8, 0xFE, 0x00, 0x81, 0x02];
    match parse_table(&payload) {
        Err(ParserError::NoMatchingParser { attempts }) => {
            let names: Vec<&str> = attempts.iter().map(|attempt| attempt.parser).collect();
            assert_eq!(names, vec!["spreadsheet", "delimited"]);
        }
        other => panic!("expected NoMatchingParser, got {other:?}"),
    }
}

#[test]
fn single_column_text_is_not_treated_as_csv() {
    let parser = DelimitedParser;
    let parsers: [&dyn TableParser; 1] = [&parser];
    let result = parse_with_parsers(b"just some words\nmore words\n", &parsers);
    assert!(matches!(
        result,
        Err(ParserError::NoMatchingParser { ref attempts }) if attempts.len() == 1
    ));
}

#[test]
fn single_date_column_csv_is_accepted() {
    let parsed = parse_table(b"Date\n2024-01-01\n2024-01-02\n").expect("parse");
    assert_eq!(parsed.format, TableFormat::Delimited);
    assert_eq!(column_names(&parsed.df), vec!["Date"]);
    assert_eq!(parsed.height(), 2);
}

#[test]
fn huge_whole_floats_stay_float() {
    let cells = [Cell::Float(1.0e19), Cell::Float(2.0)];
    assert_eq!(infer_kind(cells.iter()), InferredKind::Float);

    let cells = [Cell::Float(3.0), Cell::Int(4)];
    assert_eq!(infer_kind(cells.iter()), InferredKind::Int);
}

#[test]
fn parses_first_worksheet_of_xlsx() {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Lingkungan").unwrap();
        sheet.write_string(0, 0, "Date").unwrap();
        sheet.write_string(0, 1, "value_calibration_temp").unwrap();
        sheet.write_string(0, 2, "note").unwrap();
        sheet
            .write_number_with_format(1, 0, 45292.0, &date_format)
            .unwrap();
        sheet.write_number(1, 1, 31.5).unwrap();
        sheet.write_string(1, 2, "ok").unwrap();
        sheet
            .write_number_with_format(2, 0, 45293.0, &date_format)
            .unwrap();
        sheet.write_number(2, 1, 32.0).unwrap();
    }
    workbook.add_worksheet().write_string(0, 0, "ignored").unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let parsed = parse_table(&bytes).expect("xlsx parse failed");

    assert_eq!(parsed.format, TableFormat::Spreadsheet);
    assert_eq!(parsed.sheet_name.as_deref(), Some("Lingkungan"));
    assert_eq!(parsed.height(), 2);
    assert_eq!(
        column_names(&parsed.df),
        vec!["Date", "value_calibration_temp", "note"]
    );
    assert_eq!(
        parsed.df.column("Date").unwrap().dtype(),
        &DataType::Datetime(TimeUnit::Milliseconds, None)
    );
    assert_eq!(
        parsed.df.column("value_calibration_temp").unwrap().dtype(),
        &DataType::Float64
    );
    let note = parsed.df.column("note").unwrap().str().unwrap();
    assert_eq!(note.get(0), Some("ok"));
    assert_eq!(note.get(1), None);
}
