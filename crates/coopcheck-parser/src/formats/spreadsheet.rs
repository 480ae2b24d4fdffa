use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Reader};

use crate::dates::parse_datetime_text;
use crate::errors::ParserError;
use crate::formats::common::{build_dataframe, trim_trailing_blank_rows};
use crate::model::{Cell, ParsedTable, RawTable, TableFormat};
use crate::registry::TableParser;

const PARSER_NAME: &str = "spreadsheet";

// Zip container (xlsx/xlsm/ods) and OLE compound document (xls).
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1];

/// Reads the first worksheet of an Excel or OpenDocument workbook.
pub struct SpreadsheetParser;

impl TableParser for SpreadsheetParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn parse(&self, content: &[u8]) -> Result<ParsedTable, ParserError> {
        if !content.starts_with(ZIP_MAGIC) && !content.starts_with(OLE_MAGIC) {
            return Err(ParserError::FormatMismatch {
                parser: PARSER_NAME,
                reason: "payload is not a zip or OLE workbook container".to_string(),
            });
        }

        let mut workbook = open_workbook_auto_from_rs(Cursor::new(content.to_vec())).map_err(
            |err| ParserError::FormatMismatch {
                parser: PARSER_NAME,
                reason: err.to_string(),
            },
        )?;

        let sheet_name = workbook.sheet_names().first().cloned();
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ParserError::Workbook {
                parser: PARSER_NAME,
                message: "workbook has no worksheets".to_string(),
            })?
            .map_err(|err| ParserError::Workbook {
                parser: PARSER_NAME,
                message: err.to_string(),
            })?;

        let mut rows = range
            .rows()
            .map(|row| row.iter().map(cell_from_data).collect::<Vec<Cell>>())
            .skip_while(|row| row.iter().all(Cell::is_empty));

        let header_row = rows.next().ok_or(ParserError::MissingHeader {
            parser: PARSER_NAME,
        })?;
        let headers = header_row
            .iter()
            .map(|cell| cell.render().unwrap_or_default())
            .collect::<Vec<String>>();

        let mut data_rows: Vec<Vec<Cell>> = rows.collect();
        trim_trailing_blank_rows(&mut data_rows);

        let table = RawTable {
            headers,
            rows: data_rows,
        };
        let df = build_dataframe(&table)?;

        Ok(ParsedTable {
            format: TableFormat::Spreadsheet,
            sheet_name,
            df,
        })
    }
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(value) => Cell::Int(*value),
        Data::Float(value) => Cell::Float(*value),
        Data::Bool(value) => Cell::Bool(*value),
        Data::String(text) => Cell::Text(text.clone()),
        Data::DateTime(value) => match value.as_datetime() {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Float(value.as_f64()),
        },
        Data::DateTimeIso(text) => match parse_datetime_text(text) {
            Some(dt) => Cell::DateTime(dt),
            None => Cell::Text(text.clone()),
        },
        Data::DurationIso(text) => Cell::Text(text.clone()),
    }
}
