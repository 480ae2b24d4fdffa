use csv::ReaderBuilder;

use crate::errors::ParserError;
use crate::formats::common::{build_dataframe, cell_from_text, trim_trailing_blank_rows};
use crate::model::{ParsedTable, RawTable, TableFormat};
use crate::registry::TableParser;

const PARSER_NAME: &str = "delimited";

/// Date columns that may legitimately make up a whole upload on their own.
const SINGLE_COLUMN_HEADERS: &[&str] = &["Date", "record_datetime"];

fn is_known_single_column(headers: &[String]) -> bool {
    headers
        .first()
        .is_some_and(|header| SINGLE_COLUMN_HEADERS.contains(&header.trim()))
}

/// Comma separated text with a header row.
pub struct DelimitedParser;

impl TableParser for DelimitedParser {
    fn name(&self) -> &'static str {
        PARSER_NAME
    }

    fn parse(&self, content: &[u8]) -> Result<ParsedTable, ParserError> {
        let text = std::str::from_utf8(content).map_err(|err| ParserError::FormatMismatch {
            parser: PARSER_NAME,
            reason: format!("payload is not UTF-8 text: {err}"),
        })?;
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());

        let mut records = reader.records();
        let headers = loop {
            match records.next() {
                Some(Ok(record)) => {
                    if record.iter().all(|field| field.trim().is_empty()) {
                        continue;
                    }
                    break record.iter().map(str::to_string).collect::<Vec<String>>();
                }
                Some(Err(source)) => {
                    return Err(ParserError::Csv {
                        parser: PARSER_NAME,
                        source,
                    })
                }
                None => {
                    return Err(ParserError::MissingHeader {
                        parser: PARSER_NAME,
                    })
                }
            }
        };

        if headers.len() < 2 && !is_known_single_column(&headers) {
            return Err(ParserError::FormatMismatch {
                parser: PARSER_NAME,
                reason: "header row has a single field that is not a known column".to_string(),
            });
        }

        let mut rows = Vec::new();
        for record in records {
            let record = record.map_err(|source| ParserError::Csv {
                parser: PARSER_NAME,
                source,
            })?;
            rows.push(record.iter().map(cell_from_text).collect());
        }
        trim_trailing_blank_rows(&mut rows);

        let table = RawTable { headers, rows };
        let df = build_dataframe(&table)?;

        Ok(ParsedTable {
            format: TableFormat::Delimited,
            sheet_name: None,
            df,
        })
    }
}
