use tracing::debug;

use crate::errors::{ParserAttempt, ParserError};
use crate::formats::{DelimitedParser, SpreadsheetParser};
use crate::model::ParsedTable;

pub trait TableParser {
    fn name(&self) -> &'static str;
    fn parse(&self, content: &[u8]) -> Result<ParsedTable, ParserError>;
}

pub fn parse_table(content: &[u8]) -> Result<ParsedTable, ParserError> {
    if content.is_empty() {
        return Err(ParserError::EmptyPayload);
    }
    let spreadsheet = SpreadsheetParser;
    let delimited = DelimitedParser;
    let parsers: [&dyn TableParser; 2] = [&spreadsheet, &delimited];
    parse_with_parsers(content, &parsers)
}

pub fn parse_with_parsers(
    content: &[u8],
    parsers: &[&dyn TableParser],
) -> Result<ParsedTable, ParserError> {
    let mut attempts = Vec::new();

    for parser in parsers {
        match parser.parse(content) {
            Ok(parsed) => {
                debug!(
                    parser = parser.name(),
                    rows = parsed.height(),
                    columns = parsed.df.width(),
                    "parsed table"
                );
                return Ok(parsed);
            }
            Err(ParserError::FormatMismatch { reason, .. }) => {
                debug!(parser = parser.name(), %reason, "parser declined input");
                attempts.push(ParserAttempt::new(parser.name(), reason));
            }
            Err(err) => return Err(err),
        }
    }

    Err(ParserError::NoMatchingParser { attempts })
}
