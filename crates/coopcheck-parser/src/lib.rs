pub mod dates;
pub mod errors;
pub mod formats;
pub mod model;
mod registry;

pub use errors::{ParserAttempt, ParserError};
pub use model::{Cell, ParsedTable, RawTable, TableFormat};
pub use registry::{parse_table, parse_with_parsers, TableParser};

#[cfg(test)]
mod tests;
