pub(crate) mod common;
mod delimited;
mod spreadsheet;

pub use delimited::DelimitedParser;
pub use spreadsheet::SpreadsheetParser;

pub use common::{infer_kind, normalize_headers, InferredKind};
