// crates/coopcheck-core/src/error.rs

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Which of the two uploaded tables a message refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    Production,
    Environment,
}

impl Dataset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dataset::Production => "production",
            Dataset::Environment => "environment",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{dataset} data must contain one of the columns {candidates:?}")]
    MissingColumn {
        dataset: Dataset,
        candidates: Vec<&'static str>,
    },

    #[error("cycle '{requested}' not found; available cycles: {available:?}")]
    UnknownCycle {
        requested: String,
        available: Vec<String>,
    },

    #[error("failed to parse {dataset} table: {source}")]
    Parse {
        dataset: Dataset,
        #[source]
        source: coopcheck_parser::ParserError,
    },

    #[error("Polars operation failed: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Spreadsheet export failed: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("PDF rendering failed: {0}")]
    Document(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Configuration file could not be parsed: {0}")]
    ConfigToml(#[from] toml::de::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

/// Recoverable conditions surfaced alongside a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineWarning {
    UnparseableDates { dataset: Dataset, count: usize },
    MissingEnvironmentPairing { count: usize },
    DuplicateEnvironmentDates { count: usize },
    CycleFilterIgnored { cycle: String },
}

impl fmt::Display for PipelineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineWarning::UnparseableDates { dataset, count } => write!(
                f,
                "{count} {dataset} rows have a missing or unparseable date"
            ),
            PipelineWarning::MissingEnvironmentPairing { count } => write!(
                f,
                "{count} production rows have no environment data for the same date"
            ),
            PipelineWarning::DuplicateEnvironmentDates { count } => write!(
                f,
                "{count} environment rows repeat an earlier date and were not joined"
            ),
            PipelineWarning::CycleFilterIgnored { cycle } => write!(
                f,
                "cycle '{cycle}' requested but production data has no cycle column"
            ),
        }
    }
}
