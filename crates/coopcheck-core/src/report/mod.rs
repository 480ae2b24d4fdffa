mod document;
mod workbook;

pub use document::{merged_page_ranges, render_document};
pub use workbook::render_workbook;

use chrono::{DateTime, Utc};
use polars::prelude::*;
use serde::Serialize;

use crate::config::{CycleSelection, FanSizing};
use crate::correlation::CorrelationMatrix;
use crate::error::{PipelineWarning, Result};
use crate::validation::ComplianceSummary;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const PDF_MIME: &str = "application/pdf";

pub const WORKBOOK_FILE_NAME: &str = "merged_production_environment.xlsx";
pub const DOCUMENT_FILE_NAME: &str = "report.pdf";

pub const MERGED_SHEET: &str = "Merged";
pub const CORRELATION_SHEET: &str = "Correlation";
pub const COMPLIANCE_SHEET: &str = "Compliance";

/// Fixed guidance printed at the end of the PDF report.
pub const GUIDANCE: &[&str] = &[
    "Brooding temperature targets: 32-34 C in week 1, 30-32 C in week 2, 28-30 C in week 3,",
    "26-28 C in week 4 and 24-26 C afterwards. Lower the setpoint gradually as birds feather.",
    "Keep relative humidity between 60 and 70 %. Wet litter and high humidity raise ammonia.",
    "Ammonia above 20 ppm harms respiratory health: increase minimum ventilation and manage litter.",
    "Ventilation targets: 1-2 m3/h per bird in week 1, 2-4 in weeks 2-3 and 4-6 from week 4.",
    "Recommended fan counts assume the larger of the flock airflow need and 10 m3/h per m2 of floor.",
    "Correlations describe association only; check feed, water and health records before acting.",
];

/// A downloadable output of a pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn info(&self) -> ArtifactInfo {
        ArtifactInfo {
            file_name: self.file_name.clone(),
            mime_type: self.mime_type,
            size_bytes: self.bytes.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactInfo {
    pub file_name: String,
    pub mime_type: &'static str,
    pub size_bytes: usize,
}

/// Everything the renderers need about one run.
#[derive(Debug, Clone, Copy)]
pub struct ReportContext<'a> {
    pub title: &'a str,
    pub generated_at: DateTime<Utc>,
    pub cycle: &'a CycleSelection,
    pub fan_sizing: &'a FanSizing,
    pub merged: &'a DataFrame,
    pub correlation: Option<&'a CorrelationMatrix>,
    pub compliance: &'a ComplianceSummary,
    pub warnings: &'a [PipelineWarning],
    pub rows_per_page: usize,
}

pub fn render_artifacts(context: &ReportContext<'_>) -> Result<Vec<Artifact>> {
    let workbook = render_workbook(context)?;
    let document = render_document(context)?;

    Ok(vec![
        Artifact {
            file_name: WORKBOOK_FILE_NAME.to_string(),
            mime_type: XLSX_MIME,
            bytes: workbook,
        },
        Artifact {
            file_name: DOCUMENT_FILE_NAME.to_string(),
            mime_type: PDF_MIME,
            bytes: document,
        },
    ])
}

/// Short human rendering of a float: integers without decimals, otherwise up
/// to three decimals.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return "n/a".to_string();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{value:.0}");
    }
    let text = format!("{value:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

pub fn format_percentage(value: Option<f64>) -> String {
    match value {
        Some(pct) => format!("{pct:.1} %"),
        None => "n/a".to_string(),
    }
}

/// Cell texts of a column; nulls become empty strings.
pub fn column_text(column: &Column) -> Result<Vec<String>> {
    let texts = match column.dtype() {
        DataType::Float32 | DataType::Float64 => column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|value| value.map(format_number).unwrap_or_default())
            .collect(),
        _ => column
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|value| value.unwrap_or_default().to_string())
            .collect(),
    };
    Ok(texts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_are_rendered_compactly() {
        assert_eq!(format_number(15000.0), "15000");
        assert_eq!(format_number(1.5), "1.5");
        assert_eq!(format_number(1.0 / 3.0), "0.333");
        assert_eq!(format_number(-0.25), "-0.25");
        assert_eq!(format_number(f64::NAN), "n/a");
        assert_eq!(format_percentage(Some(66.666)), "66.7 %");
        assert_eq!(format_percentage(None), "n/a");
    }

    #[test]
    fn column_text_handles_nulls_and_dates() {
        let dates = Series::new("Date".into(), [Some(19723i32), None])
            .cast(&DataType::Date)
            .unwrap();
        let texts = column_text(&dates.into()).unwrap();
        assert_eq!(texts, vec!["2024-01-01".to_string(), String::new()]);

        let flags = Series::new("ok".into(), [Some(true), None]);
        assert_eq!(column_text(&flags.into()).unwrap(), vec!["true", ""]);
    }
}
