use polars::prelude::*;
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use crate::error::Result;
use crate::frame::is_numeric;
use crate::report::{
    ReportContext, COMPLIANCE_SHEET, CORRELATION_SHEET, MERGED_SHEET,
};
use crate::validation::ComplianceCheck;

/// Days between the Excel epoch (1899-12-30) and the Unix epoch.
const EXCEL_UNIX_OFFSET_DAYS: f64 = 25_569.0;
const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Builds the `.xlsx` export: merged rows first, then correlation and compliance.
pub fn render_workbook(context: &ReportContext<'_>) -> Result<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    let merged = workbook.add_worksheet();
    merged.set_name(MERGED_SHEET)?;
    write_frame(merged, context.merged, &header)?;

    let correlation = workbook.add_worksheet();
    correlation.set_name(CORRELATION_SHEET)?;
    write_correlation(correlation, context, &header)?;

    let compliance = workbook.add_worksheet();
    compliance.set_name(COMPLIANCE_SHEET)?;
    write_compliance(compliance, context, &header)?;

    Ok(workbook.save_to_buffer()?)
}

fn write_frame(sheet: &mut Worksheet, df: &DataFrame, header: &Format) -> Result<()> {
    let date_format = Format::new().set_num_format("yyyy-mm-dd");
    let datetime_format = Format::new().set_num_format("yyyy-mm-dd hh:mm:ss");

    for (col_idx, column) in df.get_columns().iter().enumerate() {
        let col = col_idx as u16;
        sheet.write_string_with_format(0, col, column.name().as_str(), header)?;

        match column.dtype() {
            DataType::Date => {
                let days = column.cast(&DataType::Int32)?;
                for (row, value) in days.i32()?.into_iter().enumerate() {
                    if let Some(day) = value {
                        let serial = day as f64 + EXCEL_UNIX_OFFSET_DAYS;
                        sheet.write_number_with_format(row as u32 + 1, col, serial, &date_format)?;
                    }
                }
            }
            DataType::Datetime(_, _) => {
                let millis = column
                    .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))?
                    .cast(&DataType::Int64)?;
                for (row, value) in millis.i64()?.into_iter().enumerate() {
                    if let Some(ms) = value {
                        let serial = ms as f64 / MILLIS_PER_DAY + EXCEL_UNIX_OFFSET_DAYS;
                        sheet.write_number_with_format(
                            row as u32 + 1,
                            col,
                            serial,
                            &datetime_format,
                        )?;
                    }
                }
            }
            DataType::Boolean => {
                for (row, value) in column.bool()?.into_iter().enumerate() {
                    if let Some(flag) = value {
                        sheet.write_boolean(row as u32 + 1, col, flag)?;
                    }
                }
            }
            dtype if is_numeric(dtype) => {
                let values = column.cast(&DataType::Float64)?;
                for (row, value) in values.f64()?.into_iter().enumerate() {
                    if let Some(number) = value.filter(|v| v.is_finite()) {
                        sheet.write_number(row as u32 + 1, col, number)?;
                    }
                }
            }
            _ => {
                let texts = column.cast(&DataType::String)?;
                for (row, value) in texts.str()?.into_iter().enumerate() {
                    if let Some(text) = value {
                        sheet.write_string(row as u32 + 1, col, text)?;
                    }
                }
            }
        }
    }

    if df.width() > 0 {
        sheet.set_freeze_panes(1, 0)?;
    }
    sheet.autofit();
    Ok(())
}

fn write_correlation(
    sheet: &mut Worksheet,
    context: &ReportContext<'_>,
    header: &Format,
) -> Result<()> {
    let Some(matrix) = context.correlation else {
        sheet.write_string(
            0,
            0,
            "Correlation columns were not found in the merged data.",
        )?;
        return Ok(());
    };

    sheet.write_string_with_format(0, 0, "Environment \\ Production", header)?;
    for (col_idx, name) in matrix.production.iter().enumerate() {
        sheet.write_string_with_format(0, col_idx as u16 + 1, name.as_str(), header)?;
    }
    for (row_idx, (name, values)) in matrix.environment.iter().zip(&matrix.values).enumerate() {
        let row = row_idx as u32 + 1;
        sheet.write_string_with_format(row, 0, name.as_str(), header)?;
        for (col_idx, value) in values.iter().enumerate() {
            if value.is_finite() {
                sheet.write_number(row, col_idx as u16 + 1, *value)?;
            }
        }
    }
    sheet.autofit();
    Ok(())
}

fn write_compliance(
    sheet: &mut Worksheet,
    context: &ReportContext<'_>,
    header: &Format,
) -> Result<()> {
    let summary = context.compliance;
    for (col, title) in ["Check", "Passed", "Failed", "Unknown", "Compliance (%)"]
        .iter()
        .enumerate()
    {
        sheet.write_string_with_format(0, col as u16, *title, header)?;
    }

    for (row_idx, check) in ComplianceCheck::ALL.iter().enumerate() {
        let row = row_idx as u32 + 1;
        let flag = summary.flag(*check);
        sheet.write_string(row, 0, check.label())?;
        sheet.write_number(row, 1, flag.passed as f64)?;
        sheet.write_number(row, 2, flag.failed as f64)?;
        sheet.write_number(row, 3, flag.unknown as f64)?;
        if let Some(pct) = flag.percentage {
            sheet.write_number(row, 4, pct)?;
        }
    }

    let row = ComplianceCheck::ALL.len() as u32 + 2;
    sheet.write_string_with_format(row, 0, "Rows", header)?;
    sheet.write_number(row, 1, summary.total_rows as f64)?;
    sheet.write_string_with_format(row + 1, 0, "Non-compliant rows", header)?;
    sheet.write_number(row + 1, 1, summary.non_compliant_rows as f64)?;
    sheet.autofit();
    Ok(())
}
