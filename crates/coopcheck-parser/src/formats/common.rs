use std::collections::HashMap;

use polars::prelude::*;

use crate::errors::ParserError;
use crate::model::{Cell, RawTable};

/// Column dtype chosen from the non-empty cells of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InferredKind {
    Int,
    Float,
    Bool,
    DateTime,
    Text,
}

/// Largest magnitude below which every whole `f64` converts to `i64` exactly.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

fn is_exact_integer(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value.abs() < MAX_EXACT_INTEGER
}

pub fn infer_kind<'a>(cells: impl Iterator<Item = &'a Cell>) -> InferredKind {
    let mut kind: Option<InferredKind> = None;

    for cell in cells {
        if cell.is_empty() {
            continue;
        }
        let cell_kind = match cell {
            Cell::Int(_) => InferredKind::Int,
            Cell::Float(value) if is_exact_integer(*value) => InferredKind::Int,
            Cell::Float(_) => InferredKind::Float,
            Cell::Bool(_) => InferredKind::Bool,
            Cell::DateTime(_) => InferredKind::DateTime,
            Cell::Text(_) | Cell::Empty => InferredKind::Text,
        };
        kind = Some(match (kind, cell_kind) {
            (None, next) => next,
            (Some(current), next) if current == next => current,
            (Some(InferredKind::Int), InferredKind::Float)
            | (Some(InferredKind::Float), InferredKind::Int) => InferredKind::Float,
            _ => return InferredKind::Text,
        });
    }

    kind.unwrap_or(InferredKind::Text)
}

/// Makes every header unique and non-empty, keeping the first spelling as-is.
pub fn normalize_headers(raw: &[String]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headers = Vec::with_capacity(raw.len());

    for (idx, header) in raw.iter().enumerate() {
        let trimmed = header.trim();
        let base = if trimmed.is_empty() {
            format!("column_{}", idx + 1)
        } else {
            trimmed.to_string()
        };

        let count = seen.entry(base.clone()).or_insert(0);
        *count += 1;
        if *count == 1 {
            headers.push(base);
        } else {
            headers.push(format!("{base}_{}", *count - 1));
        }
    }

    headers
}

/// Text cells that look numeric or boolean are promoted so delimited input
/// infers the same dtypes a workbook would.
pub fn cell_from_text(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Cell::Empty;
    }
    if let Ok(value) = trimmed.parse::<i64>() {
        return Cell::Int(value);
    }
    if let Ok(value) = trimmed.parse::<f64>() {
        if value.is_finite() {
            return Cell::Float(value);
        }
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => Cell::Bool(true),
        "false" => Cell::Bool(false),
        _ => Cell::Text(trimmed.to_string()),
    }
}

fn build_column(name: &str, cells: Vec<&Cell>) -> Result<Column, ParserError> {
    let kind = infer_kind(cells.iter().copied());
    let series = match kind {
        InferredKind::Int => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|cell| match cell {
                    Cell::Int(value) => Some(*value),
                    Cell::Float(value) => Some(*value as i64),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        InferredKind::Float => {
            let values: Vec<Option<f64>> = cells
                .iter()
                .map(|cell| match cell {
                    Cell::Int(value) => Some(*value as f64),
                    Cell::Float(value) => Some(*value),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        InferredKind::Bool => {
            let values: Vec<Option<bool>> = cells
                .iter()
                .map(|cell| match cell {
                    Cell::Bool(value) => Some(*value),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
        }
        InferredKind::DateTime => {
            let values: Vec<Option<i64>> = cells
                .iter()
                .map(|cell| match cell {
                    Cell::DateTime(value) => Some(value.and_utc().timestamp_millis()),
                    _ => None,
                })
                .collect();
            Series::new(name.into(), values)
                .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
                .map_err(|source| ParserError::Column {
                    column: name.to_string(),
                    source,
                })?
        }
        InferredKind::Text => {
            let values: Vec<Option<String>> = cells.iter().map(|cell| cell.render()).collect();
            Series::new(name.into(), values)
        }
    };

    Ok(series.into())
}

/// Converts a raw table into a typed `DataFrame`, one column per header.
pub fn build_dataframe(table: &RawTable) -> Result<DataFrame, ParserError> {
    let headers = normalize_headers(&table.headers);
    let mut columns = Vec::with_capacity(headers.len());

    for (idx, header) in headers.iter().enumerate() {
        let cells: Vec<&Cell> = table.column_cells(idx).collect();
        columns.push(build_column(header, cells)?);
    }

    DataFrame::new(columns).map_err(|source| ParserError::Column {
        column: "<frame>".to_string(),
        source,
    })
}

/// Drops trailing rows whose cells are all empty.
pub fn trim_trailing_blank_rows(rows: &mut Vec<Vec<Cell>>) {
    while rows
        .last()
        .map(|row| row.iter().all(Cell::is_empty))
        .unwrap_or(false)
    {
        rows.pop();
    }
}
