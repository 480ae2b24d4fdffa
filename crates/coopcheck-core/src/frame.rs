use polars::prelude::*;

pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names()
        .iter()
        .any(|col| col.as_str() == name)
}

pub fn is_numeric(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Values of `name` as floats; cells that cannot be cast become `None`.
pub fn float_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<f64>>> {
    let column = df.column(name)?;
    let values = match column.dtype() {
        DataType::Boolean | DataType::Date | DataType::Datetime(_, _) => {
            vec![None; column.len()]
        }
        _ => {
            let cast = column.cast(&DataType::Float64)?;
            cast.f64()?
                .into_iter()
                .map(|value| value.filter(|v| v.is_finite()))
                .collect()
        }
    };
    Ok(values)
}

/// Like [`float_values`] but a missing column yields all-`None`.
pub fn optional_float_values(df: &DataFrame, name: Option<&str>) -> PolarsResult<Vec<Option<f64>>> {
    match name {
        Some(name) if has_column(df, name) => float_values(df, name),
        _ => Ok(vec![None; df.height()]),
    }
}
