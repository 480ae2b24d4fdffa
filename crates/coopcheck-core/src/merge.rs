use std::collections::HashMap;

use polars::prelude::*;
use tracing::{info, warn};

use crate::error::Result;
use crate::frame::column_names;
use crate::schema::{DATE, ENVIRONMENT_MISSING, ENVIRONMENT_SUFFIX};

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub merged: DataFrame,
    /// Environment-origin column names as they appear in `merged`.
    pub environment_columns: Vec<String>,
    pub missing_environment: usize,
    pub duplicate_environment_dates: usize,
}

fn date_keys(df: &DataFrame) -> Result<Vec<Option<i32>>> {
    let keys = df.column(DATE)?.cast(&DataType::Int32)?;
    Ok(keys.i32()?.into_iter().collect())
}

/// Left-joins `environment` onto `production` by calendar date.
///
/// Every production row appears exactly once in the output. When several
/// environment rows share a date, the first one in file order is joined and
/// the rest are counted in `duplicate_environment_dates`. Rows are returned
/// sorted by date with unknown dates last.
pub fn merge_on_date(production: &DataFrame, environment: &DataFrame) -> Result<MergeOutcome> {
    let mut first_row_by_date: HashMap<i32, IdxSize> = HashMap::new();
    let mut duplicate_environment_dates = 0usize;

    for (idx, key) in date_keys(environment)?.into_iter().enumerate() {
        let Some(key) = key else { continue };
        if first_row_by_date.contains_key(&key) {
            duplicate_environment_dates += 1;
        } else {
            first_row_by_date.insert(key, idx as IdxSize);
        }
    }

    let indices: Vec<Option<IdxSize>> = date_keys(production)?
        .into_iter()
        .map(|key| key.and_then(|key| first_row_by_date.get(&key).copied()))
        .collect();

    let production_names = column_names(production);
    let value_names: Vec<String> = column_names(environment)
        .into_iter()
        .filter(|name| name != DATE)
        .collect();

    let gather = IdxCa::from_slice_options("environment_row".into(), &indices);
    let mut joined = environment.select(value_names.iter().map(String::as_str))?.take(&gather)?;

    let mut environment_columns = Vec::with_capacity(value_names.len());
    for name in &value_names {
        if production_names.contains(name) {
            let mut renamed = format!("{name}{ENVIRONMENT_SUFFIX}");
            while production_names.contains(&renamed) || value_names.contains(&renamed) {
                renamed.push_str(ENVIRONMENT_SUFFIX);
            }
            joined.rename(name, renamed.as_str().into())?;
            environment_columns.push(renamed);
        } else {
            environment_columns.push(name.clone());
        }
    }

    let mut missing = vec![true; production.height()];
    if value_names.is_empty() {
        for (flag, idx) in missing.iter_mut().zip(indices.iter()) {
            *flag = idx.is_none();
        }
    } else {
        for column in joined.get_columns() {
            for (flag, present) in missing.iter_mut().zip(column.is_not_null().into_iter()) {
                if present.unwrap_or(false) {
                    *flag = false;
                }
            }
        }
    }
    let missing_environment = missing.iter().filter(|flag| **flag).count();

    let mut columns: Vec<Column> = joined.get_columns().to_vec();
    columns.push(Series::new(ENVIRONMENT_MISSING.into(), missing).into());

    let mut merged = production.clone();
    merged.hstack_mut(&columns)?;

    let merged = merged.sort(
        [DATE],
        SortMultipleOptions::default()
            .with_maintain_order(true)
            .with_nulls_last(true),
    )?;

    if duplicate_environment_dates > 0 {
        warn!(
            duplicate_environment_dates,
            "environment data repeats dates; first row per date joined"
        );
    }
    if missing_environment > 0 {
        warn!(
            missing_environment,
            "production rows without environment data for the same date"
        );
    }
    info!(
        production_rows = production.height(),
        environment_rows = environment.height(),
        merged_rows = merged.height(),
        "merged production and environment data"
    );

    Ok(MergeOutcome {
        merged,
        environment_columns,
        missing_environment,
        duplicate_environment_dates,
    })
}
