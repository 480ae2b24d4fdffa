use coopcheck_parser::dates::{date_to_epoch_days, excel_serial_to_date, parse_date_text};
use coopcheck_parser::ParsedTable;
use polars::prelude::*;
use tracing::{info, warn};

use crate::error::{Dataset, PipelineError, PipelineWarning, Result};
use crate::frame::{has_column, is_numeric};
use crate::schema::{DATE, RECORD_DATETIME};

/// A parsed table whose `Date` column has been normalized to calendar dates.
#[derive(Debug, Clone)]
pub struct LoadedTable {
    pub dataset: Dataset,
    pub df: DataFrame,
    pub unknown_dates: usize,
}

impl LoadedTable {
    pub fn warning(&self) -> Option<PipelineWarning> {
        (self.unknown_dates > 0).then_some(PipelineWarning::UnparseableDates {
            dataset: self.dataset,
            count: self.unknown_dates,
        })
    }
}

/// Production rows must carry `Date`.
pub fn load_production(table: ParsedTable) -> Result<LoadedTable> {
    let mut df = table.df;
    if !has_column(&df, DATE) {
        return Err(PipelineError::MissingColumn {
            dataset: Dataset::Production,
            candidates: vec![DATE],
        });
    }

    let (dates, unknown_dates) = normalize_dates(df.column(DATE)?)?;
    df.with_column(dates)?;

    finish(Dataset::Production, df, unknown_dates)
}

/// Environment rows carry `Date` or, failing that, `record_datetime`.
pub fn load_environment(table: ParsedTable) -> Result<LoadedTable> {
    let mut df = table.df;

    if has_column(&df, DATE) {
        let (dates, unknown_dates) = normalize_dates(df.column(DATE)?)?;
        df.with_column(dates)?;
        finish(Dataset::Environment, df, unknown_dates)
    } else if has_column(&df, RECORD_DATETIME) {
        let (dates, unknown_dates) = normalize_dates(df.column(RECORD_DATETIME)?)?;
        df.insert_column(0, dates)?;
        finish(Dataset::Environment, df, unknown_dates)
    } else {
        Err(PipelineError::MissingColumn {
            dataset: Dataset::Environment,
            candidates: vec![DATE, RECORD_DATETIME],
        })
    }
}

fn finish(dataset: Dataset, df: DataFrame, unknown_dates: usize) -> Result<LoadedTable> {
    if unknown_dates > 0 {
        warn!(%dataset, unknown_dates, "rows without a usable date");
    }
    info!(%dataset, rows = df.height(), columns = df.width(), "loaded table");

    Ok(LoadedTable {
        dataset,
        df,
        unknown_dates,
    })
}

/// Converts any date-bearing column into a `Date` column named [`DATE`].
/// Returns the column and the number of rows left without a date.
pub fn normalize_dates(column: &Column) -> Result<(Series, usize)> {
    let days: Vec<Option<i32>> = match column.dtype() {
        DataType::Date => column.cast(&DataType::Int32)?.i32()?.into_iter().collect(),
        DataType::Datetime(_, _) => column
            .cast(&DataType::Date)?
            .cast(&DataType::Int32)?
            .i32()?
            .into_iter()
            .collect(),
        DataType::String => column
            .str()?
            .into_iter()
            .map(|value| value.and_then(parse_date_text).map(date_to_epoch_days))
            .collect(),
        dtype if is_numeric(dtype) => column
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|value| {
                value
                    .and_then(excel_serial_to_date)
                    .map(date_to_epoch_days)
            })
            .collect(),
        _ => vec![None; column.len()],
    };

    let unknown = days.iter().filter(|day| day.is_none()).count();
    let series = Series::new(DATE.into(), days).cast(&DataType::Date)?;
    Ok((series, unknown))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use coopcheck_parser::dates::epoch_days_to_date;
    use coopcheck_parser::TableFormat;

    use super::*;

    fn table(df: DataFrame) -> ParsedTable {
        ParsedTable {
            format: TableFormat::Delimited,
            sheet_name: None,
            df,
        }
    }

    fn dates_of(df: &DataFrame) -> Vec<Option<NaiveDate>> {
        df.column(DATE)
            .unwrap()
            .cast(&DataType::Int32)
            .unwrap()
            .i32()
            .unwrap()
            .into_iter()
            .map(|day| day.and_then(epoch_days_to_date))
            .collect()
    }

    #[test]
    fn production_without_date_is_fatal() {
        let df = df!("cycle" => ["A"], "Age" => [1i64]).unwrap();
        let err = load_production(table(df)).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn {
                dataset: Dataset::Production,
                ..
            }
        ));
    }

    #[test]
    fn environment_without_any_date_column_is_fatal() {
        let df = df!("value_calibration_temp" => [30.0f64]).unwrap();
        let err = load_environment(table(df)).unwrap_err();
        match err {
            PipelineError::MissingColumn {
                dataset,
                candidates,
            } => {
                assert_eq!(dataset, Dataset::Environment);
                assert_eq!(candidates, vec![DATE, RECORD_DATETIME]);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn unparseable_dates_become_null() {
        let df = df!("Date" => [Some("2024-01-01"), Some("garbage"), None]).unwrap();
        let loaded = load_production(table(df)).unwrap();

        assert_eq!(loaded.unknown_dates, 2);
        assert_eq!(
            dates_of(&loaded.df),
            vec![NaiveDate::from_ymd_opt(2024, 1, 1), None, None]
        );
        assert_eq!(
            loaded.warning(),
            Some(PipelineWarning::UnparseableDates {
                dataset: Dataset::Production,
                count: 2
            })
        );
    }

    #[test]
    fn environment_date_is_derived_from_timestamp() {
        let df = df!(
            "record_datetime" => ["2024-01-01 06:00:00", "2024-01-02T18:30:00"],
            "value_calibration_temp" => [31.0f64, 30.5]
        )
        .unwrap();
        let loaded = load_environment(table(df)).unwrap();

        let names: Vec<String> = crate::frame::column_names(&loaded.df);
        assert_eq!(names, vec![DATE, RECORD_DATETIME, "value_calibration_temp"]);
        assert_eq!(
            dates_of(&loaded.df),
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 1),
                NaiveDate::from_ymd_opt(2024, 1, 2)
            ]
        );
        assert!(loaded.warning().is_none());
    }

    #[test]
    fn direct_date_column_wins_over_timestamp() {
        let df = df!(
            "Date" => ["2024-02-01"],
            "record_datetime" => ["2024-03-01 00:00:00"]
        )
        .unwrap();
        let loaded = load_environment(table(df)).unwrap();
        assert_eq!(dates_of(&loaded.df), vec![NaiveDate::from_ymd_opt(2024, 2, 1)]);
    }

    #[test]
    fn numeric_dates_are_excel_serials() {
        let df = df!("Date" => [45292i64, 45293]).unwrap();
        let loaded = load_production(table(df)).unwrap();
        assert_eq!(
            dates_of(&loaded.df),
            vec![
                NaiveDate::from_ymd_opt(2024, 1, 1),
                NaiveDate::from_ymd_opt(2024, 1, 2)
            ]
        );
    }

    #[test]
    fn datetime_columns_are_truncated_to_dates() {
        let millis = NaiveDate::from_ymd_opt(2024, 1, 5)
            .unwrap()
            .and_hms_opt(22, 15, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        let series = Series::new("Date".into(), [millis])
            .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
            .unwrap();
        let df = DataFrame::new(vec![series.into()]).unwrap();
        let loaded = load_production(table(df)).unwrap();
        assert_eq!(dates_of(&loaded.df), vec![NaiveDate::from_ymd_opt(2024, 1, 5)]);
    }
}
