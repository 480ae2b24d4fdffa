use std::cmp::Ordering;
use std::collections::HashMap;

use polars::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::{CycleSelection, ALL_CYCLES};
use crate::error::{PipelineError, PipelineWarning, Result};
use crate::frame::has_column;
use crate::schema::CYCLE;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CycleCount {
    pub cycle: String,
    pub rows: usize,
}

#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub production: DataFrame,
    pub environment: DataFrame,
    pub warning: Option<PipelineWarning>,
}

/// String form of the cycle column, the same rendering used for selection.
fn cycle_strings(df: &DataFrame) -> Result<Vec<Option<String>>> {
    let column = df.column(CYCLE)?.cast(&DataType::String)?;
    Ok(column
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect())
}

fn compare_cycles(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

fn sort_cycles(cycles: &mut [String]) {
    let all_numeric = cycles.iter().all(|cycle| cycle.parse::<f64>().is_ok());
    if all_numeric {
        cycles.sort_by(|a, b| compare_cycles(a, b));
    } else {
        cycles.sort();
    }
}

/// Distinct cycle identifiers, or `None` when production has no cycle column.
pub fn available_cycles(production: &DataFrame) -> Result<Option<Vec<String>>> {
    if !has_column(production, CYCLE) {
        return Ok(None);
    }
    let mut cycles: Vec<String> = cycle_strings(production)?.into_iter().flatten().collect();
    cycles.sort();
    cycles.dedup();
    sort_cycles(&mut cycles);
    Ok(Some(cycles))
}

/// Selector choices: the `all` sentinel followed by every available cycle.
pub fn cycle_options(production: &DataFrame) -> Result<Vec<String>> {
    let mut options = vec![ALL_CYCLES.to_string()];
    if let Some(cycles) = available_cycles(production)? {
        options.extend(cycles);
    }
    Ok(options)
}

/// Rows per cycle, ordered like [`available_cycles`]. Null cycles are not counted.
pub fn cycle_counts(df: &DataFrame) -> Result<Vec<CycleCount>> {
    if !has_column(df, CYCLE) {
        return Ok(Vec::new());
    }
    let mut counts: HashMap<String, usize> = HashMap::new();
    for cycle in cycle_strings(df)?.into_iter().flatten() {
        *counts.entry(cycle).or_default() += 1;
    }
    let mut cycles: Vec<String> = counts.keys().cloned().collect();
    sort_cycles(&mut cycles);
    Ok(cycles
        .into_iter()
        .map(|cycle| {
            let rows = counts[&cycle];
            CycleCount { cycle, rows }
        })
        .collect())
}

fn keep_cycle(df: &DataFrame, cycle: &str) -> Result<DataFrame> {
    let mask: BooleanChunked = cycle_strings(df)?
        .iter()
        .map(|value| Some(value.as_deref() == Some(cycle)))
        .collect();
    Ok(df.filter(&mask)?)
}

pub fn apply_cycle_filter(
    production: DataFrame,
    environment: DataFrame,
    selection: &CycleSelection,
) -> Result<FilterOutcome> {
    let Some(cycle) = selection.as_cycle() else {
        return Ok(FilterOutcome {
            production,
            environment,
            warning: None,
        });
    };

    let Some(available) = available_cycles(&production)? else {
        warn!(cycle, "cycle selected but production data has no cycle column");
        return Ok(FilterOutcome {
            production,
            environment,
            warning: Some(PipelineWarning::CycleFilterIgnored {
                cycle: cycle.to_string(),
            }),
        });
    };

    if !available.iter().any(|candidate| candidate == cycle) {
        return Err(PipelineError::UnknownCycle {
            requested: cycle.to_string(),
            available,
        });
    }

    let production = keep_cycle(&production, cycle)?;
    let environment = if has_column(&environment, CYCLE) {
        keep_cycle(&environment, cycle)?
    } else {
        environment
    };

    info!(
        cycle,
        production_rows = production.height(),
        environment_rows = environment.height(),
        "applied cycle filter"
    );

    Ok(FilterOutcome {
        production,
        environment,
        warning: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_cycles_sort_numerically() {
        let df = df!("cycle" => [10i64, 2, 2, 1]).unwrap();
        assert_eq!(
            available_cycles(&df).unwrap(),
            Some(vec!["1".to_string(), "2".to_string(), "10".to_string()])
        );
        assert_eq!(
            cycle_options(&df).unwrap(),
            vec!["all", "1", "2", "10"]
        );
    }

    #[test]
    fn counts_skip_null_cycles() {
        let df = df!("cycle" => [Some("B"), Some("A"), None, Some("B")]).unwrap();
        assert_eq!(
            cycle_counts(&df).unwrap(),
            vec![
                CycleCount {
                    cycle: "A".to_string(),
                    rows: 1
                },
                CycleCount {
                    cycle: "B".to_string(),
                    rows: 2
                },
            ]
        );
    }

    #[test]
    fn no_cycle_column_exposes_only_the_sentinel() {
        let df = df!("Date" => ["2024-01-01"]).unwrap();
        assert_eq!(available_cycles(&df).unwrap(), None);
        assert_eq!(cycle_options(&df).unwrap(), vec!["all"]);
        assert!(cycle_counts(&df).unwrap().is_empty());
    }

    #[test]
    fn selection_filters_both_tables_when_both_carry_cycles() {
        let production = df!("cycle" => ["A", "B", "A"], "Age" => [1i64, 1, 2]).unwrap();
        let environment = df!("cycle" => ["A", "B"], "THI" => [70.0f64, 71.0]).unwrap();

        let outcome = apply_cycle_filter(
            production,
            environment,
            &CycleSelection::Cycle("A".to_string()),
        )
        .unwrap();

        assert_eq!(outcome.production.height(), 2);
        assert_eq!(outcome.environment.height(), 1);
        assert!(outcome.warning.is_none());
    }

    #[test]
    fn environment_without_cycle_is_left_alone() {
        let production = df!("cycle" => [1i64, 2]).unwrap();
        let environment = df!("THI" => [70.0f64, 71.0, 72.0]).unwrap();

        let outcome = apply_cycle_filter(
            production,
            environment,
            &CycleSelection::Cycle("2".to_string()),
        )
        .unwrap();

        assert_eq!(outcome.production.height(), 1);
        assert_eq!(outcome.environment.height(), 3);
    }

    #[test]
    fn all_is_a_no_op() {
        let production = df!("cycle" => ["A", "B"]).unwrap();
        let environment = df!("cycle" => ["A"]).unwrap();
        let outcome = apply_cycle_filter(production, environment, &CycleSelection::All).unwrap();
        assert_eq!(outcome.production.height(), 2);
        assert_eq!(outcome.environment.height(), 1);
    }

    #[test]
    fn unknown_cycle_is_rejected() {
        let production = df!("cycle" => ["A"]).unwrap();
        let environment = df!("THI" => [70.0f64]).unwrap();
        let err = apply_cycle_filter(
            production,
            environment,
            &CycleSelection::Cycle("Z".to_string()),
        )
        .unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCycle { .. }));
    }

    #[test]
    fn missing_cycle_column_ignores_the_selection() {
        let production = df!("Age" => [1i64]).unwrap();
        let environment = df!("THI" => [70.0f64]).unwrap();
        let outcome = apply_cycle_filter(
            production,
            environment,
            &CycleSelection::Cycle("A".to_string()),
        )
        .unwrap();
        assert_eq!(
            outcome.warning,
            Some(PipelineWarning::CycleFilterIgnored {
                cycle: "A".to_string()
            })
        );
    }
}
