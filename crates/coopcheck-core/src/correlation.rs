use polars::prelude::DataFrame;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::frame::{float_values, has_column};
use crate::schema::{ENVIRONMENT_CORRELATION_COLUMNS, PRODUCTION_CORRELATION_COLUMNS};

/// Pearson coefficients, one row per environment column and one column per
/// production column. Undefined coefficients are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub environment: Vec<String>,
    pub production: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl CorrelationMatrix {
    pub fn get(&self, environment: &str, production: &str) -> Option<f64> {
        let row = self.environment.iter().position(|name| name == environment)?;
        let col = self.production.iter().position(|name| name == production)?;
        Some(self.values[row][col])
    }
}

/// Pearson correlation over pairwise-complete observations.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> f64 {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys.iter())
        .filter_map(|pair| match pair {
            (Some(x), Some(y)) if x.is_finite() && y.is_finite() => Some((*x, *y)),
            _ => None,
        })
        .collect();

    if pairs.len() < 2 {
        return f64::NAN;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return f64::NAN;
    }

    (cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0)
}

/// Correlates the fixed environment columns against the fixed production
/// columns that exist in `df`. `None` when either side has no column.
pub fn correlation_matrix(df: &DataFrame) -> Result<Option<CorrelationMatrix>> {
    let environment: Vec<String> = ENVIRONMENT_CORRELATION_COLUMNS
        .iter()
        .filter(|name| has_column(df, name))
        .map(|name| name.to_string())
        .collect();
    let production: Vec<String> = PRODUCTION_CORRELATION_COLUMNS
        .iter()
        .filter(|name| has_column(df, name))
        .map(|name| name.to_string())
        .collect();

    if environment.is_empty() || production.is_empty() {
        info!(
            environment_columns = environment.len(),
            production_columns = production.len(),
            "correlation skipped; required columns missing"
        );
        return Ok(None);
    }

    let production_values = production
        .iter()
        .map(|name| float_values(df, name))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut values = Vec::with_capacity(environment.len());
    for name in &environment {
        let env_values = float_values(df, name)?;
        values.push(
            production_values
                .iter()
                .map(|prod_values| pearson(&env_values, prod_values))
                .collect(),
        );
    }

    Ok(Some(CorrelationMatrix {
        environment,
        production,
        values,
    }))
}

#[cfg(test)]
mod tests {
    use polars::prelude::*;

    use super::*;

    #[test]
    fn perfectly_linear_series() {
        let xs = [Some(1.0), Some(2.0), Some(3.0)];
        let up = [Some(2.0), Some(4.0), Some(6.0)];
        let down = [Some(3.0), Some(2.0), Some(1.0)];
        assert!((pearson(&xs, &up) - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &down) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn undefined_cases_are_nan() {
        assert!(pearson(&[Some(1.0)], &[Some(2.0)]).is_nan());
        assert!(pearson(&[Some(1.0), Some(1.0)], &[Some(2.0), Some(3.0)]).is_nan());
        assert!(pearson(&[Some(1.0), None, Some(3.0)], &[None, Some(2.0), Some(4.0)]).is_nan());
        assert!(pearson(&[], &[]).is_nan());
    }

    #[test]
    fn nulls_are_dropped_pairwise() {
        let xs = [Some(1.0), Some(2.0), None, Some(4.0)];
        let ys = [Some(10.0), Some(20.0), Some(999.0), Some(40.0)];
        assert!((pearson(&xs, &ys) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn matrix_uses_only_present_columns() {
        let df = df!(
            "value_calibration_temp" => [30.0f64, 31.0, 32.0],
            "THI" => [70.0f64, 70.0, 70.0],
            "Live Weight" => [100.0f64, 90.0, 80.0],
            "FCR" => [1.0f64, 1.1, 1.3],
            "unrelated" => [1.0f64, 2.0, 3.0]
        )
        .unwrap();

        let matrix = correlation_matrix(&df).unwrap().unwrap();
        assert_eq!(matrix.environment, vec!["value_calibration_temp", "THI"]);
        assert_eq!(matrix.production, vec!["Live Weight", "FCR"]);
        assert!((matrix.get("value_calibration_temp", "Live Weight").unwrap() + 1.0).abs() < 1e-12);
        assert!(matrix.get("THI", "FCR").unwrap().is_nan());
        assert!(matrix.get("WCI", "FCR").is_none());
    }

    #[test]
    fn missing_side_yields_no_matrix() {
        let df = df!("value_calibration_temp" => [30.0f64, 31.0]).unwrap();
        assert!(correlation_matrix(&df).unwrap().is_none());
    }
}
