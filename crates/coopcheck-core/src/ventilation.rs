use polars::prelude::*;
use serde::Serialize;

use crate::config::FanSizing;
use crate::error::Result;
use crate::schema::{RECOMMENDED_FANS, REQUIRED_AIRFLOW, VENTILATION_NEED_PER_BIRD};
use crate::validation::{age_values, bucket_for_age};

/// Minimum airflow per square metre of housing, independent of bird count.
pub const AREA_AIRFLOW_M3H_PER_M2: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VentilationRecommendation {
    pub need_m3h_per_bird: f64,
    pub population_airflow_m3h: f64,
    pub area_airflow_m3h: f64,
    pub required_airflow_m3h: f64,
    pub recommended_fans: u32,
}

/// Per-bird airflow need for an age: midpoint of the bucket's ventilation range.
pub fn need_per_bird(age_days: f64) -> Option<f64> {
    bucket_for_age(age_days).map(|bucket| bucket.ventilation_midpoint())
}

pub fn recommend(need_m3h_per_bird: f64, sizing: &FanSizing) -> VentilationRecommendation {
    let population_airflow_m3h = need_m3h_per_bird * sizing.population as f64;
    let area_airflow_m3h = AREA_AIRFLOW_M3H_PER_M2 * sizing.housing_area_m2;
    let required_airflow_m3h = population_airflow_m3h.max(area_airflow_m3h);

    let installed = sizing.installed_fans.max(1);
    let fans = (required_airflow_m3h / sizing.fan_capacity_m3h).round();
    let recommended_fans = if !fans.is_finite() || fans >= installed as f64 {
        installed
    } else if fans < 1.0 {
        1
    } else {
        fans as u32
    };

    VentilationRecommendation {
        need_m3h_per_bird,
        population_airflow_m3h,
        area_airflow_m3h,
        required_airflow_m3h,
        recommended_fans,
    }
}

pub fn recommend_for_age(age_days: f64, sizing: &FanSizing) -> Option<VentilationRecommendation> {
    need_per_bird(age_days).map(|need| recommend(need, sizing))
}

/// Appends per-bird need, required airflow and recommended fan count. Rows
/// without a usable age get nulls.
pub fn apply_fan_sizing(df: &DataFrame, sizing: &FanSizing) -> Result<DataFrame> {
    let ages = age_values(df)?;
    let len = df.height();

    let mut need = Vec::with_capacity(len);
    let mut required = Vec::with_capacity(len);
    let mut fans: Vec<Option<i64>> = Vec::with_capacity(len);

    for age in ages {
        match age.and_then(|age| recommend_for_age(age, sizing)) {
            Some(rec) => {
                need.push(Some(rec.need_m3h_per_bird));
                required.push(Some(rec.required_airflow_m3h));
                fans.push(Some(rec.recommended_fans as i64));
            }
            None => {
                need.push(None);
                required.push(None);
                fans.push(None);
            }
        }
    }

    let mut output = df.clone();
    output.hstack_mut(&[
        Series::new(VENTILATION_NEED_PER_BIRD.into(), need).into(),
        Series::new(REQUIRED_AIRFLOW.into(), required).into(),
        Series::new(RECOMMENDED_FANS.into(), fans).into(),
    ])?;

    Ok(output)
}
