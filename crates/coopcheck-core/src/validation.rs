use polars::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::error::Result;
use crate::frame::{column_names, optional_float_values};
use crate::schema::{
    first_present, AGE_ALIASES, AMMONIA_ALIASES, AMMONIA_OK, HUMIDITY, HUMIDITY_OK,
    NON_COMPLIANT, TEMPERATURE, TEMPERATURE_OK, VENTILATION_ALIASES, VENTILATION_OK,
};

/// Standard ranges for one age bracket. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgeBucket {
    pub label: &'static str,
    /// Oldest age in days covered by the bucket; `None` for the open-ended last one.
    pub max_age_days: Option<f64>,
    pub temperature_c: (f64, f64),
    pub ventilation_m3h_per_bird: (f64, f64),
}

impl AgeBucket {
    pub fn ventilation_midpoint(&self) -> f64 {
        let (low, high) = self.ventilation_m3h_per_bird;
        (low + high) / 2.0
    }
}

pub const AGE_BUCKETS: [AgeBucket; 5] = [
    AgeBucket {
        label: "1-7",
        max_age_days: Some(7.0),
        temperature_c: (32.0, 34.0),
        ventilation_m3h_per_bird: (1.0, 2.0),
    },
    AgeBucket {
        label: "8-14",
        max_age_days: Some(14.0),
        temperature_c: (30.0, 32.0),
        ventilation_m3h_per_bird: (2.0, 4.0),
    },
    AgeBucket {
        label: "15-21",
        max_age_days: Some(21.0),
        temperature_c: (28.0, 30.0),
        ventilation_m3h_per_bird: (2.0, 4.0),
    },
    AgeBucket {
        label: "22-28",
        max_age_days: Some(28.0),
        temperature_c: (26.0, 28.0),
        ventilation_m3h_per_bird: (4.0, 6.0),
    },
    AgeBucket {
        label: ">28",
        max_age_days: None,
        temperature_c: (24.0, 26.0),
        ventilation_m3h_per_bird: (4.0, 6.0),
    },
];

pub const HUMIDITY_RANGE_PCT: (f64, f64) = (60.0, 70.0);
pub const AMMONIA_MAX_PPM: f64 = 20.0;

/// Age 0 (placement day) falls in the first week; negative ages have no bucket.
pub fn bucket_for_age(age_days: f64) -> Option<&'static AgeBucket> {
    if !age_days.is_finite() || age_days < 0.0 {
        return None;
    }
    AGE_BUCKETS.iter().find(|bucket| match bucket.max_age_days {
        Some(max) => age_days <= max,
        None => true,
    })
}

fn within((low, high): (f64, f64), value: f64) -> bool {
    value >= low && value <= high
}

pub fn temperature_ok(age_days: Option<f64>, temperature_c: Option<f64>) -> Option<bool> {
    let bucket = bucket_for_age(age_days?)?;
    Some(within(bucket.temperature_c, temperature_c?))
}

pub fn humidity_ok(humidity_pct: Option<f64>) -> Option<bool> {
    Some(within(HUMIDITY_RANGE_PCT, humidity_pct?))
}

pub fn ammonia_ok(ammonia_ppm: Option<f64>) -> Option<bool> {
    Some(ammonia_ppm? <= AMMONIA_MAX_PPM)
}

pub fn ventilation_ok(age_days: Option<f64>, ventilation: Option<f64>) -> Option<bool> {
    let bucket = bucket_for_age(age_days?)?;
    Some(within(bucket.ventilation_m3h_per_bird, ventilation?))
}

/// Pass (`Some(true)`), fail (`Some(false)`) or unknown (`None`) per check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ComplianceFlags {
    pub temperature: Option<bool>,
    pub humidity: Option<bool>,
    pub ammonia: Option<bool>,
    pub ventilation: Option<bool>,
}

impl ComplianceFlags {
    pub fn evaluate(
        age_days: Option<f64>,
        temperature_c: Option<f64>,
        humidity_pct: Option<f64>,
        ammonia_ppm: Option<f64>,
        ventilation: Option<f64>,
    ) -> Self {
        Self {
            temperature: temperature_ok(age_days, temperature_c),
            humidity: humidity_ok(humidity_pct),
            ammonia: ammonia_ok(ammonia_ppm),
            ventilation: ventilation_ok(age_days, ventilation),
        }
    }

    pub fn as_array(&self) -> [Option<bool>; 4] {
        [self.temperature, self.humidity, self.ammonia, self.ventilation]
    }

    /// Only a definite failure makes a row non-compliant.
    pub fn is_non_compliant(&self) -> bool {
        self.as_array().contains(&Some(false))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceCheck {
    Temperature,
    Humidity,
    Ammonia,
    Ventilation,
}

impl ComplianceCheck {
    pub const ALL: [ComplianceCheck; 4] = [
        ComplianceCheck::Temperature,
        ComplianceCheck::Humidity,
        ComplianceCheck::Ammonia,
        ComplianceCheck::Ventilation,
    ];

    pub fn column(&self) -> &'static str {
        match self {
            ComplianceCheck::Temperature => TEMPERATURE_OK,
            ComplianceCheck::Humidity => HUMIDITY_OK,
            ComplianceCheck::Ammonia => AMMONIA_OK,
            ComplianceCheck::Ventilation => VENTILATION_OK,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ComplianceCheck::Temperature => "Temperature",
            ComplianceCheck::Humidity => "Humidity",
            ComplianceCheck::Ammonia => "Ammonia",
            ComplianceCheck::Ventilation => "Ventilation",
        }
    }
}

/// Age column of the merged table, if any alias is present.
pub fn age_column(df: &DataFrame) -> Option<&'static str> {
    first_present(AGE_ALIASES, &column_names(df))
}

pub fn age_values(df: &DataFrame) -> Result<Vec<Option<f64>>> {
    Ok(optional_float_values(df, age_column(df))?)
}

/// Appends the four compliance flag columns and `non_compliant`.
pub fn apply_compliance(df: &DataFrame) -> Result<DataFrame> {
    let names = column_names(df);
    let ages = age_values(df)?;
    let temperatures = optional_float_values(df, Some(TEMPERATURE))?;
    let humidities = optional_float_values(df, Some(HUMIDITY))?;
    let ammonia = optional_float_values(df, first_present(AMMONIA_ALIASES, &names))?;
    let ventilation = optional_float_values(df, first_present(VENTILATION_ALIASES, &names))?;

    let len = df.height();
    let mut temperature_flags = Vec::with_capacity(len);
    let mut humidity_flags = Vec::with_capacity(len);
    let mut ammonia_flags = Vec::with_capacity(len);
    let mut ventilation_flags = Vec::with_capacity(len);
    let mut non_compliant = Vec::with_capacity(len);

    for idx in 0..len {
        let flags = ComplianceFlags::evaluate(
            ages[idx],
            temperatures[idx],
            humidities[idx],
            ammonia[idx],
            ventilation[idx],
        );
        temperature_flags.push(flags.temperature);
        humidity_flags.push(flags.humidity);
        ammonia_flags.push(flags.ammonia);
        ventilation_flags.push(flags.ventilation);
        non_compliant.push(flags.is_non_compliant());
    }

    let mut output = df.clone();
    output.hstack_mut(&[
        Series::new(TEMPERATURE_OK.into(), temperature_flags).into(),
        Series::new(HUMIDITY_OK.into(), humidity_flags).into(),
        Series::new(AMMONIA_OK.into(), ammonia_flags).into(),
        Series::new(VENTILATION_OK.into(), ventilation_flags).into(),
        Series::new(NON_COMPLIANT.into(), non_compliant).into(),
    ])?;

    Ok(output)
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct FlagSummary {
    pub passed: usize,
    pub failed: usize,
    pub unknown: usize,
    /// passed / (passed + failed) * 100; `None` when nothing was known.
    pub percentage: Option<f64>,
}

impl FlagSummary {
    pub fn from_flags(flags: impl IntoIterator<Item = Option<bool>>) -> Self {
        let mut summary = FlagSummary::default();
        for flag in flags {
            match flag {
                Some(true) => summary.passed += 1,
                Some(false) => summary.failed += 1,
                None => summary.unknown += 1,
            }
        }
        let known = summary.passed + summary.failed;
        summary.percentage = (known > 0).then(|| summary.passed as f64 / known as f64 * 100.0);
        summary
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ComplianceSummary {
    pub total_rows: usize,
    pub non_compliant_rows: usize,
    pub temperature: FlagSummary,
    pub humidity: FlagSummary,
    pub ammonia: FlagSummary,
    pub ventilation: FlagSummary,
}

impl ComplianceSummary {
    pub fn flag(&self, check: ComplianceCheck) -> &FlagSummary {
        match check {
            ComplianceCheck::Temperature => &self.temperature,
            ComplianceCheck::Humidity => &self.humidity,
            ComplianceCheck::Ammonia => &self.ammonia,
            ComplianceCheck::Ventilation => &self.ventilation,
        }
    }
}

/// Aggregates the flag columns written by [`apply_compliance`].
pub fn summarize_compliance(df: &DataFrame) -> Result<ComplianceSummary> {
    let flags = |name: &str| -> Result<FlagSummary> {
        Ok(FlagSummary::from_flags(
            df.column(name)?.bool()?.into_iter(),
        ))
    };

    let non_compliant_rows = df
        .column(NON_COMPLIANT)?
        .bool()?
        .into_iter()
        .filter(|flag| *flag == Some(true))
        .count();

    let summary = ComplianceSummary {
        total_rows: df.height(),
        non_compliant_rows,
        temperature: flags(TEMPERATURE_OK)?,
        humidity: flags(HUMIDITY_OK)?,
        ammonia: flags(AMMONIA_OK)?,
        ventilation: flags(VENTILATION_OK)?,
    };

    info!(
        rows = summary.total_rows,
        non_compliant = summary.non_compliant_rows,
        "evaluated environmental compliance"
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buckets_cover_every_non_negative_age() {
        assert_eq!(bucket_for_age(0.0).unwrap().label, "1-7");
        assert_eq!(bucket_for_age(7.0).unwrap().label, "1-7");
        assert_eq!(bucket_for_age(7.5).unwrap().label, "8-14");
        assert_eq!(bucket_for_age(14.0).unwrap().label, "8-14");
        assert_eq!(bucket_for_age(21.0).unwrap().label, "15-21");
        assert_eq!(bucket_for_age(28.0).unwrap().label, "22-28");
        assert_eq!(bucket_for_age(29.0).unwrap().label, ">28");
        assert_eq!(bucket_for_age(60.0).unwrap().label, ">28");
        assert!(bucket_for_age(-1.0).is_none());
        assert!(bucket_for_age(f64::NAN).is_none());
    }

    #[test]
    fn temperature_follows_age_bucket() {
        assert_eq!(temperature_ok(Some(5.0), Some(33.0)), Some(true));
        assert_eq!(temperature_ok(Some(5.0), Some(35.0)), Some(false));
        assert_eq!(temperature_ok(Some(5.0), Some(32.0)), Some(true));
        assert_eq!(temperature_ok(Some(10.0), Some(33.0)), Some(false));
        assert_eq!(temperature_ok(Some(35.0), Some(25.0)), Some(true));
        assert_eq!(temperature_ok(None, Some(33.0)), None);
        assert_eq!(temperature_ok(Some(5.0), None), None);
    }

    #[test]
    fn age_independent_checks() {
        assert_eq!(humidity_ok(Some(60.0)), Some(true));
        assert_eq!(humidity_ok(Some(70.5)), Some(false));
        assert_eq!(humidity_ok(None), None);
        assert_eq!(ammonia_ok(Some(20.0)), Some(true));
        assert_eq!(ammonia_ok(Some(25.0)), Some(false));
        assert_eq!(ventilation_ok(Some(25.0), Some(5.0)), Some(true));
        assert_eq!(ventilation_ok(Some(3.0), Some(3.0)), Some(false));
    }

    #[test]
    fn unknown_flags_never_make_a_row_non_compliant() {
        let unknown = ComplianceFlags::default();
        assert!(!unknown.is_non_compliant());

        let mixed = ComplianceFlags {
            temperature: Some(true),
            humidity: None,
            ammonia: Some(false),
            ventilation: None,
        };
        assert!(mixed.is_non_compliant());
    }

    #[test]
    fn percentage_excludes_unknown() {
        let summary = FlagSummary::from_flags([Some(true), Some(false), None, Some(true), None]);
        assert_eq!(summary.passed, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unknown, 2);
        let pct = summary.percentage.unwrap();
        assert!((pct - 200.0 / 3.0).abs() < 1e-9);

        assert_eq!(FlagSummary::from_flags([None, None]).percentage, None);
    }

    #[test]
    fn apply_compliance_adds_nullable_flags() {
        let df = df!(
            "Age" => [Some(5i64), Some(5), None],
            "value_calibration_temp" => [Some(33.0f64), Some(35.0), Some(33.0)],
            "value_calibration_hum" => [Some(65.0f64), None, Some(90.0)]
        )
        .unwrap();

        let flagged = apply_compliance(&df).unwrap();
        let temperature = flagged.column(TEMPERATURE_OK).unwrap().bool().unwrap();
        let humidity = flagged.column(HUMIDITY_OK).unwrap().bool().unwrap();
        let ammonia = flagged.column(AMMONIA_OK).unwrap().bool().unwrap();
        let non_compliant = flagged.column(NON_COMPLIANT).unwrap().bool().unwrap();

        assert_eq!(temperature.get(0), Some(true));
        assert_eq!(temperature.get(1), Some(false));
        assert_eq!(temperature.get(2), None);
        assert_eq!(humidity.get(1), None);
        assert_eq!(humidity.get(2), Some(false));
        assert_eq!(ammonia.null_count(), 3);
        assert_eq!(non_compliant.get(0), Some(false));
        assert_eq!(non_compliant.get(1), Some(true));
        assert_eq!(non_compliant.get(2), Some(true));

        let summary = summarize_compliance(&flagged).unwrap();
        assert_eq!(summary.total_rows, 3);
        assert_eq!(summary.non_compliant_rows, 2);
        assert_eq!(summary.temperature.percentage, Some(50.0));
        assert_eq!(summary.ammonia.unknown, 3);
        assert_eq!(summary.ammonia.percentage, None);
    }
}
