//! Column names shared by the loader, validator, correlation and report stages.

pub const DATE: &str = "Date";
pub const RECORD_DATETIME: &str = "record_datetime";
pub const CYCLE: &str = "cycle";

/// Candidate age columns (days since placement), first present wins.
pub const AGE_ALIASES: &[&str] = &["Age", "age", "Age (days)", "Umur"];

pub const TEMPERATURE: &str = "value_calibration_temp";
pub const HUMIDITY: &str = "value_calibration_hum";
pub const WIND: &str = "value_calibration_wind";
pub const THI: &str = "THI";
pub const WCI: &str = "WCI";

pub const AMMONIA_ALIASES: &[&str] = &["value_calibration_nh3", "ammonia", "Ammonia", "NH3"];
pub const VENTILATION_ALIASES: &[&str] = &[
    "ventilation",
    "Ventilation",
    "ventilation_m3h_per_bird",
];

pub const ENVIRONMENT_CORRELATION_COLUMNS: &[&str] = &[TEMPERATURE, HUMIDITY, THI, WIND, WCI];

pub const PRODUCTION_CORRELATION_COLUMNS: &[&str] = &[
    "Mortality Adjusted",
    "Mortality Rate (%)",
    "Live Weight",
    "Harvest Weight",
    "Cumulative Feed",
    "Feed Intake",
    "FCR",
    "Index Performance",
];

/// Suffix given to environment columns whose name is already used by production.
pub const ENVIRONMENT_SUFFIX: &str = "_env";

pub const ENVIRONMENT_MISSING: &str = "environment_missing";

pub const TEMPERATURE_OK: &str = "temperature_ok";
pub const HUMIDITY_OK: &str = "humidity_ok";
pub const AMMONIA_OK: &str = "ammonia_ok";
pub const VENTILATION_OK: &str = "ventilation_ok";
pub const NON_COMPLIANT: &str = "non_compliant";

pub const VENTILATION_NEED_PER_BIRD: &str = "ventilation_need_m3h_per_bird";
pub const REQUIRED_AIRFLOW: &str = "required_airflow_m3h";
pub const RECOMMENDED_FANS: &str = "recommended_fans";

pub fn first_present<'a>(candidates: &[&'a str], columns: &[String]) -> Option<&'a str> {
    candidates
        .iter()
        .copied()
        .find(|candidate| columns.iter().any(|col| col == candidate))
}
