use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

pub const ALL_CYCLES: &str = "all";

/// Cycle selector; `all` (or an empty string) keeps every row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CycleSelection {
    #[default]
    All,
    Cycle(String),
}

impl CycleSelection {
    pub fn as_cycle(&self) -> Option<&str> {
        match self {
            CycleSelection::All => None,
            CycleSelection::Cycle(id) => Some(id.as_str()),
        }
    }
}

impl From<String> for CycleSelection {
    fn from(value: String) -> Self {
        let trimmed = value.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(ALL_CYCLES) {
            CycleSelection::All
        } else {
            CycleSelection::Cycle(trimmed.to_string())
        }
    }
}

impl From<CycleSelection> for String {
    fn from(value: CycleSelection) -> Self {
        value.to_string()
    }
}

impl FromStr for CycleSelection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(CycleSelection::from(s.to_string()))
    }
}

impl fmt::Display for CycleSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CycleSelection::All => f.write_str(ALL_CYCLES),
            CycleSelection::Cycle(id) => f.write_str(id),
        }
    }
}

/// Manual inputs of the fan sizing calculation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FanSizing {
    pub housing_area_m2: f64,
    pub fan_capacity_m3h: f64,
    pub installed_fans: u32,
    pub population: u32,
}

impl Default for FanSizing {
    fn default() -> Self {
        Self {
            housing_area_m2: 1000.0,
            fan_capacity_m3h: 10_000.0,
            installed_fans: 6,
            population: 10_000,
        }
    }
}

impl FanSizing {
    pub fn validate(&self) -> Result<()> {
        if !(self.housing_area_m2.is_finite() && self.housing_area_m2 > 0.0) {
            return Err(PipelineError::Config(format!(
                "housing_area_m2 must be positive, got {}",
                self.housing_area_m2
            )));
        }
        if !(self.fan_capacity_m3h.is_finite() && self.fan_capacity_m3h > 0.0) {
            return Err(PipelineError::Config(format!(
                "fan_capacity_m3h must be positive, got {}",
                self.fan_capacity_m3h
            )));
        }
        if self.installed_fans == 0 {
            return Err(PipelineError::Config(
                "installed_fans must be at least 1".to_string(),
            ));
        }
        if self.population == 0 {
            return Err(PipelineError::Config(
                "population must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportOptions {
    pub title: String,
    pub rows_per_page: usize,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            title: "Broiler Production & Environment Report".to_string(),
            rows_per_page: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub cycle: CycleSelection,
    pub fan_sizing: FanSizing,
    pub report: ReportOptions,
}

impl PipelineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: PipelineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<()> {
        self.fan_sizing.validate()?;
        if self.report.rows_per_page == 0 {
            return Err(PipelineError::Config(
                "report.rows_per_page must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
