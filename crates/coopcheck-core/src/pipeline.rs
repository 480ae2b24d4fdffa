use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use coopcheck_parser::parse_table;
use polars::prelude::DataFrame;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::config::PipelineConfig;
use crate::correlation::{correlation_matrix, CorrelationMatrix};
use crate::error::{Dataset, PipelineError, PipelineWarning, Result};
use crate::filter::{apply_cycle_filter, cycle_counts, cycle_options, CycleCount};
use crate::loader::{load_environment, load_production, LoadedTable};
use crate::merge::merge_on_date;
use crate::report::{render_artifacts, Artifact, ArtifactInfo, ReportContext};
use crate::validation::{apply_compliance, summarize_compliance, ComplianceSummary};
use crate::ventilation::apply_fan_sizing;

/// Raw uploads for one run.
#[derive(Debug, Clone, Copy)]
pub struct PipelineInputs<'a> {
    pub production: &'a [u8],
    pub environment: &'a [u8],
}

#[derive(Debug, Clone, Serialize)]
pub struct InputDigest {
    pub dataset: Dataset,
    pub blake3: String,
    pub bytes: usize,
}

impl InputDigest {
    fn of(dataset: Dataset, content: &[u8]) -> Self {
        Self {
            dataset,
            blake3: blake3::hash(content).to_hex().to_string(),
            bytes: content.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineSummary {
    pub generated_at: DateTime<Utc>,
    pub cycle: String,
    pub inputs: Vec<InputDigest>,
    pub production_rows: usize,
    pub environment_rows: usize,
    pub merged_rows: usize,
    pub cycle_counts_before_merge: Vec<CycleCount>,
    pub cycle_counts_after_merge: Vec<CycleCount>,
    pub warnings: Vec<PipelineWarning>,
    pub compliance: ComplianceSummary,
    pub correlation: Option<CorrelationMatrix>,
    pub artifacts: Vec<ArtifactInfo>,
}

/// Result of a successful run. Artifacts exist only if every stage succeeded.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub merged: DataFrame,
    pub summary: PipelineSummary,
    pub artifacts: Vec<Artifact>,
}

impl PipelineOutput {
    /// Writes every artifact into `dir`, creating it if needed. Artifacts are
    /// staged as temporary files first; on any failure nothing is left behind.
    pub fn write_to_dir(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        std::fs::create_dir_all(dir)?;

        let mut staged = Vec::with_capacity(self.artifacts.len());
        for artifact in &self.artifacts {
            let mut temp = NamedTempFile::new_in(dir)?;
            temp.write_all(&artifact.bytes)?;
            temp.as_file().sync_all()?;
            staged.push((temp, dir.join(&artifact.file_name)));
        }

        let mut written: Vec<PathBuf> = Vec::with_capacity(staged.len());
        for (temp, path) in staged {
            if let Err(err) = temp.persist(&path) {
                for done in &written {
                    let _ = std::fs::remove_file(done);
                }
                return Err(err.error.into());
            }
            written.push(path);
        }

        for (path, artifact) in written.iter().zip(&self.artifacts) {
            info!(path = %path.display(), bytes = artifact.bytes.len(), "wrote artifact");
        }
        Ok(written)
    }
}

fn parse(dataset: Dataset, content: &[u8]) -> Result<coopcheck_parser::ParsedTable> {
    parse_table(content).map_err(|source| PipelineError::Parse { dataset, source })
}

/// Parses and date-normalizes both uploads.
pub fn load_inputs(inputs: &PipelineInputs<'_>) -> Result<(LoadedTable, LoadedTable)> {
    let production = load_production(parse(Dataset::Production, inputs.production)?)?;
    let environment = load_environment(parse(Dataset::Environment, inputs.environment)?)?;
    Ok((production, environment))
}

/// Cycle selector choices for a production upload, `all` first.
pub fn list_cycles(production: &[u8]) -> Result<Vec<String>> {
    let loaded = load_production(parse(Dataset::Production, production)?)?;
    cycle_options(&loaded.df)
}

pub fn run_pipeline(inputs: &PipelineInputs<'_>, config: &PipelineConfig) -> Result<PipelineOutput> {
    run_pipeline_at(inputs, config, Utc::now())
}

/// Same as [`run_pipeline`] with an explicit report timestamp.
pub fn run_pipeline_at(
    inputs: &PipelineInputs<'_>,
    config: &PipelineConfig,
    generated_at: DateTime<Utc>,
) -> Result<PipelineOutput> {
    config.validate()?;

    let digests = vec![
        InputDigest::of(Dataset::Production, inputs.production),
        InputDigest::of(Dataset::Environment, inputs.environment),
    ];

    let (production, environment) = load_inputs(inputs)?;
    let mut warnings: Vec<PipelineWarning> = [production.warning(), environment.warning()]
        .into_iter()
        .flatten()
        .collect();

    let filtered = apply_cycle_filter(production.df, environment.df, &config.cycle)?;
    warnings.extend(filtered.warning);

    let cycle_counts_before_merge = cycle_counts(&filtered.production)?;
    let merge = merge_on_date(&filtered.production, &filtered.environment)?;
    let cycle_counts_after_merge = cycle_counts(&merge.merged)?;

    if merge.duplicate_environment_dates > 0 {
        warnings.push(PipelineWarning::DuplicateEnvironmentDates {
            count: merge.duplicate_environment_dates,
        });
    }
    if merge.missing_environment > 0 {
        warnings.push(PipelineWarning::MissingEnvironmentPairing {
            count: merge.missing_environment,
        });
    }

    let validated = apply_compliance(&merge.merged)?;
    let merged = apply_fan_sizing(&validated, &config.fan_sizing)?;
    let compliance = summarize_compliance(&merged)?;
    let correlation = correlation_matrix(&merged)?;

    let context = ReportContext {
        title: &config.report.title,
        generated_at,
        cycle: &config.cycle,
        fan_sizing: &config.fan_sizing,
        merged: &merged,
        correlation: correlation.as_ref(),
        compliance: &compliance,
        warnings: &warnings,
        rows_per_page: config.report.rows_per_page,
    };
    let artifacts = render_artifacts(&context)?;

    let summary = PipelineSummary {
        generated_at,
        cycle: config.cycle.to_string(),
        inputs: digests,
        production_rows: filtered.production.height(),
        environment_rows: filtered.environment.height(),
        merged_rows: merged.height(),
        cycle_counts_before_merge,
        cycle_counts_after_merge,
        warnings,
        compliance,
        correlation,
        artifacts: artifacts.iter().map(Artifact::info).collect(),
    };

    info!(
        merged_rows = summary.merged_rows,
        warnings = summary.warnings.len(),
        "pipeline finished"
    );

    Ok(PipelineOutput {
        merged,
        summary,
        artifacts,
    })
}
