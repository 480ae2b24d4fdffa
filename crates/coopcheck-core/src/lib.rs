pub mod config;
pub mod correlation;
pub mod error;
pub mod filter;
pub mod frame;
pub mod loader;
pub mod merge;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod validation;
pub mod ventilation;

pub use config::{CycleSelection, FanSizing, PipelineConfig, ReportOptions};
pub use error::{Dataset, PipelineError, PipelineWarning, Result};
pub use pipeline::{
    list_cycles, run_pipeline, run_pipeline_at, PipelineInputs, PipelineOutput, PipelineSummary,
};
