use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use coopcheck_core::report::{format_number, format_percentage};
use coopcheck_core::validation::ComplianceCheck;
use coopcheck_core::{
    list_cycles, run_pipeline, CycleSelection, PipelineConfig, PipelineInputs, PipelineSummary,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const CONFIG_ENV: &str = "COOPCHECK_CONFIG";

#[derive(Parser, Debug)]
#[command(author, version, about = "Broiler production and coop environment analysis", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge, validate and report on a production and an environment upload
    Run(RunArgs),
    /// List the cycle choices found in a production upload
    Cycles(CyclesArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Production table (.xlsx, .xls or .csv)
    #[arg(long)]
    production: PathBuf,
    /// Environment table (.xlsx, .xls or .csv)
    #[arg(long)]
    environment: PathBuf,
    /// Cycle to keep, or `all`
    #[arg(long)]
    cycle: Option<CycleSelection>,
    /// Housing floor area in square metres
    #[arg(long)]
    housing_area: Option<f64>,
    /// Airflow of a single fan in m3/h
    #[arg(long)]
    fan_capacity: Option<f64>,
    /// Number of fans installed in the house
    #[arg(long)]
    installed_fans: Option<u32>,
    /// Number of birds in the flock
    #[arg(long)]
    population: Option<u32>,
    /// TOML configuration file (defaults to $COOPCHECK_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Directory receiving the workbook and PDF report
    #[arg(long, default_value = "coopcheck-output")]
    out_dir: PathBuf,
    /// Print the run summary as JSON instead of tables
    #[arg(long)]
    summary_json: bool,
}

#[derive(Args, Debug)]
struct CyclesArgs {
    /// Production table (.xlsx, .xls or .csv)
    #[arg(long)]
    production: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Cycles(args) => handle_cycles(args),
    }
}

fn read_upload(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

fn load_config(args: &RunArgs) -> Result<PipelineConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from));

    let mut config = match path {
        Some(path) => {
            info!(path = %path.display(), "loading configuration");
            PipelineConfig::from_path(&path)
                .with_context(|| format!("failed to load configuration {}", path.display()))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(cycle) = &args.cycle {
        config.cycle = cycle.clone();
    }
    if let Some(area) = args.housing_area {
        config.fan_sizing.housing_area_m2 = area;
    }
    if let Some(capacity) = args.fan_capacity {
        config.fan_sizing.fan_capacity_m3h = capacity;
    }
    if let Some(fans) = args.installed_fans {
        config.fan_sizing.installed_fans = fans;
    }
    if let Some(population) = args.population {
        config.fan_sizing.population = population;
    }

    config.validate().context("invalid fan sizing or report options")?;
    Ok(config)
}

fn handle_run(args: RunArgs) -> Result<()> {
    let config = load_config(&args)?;
    let production = read_upload(&args.production)?;
    let environment = read_upload(&args.environment)?;

    let inputs = PipelineInputs {
        production: &production,
        environment: &environment,
    };
    let output = run_pipeline(&inputs, &config).context("pipeline run failed")?;

    let written = output
        .write_to_dir(&args.out_dir)
        .with_context(|| format!("failed to write artifacts to {}", args.out_dir.display()))?;

    if args.summary_json {
        println!("{}", serde_json::to_string_pretty(&output.summary)?);
    } else {
        print_summary(&output.summary);
        for path in &written {
            println!("wrote {}", path.display());
        }
    }

    Ok(())
}

fn handle_cycles(args: CyclesArgs) -> Result<()> {
    let production = read_upload(&args.production)?;
    let cycles = list_cycles(&production).context("failed to read production cycles")?;
    if cycles.len() == 1 {
        warn!("production data has no cycle column");
    }
    let mut table = new_table(vec!["Cycle"]);
    for cycle in cycles {
        table.add_row(vec![cycle]);
    }
    println!("{table}");
    Ok(())
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_summary(summary: &PipelineSummary) {
    println!(
        "cycle {} | production rows {} | environment rows {} | merged rows {}",
        summary.cycle, summary.production_rows, summary.environment_rows, summary.merged_rows
    );

    for warning in &summary.warnings {
        println!("warning: {warning}");
    }

    let mut compliance = new_table(vec!["Check", "Passed", "Failed", "Unknown", "Compliance"]);
    for check in ComplianceCheck::ALL {
        let flag = summary.compliance.flag(check);
        compliance.add_row(vec![
            Cell::new(check.label()),
            Cell::new(flag.passed),
            Cell::new(flag.failed),
            Cell::new(flag.unknown),
            Cell::new(format_percentage(flag.percentage)),
        ]);
    }
    println!("{compliance}");
    println!(
        "non-compliant rows: {} of {}",
        summary.compliance.non_compliant_rows, summary.compliance.total_rows
    );

    match &summary.correlation {
        Some(matrix) => {
            let mut header = vec![""];
            header.extend(matrix.production.iter().map(String::as_str));
            let mut table = new_table(header);
            for (name, values) in matrix.environment.iter().zip(&matrix.values) {
                let mut row = vec![Cell::new(name)];
                row.extend(values.iter().map(|value| Cell::new(format_number(*value))));
                table.add_row(row);
            }
            println!("{table}");
        }
        None => println!("correlation skipped: required columns missing"),
    }
}
