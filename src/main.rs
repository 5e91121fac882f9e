//! # Run the full comparison
//! mobility-forecast run --data data/panel.csv --config config/default.toml --output results
//!
//! # Inspect the test split and folds without fitting
//! mobility-forecast folds --data data/panel.csv --config config/default.toml
//!
//! # Check a panel file before running
//! mobility-forecast validate --data data/panel.csv

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use mobility_forecast::{DataIntegrityValidator, PanelLoader, Pipeline, PipelineConfig};

const SEPARATOR: &str = "============================================================";

#[derive(Parser)]
#[command(name = "mobility-forecast")]
#[command(about = "County-level case forecasting from mobility signals")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tune and evaluate every model family on every feature set
    Run {
        /// Path to the cleaned panel (.csv or .parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output directory for results
        #[arg(short, long, default_value = "results")]
        output: PathBuf,

        /// Override the configured random seed
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the test window and rolling folds
    Folds {
        /// Path to the cleaned panel (.csv or .parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Run data integrity checks on a panel file
    Validate {
        /// Path to the cleaned panel (.csv or .parquet)
        #[arg(short, long)]
        data: PathBuf,

        /// Largest tolerated share of missing values per mobility indicator
        #[arg(long, default_value = "0.2")]
        max_missing_mobility: f64,
    },
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    match path {
        Some(path) => PipelineConfig::from_toml_file(path)
            .with_context(|| format!("loading config {}", path.display())),
        None => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("mobility_forecast=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            data,
            config,
            output,
            seed,
        } => {
            let mut config = load_config(config.as_deref())?;
            if let Some(seed) = seed {
                config = config.with_seed(seed);
            }

            let pipeline = Pipeline::new(config).context("invalid configuration")?;
            let result = pipeline
                .run_path(&data)
                .with_context(|| format!("running pipeline on {}", data.display()))?;
            pipeline
                .write_outputs(&result, &output)
                .with_context(|| format!("writing results to {}", output.display()))?;

            println!("{}", SEPARATOR);
            println!("{}", result.feature_report.summary());
            println!("{}", SEPARATOR);
            println!("{}", result.table.summary());
            println!("Results written to {}", output.display());
        }
        Commands::Folds { data, config } => {
            let config = load_config(config.as_deref())?;
            let pipeline = Pipeline::new(config).context("invalid configuration")?;
            let panel = PanelLoader::load(&data)
                .with_context(|| format!("loading panel {}", data.display()))?;
            let (report, plan) = pipeline.prepare(&panel).context("building folds")?;

            println!("{}", SEPARATOR);
            println!("{}", report.summary());
            println!("{}", SEPARATOR);
            print!("{}", plan.summary());
        }
        Commands::Validate {
            data,
            max_missing_mobility,
        } => {
            let report = DataIntegrityValidator::new()
                .with_max_missing_mobility(max_missing_mobility)
                .validate_path(&data)
                .with_context(|| format!("validating {}", data.display()))?;

            println!("{}", SEPARATOR);
            print!("{}", report.summary());
            println!("{}", SEPARATOR);

            if !report.all_passed() {
                bail!("{} integrity checks failed", report.failed_checks().len());
            }
        }
    }

    Ok(())
}
