#![deny(unused_variables)]
#![deny(dead_code)]
#![deny(unused_imports)]

use clap::{Args, CommandFactory, Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use labortrend::data::{discover_tables, load_table, write_table};
use labortrend::report::TrainingReport;
use labortrend::{ModelConfig, TrainOutput, train_model};
use polars::prelude::DataFrame;

#[derive(Args)]
pub struct TrainArgs {
    /// Path to a CSV/TSV table, or a directory of CSV tables trained one by one
    #[arg(value_name = "TABLE")]
    pub table: PathBuf,

    /// TOML file with model hyperparameters; defaults are used when omitted
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Number of coefficients to print, largest magnitude first
    #[arg(long, default_value = "10")]
    pub top: usize,

    /// Where to write the table with predictions (a directory when TABLE is one)
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Where to write the TOML training report (a directory when TABLE is one)
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,
}

#[derive(Parser)]
#[command(
    name = "labortrend",
    about = "Employment and population trend modelling",
    long_about = "Fits a linear model with categorical indicators, a smooth year trend \
                 and pairwise interactions to population tables."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Train the population model on one table or a directory of tables
    #[command(about = "Train the population model (outputs: metrics, coefficients)")]
    Train(TrainArgs),

    /// Display version information
    #[command(about = "Display version information")]
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let Cli { command } = cli;

    let result = match command {
        Some(Commands::Train(args)) => train(args),
        Some(Commands::Version) => {
            println!("labortrend {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        None => Cli::command()
            .print_help()
            .map(|()| println!())
            .map_err(Into::into),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

pub fn train(args: TrainArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &args.config {
        Some(path) => {
            println!("Loading model configuration from: {}", path.display());
            ModelConfig::load(path)?
        }
        None => ModelConfig::default(),
    };

    if args.table.is_dir() {
        let tables = discover_tables(&args.table)?;
        println!(
            "Found {} tables in {}",
            tables.len(),
            args.table.display()
        );
        for dir in [&args.output, &args.report].into_iter().flatten() {
            fs::create_dir_all(dir)?;
        }
        for (stem, table) in tables {
            println!("\n=== {stem} ===");
            let output_path = args.output.as_ref().map(|dir| dir.join(format!("{stem}.csv")));
            let report_path = args.report.as_ref().map(|dir| dir.join(format!("{stem}.toml")));
            train_one(
                &table,
                &config,
                args.top,
                output_path.as_deref(),
                report_path.as_deref(),
            )?;
        }
        Ok(())
    } else {
        println!("Loading table from: {}", args.table.display());
        let table = load_table(&args.table)?;
        train_one(
            &table,
            &config,
            args.top,
            args.output.as_deref(),
            args.report.as_deref(),
        )
    }
}

fn train_one(
    table: &DataFrame,
    config: &ModelConfig,
    top: usize,
    output_path: Option<&Path>,
    report_path: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let output = train_model(table, config)?;
    print_summary(&output, top);

    if let Some(path) = report_path {
        TrainingReport::from_output(&output).save(path)?;
        println!("Report saved to: {}", path.display());
    }
    if let Some(path) = output_path {
        let (_, mut augmented, _, _) = output.into_parts();
        write_table(&mut augmented, path)?;
        println!("Predictions saved to: {}", path.display());
    }
    Ok(())
}

fn print_summary(output: &TrainOutput, top: usize) {
    let metrics = &output.metrics;
    println!(
        "Rows: {}  Features: {}",
        output.augmented.height(),
        output.coefficients.len()
    );
    println!(
        "In-sample R²: {:.4}  MAE: {:.4}  RMSE: {:.4}",
        metrics.r2, metrics.mae, metrics.rmse
    );
    for warning in &output.warnings {
        println!("Warning: {warning}");
    }

    let shown = output.coefficients.top(top);
    if shown.is_empty() {
        return;
    }
    let width = shown.iter().map(|c| c.name.len()).max().unwrap_or(0);
    println!("\nTop {} coefficients by magnitude:", shown.len());
    for coefficient in shown {
        println!("  {:<width$}  {:>14.6}", coefficient.name, coefficient.weight);
    }
}
