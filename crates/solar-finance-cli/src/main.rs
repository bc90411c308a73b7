mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::catalog::CatalogArgs;
use commands::projection::{ExportArgs, ScenarioArgs};

/// Residential solar loan projections
#[derive(Parser)]
#[command(
    name = "sfp",
    version,
    about = "Residential solar loan projections",
    long_about = "A CLI for projecting residential solar financing with decimal precision. \
                  Computes dealer-fee gross-up, federal/battery/state incentives, loan \
                  payments with deferral, annual and monthly cash flows, NPV, IRR, ROI \
                  and payback, and compares every program in the loan catalog."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log derived intermediate values to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Path to a JSON or YAML loan catalog replacing the standard one
    #[arg(long, global = true)]
    catalog: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full projection for one scenario
    Project(ScenarioArgs),
    /// List the loan programs in the catalog
    Catalog(CatalogArgs),
    /// Project the scenario under every loan program in the catalog
    Compare(ScenarioArgs),
    /// Write the annual and monthly cash-flow schedules as CSV files
    Export(ExportArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbose: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "warn" };
        format!("solar_finance_core={level},sfp={level}").into()
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let catalog = match commands::load_catalog(cli.catalog.as_deref()) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Project(args) => commands::projection::run_project(args, &catalog),
        Commands::Catalog(args) => commands::catalog::run_catalog(args, &catalog),
        Commands::Compare(args) => commands::projection::run_compare(args, &catalog),
        Commands::Export(args) => commands::projection::run_export(args, &catalog),
        Commands::Version => {
            println!("sfp {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
