//! IvyLab CLI — generate, plan and validate commands.
//!
//! Commands:
//! - `generate` — fetch prices and write one signal workbook per document
//! - `plan` — print each document's date range and dashboard layout
//! - `validate` — check a portfolio config without fetching anything

use anyhow::{bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use ivylab_core::data::{CsvDirectoryClient, FinancialDataClient, StdoutProgress};
use ivylab_core::planning::DashboardLayout;
use ivylab_runner::{
    client_from_config, init_logging, DocumentOutcome, LoggingConfig, PortfolioConfig,
    ReportGenerator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const RUN_REPORT_FILE: &str = "run_report.json";

#[derive(Parser)]
#[command(name = "ivylab", about = "IvyLab — moving-average signal reports")]
struct Cli {
    /// Debug-level logging (RUST_LOG overrides).
    #[arg(long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch price history and write the configured reports.
    Generate {
        /// Path to the portfolio TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Only generate the document with this file name.
        #[arg(long)]
        document: Option<String>,

        /// Read `<SYMBOL>.csv` files from this directory instead of the network.
        #[arg(long)]
        offline: Option<PathBuf>,
    },
    /// Print date ranges and dashboard layouts without fetching.
    Plan {
        /// Path to the portfolio TOML file.
        #[arg(long)]
        config: PathBuf,

        /// Plan as of this date (YYYY-MM-DD). Defaults to today (UTC).
        #[arg(long)]
        today: Option<String>,
    },
    /// Validate a portfolio config.
    Validate {
        /// Path to the portfolio TOML file.
        #[arg(long)]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(LoggingConfig::new(cli.verbose))?;

    match cli.command {
        Commands::Generate {
            config,
            document,
            offline,
        } => run_generate(&config, document.as_deref(), offline.as_deref()),
        Commands::Plan { config, today } => run_plan(&config, today.as_deref()),
        Commands::Validate { config } => run_validate(&config),
    }
}

fn load_config(path: &Path) -> Result<PortfolioConfig> {
    let config = PortfolioConfig::from_file(path)
        .with_context(|| format!("Failed to load config {}", path.display()))?;
    for warning in config.validate()? {
        tracing::warn!("{warning}");
    }
    Ok(config)
}

fn run_generate(config_path: &Path, document: Option<&str>, offline: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;

    let documents = match document {
        Some(name) => match config.document(name) {
            Some(doc) => vec![doc.clone()],
            None => bail!("no document named '{name}' in {}", config_path.display()),
        },
        None => config.documents.clone(),
    };

    let client: Arc<dyn FinancialDataClient> = match offline {
        Some(dir) => Arc::new(CsvDirectoryClient::open(dir)?),
        None => client_from_config(&config.provider)?,
    };
    let generator = ReportGenerator::from_config(&config, client)?
        .with_progress(Arc::new(StdoutProgress));

    let report = generator.run(&documents, Utc::now().date_naive());

    for doc in &report.documents {
        match &doc.outcome {
            DocumentOutcome::Succeeded { paths, .. } => {
                println!("{}: OK", doc.file_name);
                for path in paths {
                    println!("  {}", path.display());
                }
            }
            DocumentOutcome::Failed { stage, error } => {
                eprintln!("{}: FAILED at {stage}: {error}", doc.file_name);
            }
        }
        for sync in doc.sync.iter().filter(|s| !s.ok) {
            eprintln!(
                "  sync to {} failed: {}",
                sync.spreadsheet_id,
                sync.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let report_path = config.output_dir.join(RUN_REPORT_FILE);
    report.write(&report_path)?;
    println!("Run report: {}", report_path.display());

    if !report.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_plan(config_path: &Path, today: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let today = today
        .map(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d"))
        .transpose()
        .context("--today must be YYYY-MM-DD")?
        .unwrap_or_else(|| Utc::now().date_naive());

    for doc in &config.documents {
        let range = doc.date_range(today);
        println!("{}", doc.file_name);
        println!(
            "  range: {} .. {}{}",
            range.start,
            range.end,
            if range.needs_month_alignment { " (month aligned)" } else { "" }
        );

        let layout = DashboardLayout::plan(doc.symbols.len(), &doc.moving_averages);
        for (region, spec) in layout.regions.iter().zip(&doc.moving_averages) {
            // 1-based rows, as a spreadsheet shows them
            println!(
                "  {:<20} header {:>3}  body {:>3}..{:<3}  footer {:>3}",
                spec.display_title(),
                region.header_row + 1,
                region.body_start_row + 1,
                region.body_end_row,
                region.footer_row + 1
            );
        }
        println!("  legend from row {}", layout.legend_start_row() + 1);
    }
    Ok(())
}

fn run_validate(config_path: &Path) -> Result<()> {
    let config = PortfolioConfig::from_file(config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;
    let warnings = config.validate()?;
    for warning in &warnings {
        println!("warning: {warning}");
    }
    let symbols: usize = config.documents.iter().map(|d| d.symbols.len()).sum();
    println!(
        "{}: {} documents, {} symbols, {} warnings",
        config_path.display(),
        config.documents.len(),
        symbols,
        warnings.len()
    );
    Ok(())
}
