mod config;
mod models;
mod pipeline;
mod report;
mod scraper;
mod utils;
mod valuation;

use anyhow::{Result, bail};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::AppConfig;
use crate::pipeline::Pipeline;

#[derive(Parser)]
#[command(
    name = "equity-dcf",
    about = "Scrape equity fundamentals and write a discounted-cash-flow report per company",
    version
)]
struct Cli {
    /// Stock codes as they appear in investing.com quote URLs (e.g. top-glove-corp)
    #[arg(required = true)]
    codes: Vec<String>,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Directory reports are written to (overrides config)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Skip the JSON metadata written next to each report
    #[arg(long)]
    no_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "equity_dcf=info,warn",
        1 => "equity_dcf=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    let mut config = AppConfig::load()?;
    if let Some(dir) = cli.output_dir {
        config.report.output_dir = dir;
    }
    if cli.no_json {
        config.report.json_sidecar = false;
    }
    info!(
        "{} companies → {}",
        cli.codes.len(),
        config.report.output_dir.display()
    );

    let stats = Pipeline::new(config)?.run(&cli.codes).await?;
    if stats.all_failed() {
        bail!("no report could be written for any of {} companies", stats.companies);
    }

    Ok(())
}
