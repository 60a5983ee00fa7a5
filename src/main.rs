use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dca_risk::api::{Cli, Command, SimulationArgs, build_config, run_http_server};
use dca_risk::core::{load_price_csv, run_simulations_with_progress, summarize};
use dca_risk::export::{format_compact, write_artifacts};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Run {
            prices,
            output_dir,
            simulation,
        } => run_command(prices, output_dir, simulation).await,
        Command::Serve {
            prices,
            port,
            simulation,
        } => {
            // Fail on bad flags before binding, requests only override them.
            build_config(&simulation).map_err(anyhow::Error::msg)?;
            let series = load_price_csv(&prices)
                .with_context(|| format!("loading prices from {}", prices.display()))?;
            info!(prices = series.len(), "price history loaded");
            run_http_server(series, simulation, port)
                .await
                .context("HTTP server stopped")
        }
    }
}

async fn run_command(prices: PathBuf, output_dir: PathBuf, args: SimulationArgs) -> Result<()> {
    tokio::task::spawn_blocking(move || run_batch(&prices, &output_dir, &args))
        .await
        .context("batch run task failed")?
}

fn run_batch(prices: &Path, output_dir: &Path, args: &SimulationArgs) -> Result<()> {
    let config = build_config(args).map_err(anyhow::Error::msg)?;
    let series = load_price_csv(prices)
        .with_context(|| format!("loading prices from {}", prices.display()))?;
    info!(
        prices = series.len(),
        first = ?series.first_date(),
        last = ?series.last_date(),
        "price history loaded"
    );

    let mut last_logged = 0_u64;
    let results = run_simulations_with_progress(&series, &config, |progress| {
        let pct = (progress.fraction() * 100.0) as u64;
        if pct >= last_logged + 10 || progress.completed_trials == progress.total_trials {
            last_logged = pct;
            info!(strategy = progress.strategy.label(), "{pct}% of trials done");
        }
    })
    .context("simulation run failed")?;

    let (summary, risk) = summarize(&results);
    let written = write_artifacts(output_dir, &results, &summary, &risk)
        .with_context(|| format!("writing artifacts to {}", output_dir.display()))?;
    for path in &written {
        info!(path = %path.display(), "artifact written");
    }

    if summary.is_empty() {
        warn!("no valid trials, summary and risk tables are empty");
        return Ok(());
    }
    for row in &summary.rows {
        info!(
            years = row.duration_years,
            strategy = row.strategy.label(),
            trials = row.trials,
            median = %format_compact(row.median_end_value),
            invested = %format_compact(row.mean_invested_amount),
            positive_pct = format_args!("{:.1}", row.positive_return_percentage),
            "summary"
        );
    }
    Ok(())
}
