//! Delimited-text artifacts for the storage and dashboard layers.
//!
//! Three tables are produced per run:
//! - `simulation_results.csv`: one row per valid trial
//! - `summary_table.csv`: one row per (duration in years, strategy)
//! - `risk_curve.csv`: negative-return probability per (duration in years, strategy)
//!
//! Column names are part of the contract with the dashboard and must not change.
//! Numbers are written in shortest round-trip form, so readers get the exact `f64` back.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::{ResultsTable, RiskTable, SummaryTable};

pub const RESULTS_FILE: &str = "simulation_results.csv";
pub const SUMMARY_FILE: &str = "summary_table.csv";
pub const RISK_FILE: &str = "risk_curve.csv";

pub const RESULTS_COLUMNS: [&str; 9] = [
    "Start Date",
    "Duration (Days)",
    "Total Invested",
    "Total Fee",
    "End Portfolio Value",
    "Total Return",
    "Annualized Return",
    "Strategy",
    "Duration (Years)",
];

pub const SUMMARY_COLUMNS: [&str; 9] = [
    "Duration (Years)",
    "Strategy",
    "Mean_End_Value",
    "Median_End_Value",
    "Min_End_Value",
    "Max_End_Value",
    "Mean_Invested_Amount",
    "Mean_Fee",
    "Positive_Return_Percentage",
];

pub const RISK_COLUMNS: [&str; 3] = [
    "Duration (Years)",
    "Strategy",
    "Negative Return Probability (%)",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to encode csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to flush csv writer: {0}")]
    Flush(String),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub fn results_csv(results: &ResultsTable) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(RESULTS_COLUMNS)?;
    for r in results.rows() {
        wtr.write_record([
            r.start_date.format("%Y-%m-%d").to_string(),
            r.duration_days.to_string(),
            r.total_invested.to_string(),
            r.total_fee.to_string(),
            r.end_value.to_string(),
            r.total_return.to_string(),
            r.annualized_return.to_string(),
            r.strategy.label().to_string(),
            r.duration_years().to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn summary_csv(summary: &SummaryTable) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(SUMMARY_COLUMNS)?;
    for s in &summary.rows {
        wtr.write_record([
            s.duration_years.to_string(),
            s.strategy.label().to_string(),
            s.mean_end_value.to_string(),
            s.median_end_value.to_string(),
            s.min_end_value.to_string(),
            s.max_end_value.to_string(),
            s.mean_invested_amount.to_string(),
            s.mean_fee.to_string(),
            s.positive_return_percentage.to_string(),
        ])?;
    }
    finish(wtr)
}

pub fn risk_csv(risk: &RiskTable) -> Result<String, ExportError> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(RISK_COLUMNS)?;
    for r in &risk.rows {
        wtr.write_record([
            r.duration_years.to_string(),
            r.strategy.label().to_string(),
            r.negative_return_percentage.to_string(),
        ])?;
    }
    finish(wtr)
}

fn finish(wtr: csv::Writer<Vec<u8>>) -> Result<String, ExportError> {
    let data = wtr
        .into_inner()
        .map_err(|e| ExportError::Flush(e.to_string()))?;
    String::from_utf8(data).map_err(|e| ExportError::Flush(e.to_string()))
}

/// Writes the three run artifacts into `dir`, creating it if needed.
pub fn write_artifacts(
    dir: &Path,
    results: &ResultsTable,
    summary: &SummaryTable,
    risk: &RiskTable,
) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let files = [
        (RESULTS_FILE, results_csv(results)?),
        (SUMMARY_FILE, summary_csv(summary)?),
        (RISK_FILE, risk_csv(risk)?),
    ];

    let mut written = Vec::with_capacity(files.len());
    for (name, body) in files {
        let path = dir.join(name);
        fs::write(&path, body).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}

/// Short human form of a money amount, e.g. `1.2M` or `850.0K`. Display only.
pub fn format_compact(value: f64) -> String {
    const UNITS: [(f64, &str); 5] = [(1.0, ""), (1e3, "K"), (1e6, "M"), (1e9, "B"), (1e12, "T")];

    if !value.is_finite() {
        return value.to_string();
    }
    for (scale, suffix) in UNITS {
        let text = format!("{:.1}", value / scale);
        // Move up a unit only when the rounded figure would read 1000 or more.
        let rounded = text.trim_start_matches('-').parse::<f64>().unwrap_or(0.0);
        if rounded < 1000.0 || suffix == "T" {
            return format!("{text}{suffix}");
        }
    }
    value.to_string()
}
