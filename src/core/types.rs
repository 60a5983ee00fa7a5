use chrono::NaiveDate;
use serde::Serialize;

pub const TRADING_DAYS_PER_YEAR: u32 = 252;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize)]
pub enum Strategy {
    #[serde(rename = "S&P 500")]
    Unleveraged,
    #[serde(rename = "Leveraged S&P 500")]
    Leveraged,
}

impl Strategy {
    pub const fn label(self) -> &'static str {
        match self {
            Strategy::Unleveraged => "S&P 500",
            Strategy::Leveraged => "Leveraged S&P 500",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "S&P 500" => Some(Strategy::Unleveraged),
            "Leveraged S&P 500" => Some(Strategy::Leveraged),
            _ => None,
        }
    }

    pub(crate) const fn stream_id(self) -> u64 {
        match self {
            Strategy::Unleveraged => 1,
            Strategy::Leveraged => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrialRequest {
    pub start_index: usize,
    pub duration_days: u32,
    pub daily_contribution: f64,
    pub annual_fee_rate: f64,
    pub leverage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrialResult {
    pub start_date: NaiveDate,
    pub duration_days: u32,
    pub total_invested: f64,
    pub total_fee: f64,
    pub end_value: f64,
    pub total_return: f64,
    pub annualized_return: f64,
    pub strategy: Strategy,
}

impl TrialResult {
    pub fn duration_years(&self) -> u32 {
        duration_years(self.duration_days)
    }
}

/// Rounds a day count to whole years, ties going up (378 days -> 2 years).
pub fn duration_years(duration_days: u32) -> u32 {
    duration_days / TRADING_DAYS_PER_YEAR
        + u32::from(duration_days % TRADING_DAYS_PER_YEAR >= TRADING_DAYS_PER_YEAR / 2)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StrategyConfig {
    pub strategy: Strategy,
    pub annual_fee_rate: f64,
    pub leverage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    pub trials: u32,
    pub min_duration_days: u32,
    pub max_duration_days: u32,
    pub daily_contribution: f64,
    pub strategies: Vec<StrategyConfig>,
    pub batch_size: usize,
    pub threads: usize,
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub strategy: Strategy,
    pub requested: u32,
    pub valid: u32,
    pub invalid: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunProgress {
    pub strategy: Strategy,
    pub completed_trials: u64,
    pub total_trials: u64,
}

impl RunProgress {
    pub fn fraction(&self) -> f64 {
        if self.total_trials == 0 {
            return 1.0;
        }
        self.completed_trials as f64 / self.total_trials as f64
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultsTable {
    rows: Vec<TrialResult>,
    stats: Vec<RunStats>,
}

impl ResultsTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<TrialResult>) -> Self {
        Self {
            rows,
            stats: Vec::new(),
        }
    }

    pub(crate) fn append(&mut self, rows: Vec<TrialResult>, stats: RunStats) {
        self.rows.extend(rows);
        self.stats.push(stats);
    }

    pub fn rows(&self) -> &[TrialResult] {
        &self.rows
    }

    pub fn stats(&self) -> &[RunStats] {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn valid_trials(&self, strategy: Strategy) -> u32 {
        self.stats
            .iter()
            .filter(|s| s.strategy == strategy)
            .map(|s| s.valid)
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub duration_years: u32,
    pub strategy: Strategy,
    pub trials: usize,
    pub mean_end_value: f64,
    pub median_end_value: f64,
    pub min_end_value: f64,
    pub max_end_value: f64,
    pub mean_invested_amount: f64,
    pub mean_fee: f64,
    pub positive_return_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskRow {
    pub duration_years: u32,
    pub strategy: Strategy,
    pub negative_return_percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionRow {
    pub duration_years: u32,
    pub strategy: Strategy,
    pub p10_end_value: f64,
    pub p25_end_value: f64,
    pub p50_end_value: f64,
    pub p75_end_value: f64,
    pub p90_end_value: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SummaryTable {
    pub rows: Vec<SummaryRow>,
}

impl SummaryTable {
    pub fn lookup(&self, duration_years: u32, strategy: Strategy) -> Option<&SummaryRow> {
        self.rows
            .iter()
            .find(|r| r.duration_years == duration_years && r.strategy == strategy)
    }

    /// Smallest and largest year bucket present, if any.
    pub fn duration_range(&self) -> Option<(u32, u32)> {
        let min = self.rows.iter().map(|r| r.duration_years).min()?;
        let max = self.rows.iter().map(|r| r.duration_years).max()?;
        Some((min, max))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RiskTable {
    pub rows: Vec<RiskRow>,
}

impl RiskTable {
    pub fn curve(&self, strategy: Strategy) -> Vec<(u32, f64)> {
        self.rows
            .iter()
            .filter(|r| r.strategy == strategy)
            .map(|r| (r.duration_years, r.negative_return_percentage))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
