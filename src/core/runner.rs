use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use super::error::SimulationError;
use super::prices::PriceSeries;
use super::simulator::simulate;
use super::types::{
    ResultsTable, RunProgress, RunStats, SimulationConfig, Strategy, StrategyConfig, TrialRequest,
    TrialResult,
};

pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Runs every configured strategy and concatenates their tagged results.
pub fn run_simulations(
    prices: &PriceSeries,
    config: &SimulationConfig,
) -> Result<ResultsTable, SimulationError> {
    run_simulations_with_progress(prices, config, |_| {})
}

/// Same as [`run_simulations`], reporting progress after every finished batch.
pub fn run_simulations_with_progress<F>(
    prices: &PriceSeries,
    config: &SimulationConfig,
    mut on_progress: F,
) -> Result<ResultsTable, SimulationError>
where
    F: FnMut(RunProgress),
{
    validate_config(config, prices)?;
    let pool = build_pool(config.threads)?;

    let total_trials = u64::from(config.trials) * config.strategies.len() as u64;
    let mut table = ResultsTable::new();
    for (idx, strategy) in config.strategies.iter().enumerate() {
        let done_before = u64::from(config.trials) * idx as u64;
        let occurrence = config.strategies[..idx]
            .iter()
            .filter(|earlier| earlier.strategy == strategy.strategy)
            .count() as u64;
        let mut report = |completed: u64| {
            on_progress(RunProgress {
                strategy: strategy.strategy,
                completed_trials: done_before + completed,
                total_trials,
            })
        };
        let (rows, stats) =
            execute_strategy(prices, config, strategy, occurrence, &pool, &mut report);
        table.append(rows, stats);
    }

    Ok(table)
}

/// Runs a single strategy. The returned table carries one [`RunStats`] entry.
///
/// Draws the same windows as the first entry with this tag in [`run_simulations`].
pub fn run_strategy(
    prices: &PriceSeries,
    config: &SimulationConfig,
    strategy: &StrategyConfig,
) -> Result<ResultsTable, SimulationError> {
    validate_run(config, prices)?;
    validate_strategy(strategy)?;
    let pool = build_pool(config.threads)?;

    let (rows, stats) = execute_strategy(prices, config, strategy, 0, &pool, &mut |_: u64| {});
    let mut table = ResultsTable::new();
    table.append(rows, stats);
    Ok(table)
}

pub fn validate_config(
    config: &SimulationConfig,
    prices: &PriceSeries,
) -> Result<(), SimulationError> {
    validate_run(config, prices)?;
    if config.strategies.is_empty() {
        return Err(SimulationError::config(
            "strategies",
            "at least one strategy is required",
        ));
    }
    for strategy in &config.strategies {
        validate_strategy(strategy)?;
    }
    Ok(())
}

fn validate_run(config: &SimulationConfig, prices: &PriceSeries) -> Result<(), SimulationError> {
    if prices.is_empty() {
        return Err(SimulationError::data("price series is empty"));
    }
    if config.trials == 0 {
        return Err(SimulationError::config("trials", "must be > 0"));
    }
    if config.min_duration_days == 0 {
        return Err(SimulationError::config("min_duration_days", "must be > 0"));
    }
    if config.min_duration_days > config.max_duration_days {
        return Err(SimulationError::config(
            "min_duration_days",
            format!(
                "{} exceeds max_duration_days {}",
                config.min_duration_days, config.max_duration_days
            ),
        ));
    }
    if start_index_bound(prices.len(), config.max_duration_days).is_none() {
        return Err(SimulationError::config(
            "max_duration_days",
            format!(
                "{} days leaves no start date in a series of {} prices (needs at most {})",
                config.max_duration_days,
                prices.len(),
                prices.len().saturating_sub(2)
            ),
        ));
    }
    if !config.daily_contribution.is_finite() || config.daily_contribution <= 0.0 {
        return Err(SimulationError::config(
            "daily_contribution",
            "must be finite and > 0",
        ));
    }
    if config.batch_size == 0 {
        return Err(SimulationError::config("batch_size", "must be > 0"));
    }
    Ok(())
}

fn validate_strategy(strategy: &StrategyConfig) -> Result<(), SimulationError> {
    if !strategy.annual_fee_rate.is_finite() || strategy.annual_fee_rate < 0.0 {
        return Err(SimulationError::config(
            "annual_fee_rate",
            format!("{} fee must be finite and >= 0", strategy.strategy.label()),
        ));
    }
    if !strategy.leverage.is_finite() || strategy.leverage < 0.0 {
        return Err(SimulationError::config(
            "leverage",
            format!("{} leverage must be finite and >= 0", strategy.strategy.label()),
        ));
    }
    Ok(())
}

/// Exclusive upper bound for sampled start indices, shared by every trial of a run.
pub fn start_index_bound(series_len: usize, max_duration_days: u32) -> Option<usize> {
    let bound = series_len.checked_sub(max_duration_days as usize + 1)?;
    (bound > 0).then_some(bound)
}

fn build_pool(threads: usize) -> Result<rayon::ThreadPool, SimulationError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| SimulationError::config("threads", e.to_string()))
}

fn execute_strategy(
    prices: &PriceSeries,
    config: &SimulationConfig,
    strategy: &StrategyConfig,
    occurrence: u64,
    pool: &rayon::ThreadPool,
    on_batch: &mut dyn FnMut(u64),
) -> (Vec<TrialResult>, RunStats) {
    let label = strategy.strategy.label();
    let start_bound = start_index_bound(prices.len(), config.max_duration_days).unwrap_or(1);
    let mut rng = StdRng::seed_from_u64(derive_seed(config.seed, strategy.strategy, occurrence));

    info!(
        strategy = label,
        trials = config.trials,
        min_duration_days = config.min_duration_days,
        max_duration_days = config.max_duration_days,
        leverage = strategy.leverage,
        annual_fee_rate = strategy.annual_fee_rate,
        "starting simulation run"
    );

    let mut rows = Vec::with_capacity(config.trials as usize);
    let mut invalid = 0_u32;
    let mut completed = 0_u32;
    let batch_cap = u32::try_from(config.batch_size).unwrap_or(u32::MAX);
    let mut batch = Vec::with_capacity(batch_cap.min(config.trials) as usize);

    while completed < config.trials {
        let batch_len = (config.trials - completed).min(batch_cap);
        batch.clear();
        batch.extend((0..batch_len).map(|_| {
            sample_request(
                &mut rng,
                start_bound,
                config.min_duration_days,
                config.max_duration_days,
                config.daily_contribution,
                strategy,
            )
        }));

        let outcomes: Vec<_> = pool.install(|| {
            batch
                .par_iter()
                .map(|request| simulate(request, prices, strategy.strategy))
                .collect()
        });

        for outcome in outcomes {
            match outcome {
                Ok(row) => rows.push(row),
                Err(reason) => {
                    invalid += 1;
                    debug!(strategy = label, %reason, "discarded trial");
                }
            }
        }

        completed += batch_len;
        debug!(
            strategy = label,
            completed,
            total = config.trials,
            "batch finished"
        );
        on_batch(u64::from(completed));
    }

    let stats = RunStats {
        strategy: strategy.strategy,
        requested: config.trials,
        valid: rows.len() as u32,
        invalid,
    };
    if stats.valid == 0 {
        warn!(strategy = label, requested = stats.requested, "no valid trials");
    } else if stats.invalid > 0 {
        warn!(
            strategy = label,
            valid = stats.valid,
            invalid = stats.invalid,
            "some trials were discarded"
        );
    }
    info!(
        strategy = label,
        valid = stats.valid,
        invalid = stats.invalid,
        "simulation run finished"
    );

    (rows, stats)
}

pub(crate) fn sample_request<R: Rng>(
    rng: &mut R,
    start_bound: usize,
    min_duration_days: u32,
    max_duration_days: u32,
    daily_contribution: f64,
    strategy: &StrategyConfig,
) -> TrialRequest {
    TrialRequest {
        start_index: rng.random_range(0..start_bound),
        duration_days: rng.random_range(min_duration_days..=max_duration_days),
        daily_contribution,
        annual_fee_rate: strategy.annual_fee_rate,
        leverage: strategy.leverage,
    }
}

/// `occurrence` counts earlier entries with the same tag, so repeated tags draw distinct streams.
fn derive_seed(base_seed: u64, strategy: Strategy, occurrence: u64) -> u64 {
    splitmix64(base_seed ^ (strategy.stream_id() << 32) ^ (occurrence << 40))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}
