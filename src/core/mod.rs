mod aggregate;
mod error;
pub mod prices;
mod runner;
mod simulator;
mod types;

pub use aggregate::{distribution, summarize};
pub use error::{InvalidTrial, SimulationError};
pub use prices::{LoadError, PriceSeries, load_price_csv, parse_price_csv};
pub use runner::{
    DEFAULT_BATCH_SIZE, run_simulations, run_simulations_with_progress, run_strategy,
    start_index_bound, validate_config,
};
pub use simulator::{daily_fee_rate, simulate};
pub use types::{
    DistributionRow, ResultsTable, RiskRow, RiskTable, RunProgress, RunStats, SimulationConfig,
    Strategy, StrategyConfig, SummaryRow, SummaryTable, TRADING_DAYS_PER_YEAR, TrialRequest,
    TrialResult, duration_years,
};
