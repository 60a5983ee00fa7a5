use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::{
    DEFAULT_BATCH_SIZE, SimulationConfig, Strategy, StrategyConfig, TRADING_DAYS_PER_YEAR,
};

pub const DEFAULT_SIMULATIONS: u32 = 1_000;
pub const MIN_SIMULATIONS: u32 = 100;
pub const MAX_SIMULATIONS: u32 = 1_000_000;
pub const DEFAULT_MIN_YEARS: u32 = 1;
pub const DEFAULT_MAX_YEARS: u32 = 20;
pub const MAX_YEARS: u32 = 30;
pub const DEFAULT_MONTHLY_CONTRIBUTION: f64 = 833.33;
pub const DEFAULT_TRADING_DAYS_PER_MONTH: f64 = 21.0;
pub const DEFAULT_UNLEVERAGED_FEE_PCT: f64 = 0.25;
pub const DEFAULT_LEVERAGED_FEE_PCT: f64 = 0.35;
pub const DEFAULT_UNLEVERAGED_LEVERAGE: f64 = 1.0;
pub const DEFAULT_LEVERAGE: f64 = 2.0;
pub const DEFAULT_SEED: u64 = 42;

#[derive(Parser, Debug)]
#[command(
    name = "dca-risk",
    about = "Historical block-bootstrap simulator for leveraged vs unleveraged dollar-cost averaging"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one simulation and write the result, summary and risk tables as CSV.
    Run {
        #[arg(long, help = "CSV with a Date column and an Adj Close, Close or Price column")]
        prices: PathBuf,
        #[arg(long, default_value = "simulation_outputs")]
        output_dir: PathBuf,
        #[command(flatten)]
        simulation: SimulationArgs,
    },
    /// Serve the simulation API over HTTP.
    Serve {
        #[arg(long, help = "CSV with a Date column and an Adj Close, Close or Price column")]
        prices: PathBuf,
        #[arg(long, default_value_t = 8080)]
        port: u16,
        #[command(flatten)]
        simulation: SimulationArgs,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct SimulationArgs {
    #[arg(long, default_value_t = DEFAULT_SIMULATIONS, help = "Trials per strategy")]
    pub simulations: u32,
    #[arg(long, default_value_t = DEFAULT_MIN_YEARS, help = "Shortest investment horizon in years")]
    pub min_years: u32,
    #[arg(long, default_value_t = DEFAULT_MAX_YEARS, help = "Longest investment horizon in years")]
    pub max_years: u32,
    #[arg(long, default_value_t = DEFAULT_MONTHLY_CONTRIBUTION)]
    pub monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_TRADING_DAYS_PER_MONTH,
        help = "Trading days the monthly contribution is spread over"
    )]
    pub trading_days_per_month: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_UNLEVERAGED_FEE_PCT,
        help = "Unleveraged annual fee in percent"
    )]
    pub unleveraged_fee: f64,
    #[arg(
        long,
        default_value_t = DEFAULT_LEVERAGED_FEE_PCT,
        help = "Leveraged annual fee in percent"
    )]
    pub leveraged_fee: f64,
    #[arg(long, default_value_t = DEFAULT_UNLEVERAGED_LEVERAGE)]
    pub unleveraged_leverage: f64,
    #[arg(long, default_value_t = DEFAULT_LEVERAGE, help = "Daily leverage of the leveraged strategy")]
    pub leverage: f64,
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE, help = "Trials per parallel batch")]
    pub batch_size: usize,
    #[arg(long, default_value_t = 0, help = "Worker threads, 0 uses every core")]
    pub threads: usize,
}

impl Default for SimulationArgs {
    fn default() -> Self {
        Self {
            simulations: DEFAULT_SIMULATIONS,
            min_years: DEFAULT_MIN_YEARS,
            max_years: DEFAULT_MAX_YEARS,
            monthly_contribution: DEFAULT_MONTHLY_CONTRIBUTION,
            trading_days_per_month: DEFAULT_TRADING_DAYS_PER_MONTH,
            unleveraged_fee: DEFAULT_UNLEVERAGED_FEE_PCT,
            leveraged_fee: DEFAULT_LEVERAGED_FEE_PCT,
            unleveraged_leverage: DEFAULT_UNLEVERAGED_LEVERAGE,
            leverage: DEFAULT_LEVERAGE,
            seed: DEFAULT_SEED,
            batch_size: DEFAULT_BATCH_SIZE,
            threads: 0,
        }
    }
}

pub fn build_config(args: &SimulationArgs) -> Result<SimulationConfig, String> {
    if !(MIN_SIMULATIONS..=MAX_SIMULATIONS).contains(&args.simulations) {
        return Err(format!(
            "--simulations must be between {MIN_SIMULATIONS} and {MAX_SIMULATIONS}"
        ));
    }
    if !(1..=MAX_YEARS).contains(&args.min_years) {
        return Err(format!("--min-years must be between 1 and {MAX_YEARS}"));
    }
    if !(1..=MAX_YEARS).contains(&args.max_years) {
        return Err(format!("--max-years must be between 1 and {MAX_YEARS}"));
    }
    if args.min_years > args.max_years {
        return Err("--min-years cannot exceed --max-years".to_string());
    }
    if !args.monthly_contribution.is_finite() || args.monthly_contribution <= 0.0 {
        return Err("--monthly-contribution must be > 0".to_string());
    }
    if !args.trading_days_per_month.is_finite() || args.trading_days_per_month <= 0.0 {
        return Err("--trading-days-per-month must be > 0".to_string());
    }
    for (name, fee) in [
        ("--unleveraged-fee", args.unleveraged_fee),
        ("--leveraged-fee", args.leveraged_fee),
    ] {
        if !(0.0..=100.0).contains(&fee) {
            return Err(format!("{name} must be between 0 and 100"));
        }
    }
    for (name, leverage) in [
        ("--unleveraged-leverage", args.unleveraged_leverage),
        ("--leverage", args.leverage),
    ] {
        if !leverage.is_finite() || leverage < 0.0 {
            return Err(format!("{name} must be >= 0"));
        }
    }
    if args.batch_size == 0 {
        return Err("--batch-size must be > 0".to_string());
    }

    Ok(SimulationConfig {
        trials: args.simulations,
        min_duration_days: args.min_years * TRADING_DAYS_PER_YEAR,
        max_duration_days: args.max_years * TRADING_DAYS_PER_YEAR,
        daily_contribution: args.monthly_contribution / args.trading_days_per_month,
        strategies: vec![
            StrategyConfig {
                strategy: Strategy::Unleveraged,
                annual_fee_rate: args.unleveraged_fee / 100.0,
                leverage: args.unleveraged_leverage,
            },
            StrategyConfig {
                strategy: Strategy::Leveraged,
                annual_fee_rate: args.leveraged_fee / 100.0,
                leverage: args.leverage,
            },
        ],
        batch_size: args.batch_size,
        threads: args.threads,
        seed: args.seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn defaults_build_two_strategies_in_day_units() {
        let config = build_config(&SimulationArgs::default()).expect("valid defaults");

        assert_eq!(config.trials, 1_000);
        assert_eq!(config.min_duration_days, 252);
        assert_eq!(config.max_duration_days, 20 * 252);
        assert_approx(config.daily_contribution, 833.33 / 21.0);
        assert_eq!(config.batch_size, 100);

        assert_eq!(config.strategies.len(), 2);
        let unlev = config.strategies[0];
        assert_eq!(unlev.strategy, Strategy::Unleveraged);
        assert_approx(unlev.annual_fee_rate, 0.0025);
        assert_approx(unlev.leverage, 1.0);
        let lev = config.strategies[1];
        assert_eq!(lev.strategy, Strategy::Leveraged);
        assert_approx(lev.annual_fee_rate, 0.0035);
        assert_approx(lev.leverage, 2.0);
    }

    #[test]
    fn clap_defaults_match_api_defaults() {
        let cli = Cli::try_parse_from(["dca-risk", "run", "--prices", "spx.csv"])
            .expect("parses");
        let Command::Run {
            prices,
            output_dir,
            simulation,
        } = cli.command
        else {
            panic!("expected run command");
        };
        assert_eq!(prices, PathBuf::from("spx.csv"));
        assert_eq!(output_dir, PathBuf::from("simulation_outputs"));
        assert_eq!(simulation, SimulationArgs::default());
    }

    #[test]
    fn clap_parses_serve_overrides() {
        let cli = Cli::try_parse_from([
            "dca-risk",
            "serve",
            "--prices",
            "spx.csv",
            "--port",
            "9000",
            "--leverage",
            "3",
            "--max-years",
            "10",
        ])
        .expect("parses");
        let Command::Serve {
            port, simulation, ..
        } = cli.command
        else {
            panic!("expected serve command");
        };
        assert_eq!(port, 9000);
        assert_approx(simulation.leverage, 3.0);
        assert_eq!(simulation.max_years, 10);
    }

    #[test]
    fn build_config_rejects_out_of_range_simulations() {
        let mut args = SimulationArgs::default();
        args.simulations = 99;
        let err = build_config(&args).expect_err("must reject too few trials");
        assert!(err.contains("--simulations"));

        args.simulations = 1_000_001;
        assert!(build_config(&args).is_err());
    }

    #[test]
    fn build_config_rejects_inverted_years() {
        let mut args = SimulationArgs::default();
        args.min_years = 10;
        args.max_years = 5;
        let err = build_config(&args).expect_err("must reject min > max");
        assert!(err.contains("--min-years"));

        let mut args = SimulationArgs::default();
        args.max_years = 31;
        let err = build_config(&args).expect_err("must reject > 30 years");
        assert!(err.contains("--max-years"));
    }

    #[test]
    fn build_config_rejects_bad_money_and_rates() {
        let mut args = SimulationArgs::default();
        args.monthly_contribution = 0.0;
        assert!(build_config(&args).expect_err("zero").contains("--monthly-contribution"));

        let mut args = SimulationArgs::default();
        args.leveraged_fee = -0.1;
        assert!(build_config(&args).expect_err("negative").contains("--leveraged-fee"));

        let mut args = SimulationArgs::default();
        args.leverage = f64::NAN;
        assert!(build_config(&args).expect_err("nan").contains("--leverage"));

        let mut args = SimulationArgs::default();
        args.trading_days_per_month = 0.0;
        assert!(build_config(&args).expect_err("zero").contains("--trading-days-per-month"));
    }
}
