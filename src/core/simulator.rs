use super::error::InvalidTrial;
use super::prices::PriceSeries;
use super::types::{Strategy, TRADING_DAYS_PER_YEAR, TrialRequest, TrialResult};

/// Daily rate that compounds to `annual_fee_rate` over one trading year.
pub fn daily_fee_rate(annual_fee_rate: f64) -> f64 {
    (1.0 + annual_fee_rate).powf(1.0 / TRADING_DAYS_PER_YEAR as f64) - 1.0
}

/// Runs one dollar-cost-averaging trial over the window starting at `request.start_index`.
///
/// A contribution is bought at each day's close for `duration_days` days and then rides
/// every remaining leveraged daily return net of the daily fee, so each day's growth
/// factor is `1 + r * leverage - f`. The fee charged is `f` times the value held at the
/// start of that day's return.
pub fn simulate(
    request: &TrialRequest,
    prices: &PriceSeries,
    strategy: Strategy,
) -> Result<TrialResult, InvalidTrial> {
    validate_request(request)?;

    let duration = request.duration_days as usize;
    let start = request.start_index;
    let end = start
        .checked_add(duration)
        .ok_or(InvalidTrial::WindowOutOfRange {
            start,
            end: usize::MAX,
            len: prices.len(),
        })?;
    if end >= prices.len() {
        return Err(InvalidTrial::WindowOutOfRange {
            start,
            end,
            len: prices.len(),
        });
    }

    let window = &prices.prices()[start..=end];
    if window.len() != duration + 1 {
        return Err(InvalidTrial::TruncatedWindow {
            expected: duration + 1,
            actual: window.len(),
        });
    }

    let daily_fee = daily_fee_rate(request.annual_fee_rate);

    let mut value = 0.0_f64;
    let mut total_fee = 0.0_f64;
    for (offset, pair) in window.windows(2).enumerate() {
        let daily_return = pair[1] / pair[0] - 1.0;
        if !daily_return.is_finite() {
            return Err(InvalidTrial::NonFiniteReturn { offset });
        }

        value += request.daily_contribution;
        total_fee += value * daily_fee;
        let growth = (1.0 + daily_return * request.leverage - daily_fee).max(0.0);
        value *= growth;
    }

    let total_invested = request.daily_contribution * duration as f64;
    let total_return = (value - total_invested) / total_invested;
    let annualized_return = annualize(total_return, request.duration_days);

    Ok(TrialResult {
        start_date: prices.dates()[start],
        duration_days: request.duration_days,
        total_invested,
        total_fee,
        end_value: value,
        total_return,
        annualized_return,
        strategy,
    })
}

fn annualize(total_return: f64, duration_days: u32) -> f64 {
    let growth = (1.0 + total_return).max(0.0);
    growth.powf(TRADING_DAYS_PER_YEAR as f64 / duration_days as f64) - 1.0
}

fn validate_request(request: &TrialRequest) -> Result<(), InvalidTrial> {
    if request.duration_days == 0 {
        return Err(InvalidTrial::InvalidRequest {
            field: "duration_days",
        });
    }
    if !request.daily_contribution.is_finite() || request.daily_contribution <= 0.0 {
        return Err(InvalidTrial::InvalidRequest {
            field: "daily_contribution",
        });
    }
    if !request.annual_fee_rate.is_finite() || request.annual_fee_rate < 0.0 {
        return Err(InvalidTrial::InvalidRequest {
            field: "annual_fee_rate",
        });
    }
    if !request.leverage.is_finite() || request.leverage < 0.0 {
        return Err(InvalidTrial::InvalidRequest { field: "leverage" });
    }
    Ok(())
}
