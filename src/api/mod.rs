use axum::{
    Router,
    extract::{Json, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

use crate::core::{
    DistributionRow, PriceSeries, ResultsTable, RiskTable, RunStats, SimulationError,
    SummaryTable, TrialResult, distribution, run_simulations, summarize,
};

mod args;

pub use args::{Cli, Command, SimulationArgs, build_config};

#[derive(Clone)]
struct AppState {
    prices: Arc<PriceSeries>,
    defaults: Arc<SimulationArgs>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    simulations: Option<u32>,
    min_years: Option<u32>,
    max_years: Option<u32>,
    monthly_contribution: Option<f64>,
    trading_days_per_month: Option<f64>,
    unleveraged_fee: Option<f64>,
    leveraged_fee: Option<f64>,
    unleveraged_leverage: Option<f64>,
    leverage: Option<f64>,
    seed: Option<u64>,
    include_results: Option<bool>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    price_count: usize,
    first_date: Option<NaiveDate>,
    last_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    first_date: Option<NaiveDate>,
    last_date: Option<NaiveDate>,
    price_count: usize,
    stats: Vec<RunStats>,
    summary: SummaryTable,
    risk: RiskTable,
    distribution: Vec<DistributionRow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<Vec<TrialResult>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

/// Serves `/health` and `/api/simulate` over the loaded price history.
///
/// `defaults` are the CLI-level parameters; request payloads override them field by field.
pub async fn run_http_server(
    prices: PriceSeries,
    defaults: SimulationArgs,
    port: u16,
) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(AppState {
        prices: Arc::new(prices),
        defaults: Arc::new(defaults),
    });

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "simulation HTTP API listening");
    info!("local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(state)
}

async fn health_handler(State(state): State<AppState>) -> Response {
    json_response(
        StatusCode::OK,
        HealthResponse {
            status: "ok",
            price_count: state.prices.len(),
            first_date: state.prices.first_date(),
            last_date: state.prices.last_date(),
        },
    )
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(
    State(state): State<AppState>,
    Query(payload): Query<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_post_handler(
    State(state): State<AppState>,
    Json(payload): Json<SimulatePayload>,
) -> Response {
    simulate_handler_impl(state, payload).await
}

async fn simulate_handler_impl(state: AppState, payload: SimulatePayload) -> Response {
    let include_results = payload.include_results.unwrap_or(false);
    let args = args_from_payload(&state.defaults, payload);
    let config = match build_config(&args) {
        Ok(config) => config,
        Err(msg) => return error_response(StatusCode::BAD_REQUEST, &msg),
    };
    debug!(
        trials = config.trials,
        min_days = config.min_duration_days,
        max_days = config.max_duration_days,
        seed = config.seed,
        "simulate request accepted"
    );

    let prices = Arc::clone(&state.prices);
    let outcome = tokio::task::spawn_blocking(move || {
        run_simulations(&prices, &config)
            .map(|results| build_simulate_response(&prices, &results, include_results))
    })
    .await;

    match outcome {
        Ok(Ok(response)) => json_response(StatusCode::OK, response),
        Ok(Err(err)) => {
            warn!(%err, "simulate request rejected");
            error_response(status_for(&err), &err.to_string())
        }
        Err(err) => {
            error!(%err, "simulation task failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "simulation task failed")
        }
    }
}

fn status_for(err: &SimulationError) -> StatusCode {
    match err {
        SimulationError::Configuration { .. } => StatusCode::BAD_REQUEST,
        SimulationError::Data { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}

#[cfg(test)]
fn args_from_json(defaults: &SimulationArgs, json: &str) -> Result<SimulationArgs, String> {
    let payload = serde_json::from_str::<SimulatePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(args_from_payload(defaults, payload))
}

fn args_from_payload(defaults: &SimulationArgs, payload: SimulatePayload) -> SimulationArgs {
    let mut args = defaults.clone();

    if let Some(v) = payload.simulations {
        args.simulations = v;
    }
    if let Some(v) = payload.min_years {
        args.min_years = v;
    }
    if let Some(v) = payload.max_years {
        args.max_years = v;
    }
    if let Some(v) = payload.monthly_contribution {
        args.monthly_contribution = v;
    }
    if let Some(v) = payload.trading_days_per_month {
        args.trading_days_per_month = v;
    }
    if let Some(v) = payload.unleveraged_fee {
        args.unleveraged_fee = v;
    }
    if let Some(v) = payload.leveraged_fee {
        args.leveraged_fee = v;
    }
    if let Some(v) = payload.unleveraged_leverage {
        args.unleveraged_leverage = v;
    }
    if let Some(v) = payload.leverage {
        args.leverage = v;
    }
    if let Some(v) = payload.seed {
        args.seed = v;
    }

    args
}

fn build_simulate_response(
    prices: &PriceSeries,
    results: &ResultsTable,
    include_results: bool,
) -> SimulateResponse {
    let (summary, risk) = summarize(results);
    SimulateResponse {
        first_date: prices.first_date(),
        last_date: prices.last_date(),
        price_count: prices.len(),
        stats: results.stats().to_vec(),
        summary,
        risk,
        distribution: distribution(results),
        results: include_results.then(|| results.rows().to_vec()),
    }
}
