use axum::{
    Router,
    extract::{Json, Query},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::net::SocketAddr;
use std::path::PathBuf;
use tokio::net::TcpListener;

use crate::core::{
    AnnualReturnAnchor, AnnualReturnRecord, EXPORT_FILE_NAME, FinalValueStats, HistogramBin,
    MonthlySummary, PathMatrix, SimulationParameters, SimulationReport, SimulationResult,
    build_report, paths_to_csv, run_seeded_simulation, write_paths_csv,
};
use crate::{Error, Result};

const MAX_SIMULATIONS: u32 = 100_000;
const MAX_YEARS: u32 = 100;
const MAX_RATE: f64 = 10.0;

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CliAnnualReturnAnchor {
    YearOpen,
    PriorClose,
}

impl From<CliAnnualReturnAnchor> for AnnualReturnAnchor {
    fn from(value: CliAnnualReturnAnchor) -> Self {
        match value {
            CliAnnualReturnAnchor::YearOpen => AnnualReturnAnchor::YearOpen,
            CliAnnualReturnAnchor::PriorClose => AnnualReturnAnchor::PriorClose,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
enum ApiAnnualReturnAnchor {
    #[serde(alias = "yearOpen", alias = "year_open")]
    YearOpen,
    #[serde(alias = "priorClose", alias = "prior_close")]
    PriorClose,
}

impl From<ApiAnnualReturnAnchor> for CliAnnualReturnAnchor {
    fn from(value: ApiAnnualReturnAnchor) -> Self {
        match value {
            ApiAnnualReturnAnchor::YearOpen => CliAnnualReturnAnchor::YearOpen,
            ApiAnnualReturnAnchor::PriorClose => CliAnnualReturnAnchor::PriorClose,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct SimulatePayload {
    #[serde(alias = "nSimulations")]
    simulations: Option<u32>,
    years: Option<u32>,
    seed: Option<u64>,

    initial_investment: Option<f64>,
    monthly_contribution: Option<f64>,
    inflation_rate: Option<f64>,
    annual_return: Option<f64>,
    volatility: Option<f64>,

    annual_return_anchor: Option<ApiAnnualReturnAnchor>,
    include_paths: Option<bool>,
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "portfolio-mc",
    about = "Monte Carlo projection of a portfolio with monthly contributions"
)]
struct Cli {
    #[arg(long, default_value_t = 100, help = "Number of simulated paths")]
    simulations: u32,
    #[arg(long, default_value_t = 20, help = "Horizon in years")]
    years: u32,
    #[arg(long, default_value_t = 100_000.0)]
    initial_investment: f64,
    #[arg(long, default_value_t = 700.0, help = "Deposit added every month")]
    monthly_contribution: f64,
    #[arg(
        long,
        default_value_t = 0.02,
        help = "Annual growth of the monthly deposit as a fraction"
    )]
    inflation_rate: f64,
    #[arg(long, default_value_t = 0.075, help = "Expected annual return as a fraction")]
    annual_return: f64,
    #[arg(long, default_value_t = 0.15, help = "Annualized volatility as a fraction")]
    volatility: f64,
    #[arg(long, help = "Seed for a reproducible run; random when omitted")]
    seed: Option<u64>,
    #[arg(long, value_enum, default_value_t = CliAnnualReturnAnchor::YearOpen)]
    annual_return_anchor: CliAnnualReturnAnchor,
    #[arg(long, default_value_t = false, help = "Include raw paths in the JSON report")]
    include_paths: bool,
    #[arg(long, help = "Write the raw paths as CSV to this file")]
    csv_out: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug)]
struct ApiOptions {
    seed: Option<u64>,
    anchor: AnnualReturnAnchor,
    include_paths: bool,
}

#[derive(Debug)]
struct ApiRequest {
    params: SimulationParameters,
    options: ApiOptions,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SimulateResponse {
    seed: u64,
    simulations: u32,
    years: u32,
    months: usize,
    monthly: Vec<MonthlySummary>,
    annual_returns: Vec<AnnualReturnRecord>,
    final_values: FinalValueStats,
    histogram: Vec<HistogramBin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    paths: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

fn build_params(cli: &Cli) -> Result<SimulationParameters> {
    if cli.simulations == 0 {
        return Err(Error::invalid("--simulations", "must be > 0"));
    }
    if cli.simulations > MAX_SIMULATIONS {
        return Err(Error::invalid(
            "--simulations",
            format!("must be <= {MAX_SIMULATIONS}"),
        ));
    }

    if cli.years == 0 {
        return Err(Error::invalid("--years", "must be > 0"));
    }
    if cli.years > MAX_YEARS {
        return Err(Error::invalid("--years", format!("must be <= {MAX_YEARS}")));
    }

    if !cli.initial_investment.is_finite() || cli.initial_investment < 0.0 {
        return Err(Error::invalid("--initial-investment", "must be >= 0"));
    }

    if !cli.monthly_contribution.is_finite() {
        return Err(Error::invalid("--monthly-contribution", "must be finite"));
    }

    if !cli.inflation_rate.is_finite()
        || cli.inflation_rate <= -1.0
        || cli.inflation_rate > MAX_RATE
    {
        return Err(Error::invalid(
            "--inflation-rate",
            format!("must be > -1 and <= {MAX_RATE}"),
        ));
    }

    if !cli.annual_return.is_finite() || cli.annual_return <= -1.0 || cli.annual_return > MAX_RATE {
        return Err(Error::invalid(
            "--annual-return",
            format!("must be > -1 and <= {MAX_RATE}"),
        ));
    }

    if !cli.volatility.is_finite() || cli.volatility < 0.0 || cli.volatility > MAX_RATE {
        return Err(Error::invalid(
            "--volatility",
            format!("must be >= 0 and <= {MAX_RATE}"),
        ));
    }

    Ok(SimulationParameters {
        simulation_count: cli.simulations,
        years: cli.years,
        initial_investment: cli.initial_investment,
        monthly_contribution: cli.monthly_contribution,
        inflation_rate: cli.inflation_rate,
        annual_return: cli.annual_return,
        volatility: cli.volatility,
    })
}

fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

// Bounded rates can still overflow over long horizons or from huge balances.
fn ensure_finite_paths(paths: &PathMatrix) -> Result<()> {
    if paths.paths().iter().flatten().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Error::invalid(
            "parameters",
            "produce portfolio values outside the representable range",
        ))
    }
}

pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    let params = build_params(&cli)?;
    let options = ApiOptions {
        seed: cli.seed,
        anchor: cli.annual_return_anchor.into(),
        include_paths: cli.include_paths,
    };

    let seed = resolve_seed(options.seed);
    let result = run_seeded_simulation(&params, seed);
    ensure_finite_paths(&result.paths)?;
    let report = build_report(&params, &result, options.anchor);

    if let Some(path) = &cli.csv_out {
        let file = File::create(path)?;
        write_paths_csv(&result.paths, BufWriter::new(file))?;
        log::info!(
            "wrote {} paths x {} months to {}",
            result.paths.path_count(),
            result.paths.months(),
            path.display()
        );
    }

    let response = build_simulate_response(&params, seed, report, &result, options);
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

pub async fn run_http_server(port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = Router::new()
        .route(
            "/api/simulate",
            get(simulate_get_handler).post(simulate_post_handler),
        )
        .route(
            "/api/simulate.csv",
            get(export_get_handler).post(export_post_handler),
        )
        .fallback(not_found_handler);

    let listener = TcpListener::bind(addr).await?;
    log::info!("Monte Carlo HTTP API listening on http://{addr}");
    log::info!("Local access: http://127.0.0.1:{port}/api/simulate");

    axum::serve(listener, app).await
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn simulate_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn simulate_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    simulate_handler_impl(payload).await
}

async fn export_get_handler(Query(payload): Query<SimulatePayload>) -> Response {
    export_handler_impl(payload).await
}

async fn export_post_handler(Json(payload): Json<SimulatePayload>) -> Response {
    export_handler_impl(payload).await
}

async fn simulate_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return rejection(err),
    };

    let (seed, result) = match run_request(&request) {
        Ok(run) => run,
        Err(err) => return rejection(err),
    };
    let report = build_report(&request.params, &result, request.options.anchor);
    let response = build_simulate_response(&request.params, seed, report, &result, request.options);
    json_response(StatusCode::OK, response)
}

async fn export_handler_impl(payload: SimulatePayload) -> Response {
    let request = match api_request_from_payload(payload) {
        Ok(request) => request,
        Err(err) => return rejection(err),
    };

    let csv = run_request(&request).and_then(|(_, result)| paths_to_csv(&result.paths));
    match csv {
        Ok(csv) => with_cache_control((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{EXPORT_FILE_NAME}\""),
                ),
            ],
            csv,
        )),
        Err(err) => rejection(err),
    }
}

fn run_request(request: &ApiRequest) -> Result<(u64, SimulationResult)> {
    let seed = resolve_seed(request.options.seed);
    log::info!(
        "simulating {} paths over {} years (seed {seed})",
        request.params.simulation_count,
        request.params.years
    );
    let result = run_seeded_simulation(&request.params, seed);
    ensure_finite_paths(&result.paths)?;
    Ok((seed, result))
}

fn rejection(err: Error) -> Response {
    let status = match &err {
        Error::InvalidParameter { .. } | Error::EmptyExport => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    log::warn!("request failed with {status}: {err}");
    error_response(status, &err.to_string())
}

fn with_cache_control<R: IntoResponse>(response: R) -> Response {
    let mut response = response.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    with_cache_control((status, Json(body)))
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
fn api_request_from_json(json: &str) -> Result<ApiRequest> {
    let payload = serde_json::from_str::<SimulatePayload>(json)?;
    api_request_from_payload(payload)
}

fn api_request_from_payload(payload: SimulatePayload) -> Result<ApiRequest> {
    let mut cli = default_cli_for_api();

    if let Some(v) = payload.simulations {
        cli.simulations = v;
    }
    if let Some(v) = payload.years {
        cli.years = v;
    }
    if let Some(v) = payload.seed {
        cli.seed = Some(v);
    }
    if let Some(v) = payload.initial_investment {
        cli.initial_investment = v;
    }
    if let Some(v) = payload.monthly_contribution {
        cli.monthly_contribution = v;
    }
    if let Some(v) = payload.inflation_rate {
        cli.inflation_rate = v;
    }
    if let Some(v) = payload.annual_return {
        cli.annual_return = v;
    }
    if let Some(v) = payload.volatility {
        cli.volatility = v;
    }
    if let Some(v) = payload.annual_return_anchor {
        cli.annual_return_anchor = v.into();
    }
    if let Some(v) = payload.include_paths {
        cli.include_paths = v;
    }

    let params = build_params(&cli)?;
    let options = ApiOptions {
        seed: cli.seed,
        anchor: cli.annual_return_anchor.into(),
        include_paths: cli.include_paths,
    };
    Ok(ApiRequest { params, options })
}

fn default_cli_for_api() -> Cli {
    Cli {
        simulations: 100,
        years: 20,
        initial_investment: 100_000.0,
        monthly_contribution: 700.0,
        inflation_rate: 0.02,
        annual_return: 0.075,
        volatility: 0.15,
        seed: None,
        annual_return_anchor: CliAnnualReturnAnchor::YearOpen,
        include_paths: false,
        csv_out: None,
    }
}

fn build_simulate_response(
    params: &SimulationParameters,
    seed: u64,
    report: SimulationReport,
    result: &SimulationResult,
    options: ApiOptions,
) -> SimulateResponse {
    SimulateResponse {
        seed,
        simulations: params.simulation_count,
        years: params.years,
        months: params.months(),
        monthly: report.monthly,
        annual_returns: report.annual_returns,
        final_values: report.final_values,
        histogram: report.histogram,
        paths: options
            .include_paths
            .then(|| result.paths.paths().to_vec()),
    }
}
