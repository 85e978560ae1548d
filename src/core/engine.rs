use rand::SeedableRng;
use rand::rngs::StdRng;

use super::random::{UniformSource, standard_normal};
use super::stats::{
    annual_returns, final_value_stats, final_values, histogram, monthly_percentiles,
};
use super::types::{
    AnnualReturnAnchor, PathMatrix, SimulationParameters, SimulationReport, SimulationResult,
};

pub fn monthly_moments(params: &SimulationParameters) -> (f64, f64) {
    let mean = (1.0 + params.annual_return).powf(1.0 / 12.0) - 1.0;
    let std_dev = params.volatility / 12.0_f64.sqrt();
    (mean, std_dev)
}

pub fn simulate_paths<U: UniformSource + ?Sized>(
    params: &SimulationParameters,
    source: &mut U,
) -> PathMatrix {
    let months = params.months();
    let (mean, std_dev) = monthly_moments(params);
    let mut matrix = PathMatrix::with_capacity(params.simulation_count as usize, months);

    for _ in 0..params.simulation_count {
        matrix.push_path(simulate_path(params, months, mean, std_dev, &mut *source));
    }

    matrix
}

fn simulate_path<U: UniformSource + ?Sized>(
    params: &SimulationParameters,
    months: usize,
    mean: f64,
    std_dev: f64,
    source: &mut U,
) -> Vec<f64> {
    let mut value = params.initial_investment;
    let mut contribution = params.monthly_contribution;
    let mut path = Vec::with_capacity(months);

    for month in 1..=months {
        if month % 12 == 1 && month > 1 {
            contribution *= 1.0 + params.inflation_rate;
        }
        let realized = mean + std_dev * standard_normal(&mut *source);
        value = value * (1.0 + realized) + contribution;
        path.push(value);
    }

    path
}

pub fn run_simulation<U: UniformSource + ?Sized>(
    params: &SimulationParameters,
    source: &mut U,
) -> SimulationResult {
    let paths = simulate_paths(params, source);
    let monthly = monthly_percentiles(&paths);
    log::debug!(
        "simulated {} paths over {} months",
        paths.path_count(),
        paths.months()
    );
    SimulationResult { monthly, paths }
}

pub fn run_seeded_simulation(params: &SimulationParameters, seed: u64) -> SimulationResult {
    let mut rng = StdRng::seed_from_u64(seed);
    run_simulation(params, &mut rng)
}

pub fn build_report(
    params: &SimulationParameters,
    result: &SimulationResult,
    anchor: AnnualReturnAnchor,
) -> SimulationReport {
    let finals = final_values(&result.paths, params.initial_investment);
    SimulationReport {
        monthly: result.monthly.clone(),
        annual_returns: annual_returns(
            &result.monthly,
            params.years,
            params.initial_investment,
            anchor,
        ),
        final_values: final_value_stats(&finals, params.initial_investment),
        histogram: histogram(&finals),
    }
}
