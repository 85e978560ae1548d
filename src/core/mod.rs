mod engine;
mod export;
mod random;
mod stats;
mod types;

pub use engine::{
    build_report, monthly_moments, run_seeded_simulation, run_simulation, simulate_paths,
};
pub use export::{EXPORT_FILE_NAME, paths_to_csv, write_paths_csv};
pub use random::{UniformSource, standard_normal};
pub use stats::{
    HISTOGRAM_BINS, annual_returns, final_value_stats, final_values, histogram,
    monthly_percentiles, percentile,
};
pub use types::{
    AnnualReturnAnchor, AnnualReturnRecord, FinalValueStats, HistogramBin, MonthlySummary,
    PathMatrix, SimulationParameters, SimulationReport, SimulationResult,
};
