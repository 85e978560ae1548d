use serde::Serialize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum AnnualReturnAnchor {
    #[default]
    YearOpen,
    // Year 1 starts from the initial investment.
    PriorClose,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParameters {
    pub simulation_count: u32,
    pub years: u32,
    pub initial_investment: f64,
    pub monthly_contribution: f64,
    pub inflation_rate: f64,
    pub annual_return: f64,
    pub volatility: f64,
}

impl SimulationParameters {
    pub fn months(&self) -> usize {
        self.years as usize * 12
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PathMatrix {
    months: usize,
    rows: Vec<Vec<f64>>,
}

impl PathMatrix {
    pub(crate) fn with_capacity(paths: usize, months: usize) -> Self {
        Self {
            months,
            rows: Vec::with_capacity(paths),
        }
    }

    pub(crate) fn push_path(&mut self, path: Vec<f64>) {
        debug_assert_eq!(path.len(), self.months);
        self.rows.push(path);
    }

    pub fn months(&self) -> usize {
        self.months
    }

    pub fn path_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn paths(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn month_values(&self, month_index: usize) -> Vec<f64> {
        self.rows
            .iter()
            .filter_map(|row| row.get(month_index).copied())
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlySummary {
    pub month: u32,
    pub p10: f64,
    pub p50: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnualReturnRecord {
    pub year: u32,
    pub return_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistogramBin {
    pub range_label: String,
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalValueStats {
    pub mean: f64,
    pub p10: f64,
    pub p90: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
pub struct SimulationResult {
    pub monthly: Vec<MonthlySummary>,
    pub paths: PathMatrix,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationReport {
    pub monthly: Vec<MonthlySummary>,
    pub annual_returns: Vec<AnnualReturnRecord>,
    pub final_values: FinalValueStats,
    pub histogram: Vec<HistogramBin>,
}
