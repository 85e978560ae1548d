use super::types::{
    AnnualReturnAnchor, AnnualReturnRecord, FinalValueStats, HistogramBin, MonthlySummary,
    PathMatrix,
};

pub const HISTOGRAM_BINS: usize = 20;

const LOW_BAND: f64 = 0.10;
const MEDIAN: f64 = 0.50;
const HIGH_BAND: f64 = 0.90;

pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }

    let rank = (sorted.len() - 1) as f64 * p.clamp(0.0, 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    sorted[lower] + (sorted[upper] - sorted[lower]) * (rank - lower as f64)
}

fn sort_ascending(values: &mut [f64]) {
    values.sort_by(|a, b| a.total_cmp(b));
}

pub fn monthly_percentiles(paths: &PathMatrix) -> Vec<MonthlySummary> {
    if paths.path_count() == 0 {
        return Vec::new();
    }

    (0..paths.months())
        .map(|idx| {
            let mut values = paths.month_values(idx);
            sort_ascending(&mut values);
            MonthlySummary {
                month: idx as u32 + 1,
                p10: percentile(&values, LOW_BAND),
                p50: percentile(&values, MEDIAN),
                p90: percentile(&values, HIGH_BAND),
            }
        })
        .collect()
}

// A missing month, a zero median and NaN all fall through to the caller's fallback.
fn usable_median(monthly: &[MonthlySummary], idx: usize) -> Option<f64> {
    monthly
        .get(idx)
        .map(|row| row.p50)
        .filter(|v| *v != 0.0 && !v.is_nan())
}

pub fn annual_returns(
    monthly: &[MonthlySummary],
    years: u32,
    initial_investment: f64,
    anchor: AnnualReturnAnchor,
) -> Vec<AnnualReturnRecord> {
    (1..=years)
        .map(|year| {
            let first_idx = (year as usize - 1) * 12;
            let last_idx = year as usize * 12 - 1;
            let start_med = match anchor {
                AnnualReturnAnchor::YearOpen => usable_median(monthly, first_idx),
                AnnualReturnAnchor::PriorClose => first_idx
                    .checked_sub(1)
                    .and_then(|idx| usable_median(monthly, idx)),
            }
            .unwrap_or(initial_investment);
            let end_med = usable_median(monthly, last_idx).unwrap_or(start_med);

            let return_percent = if start_med == 0.0 {
                0.0
            } else {
                (end_med / start_med - 1.0) * 100.0
            };
            AnnualReturnRecord {
                year,
                return_percent,
            }
        })
        .collect()
}

pub fn final_values(paths: &PathMatrix, fallback: f64) -> Vec<f64> {
    paths
        .paths()
        .iter()
        .map(|path| path.last().copied().unwrap_or(fallback))
        .collect()
}

pub fn final_value_stats(values: &[f64], fallback: f64) -> FinalValueStats {
    if values.is_empty() {
        return FinalValueStats {
            mean: fallback,
            p10: fallback,
            p90: fallback,
            min: fallback,
            max: fallback,
        };
    }

    let mut sorted = values.to_vec();
    sort_ascending(&mut sorted);
    FinalValueStats {
        mean: sorted.iter().sum::<f64>() / sorted.len() as f64,
        p10: percentile(&sorted, LOW_BAND),
        p90: percentile(&sorted, HIGH_BAND),
        min: sorted[0],
        max: sorted[sorted.len() - 1],
    }
}

pub fn histogram(values: &[f64]) -> Vec<HistogramBin> {
    let Some((min, max)) = value_range(values) else {
        return Vec::new();
    };

    let width = (max - min) / HISTOGRAM_BINS as f64;
    let mut counts = [0_u32; HISTOGRAM_BINS];
    for &value in values.iter().filter(|v| !v.is_nan()) {
        counts[bin_index(value, min, width)] += 1;
    }

    counts
        .iter()
        .enumerate()
        .map(|(idx, &count)| {
            let lower = min + idx as f64 * width;
            let upper = min + (idx + 1) as f64 * width;
            HistogramBin {
                range_label: format!("{}-{}", round_half_up(lower), round_half_up(upper)),
                lower,
                upper,
                count,
            }
        })
        .collect()
}

fn value_range(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .fold(None, |range, v| match range {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn bin_index(value: f64, min: f64, width: f64) -> usize {
    // Zero width means every value equals min.
    if !width.is_finite() || width <= 0.0 {
        return 0;
    }
    let raw = ((value - min) / width).floor();
    if raw <= 0.0 {
        0
    } else {
        (raw as usize).min(HISTOGRAM_BINS - 1)
    }
}

// Halves go toward +inf. Adding 0.5 first would round 0.49999999999999994 up.
fn round_half_up(value: f64) -> i64 {
    let floor = value.floor();
    let rounded = if value - floor >= 0.5 { floor + 1.0 } else { floor };
    rounded as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::collection::vec;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn summary(p50s: &[f64]) -> Vec<MonthlySummary> {
        p50s.iter()
            .enumerate()
            .map(|(idx, &p50)| MonthlySummary {
                month: idx as u32 + 1,
                p10: p50,
                p50,
                p90: p50,
            })
            .collect()
    }

    fn matrix(rows: Vec<Vec<f64>>) -> PathMatrix {
        let months = rows.first().map_or(0, Vec::len);
        let mut matrix = PathMatrix::with_capacity(rows.len(), months);
        for row in rows {
            matrix.push_path(row);
        }
        matrix
    }

    #[test]
    fn percentile_of_odd_length_median_is_middle_element() {
        let sorted = [1.0, 4.0, 9.0, 16.0, 25.0];
        assert_eq!(percentile(&sorted, 0.5), 9.0);
    }

    #[test]
    fn percentile_extremes_are_first_and_last() {
        let sorted = [-3.0, 0.5, 2.0, 8.0];
        assert_eq!(percentile(&sorted, 0.0), -3.0);
        assert_eq!(percentile(&sorted, 1.0), 8.0);
    }

    #[test]
    fn percentile_interpolates_between_ranks() {
        // rank = 3 * 0.1 = 0.3
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert_approx(percentile(&sorted, 0.1), 13.0);
        // rank = 3 * 0.9 = 2.7
        assert_approx(percentile(&sorted, 0.9), 37.0);
        assert_approx(percentile(&sorted, 0.5), 25.0);
    }

    #[test]
    fn percentile_of_single_value_and_empty_slice() {
        assert_eq!(percentile(&[42.0], 0.9), 42.0);
        assert_eq!(percentile(&[], 0.5), 0.0);
    }

    #[test]
    fn monthly_percentiles_sort_each_month_independently() {
        let paths = matrix(vec![
            vec![1.0, 30.0],
            vec![3.0, 10.0],
            vec![2.0, 20.0],
        ]);
        let rows = monthly_percentiles(&paths);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].month, 1);
        assert_approx(rows[0].p10, 1.2);
        assert_approx(rows[0].p50, 2.0);
        assert_approx(rows[0].p90, 2.8);
        assert_eq!(rows[1].month, 2);
        assert_approx(rows[1].p10, 12.0);
        assert_approx(rows[1].p50, 20.0);
        assert_approx(rows[1].p90, 28.0);
    }

    #[test]
    fn annual_returns_measure_from_first_to_last_month_of_each_year() {
        let mut p50s = vec![100.0; 24];
        p50s[11] = 110.0;
        p50s[12] = 110.0;
        p50s[23] = 99.0;
        let records = annual_returns(&summary(&p50s), 2, 100.0, AnnualReturnAnchor::YearOpen);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].year, 1);
        assert_approx(records[0].return_percent, 10.0);
        assert_eq!(records[1].year, 2);
        assert_approx(records[1].return_percent, -10.0);
    }

    #[test]
    fn annual_returns_from_prior_close_use_initial_investment_for_year_one() {
        let mut p50s = vec![105.0; 24];
        p50s[11] = 120.0;
        p50s[23] = 150.0;
        let records = annual_returns(&summary(&p50s), 2, 100.0, AnnualReturnAnchor::PriorClose);

        assert_approx(records[0].return_percent, 20.0);
        assert_approx(records[1].return_percent, 25.0);
    }

    #[test]
    fn annual_returns_fall_back_when_medians_are_missing_or_zero() {
        let records = annual_returns(&[], 2, 500.0, AnnualReturnAnchor::YearOpen);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.return_percent == 0.0));

        let mut p50s = vec![200.0; 12];
        p50s[0] = 0.0;
        let records = annual_returns(&summary(&p50s), 1, 100.0, AnnualReturnAnchor::YearOpen);
        assert_approx(records[0].return_percent, 100.0);

        let records = annual_returns(&[], 1, 0.0, AnnualReturnAnchor::YearOpen);
        assert_eq!(records[0].return_percent, 0.0);
    }

    #[test]
    fn final_values_fall_back_for_empty_paths() {
        let paths = matrix(vec![vec![], vec![]]);
        assert_eq!(final_values(&paths, 250.0), vec![250.0, 250.0]);

        let paths = matrix(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        assert_eq!(final_values(&paths, 250.0), vec![2.0, 4.0]);
    }

    #[test]
    fn final_value_stats_summarize_distribution() {
        let stats = final_value_stats(&[50.0, 10.0, 40.0, 20.0, 30.0], 0.0);
        assert_approx(stats.mean, 30.0);
        assert_approx(stats.p10, 14.0);
        assert_approx(stats.p90, 46.0);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 50.0);

        let empty = final_value_stats(&[], 1_000.0);
        assert_eq!(empty.mean, 1_000.0);
        assert_eq!(empty.p10, 1_000.0);
        assert_eq!(empty.p90, 1_000.0);
    }

    #[test]
    fn histogram_uses_twenty_equal_bins_and_clamps_maximum() {
        let values: Vec<f64> = (0..=100).map(f64::from).collect();
        let bins = histogram(&values);

        assert_eq!(bins.len(), HISTOGRAM_BINS);
        assert_eq!(bins[0].range_label, "0-5");
        assert_eq!(bins[19].range_label, "95-100");
        assert_eq!(bins[0].count, 5);
        // 95..=99 plus the maximum, which would otherwise index bin 20.
        assert_eq!(bins[19].count, 6);
        assert_eq!(bins.iter().map(|b| b.count).sum::<u32>(), 101);
    }

    #[test]
    fn histogram_with_zero_width_puts_everything_in_first_bin() {
        let bins = histogram(&[7.25; 9]);
        assert_eq!(bins.len(), HISTOGRAM_BINS);
        assert_eq!(bins[0].count, 9);
        assert!(bins[1..].iter().all(|b| b.count == 0));
        assert_eq!(bins[0].range_label, "7-7");
    }

    #[test]
    fn histogram_labels_round_halves_upward() {
        let bins = histogram(&[-10.5, 9.5]);
        // width = 1.0
        assert_eq!(bins[0].range_label, "-10--9");
        assert_eq!(bins[10].range_label, "0-1");
        assert_eq!(bins[19].range_label, "9-10");
    }

    #[test]
    fn round_half_up_only_moves_exact_halves_upward() {
        assert_eq!(round_half_up(0.499_999_999_999_999_94), 0);
        assert_eq!(round_half_up(2.5), 3);
        assert_eq!(round_half_up(-2.5), -2);
        assert_eq!(round_half_up(-0.5), 0);
        assert_eq!(round_half_up(-2.6), -3);
    }

    #[test]
    fn histogram_of_nothing_is_empty() {
        assert!(histogram(&[]).is_empty());
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_histogram_counts_sum_to_input_length(
            values in vec(-1.0e7_f64..1.0e7, 1..200),
        ) {
            let bins = histogram(&values);
            prop_assert_eq!(bins.len(), HISTOGRAM_BINS);
            prop_assert_eq!(bins.iter().map(|b| b.count as usize).sum::<usize>(), values.len());
        }

        #[test]
        fn prop_percentile_is_bounded_and_monotone(
            mut values in vec(-1.0e6_f64..1.0e6, 1..100),
            p in 0.0_f64..=1.0,
            q in 0.0_f64..=1.0,
        ) {
            values.sort_by(|a, b| a.total_cmp(b));
            let lo = p.min(q);
            let hi = p.max(q);
            let at_lo = percentile(&values, lo);
            let at_hi = percentile(&values, hi);
            prop_assert!(at_lo >= values[0] - 1e-6);
            prop_assert!(at_hi <= values[values.len() - 1] + 1e-6);
            prop_assert!(at_lo <= at_hi + 1e-6);
        }
    }
}
