use std::collections::BTreeMap;

use super::types::{
    DistributionRow, ResultsTable, RiskRow, RiskTable, Strategy, SummaryRow, SummaryTable,
    TrialResult,
};

type GroupKey = (u32, Strategy);

fn group_rows(results: &ResultsTable) -> BTreeMap<GroupKey, Vec<&TrialResult>> {
    let mut groups: BTreeMap<GroupKey, Vec<&TrialResult>> = BTreeMap::new();
    for row in results.rows() {
        groups
            .entry((row.duration_years(), row.strategy))
            .or_default()
            .push(row);
    }
    groups
}

/// Reduces a results table to one summary row and one risk row per (year bucket, strategy).
///
/// Rows come out ordered by year bucket, then strategy. An empty table gives empty output.
pub fn summarize(results: &ResultsTable) -> (SummaryTable, RiskTable) {
    let groups = group_rows(results);
    let mut summary = Vec::with_capacity(groups.len());
    let mut risk = Vec::with_capacity(groups.len());

    for ((duration_years, strategy), rows) in groups {
        let n = rows.len() as f64;
        let mut end_values = rows.iter().map(|r| r.end_value).collect::<Vec<_>>();
        let positive = rows.iter().filter(|r| r.total_return > 0.0).count();
        let negative = rows.iter().filter(|r| r.total_return < 0.0).count();

        summary.push(SummaryRow {
            duration_years,
            strategy,
            trials: rows.len(),
            mean_end_value: end_values.iter().sum::<f64>() / n,
            median_end_value: percentile(&mut end_values, 50.0),
            min_end_value: end_values.iter().copied().fold(f64::INFINITY, f64::min),
            max_end_value: end_values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            mean_invested_amount: rows.iter().map(|r| r.total_invested).sum::<f64>() / n,
            mean_fee: rows.iter().map(|r| r.total_fee).sum::<f64>() / n,
            positive_return_percentage: positive as f64 / n * 100.0,
        });
        risk.push(RiskRow {
            duration_years,
            strategy,
            negative_return_percentage: negative as f64 / n * 100.0,
        });
    }

    (SummaryTable { rows: summary }, RiskTable { rows: risk })
}

/// Box-plot quantiles of end value per (year bucket, strategy).
pub fn distribution(results: &ResultsTable) -> Vec<DistributionRow> {
    group_rows(results)
        .into_iter()
        .map(|((duration_years, strategy), rows)| {
            let mut values = rows.iter().map(|r| r.end_value).collect::<Vec<_>>();
            DistributionRow {
                duration_years,
                strategy,
                p10_end_value: percentile(&mut values, 10.0),
                p25_end_value: percentile(&mut values, 25.0),
                p50_end_value: percentile(&mut values, 50.0),
                p75_end_value: percentile(&mut values, 75.0),
                p90_end_value: percentile(&mut values, 90.0),
            }
        })
        .collect()
}

fn percentile(values: &mut [f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }

    values.sort_by(|a, b| a.total_cmp(b));

    let n = values.len();
    if n == 1 {
        return values[0];
    }

    let rank = (p / 100.0) * (n as f64 - 1.0);
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        values[lower]
    } else {
        let w = rank - lower as f64;
        values[lower] * (1.0 - w) + values[upper] * w
    }
}
