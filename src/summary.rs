//! Descriptive statistics over a labelled series.

use serde::{Deserialize, Serialize};

use crate::labeling::{DroughtLabel, ALL_LABELS};
use crate::observation::{Season, ALL_SEASONS};
use crate::pipeline::ProcessedRow;

pub const CORRELATION_FEATURES: [&str; 6] = [
    "ndvi",
    "precipitation_mm",
    "temp_mean_c",
    "vci",
    "precip_3month",
    "drought_label",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelShare {
    pub label: DroughtLabel,
    pub category: String,
    pub months: u64,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeasonBreakdown {
    pub season: Season,
    pub months: u64,
    /// Percent of the season's months per label, in label order.
    pub label_percent: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub left: String,
    pub right: String,
    pub pearson: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DroughtSummary {
    pub total_months: u64,
    pub first_period: Option<String>,
    pub last_period: Option<String>,
    pub distribution: Vec<LabelShare>,
    pub by_season: Vec<SeasonBreakdown>,
    pub correlations: Vec<Correlation>,
}

pub fn summarize(rows: &[ProcessedRow]) -> DroughtSummary {
    let total = rows.len() as u64;

    let distribution = ALL_LABELS
        .iter()
        .map(|label| {
            let months = rows.iter().filter(|r| r.label == *label).count() as u64;
            LabelShare {
                label: *label,
                category: label.category().to_string(),
                months,
                percent: percent(months, total),
            }
        })
        .collect();

    let by_season = ALL_SEASONS
        .iter()
        .filter_map(|season| {
            let in_season: Vec<&ProcessedRow> =
                rows.iter().filter(|r| r.season == *season).collect();
            if in_season.is_empty() {
                return None;
            }
            let months = in_season.len() as u64;
            let label_percent = ALL_LABELS.map(|label| {
                let n = in_season.iter().filter(|r| r.label == label).count() as u64;
                percent(n, months)
            });
            Some(SeasonBreakdown {
                season: *season,
                months,
                label_percent,
            })
        })
        .collect();

    DroughtSummary {
        total_months: total,
        first_period: rows.first().map(|r| r.features.observation.date_label()),
        last_period: rows.last().map(|r| r.features.observation.date_label()),
        distribution,
        by_season,
        correlations: correlation_matrix(rows),
    }
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

fn feature_value(row: &ProcessedRow, name: &str) -> Option<f64> {
    let obs = &row.features.observation;
    match name {
        "ndvi" => Some(obs.ndvi),
        "precipitation_mm" => Some(obs.precipitation_mm),
        "temp_mean_c" => obs.temp_mean_c,
        "vci" => Some(row.features.vci),
        "precip_3month" => Some(row.features.precip_3month),
        "drought_label" => Some(row.label.index() as f64),
        _ => None,
    }
}

/// Upper triangle of pairwise correlations, skipping rows where either side
/// is missing.
fn correlation_matrix(rows: &[ProcessedRow]) -> Vec<Correlation> {
    let mut out = Vec::new();
    for (i, left) in CORRELATION_FEATURES.iter().enumerate() {
        for right in CORRELATION_FEATURES.iter().skip(i + 1) {
            let (xs, ys): (Vec<f64>, Vec<f64>) = rows
                .iter()
                .filter_map(|row| Some((feature_value(row, left)?, feature_value(row, right)?)))
                .unzip();
            out.push(Correlation {
                left: (*left).to_string(),
                right: (*right).to_string(),
                pearson: pearson(&xs, &ys),
            });
        }
    }
    out
}

/// Pearson correlation; `None` with fewer than two points or zero variance.
pub fn pearson(xs: &[f64], ys: &[f64]) -> Option<f64> {
    if xs.len() != ys.len() || xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (x, y) in xs.iter().zip(ys) {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some(cov / (var_x.sqrt() * var_y.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_detects_linear_relationships() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        let up = [2.0, 4.0, 6.0, 8.0];
        let down = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&xs, &up).expect("defined") - 1.0).abs() < 1e-12);
        assert!((pearson(&xs, &down).expect("defined") + 1.0).abs() < 1e-12);
        assert_eq!(pearson(&xs, &[1.0, 1.0, 1.0, 1.0]), None);
        assert_eq!(pearson(&[1.0], &[1.0]), None);
    }

    #[test]
    fn percent_of_empty_is_zero() {
        assert_eq!(percent(0, 0), 0.0);
        assert_eq!(percent(1, 4), 25.0);
    }
}
