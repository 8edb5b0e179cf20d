//! Monthly series to drought features: rolling aggregates, lags, VCI and
//! precipitation anomaly.

use std::collections::{BTreeMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::observation::Observation;

pub const SHORT_WINDOW_MONTHS: usize = 3;
pub const LONG_WINDOW_MONTHS: usize = 6;

/// VCI assigned to every row when the whole series has one NDVI value.
pub const DEGENERATE_VCI: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderingPolicy {
    Strict,
    SortAscending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DegenerateVciPolicy {
    Midpoint,
    Reject,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    pub ordering: OrderingPolicy,
    pub degenerate_vci: DegenerateVciPolicy,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            ordering: OrderingPolicy::Strict,
            degenerate_vci: DegenerateVciPolicy::Midpoint,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub observation: Observation,
    pub precip_3month: f64,
    pub precip_6month: f64,
    pub ndvi_3month_avg: f64,
    pub precip_3month_avg: f64,
    pub precip_lag1: Option<f64>,
    pub ndvi_lag1: Option<f64>,
    pub vci: f64,
    pub precip_anomaly: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureFill {
    pub field: String,
    pub filled: u64,
    pub median: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureReport {
    pub input_rows: u64,
    pub output_rows: u64,
    pub resorted: bool,
    pub ndvi_min: f64,
    pub ndvi_max: f64,
    pub degenerate_vci: bool,
    pub zero_mean_precip_months: Vec<u32>,
    pub temperature_fills: Vec<TemperatureFill>,
}

#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    #[error("observation series is empty")]
    EmptySeries,
    #[error("observations not ascending at index {index}: {previous} followed by {current}")]
    UnsortedInput {
        index: usize,
        previous: String,
        current: String,
    },
    #[error("duplicate observation for {year}-{month:02}")]
    DuplicateMonth { year: i32, month: u32 },
    #[error("NDVI range is degenerate: every value equals {value}")]
    DegenerateRange { value: f64 },
    #[error("non-finite {field} at {date}")]
    NonFiniteValue { field: &'static str, date: String },
    #[error("negative precipitation {value} at {date}")]
    NegativePrecipitation { date: String, value: f64 },
    #[error("invalid calendar month {month} in year {year}")]
    InvalidMonth { year: i32, month: u32 },
}

/// Trailing window with min-periods-1 semantics.
#[derive(Debug, Clone)]
struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
}

impl RollingWindow {
    fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    fn push(&mut self, value: f64) {
        self.values.push_back(value);
        while self.values.len() > self.capacity {
            self.values.pop_front();
        }
    }

    fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    fn mean(&self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        self.sum() / self.values.len() as f64
    }
}

#[derive(Debug, Clone)]
struct DeriveState {
    precip_short: RollingWindow,
    precip_long: RollingWindow,
    ndvi_short: RollingWindow,
    previous: Option<(f64, f64)>,
}

impl DeriveState {
    fn new() -> Self {
        Self {
            precip_short: RollingWindow::new(SHORT_WINDOW_MONTHS),
            precip_long: RollingWindow::new(LONG_WINDOW_MONTHS),
            ndvi_short: RollingWindow::new(SHORT_WINDOW_MONTHS),
            previous: None,
        }
    }
}

/// Derives one [`FeatureRow`] per observation.
///
/// The returned rows follow ascending date order. With
/// [`OrderingPolicy::SortAscending`] an unsorted input is sorted first;
/// otherwise it is rejected. Duplicate months are always rejected.
pub fn derive_features(
    observations: &[Observation],
    cfg: &FeatureConfig,
) -> Result<(Vec<FeatureRow>, FeatureReport), FeatureError> {
    if observations.is_empty() {
        return Err(FeatureError::EmptySeries);
    }

    info!(
        component = "features",
        event = "features.derive.start",
        input_rows = observations.len(),
        ordering = ?cfg.ordering,
        degenerate_vci = ?cfg.degenerate_vci
    );

    validate_values(observations)?;
    let (mut series, resorted) = ordered_series(observations, cfg.ordering)?;
    let temperature_fills = backfill_temperatures(&mut series);

    let (ndvi_min, ndvi_max) = ndvi_bounds(&series);
    let degenerate = ndvi_max == ndvi_min;
    if degenerate {
        match cfg.degenerate_vci {
            DegenerateVciPolicy::Reject => {
                return Err(FeatureError::DegenerateRange { value: ndvi_min })
            }
            DegenerateVciPolicy::Midpoint => warn!(
                component = "features",
                event = "features.derive.degenerate_vci",
                ndvi = ndvi_min,
                vci = DEGENERATE_VCI
            ),
        }
    }

    let monthly_means = monthly_mean_precipitation(&series);
    let zero_mean_precip_months: Vec<u32> = monthly_means
        .iter()
        .filter(|(_, mean)| **mean == 0.0)
        .map(|(month, _)| *month)
        .collect();
    if !zero_mean_precip_months.is_empty() {
        warn!(
            component = "features",
            event = "features.derive.zero_mean_precip",
            months = ?zero_mean_precip_months
        );
    }

    let mut state = DeriveState::new();
    let mut rows = Vec::with_capacity(series.len());
    for observation in series {
        state.precip_short.push(observation.precipitation_mm);
        state.precip_long.push(observation.precipitation_mm);
        state.ndvi_short.push(observation.ndvi);

        let vci = if degenerate {
            DEGENERATE_VCI
        } else {
            (observation.ndvi - ndvi_min) / (ndvi_max - ndvi_min) * 100.0
        };
        let monthly_mean = monthly_means
            .get(&observation.month)
            .copied()
            .unwrap_or_default();
        let precip_anomaly = precipitation_anomaly(observation.precipitation_mm, monthly_mean);
        let (precip_lag1, ndvi_lag1) = match state.previous {
            Some((precip, ndvi)) => (Some(precip), Some(ndvi)),
            None => (None, None),
        };
        state.previous = Some((observation.precipitation_mm, observation.ndvi));

        rows.push(FeatureRow {
            precip_3month: state.precip_short.sum(),
            precip_6month: state.precip_long.sum(),
            ndvi_3month_avg: state.ndvi_short.mean(),
            precip_3month_avg: state.precip_short.mean(),
            precip_lag1,
            ndvi_lag1,
            vci,
            precip_anomaly,
            observation,
        });
    }

    let report = FeatureReport {
        input_rows: observations.len() as u64,
        output_rows: rows.len() as u64,
        resorted,
        ndvi_min,
        ndvi_max,
        degenerate_vci: degenerate,
        zero_mean_precip_months,
        temperature_fills,
    };

    info!(
        component = "features",
        event = "features.derive.finish",
        input_rows = report.input_rows,
        output_rows = report.output_rows,
        resorted = report.resorted,
        ndvi_min = report.ndvi_min,
        ndvi_max = report.ndvi_max,
        degenerate_vci = report.degenerate_vci
    );

    Ok((rows, report))
}

/// Percent deviation from the calendar-month mean; a zero mean yields 0.
pub fn precipitation_anomaly(precipitation_mm: f64, monthly_mean: f64) -> f64 {
    if monthly_mean == 0.0 {
        return 0.0;
    }
    (precipitation_mm - monthly_mean) / monthly_mean * 100.0
}

/// Median with the two middle values averaged for even counts.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn validate_values(observations: &[Observation]) -> Result<(), FeatureError> {
    for observation in observations {
        if !(1..=12).contains(&observation.month) {
            return Err(FeatureError::InvalidMonth {
                year: observation.year,
                month: observation.month,
            });
        }
        if !observation.ndvi.is_finite() {
            return Err(FeatureError::NonFiniteValue {
                field: "ndvi",
                date: observation.date_label(),
            });
        }
        if !observation.precipitation_mm.is_finite() {
            return Err(FeatureError::NonFiniteValue {
                field: "precipitation_mm",
                date: observation.date_label(),
            });
        }
        if observation.precipitation_mm < 0.0 {
            return Err(FeatureError::NegativePrecipitation {
                date: observation.date_label(),
                value: observation.precipitation_mm,
            });
        }
    }
    Ok(())
}

fn ordered_series(
    observations: &[Observation],
    ordering: OrderingPolicy,
) -> Result<(Vec<Observation>, bool), FeatureError> {
    let mut seen = HashSet::new();
    for observation in observations {
        if !seen.insert(observation.period()) {
            return Err(FeatureError::DuplicateMonth {
                year: observation.year,
                month: observation.month,
            });
        }
    }

    let first_unsorted = observations
        .windows(2)
        .position(|pair| pair[0].period() > pair[1].period());

    match (first_unsorted, ordering) {
        (None, _) => Ok((observations.to_vec(), false)),
        (Some(idx), OrderingPolicy::Strict) => Err(FeatureError::UnsortedInput {
            index: idx + 1,
            previous: observations[idx].date_label(),
            current: observations[idx + 1].date_label(),
        }),
        (Some(idx), OrderingPolicy::SortAscending) => {
            warn!(
                component = "features",
                event = "features.derive.resorted",
                first_unsorted_index = idx + 1
            );
            let mut sorted = observations.to_vec();
            sorted.sort_by_key(Observation::period);
            Ok((sorted, true))
        }
    }
}

fn backfill_temperatures(series: &mut [Observation]) -> Vec<TemperatureFill> {
    let fields: [(&str, TemperatureSlot); 3] = [
        ("temp_mean_c", temp_mean_slot),
        ("temp_max_c", temp_max_slot),
        ("temp_min_c", temp_min_slot),
    ];

    let mut fills = Vec::with_capacity(fields.len());
    for (field, accessor) in fields {
        let present: Vec<f64> = series.iter_mut().filter_map(|o| *accessor(o)).collect();
        let fill_value = median(&present);
        let mut filled = 0_u64;
        if let Some(value) = fill_value {
            for observation in series.iter_mut() {
                let slot = accessor(observation);
                if slot.is_none() {
                    *slot = Some(value);
                    filled += 1;
                }
            }
        }
        if filled > 0 {
            info!(
                component = "features",
                event = "features.derive.temperature_backfill",
                field,
                filled,
                median = fill_value
            );
        }
        fills.push(TemperatureFill {
            field: field.to_string(),
            filled,
            median: fill_value,
        });
    }
    fills
}

type TemperatureSlot = fn(&mut Observation) -> &mut Option<f64>;

fn temp_mean_slot(observation: &mut Observation) -> &mut Option<f64> {
    &mut observation.temp_mean_c
}

fn temp_max_slot(observation: &mut Observation) -> &mut Option<f64> {
    &mut observation.temp_max_c
}

fn temp_min_slot(observation: &mut Observation) -> &mut Option<f64> {
    &mut observation.temp_min_c
}

fn ndvi_bounds(series: &[Observation]) -> (f64, f64) {
    series
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), o| {
            (lo.min(o.ndvi), hi.max(o.ndvi))
        })
}

fn monthly_mean_precipitation(series: &[Observation]) -> BTreeMap<u32, f64> {
    let mut sums: BTreeMap<u32, (f64, u32)> = BTreeMap::new();
    for observation in series {
        let entry = sums.entry(observation.month).or_insert((0.0, 0));
        entry.0 += observation.precipitation_mm;
        entry.1 += 1;
    }
    sums.into_iter()
        .map(|(month, (sum, count))| (month, sum / count as f64))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rolling_window_uses_available_history() {
        let mut window = RollingWindow::new(3);
        window.push(1.0);
        assert_eq!(window.sum(), 1.0);
        window.push(2.0);
        window.push(3.0);
        window.push(4.0);
        assert_eq!(window.sum(), 9.0);
        assert_eq!(window.mean(), 3.0);
    }

    #[test]
    fn median_handles_odd_and_even_counts() {
        assert_eq!(median(&[]), None);
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), Some(2.5));
    }

    #[test]
    fn anomaly_with_zero_mean_is_zero() {
        assert_eq!(precipitation_anomaly(0.0, 0.0), 0.0);
        assert_eq!(precipitation_anomaly(15.0, 10.0), 50.0);
        assert_eq!(precipitation_anomaly(5.0, 10.0), -50.0);
    }

    #[test]
    fn out_of_range_values_are_rejected_before_derivation() {
        let cfg = FeatureConfig::default();

        let bad_month = vec![
            Observation::new(2020, 1, 0.3, 10.0),
            Observation::new(2020, 13, 0.4, 10.0),
        ];
        assert_eq!(
            derive_features(&bad_month, &cfg),
            Err(FeatureError::InvalidMonth {
                year: 2020,
                month: 13
            })
        );

        let negative = vec![
            Observation::new(2020, 1, 0.3, 10.0),
            Observation::new(2020, 2, 0.4, -4.0),
        ];
        assert_eq!(
            derive_features(&negative, &cfg),
            Err(FeatureError::NegativePrecipitation {
                date: "2020-02".to_string(),
                value: -4.0
            })
        );

        let nan_ndvi = vec![Observation::new(2020, 1, f64::NAN, 10.0)];
        assert_eq!(
            derive_features(&nan_ndvi, &cfg),
            Err(FeatureError::NonFiniteValue {
                field: "ndvi",
                date: "2020-01".to_string()
            })
        );
    }

    #[test]
    fn monthly_means_group_by_calendar_month() {
        let series = vec![
            Observation::new(2020, 1, 0.3, 10.0),
            Observation::new(2020, 2, 0.3, 0.0),
            Observation::new(2021, 1, 0.3, 30.0),
            Observation::new(2021, 2, 0.3, 0.0),
        ];
        let means = monthly_mean_precipitation(&series);
        assert_eq!(means.get(&1), Some(&20.0));
        assert_eq!(means.get(&2), Some(&0.0));
    }
}
