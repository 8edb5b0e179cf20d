//! Derive, label and tabulate a full observation series.

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::features::{
    derive_features, DegenerateVciPolicy, FeatureConfig, FeatureError, FeatureReport, FeatureRow,
    OrderingPolicy,
};
use crate::labeling::{DroughtLabel, HistoricalLabelPolicy, LabelError};
use crate::observation::{load_observations_csv, Observation, ObservationError, Season};
use crate::summary::{summarize, DroughtSummary};

pub const PROCESSED_HEADERS: [&str; 19] = [
    "year",
    "month",
    "date",
    "ndvi",
    "precipitation_mm",
    "temp_mean_c",
    "temp_max_c",
    "temp_min_c",
    "precip_3month",
    "precip_6month",
    "ndvi_3month_avg",
    "precip_3month_avg",
    "precip_lag1",
    "ndvi_lag1",
    "vci",
    "precip_anomaly",
    "drought_label",
    "drought_category",
    "season",
];

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub features: FeatureConfig,
    pub label_policy: HistoricalLabelPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from("data/drought_dataset_2015_2024.csv"),
            output_path: PathBuf::from("data/drought_dataset_processed.csv"),
            features: FeatureConfig::default(),
            label_policy: HistoricalLabelPolicy::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Observation(#[from] ObservationError),
    #[error(transparent)]
    Feature(#[from] FeatureError),
    #[error("labeling {date} failed: {source}")]
    Label { date: String, source: LabelError },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRow {
    pub features: FeatureRow,
    pub label: DroughtLabel,
    pub season: Season,
}

/// Flat CSV shape of a [`ProcessedRow`]; field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub year: i32,
    pub month: u32,
    pub date: String,
    pub ndvi: f64,
    pub precipitation_mm: f64,
    pub temp_mean_c: Option<f64>,
    pub temp_max_c: Option<f64>,
    pub temp_min_c: Option<f64>,
    pub precip_3month: f64,
    pub precip_6month: f64,
    pub ndvi_3month_avg: f64,
    pub precip_3month_avg: f64,
    pub precip_lag1: Option<f64>,
    pub ndvi_lag1: Option<f64>,
    pub vci: f64,
    pub precip_anomaly: f64,
    pub drought_label: usize,
    pub drought_category: String,
    pub season: String,
}

impl From<&ProcessedRow> for ProcessedRecord {
    fn from(row: &ProcessedRow) -> Self {
        let f = &row.features;
        let obs = &f.observation;
        Self {
            year: obs.year,
            month: obs.month,
            date: obs.date_label(),
            ndvi: obs.ndvi,
            precipitation_mm: obs.precipitation_mm,
            temp_mean_c: obs.temp_mean_c,
            temp_max_c: obs.temp_max_c,
            temp_min_c: obs.temp_min_c,
            precip_3month: f.precip_3month,
            precip_6month: f.precip_6month,
            ndvi_3month_avg: f.ndvi_3month_avg,
            precip_3month_avg: f.precip_3month_avg,
            precip_lag1: f.precip_lag1,
            ndvi_lag1: f.ndvi_lag1,
            vci: f.vci,
            precip_anomaly: f.precip_anomaly,
            drought_label: row.label.index(),
            drought_category: row.label.category().to_string(),
            season: row.season.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedSeries {
    pub rows: Vec<ProcessedRow>,
    pub report: FeatureReport,
    pub summary: DroughtSummary,
}

pub fn process_series(
    observations: &[Observation],
    features_cfg: &FeatureConfig,
    policy: &HistoricalLabelPolicy,
) -> Result<ProcessedSeries, PipelineError> {
    let (feature_rows, report) = derive_features(observations, features_cfg)?;

    let mut rows = Vec::with_capacity(feature_rows.len());
    for features in feature_rows {
        let label = policy
            .label_row(&features)
            .map_err(|source| PipelineError::Label {
                date: features.observation.date_label(),
                source,
            })?;
        let season = features.observation.season()?;
        rows.push(ProcessedRow {
            features,
            label,
            season,
        });
    }

    let summary = summarize(&rows);

    info!(
        component = "pipeline",
        event = "pipeline.labels.assigned",
        rows = rows.len(),
        no_drought = summary.distribution[0].months,
        moderate = summary.distribution[1].months,
        severe = summary.distribution[2].months
    );

    Ok(ProcessedSeries {
        rows,
        report,
        summary,
    })
}

/// Loads the input table, processes it and writes the processed table.
pub fn run_pipeline(cfg: &PipelineConfig) -> Result<ProcessedSeries, PipelineError> {
    info!(
        component = "pipeline",
        event = "pipeline.start",
        input_path = %cfg.input_path.display(),
        output_path = %cfg.output_path.display()
    );

    let observations = load_observations_csv(&cfg.input_path)?;
    let processed = process_series(&observations, &cfg.features, &cfg.label_policy)?;
    write_processed_csv(&cfg.output_path, &processed.rows)?;

    info!(
        component = "pipeline",
        event = "pipeline.finish",
        rows = processed.rows.len(),
        output_path = %cfg.output_path.display()
    );

    Ok(processed)
}

pub fn write_processed_csv(path: &Path, rows: &[ProcessedRow]) -> Result<(), PipelineError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let file = fs::File::create(path)?;
    write_processed(file, rows)
}

pub fn write_processed<W: Write>(writer: W, rows: &[ProcessedRow]) -> Result<(), PipelineError> {
    let mut writer = csv::Writer::from_writer(writer);
    if rows.is_empty() {
        writer.write_record(PROCESSED_HEADERS)?;
    }
    for row in rows {
        writer.serialize(ProcessedRecord::from(row))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn pipeline_config_from_env() -> PipelineConfig {
    let mut config = PipelineConfig::default();

    if let Ok(path) = env::var("AGDROUGHT_INPUT_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            config.input_path = PathBuf::from(trimmed);
        }
    }

    if let Ok(path) = env::var("AGDROUGHT_OUTPUT_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            config.output_path = PathBuf::from(trimmed);
        }
    }

    if let Ok(raw) = env::var("AGDROUGHT_ORDERING") {
        if let Some(parsed) = parse_ordering(&raw) {
            config.features.ordering = parsed;
        }
    }

    if let Ok(raw) = env::var("AGDROUGHT_VCI_POLICY") {
        if let Some(parsed) = parse_vci_policy(&raw) {
            config.features.degenerate_vci = parsed;
        }
    }

    config
}

fn parse_ordering(raw: &str) -> Option<OrderingPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "strict" => Some(OrderingPolicy::Strict),
        "sort" | "sort_ascending" => Some(OrderingPolicy::SortAscending),
        _ => None,
    }
}

fn parse_vci_policy(raw: &str) -> Option<DegenerateVciPolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "midpoint" => Some(DegenerateVciPolicy::Midpoint),
        "reject" => Some(DegenerateVciPolicy::Reject),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::with_env_vars;

    #[test]
    fn defaults_when_env_missing() {
        let cfg = with_env_vars(
            &[
                ("AGDROUGHT_INPUT_PATH", None),
                ("AGDROUGHT_OUTPUT_PATH", None),
                ("AGDROUGHT_ORDERING", None),
                ("AGDROUGHT_VCI_POLICY", None),
            ],
            pipeline_config_from_env,
        );
        assert_eq!(cfg, PipelineConfig::default());
    }

    #[test]
    fn parses_paths_and_policies_from_env() {
        let cfg = with_env_vars(
            &[
                ("AGDROUGHT_INPUT_PATH", Some("in.csv")),
                ("AGDROUGHT_OUTPUT_PATH", Some("out/processed.csv")),
                ("AGDROUGHT_ORDERING", Some("sort")),
                ("AGDROUGHT_VCI_POLICY", Some("REJECT")),
            ],
            pipeline_config_from_env,
        );
        assert_eq!(cfg.input_path, PathBuf::from("in.csv"));
        assert_eq!(cfg.output_path, PathBuf::from("out/processed.csv"));
        assert_eq!(cfg.features.ordering, OrderingPolicy::SortAscending);
        assert_eq!(cfg.features.degenerate_vci, DegenerateVciPolicy::Reject);
    }

    #[test]
    fn invalid_policy_values_fall_back_to_defaults() {
        let cfg = with_env_vars(
            &[
                ("AGDROUGHT_INPUT_PATH", None),
                ("AGDROUGHT_OUTPUT_PATH", None),
                ("AGDROUGHT_ORDERING", Some("random")),
                ("AGDROUGHT_VCI_POLICY", Some("zero")),
            ],
            pipeline_config_from_env,
        );
        assert_eq!(cfg.features, FeatureConfig::default());
    }

    #[test]
    fn empty_output_still_has_headers() {
        let mut buf = Vec::new();
        write_processed(&mut buf, &[]).expect("write");
        let text = String::from_utf8(buf).expect("utf8");
        assert_eq!(text.trim_end(), PROCESSED_HEADERS.join(","));
    }
}
