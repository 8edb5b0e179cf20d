//! Agricultural drought core crate.
//!
//! Current implemented scope:
//! - monthly observation ingest
//! - rolling/lag feature derivation with VCI and precipitation anomaly
//! - historical drought labels and the separate display risk score
//! - fixed-order model vector and classifier boundary
//! - processed-table output, summaries and the dashboard/predict routes

mod classifier;
mod dashboard;
mod features;
mod labeling;
mod observability;
mod observation;
mod pipeline;
mod summary;
#[cfg(test)]
mod test_support;
mod vector;

pub use classifier::{
    class_categories, ClassifierError, DroughtClassifier, LinearModelArtifact,
    LinearSoftmaxClassifier, Prediction, ThresholdClassifier, CLASS_COUNT,
};
pub use dashboard::{
    build_snapshot, dashboard_router, demo_observations, demo_snapshot, predict_manual,
    render_dashboard_html, DashboardRow, DashboardSnapshot, DashboardSnapshotSource,
    ErrorResponse, InMemorySnapshotSource, PredictResponse, DASHBOARD_HEADERS,
};
pub use features::{
    derive_features, median, precipitation_anomaly, DegenerateVciPolicy, FeatureConfig,
    FeatureError, FeatureReport, FeatureRow, OrderingPolicy, TemperatureFill, DEGENERATE_VCI,
    LONG_WINDOW_MONTHS, SHORT_WINDOW_MONTHS,
};
pub use labeling::{
    DisplayRiskPolicy, DroughtIndicators, DroughtLabel, HistoricalLabelPolicy, LabelError,
    LabelThresholds, RiskAssessment, RiskBand, RiskLevel, ALL_LABELS,
};
pub use observability::{
    init_logging, log_app_bind, log_app_start, log_classifier_selected, log_source_selected,
    logging_config_from_env, LogFormat, LoggingConfig, LoggingInitError,
};
pub use observation::{
    load_observations_csv, read_observations, Observation, ObservationError, Season, ALL_SEASONS,
};
pub use pipeline::{
    pipeline_config_from_env, process_series, run_pipeline, write_processed,
    write_processed_csv, PipelineConfig, PipelineError, ProcessedRecord, ProcessedRow,
    ProcessedSeries, PROCESSED_HEADERS,
};
pub use summary::{
    pearson, summarize, Correlation, DroughtSummary, LabelShare, SeasonBreakdown,
    CORRELATION_FEATURES,
};
pub use vector::{
    assert_schema_compatible, build_feature_schema, FeatureColumn, FeatureDType, FeatureSchema,
    FeatureVector, ManualInputs, VectorError, FEATURE_SCHEMA_VERSION, MODEL_FEATURE_COUNT,
    MODEL_FEATURE_NAMES,
};
