//! Fixed-order model input vector and its schema fingerprint.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::info;

use crate::features::{FeatureRow, SHORT_WINDOW_MONTHS};
use crate::labeling::DroughtIndicators;

pub const FEATURE_SCHEMA_VERSION: u32 = 1;
pub const MODEL_FEATURE_COUNT: usize = 11;

pub const MODEL_FEATURE_NAMES: [&str; MODEL_FEATURE_COUNT] = [
    "ndvi",
    "precipitation_mm",
    "temp_mean_c",
    "precip_3month",
    "precip_6month",
    "ndvi_3month_avg",
    "precip_3month_avg",
    "vci",
    "precip_anomaly",
    "precip_lag1",
    "ndvi_lag1",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureDType {
    F64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub dtype: FeatureDType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub fingerprint: String,
    pub columns: Vec<FeatureColumn>,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum VectorError {
    #[error("model feature {0} is missing")]
    MissingField(&'static str),
    #[error("{field} = {value} is outside [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("schema version mismatch: expected {expected}, got {actual}")]
    SchemaVersionMismatch { expected: u32, actual: u32 },
    #[error("schema fingerprint mismatch: expected {expected}, got {actual}")]
    SchemaFingerprintMismatch { expected: String, actual: String },
}

pub fn build_feature_schema() -> FeatureSchema {
    let columns: Vec<FeatureColumn> = MODEL_FEATURE_NAMES
        .iter()
        .map(|name| FeatureColumn {
            name: (*name).to_string(),
            dtype: FeatureDType::F64,
        })
        .collect();
    let fingerprint = schema_fingerprint(FEATURE_SCHEMA_VERSION, &columns);

    info!(
        component = "vector",
        event = "vector.schema.built",
        version = FEATURE_SCHEMA_VERSION,
        column_count = columns.len(),
        fingerprint = fingerprint
    );

    FeatureSchema {
        version: FEATURE_SCHEMA_VERSION,
        fingerprint,
        columns,
    }
}

/// Checks a model artifact's recorded schema against the schema this crate
/// builds. The crate schema is the expected side of any mismatch.
pub fn assert_schema_compatible(
    expected: &FeatureSchema,
    actual_version: u32,
    actual_fingerprint: &str,
) -> Result<(), VectorError> {
    if actual_version != expected.version {
        return Err(VectorError::SchemaVersionMismatch {
            expected: expected.version,
            actual: actual_version,
        });
    }

    if actual_fingerprint != expected.fingerprint {
        return Err(VectorError::SchemaFingerprintMismatch {
            expected: expected.fingerprint.clone(),
            actual: actual_fingerprint.to_string(),
        });
    }

    Ok(())
}

fn schema_fingerprint(version: u32, columns: &[FeatureColumn]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("version:{version};"));
    hasher.update("columns:");
    for column in columns {
        hasher.update(column.name.as_bytes());
        hasher.update(":f64;");
    }
    hex::encode(hasher.finalize())
}

/// Model input in [`MODEL_FEATURE_NAMES`] order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    values: [f64; MODEL_FEATURE_COUNT],
}

impl FeatureVector {
    pub fn from_values(values: [f64; MODEL_FEATURE_COUNT]) -> Result<Self, VectorError> {
        for (idx, value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(VectorError::MissingField(MODEL_FEATURE_NAMES[idx]));
            }
        }
        Ok(Self { values })
    }

    /// Builds the vector from a derived row. The first row of a series has
    /// no lags and is rejected, as is a row with no mean temperature.
    pub fn from_row(row: &FeatureRow) -> Result<Self, VectorError> {
        let obs = &row.observation;
        Self::from_values([
            obs.ndvi,
            obs.precipitation_mm,
            obs.temp_mean_c
                .ok_or(VectorError::MissingField("temp_mean_c"))?,
            row.precip_3month,
            row.precip_6month,
            row.ndvi_3month_avg,
            row.precip_3month_avg,
            row.vci,
            row.precip_anomaly,
            row.precip_lag1
                .ok_or(VectorError::MissingField("precip_lag1"))?,
            row.ndvi_lag1.ok_or(VectorError::MissingField("ndvi_lag1"))?,
        ])
    }

    pub fn values(&self) -> &[f64; MODEL_FEATURE_COUNT] {
        &self.values
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        MODEL_FEATURE_NAMES
            .iter()
            .position(|candidate| *candidate == name)
            .map(|idx| self.values[idx])
    }

    pub fn indicators(&self) -> DroughtIndicators {
        DroughtIndicators {
            vci: self.get("vci"),
            ndvi: self.get("ndvi"),
            precipitation_mm: self.get("precipitation_mm"),
            precip_3month: self.get("precip_3month"),
        }
    }
}

/// Live values entered in the predictor, one per control.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualInputs {
    pub ndvi: f64,
    pub vci: f64,
    pub ndvi_3month_avg: f64,
    pub ndvi_lag1: f64,
    pub precipitation_mm: f64,
    pub precip_3month: f64,
    pub precip_6month: f64,
    pub precip_lag1: f64,
    pub precip_anomaly: f64,
    pub temp_mean_c: f64,
}

impl Default for ManualInputs {
    fn default() -> Self {
        Self {
            ndvi: 0.45,
            vci: 50.0,
            ndvi_3month_avg: 0.43,
            ndvi_lag1: 0.42,
            precipitation_mm: 50.0,
            precip_3month: 150.0,
            precip_6month: 400.0,
            precip_lag1: 40.0,
            precip_anomaly: 0.0,
            temp_mean_c: 27.0,
        }
    }
}

impl ManualInputs {
    fn ranges(&self) -> [(&'static str, f64, f64, f64); 10] {
        [
            ("ndvi", self.ndvi, 0.20, 0.70),
            ("vci", self.vci, 0.0, 100.0),
            ("ndvi_3month_avg", self.ndvi_3month_avg, 0.20, 0.70),
            ("ndvi_lag1", self.ndvi_lag1, 0.20, 0.70),
            ("precipitation_mm", self.precipitation_mm, 0.0, 500.0),
            ("precip_3month", self.precip_3month, 0.0, 1000.0),
            ("precip_6month", self.precip_6month, 0.0, 2000.0),
            ("precip_lag1", self.precip_lag1, 0.0, 500.0),
            ("precip_anomaly", self.precip_anomaly, -100.0, 150.0),
            ("temp_mean_c", self.temp_mean_c, 15.0, 40.0),
        ]
    }

    pub fn validate(&self) -> Result<(), VectorError> {
        for (field, value, min, max) in self.ranges() {
            if !value.is_finite() {
                return Err(VectorError::MissingField(field));
            }
            if value < min || value > max {
                return Err(VectorError::OutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// The 3-month average is not entered; it follows from the 3-month sum.
    pub fn precip_3month_avg(&self) -> f64 {
        self.precip_3month / SHORT_WINDOW_MONTHS as f64
    }

    pub fn to_vector(&self) -> Result<FeatureVector, VectorError> {
        self.validate()?;
        FeatureVector::from_values([
            self.ndvi,
            self.precipitation_mm,
            self.temp_mean_c,
            self.precip_3month,
            self.precip_6month,
            self.ndvi_3month_avg,
            self.precip_3month_avg(),
            self.vci,
            self.precip_anomaly,
            self.precip_lag1,
            self.ndvi_lag1,
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_is_deterministic_and_ordered() {
        let a = build_feature_schema();
        let b = build_feature_schema();
        assert_eq!(a, b);
        assert_eq!(a.columns.len(), MODEL_FEATURE_COUNT);
        assert_eq!(a.columns[0].name, "ndvi");
        assert_eq!(a.columns[7].name, "vci");
        assert_eq!(a.columns[10].name, "ndvi_lag1");
        assert_eq!(a.fingerprint.len(), 64);
    }

    #[test]
    fn schema_compatibility_checks_version_and_fingerprint() {
        let schema = build_feature_schema();
        assert_schema_compatible(&schema, FEATURE_SCHEMA_VERSION, &schema.fingerprint)
            .expect("compatible");

        let err = assert_schema_compatible(&schema, FEATURE_SCHEMA_VERSION + 1, &schema.fingerprint)
            .expect_err("version mismatch");
        assert!(matches!(err, VectorError::SchemaVersionMismatch { .. }));

        let err = assert_schema_compatible(&schema, FEATURE_SCHEMA_VERSION, "not-real")
            .expect_err("fingerprint mismatch");
        assert!(matches!(err, VectorError::SchemaFingerprintMismatch { .. }));
    }

    #[test]
    fn manual_defaults_build_vector_with_derived_average() {
        let vector = ManualInputs::default().to_vector().expect("defaults are valid");
        assert_eq!(vector.get("precip_3month_avg"), Some(50.0));
        assert_eq!(vector.get("temp_mean_c"), Some(27.0));
        assert_eq!(vector.values()[0], 0.45);
        assert_eq!(vector.get("unknown"), None);
    }

    #[test]
    fn manual_out_of_range_is_rejected() {
        let inputs = ManualInputs {
            vci: 120.0,
            ..ManualInputs::default()
        };
        let err = inputs.to_vector().expect_err("vci too high");
        assert!(matches!(err, VectorError::OutOfRange { field: "vci", .. }));
    }

    #[test]
    fn non_finite_value_counts_as_missing() {
        let mut values = [1.0; MODEL_FEATURE_COUNT];
        values[9] = f64::NAN;
        assert_eq!(
            FeatureVector::from_values(values),
            Err(VectorError::MissingField("precip_lag1"))
        );
    }
}
