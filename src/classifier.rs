//! Classifier capability boundary.
//!
//! The crate never trains a model. A classifier is anything that maps a
//! [`FeatureVector`] to a class index and a probability vector over the three
//! drought classes.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::labeling::{DroughtLabel, HistoricalLabelPolicy, LabelError, ALL_LABELS};
use crate::vector::{
    assert_schema_compatible, build_feature_schema, FeatureVector, VectorError,
    MODEL_FEATURE_COUNT,
};

pub const CLASS_COUNT: usize = 3;
const PROBABILITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("model artifact is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("model artifact is incompatible: {0}")]
    Schema(#[from] VectorError),
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("labeling failed: {0}")]
    Label(#[from] LabelError),
    #[error("class index {0} is out of range")]
    InvalidClass(usize),
    #[error("invalid probability vector {probabilities:?}: {reason}")]
    InvalidProbabilities {
        probabilities: [f64; CLASS_COUNT],
        reason: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    class: DroughtLabel,
    probabilities: [f64; CLASS_COUNT],
}

impl Prediction {
    pub fn new(
        class_index: usize,
        probabilities: [f64; CLASS_COUNT],
    ) -> Result<Self, ClassifierError> {
        let class =
            DroughtLabel::from_index(class_index).ok_or(ClassifierError::InvalidClass(class_index))?;
        if probabilities.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(ClassifierError::InvalidProbabilities {
                probabilities,
                reason: "entries must be finite and non-negative",
            });
        }
        let total: f64 = probabilities.iter().sum();
        if (total - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(ClassifierError::InvalidProbabilities {
                probabilities,
                reason: "entries must sum to 1",
            });
        }
        Ok(Self {
            class,
            probabilities,
        })
    }

    /// Picks the most probable class; ties go to the lower index.
    pub fn from_probabilities(probabilities: [f64; CLASS_COUNT]) -> Result<Self, ClassifierError> {
        let mut best = 0;
        for (idx, p) in probabilities.iter().enumerate().skip(1) {
            if *p > probabilities[best] {
                best = idx;
            }
        }
        Self::new(best, probabilities)
    }

    pub fn one_hot(label: DroughtLabel) -> Self {
        let mut probabilities = [0.0; CLASS_COUNT];
        probabilities[label.index()] = 1.0;
        Self {
            class: label,
            probabilities,
        }
    }

    pub fn class(&self) -> DroughtLabel {
        self.class
    }

    pub fn class_index(&self) -> usize {
        self.class.index()
    }

    pub fn probabilities(&self) -> &[f64; CLASS_COUNT] {
        &self.probabilities
    }

    pub fn confidence(&self) -> f64 {
        self.probabilities[self.class.index()]
    }
}

pub trait DroughtClassifier: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError>;
}

/// Applies the historical labeling rules to the vector and reports the
/// result with full confidence.
#[derive(Debug, Clone, Default)]
pub struct ThresholdClassifier {
    policy: HistoricalLabelPolicy,
}

impl ThresholdClassifier {
    pub fn new(policy: HistoricalLabelPolicy) -> Self {
        Self { policy }
    }
}

impl DroughtClassifier for ThresholdClassifier {
    fn name(&self) -> &str {
        "threshold"
    }

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        let label = self.policy.label(&features.indicators())?;
        Ok(Prediction::one_hot(label))
    }
}

/// Exported weights of a multinomial linear model over standardised inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModelArtifact {
    pub schema_version: u32,
    pub schema_fingerprint: String,
    pub feature_mean: Vec<f64>,
    pub feature_scale: Vec<f64>,
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct LinearSoftmaxClassifier {
    artifact: LinearModelArtifact,
}

impl LinearSoftmaxClassifier {
    pub fn from_artifact(artifact: LinearModelArtifact) -> Result<Self, ClassifierError> {
        let schema = build_feature_schema();
        assert_schema_compatible(
            &schema,
            artifact.schema_version,
            &artifact.schema_fingerprint,
        )?;

        if artifact.feature_mean.len() != MODEL_FEATURE_COUNT
            || artifact.feature_scale.len() != MODEL_FEATURE_COUNT
        {
            return Err(ClassifierError::InvalidArtifact(format!(
                "standardisation vectors must have {MODEL_FEATURE_COUNT} entries"
            )));
        }
        if artifact.feature_scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(ClassifierError::InvalidArtifact(
                "feature_scale entries must be finite and non-zero".to_string(),
            ));
        }
        if artifact.bias.len() != CLASS_COUNT
            || artifact.weights.len() != CLASS_COUNT
            || artifact
                .weights
                .iter()
                .any(|row| row.len() != MODEL_FEATURE_COUNT)
        {
            return Err(ClassifierError::InvalidArtifact(format!(
                "weights must be {CLASS_COUNT}x{MODEL_FEATURE_COUNT} with {CLASS_COUNT} biases"
            )));
        }

        Ok(Self { artifact })
    }

    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let raw = fs::read_to_string(path)?;
        let artifact: LinearModelArtifact = serde_json::from_str(&raw)?;
        let classifier = Self::from_artifact(artifact)?;

        info!(
            component = "classifier",
            event = "classifier.artifact.loaded",
            path = %path.display(),
            schema_version = classifier.artifact.schema_version
        );

        Ok(classifier)
    }

    pub fn artifact(&self) -> &LinearModelArtifact {
        &self.artifact
    }
}

impl DroughtClassifier for LinearSoftmaxClassifier {
    fn name(&self) -> &str {
        "linear_softmax"
    }

    fn predict(&self, features: &FeatureVector) -> Result<Prediction, ClassifierError> {
        let a = &self.artifact;
        let scaled: Vec<f64> = features
            .values()
            .iter()
            .zip(a.feature_mean.iter().zip(&a.feature_scale))
            .map(|(x, (mean, scale))| (x - mean) / scale)
            .collect();

        let mut logits = [0.0; CLASS_COUNT];
        for (class, logit) in logits.iter_mut().enumerate() {
            *logit = a.bias[class]
                + a.weights[class]
                    .iter()
                    .zip(&scaled)
                    .map(|(w, x)| w * x)
                    .sum::<f64>();
        }

        Prediction::from_probabilities(softmax(logits))
    }
}

fn softmax(logits: [f64; CLASS_COUNT]) -> [f64; CLASS_COUNT] {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut out = logits.map(|l| (l - max).exp());
    let total: f64 = out.iter().sum();
    for p in &mut out {
        *p /= total;
    }
    out
}

/// Category names in class-index order.
pub fn class_categories() -> [&'static str; CLASS_COUNT] {
    ALL_LABELS.map(DroughtLabel::category)
}
