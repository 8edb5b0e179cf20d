//! Drought classification rules.
//!
//! Two independent policies live here:
//! - [`HistoricalLabelPolicy`] builds the three-class training labels.
//! - [`DisplayRiskPolicy`] scores the auxiliary risk hint shown next to a
//!   live prediction.
//!
//! They use different thresholds and can disagree on the same row.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DroughtLabel {
    NoDrought = 0,
    Moderate = 1,
    Severe = 2,
}

pub const ALL_LABELS: [DroughtLabel; 3] = [
    DroughtLabel::NoDrought,
    DroughtLabel::Moderate,
    DroughtLabel::Severe,
];

impl DroughtLabel {
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        ALL_LABELS.get(index).copied()
    }

    pub fn category(self) -> &'static str {
        match self {
            Self::NoDrought => "No Drought",
            Self::Moderate => "Moderate Drought",
            Self::Severe => "Severe Drought",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LabelError {
    #[error("required field {0} is missing")]
    MissingField(&'static str),
}

/// Labeling inputs. Any field may be absent on partially populated records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DroughtIndicators {
    pub vci: Option<f64>,
    pub ndvi: Option<f64>,
    pub precipitation_mm: Option<f64>,
    pub precip_3month: Option<f64>,
}

impl DroughtIndicators {
    fn require(value: Option<f64>, field: &'static str) -> Result<f64, LabelError> {
        value
            .filter(|v| v.is_finite())
            .ok_or(LabelError::MissingField(field))
    }

    fn vci(&self) -> Result<f64, LabelError> {
        Self::require(self.vci, "vci")
    }

    fn ndvi(&self) -> Result<f64, LabelError> {
        Self::require(self.ndvi, "ndvi")
    }

    fn precipitation_mm(&self) -> Result<f64, LabelError> {
        Self::require(self.precipitation_mm, "precipitation_mm")
    }

    fn precip_3month(&self) -> Result<f64, LabelError> {
        Self::require(self.precip_3month, "precip_3month")
    }
}

impl From<&FeatureRow> for DroughtIndicators {
    fn from(row: &FeatureRow) -> Self {
        Self {
            vci: Some(row.vci),
            ndvi: Some(row.observation.ndvi),
            precipitation_mm: Some(row.observation.precipitation_mm),
            precip_3month: Some(row.precip_3month),
        }
    }
}

/// One severity tier. A row matches when any criterion holds; the
/// precipitation criterion needs both the monthly and 3-month totals low.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LabelThresholds {
    pub vci_below: f64,
    pub precip_below: f64,
    pub precip_3month_below: f64,
    pub ndvi_below: f64,
}

impl LabelThresholds {
    fn matches(&self, vci: f64, ndvi: f64, precip: f64, precip_3month: f64) -> bool {
        vci < self.vci_below
            || (precip < self.precip_below && precip_3month < self.precip_3month_below)
            || ndvi < self.ndvi_below
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoricalLabelPolicy {
    pub severe: LabelThresholds,
    pub moderate: LabelThresholds,
}

impl Default for HistoricalLabelPolicy {
    fn default() -> Self {
        Self {
            severe: LabelThresholds {
                vci_below: 25.0,
                precip_below: 15.0,
                precip_3month_below: 50.0,
                ndvi_below: 0.27,
            },
            moderate: LabelThresholds {
                vci_below: 40.0,
                precip_below: 30.0,
                precip_3month_below: 100.0,
                ndvi_below: 0.35,
            },
        }
    }
}

impl HistoricalLabelPolicy {
    /// Severe is checked before Moderate; the first matching tier wins.
    pub fn label(&self, indicators: &DroughtIndicators) -> Result<DroughtLabel, LabelError> {
        let vci = indicators.vci()?;
        let ndvi = indicators.ndvi()?;
        let precip = indicators.precipitation_mm()?;
        let precip_3month = indicators.precip_3month()?;

        if self.severe.matches(vci, ndvi, precip, precip_3month) {
            Ok(DroughtLabel::Severe)
        } else if self.moderate.matches(vci, ndvi, precip, precip_3month) {
            Ok(DroughtLabel::Moderate)
        } else {
            Ok(DroughtLabel::NoDrought)
        }
    }

    pub fn label_row(&self, row: &FeatureRow) -> Result<DroughtLabel, LabelError> {
        self.label(&DroughtIndicators::from(row))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low Risk",
            Self::Medium => "Medium Risk",
            Self::High => "High Risk",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub score: u32,
    pub level: RiskLevel,
}

/// Two-step band: values under `severe_below` score `severe_points`, values
/// under `elevated_below` score `elevated_points`, anything else zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskBand {
    pub severe_below: f64,
    pub elevated_below: f64,
    pub severe_points: u32,
    pub elevated_points: u32,
}

impl RiskBand {
    const fn standard(severe_below: f64, elevated_below: f64) -> Self {
        Self {
            severe_below,
            elevated_below,
            severe_points: 3,
            elevated_points: 2,
        }
    }

    fn points(&self, value: f64) -> u32 {
        if value < self.severe_below {
            self.severe_points
        } else if value < self.elevated_below {
            self.elevated_points
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayRiskPolicy {
    pub vci: RiskBand,
    pub ndvi: RiskBand,
    pub precip_3month: RiskBand,
    pub low_max_score: u32,
    pub medium_max_score: u32,
}

impl Default for DisplayRiskPolicy {
    fn default() -> Self {
        Self {
            vci: RiskBand::standard(35.0, 50.0),
            ndvi: RiskBand::standard(0.35, 0.45),
            precip_3month: RiskBand::standard(100.0, 200.0),
            low_max_score: 3,
            medium_max_score: 6,
        }
    }
}

impl DisplayRiskPolicy {
    pub fn score(&self, indicators: &DroughtIndicators) -> Result<u32, LabelError> {
        let vci = indicators.vci()?;
        let ndvi = indicators.ndvi()?;
        let precip_3month = indicators.precip_3month()?;

        Ok(self.vci.points(vci)
            + self.ndvi.points(ndvi)
            + self.precip_3month.points(precip_3month))
    }

    pub fn level_for_score(&self, score: u32) -> RiskLevel {
        if score <= self.low_max_score {
            RiskLevel::Low
        } else if score <= self.medium_max_score {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }

    pub fn assess(&self, indicators: &DroughtIndicators) -> Result<RiskAssessment, LabelError> {
        let score = self.score(indicators)?;
        Ok(RiskAssessment {
            score,
            level: self.level_for_score(score),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indicators(vci: f64, ndvi: f64, precip: f64, precip_3month: f64) -> DroughtIndicators {
        DroughtIndicators {
            vci: Some(vci),
            ndvi: Some(ndvi),
            precipitation_mm: Some(precip),
            precip_3month: Some(precip_3month),
        }
    }

    #[test]
    fn label_indices_and_categories_are_stable() {
        assert_eq!(DroughtLabel::NoDrought.index(), 0);
        assert_eq!(DroughtLabel::Moderate.index(), 1);
        assert_eq!(DroughtLabel::Severe.index(), 2);
        assert_eq!(DroughtLabel::from_index(2), Some(DroughtLabel::Severe));
        assert_eq!(DroughtLabel::from_index(3), None);
        assert_eq!(DroughtLabel::Moderate.category(), "Moderate Drought");
    }

    #[test]
    fn severe_tier_criteria() {
        let policy = HistoricalLabelPolicy::default();
        assert_eq!(
            policy.label(&indicators(24.9, 0.5, 100.0, 300.0)),
            Ok(DroughtLabel::Severe)
        );
        assert_eq!(
            policy.label(&indicators(80.0, 0.5, 14.0, 49.0)),
            Ok(DroughtLabel::Severe)
        );
        assert_eq!(
            policy.label(&indicators(80.0, 0.26, 100.0, 300.0)),
            Ok(DroughtLabel::Severe)
        );
    }

    #[test]
    fn precipitation_criterion_needs_both_totals_low() {
        let policy = HistoricalLabelPolicy::default();
        // Dry month after a wet quarter: only the moderate pair matches.
        assert_eq!(
            policy.label(&indicators(80.0, 0.5, 10.0, 90.0)),
            Ok(DroughtLabel::Moderate)
        );
        assert_eq!(
            policy.label(&indicators(80.0, 0.5, 10.0, 150.0)),
            Ok(DroughtLabel::NoDrought)
        );
    }

    #[test]
    fn thresholds_are_strict_inequalities() {
        let policy = HistoricalLabelPolicy::default();
        assert_eq!(
            policy.label(&indicators(25.0, 0.5, 100.0, 300.0)),
            Ok(DroughtLabel::Moderate)
        );
        assert_eq!(
            policy.label(&indicators(40.0, 0.35, 30.0, 100.0)),
            Ok(DroughtLabel::NoDrought)
        );
    }

    #[test]
    fn missing_and_nan_fields_are_errors() {
        let policy = HistoricalLabelPolicy::default();
        let mut partial = indicators(50.0, 0.5, 40.0, 120.0);
        partial.precip_3month = None;
        assert_eq!(
            policy.label(&partial),
            Err(LabelError::MissingField("precip_3month"))
        );

        let nan_vci = indicators(f64::NAN, 0.5, 40.0, 120.0);
        assert_eq!(
            policy.label(&nan_vci),
            Err(LabelError::MissingField("vci"))
        );
    }

    #[test]
    fn risk_score_bands_and_levels() {
        let policy = DisplayRiskPolicy::default();
        assert_eq!(policy.score(&indicators(60.0, 0.5, 0.0, 250.0)), Ok(0));
        assert_eq!(policy.score(&indicators(40.0, 0.40, 0.0, 150.0)), Ok(6));
        assert_eq!(policy.score(&indicators(10.0, 0.30, 0.0, 50.0)), Ok(9));

        assert_eq!(policy.level_for_score(3), RiskLevel::Low);
        assert_eq!(policy.level_for_score(4), RiskLevel::Medium);
        assert_eq!(policy.level_for_score(6), RiskLevel::Medium);
        assert_eq!(policy.level_for_score(7), RiskLevel::High);
    }

    #[test]
    fn risk_ignores_monthly_precipitation() {
        let policy = DisplayRiskPolicy::default();
        let mut row = indicators(60.0, 0.5, 0.0, 250.0);
        row.precipitation_mm = None;
        let assessment = policy.assess(&row).expect("monthly precip not required");
        assert_eq!(assessment.level, RiskLevel::Low);
    }
}
