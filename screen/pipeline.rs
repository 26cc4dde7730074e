//! # Scoring Pipeline
//!
//! One patient record in, one screening result out:
//!
//! 1. encode the record against the canonical feature list ([`crate::encode`]),
//! 2. apply the persisted scaler,
//! 3. ask the classifier for the probability of the positive class,
//! 4. compare that probability with the decision threshold.
//!
//! [`score`] is a pure function of its arguments. [`ScreeningContext`] owns the
//! artifact bundle loaded at start-up and is the request handler front ends
//! call: it picks the classifier and threshold for the configured
//! [`ScreeningMode`] and delegates to [`score`].

use crate::artifacts::ArtifactBundle;
use crate::config::{ConfigError, ScreenConfig, check_threshold};
use crate::encode::encode;
use crate::model::{Classifier, LogisticModel, ModelError, Scaler};
use crate::record::PatientRecord;
use crate::types::CanonicalFeatures;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Threshold of the default, high-sensitivity screen.
pub const HIGH_SENSITIVITY_THRESHOLD: f64 = 0.3;
/// Threshold used with the default (unbalanced) classifier.
pub const STANDARD_THRESHOLD: f64 = 0.5;

#[derive(Error, Debug)]
pub enum ScoringError {
    #[error(
        "The artifacts have no feature for the '{field}' attribute. They were trained on a different schema than the one collected here."
    )]
    SchemaMismatch { field: String },
    #[error("A scoring artifact could not produce a result: {0}")]
    ArtifactUnavailable(#[from] ModelError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskDecision {
    ScreenPositive,
    ScreenNegative,
}

impl RiskDecision {
    /// Screen-positive at or above the threshold.
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability >= threshold {
            RiskDecision::ScreenPositive
        } else {
            RiskDecision::ScreenNegative
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RiskDecision::ScreenPositive => "screen-positive",
            RiskDecision::ScreenNegative => "screen-negative",
        }
    }
}

impl fmt::Display for RiskDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of scoring one record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Screening {
    pub probability: f64,
    pub decision: RiskDecision,
    pub threshold: f64,
}

/// Which classifier/threshold pair answers a prediction request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScreeningMode {
    /// Rebalanced classifier with a low threshold, favouring sensitivity.
    #[default]
    HighSensitivity,
    /// Default classifier at an even threshold.
    Standard,
}

impl ScreeningMode {
    pub fn default_threshold(self) -> f64 {
        match self {
            ScreeningMode::HighSensitivity => HIGH_SENSITIVITY_THRESHOLD,
            ScreeningMode::Standard => STANDARD_THRESHOLD,
        }
    }
}

impl fmt::Display for ScreeningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScreeningMode::HighSensitivity => "high-sensitivity",
            ScreeningMode::Standard => "standard",
        })
    }
}

/// Scores one record.
///
/// The classifier, scaler and feature list are only borrowed. Any failure is
/// returned as is; there is no partial result.
pub fn score(
    record: &PatientRecord,
    classifier: &dyn Classifier,
    scaler: &dyn Scaler,
    canonical_features: &CanonicalFeatures,
    threshold: f64,
) -> Result<Screening, ScoringError> {
    let features = encode(record, canonical_features)?;
    let scaled = scaler.transform(features.as_view())?;
    let probability = classifier.positive_probability(scaled.view())?;
    if !(0.0..=1.0).contains(&probability) {
        return Err(ModelError::NonFiniteOutput("classifier").into());
    }
    let decision = RiskDecision::from_probability(probability, threshold);
    debug!("Scored record: probability {probability:.6}, {decision} at threshold {threshold}");
    Ok(Screening {
        probability,
        decision,
        threshold,
    })
}

/// The loaded artifacts plus the screening policy, built once per process.
#[derive(Debug, Clone)]
pub struct ScreeningContext {
    bundle: ArtifactBundle,
    mode: ScreeningMode,
    threshold: f64,
}

impl ScreeningContext {
    pub fn new(
        bundle: ArtifactBundle,
        mode: ScreeningMode,
        threshold: f64,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            bundle,
            mode,
            threshold: check_threshold(threshold)?,
        })
    }

    pub fn from_config(bundle: ArtifactBundle, config: &ScreenConfig) -> Result<Self, ConfigError> {
        Self::new(bundle, config.screening.mode, config.threshold())
    }

    pub fn bundle(&self) -> &ArtifactBundle {
        &self.bundle
    }

    pub fn mode(&self) -> ScreeningMode {
        self.mode
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn classifier(&self) -> &LogisticModel {
        match self.mode {
            ScreeningMode::HighSensitivity => &self.bundle.balanced_classifier,
            ScreeningMode::Standard => &self.bundle.default_classifier,
        }
    }

    /// Handles one prediction request.
    pub fn predict(&self, record: &PatientRecord) -> Result<Screening, ScoringError> {
        score(
            record,
            self.classifier(),
            &self.bundle.scaler,
            &self.bundle.features,
            self.threshold,
        )
    }

    /// Scores many records in parallel against the shared bundle. Fails as a
    /// whole on the first error.
    pub fn predict_batch(&self, records: &[PatientRecord]) -> Result<Vec<Screening>, ScoringError> {
        records.par_iter().map(|record| self.predict(record)).collect()
    }
}
