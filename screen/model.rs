use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the human-readable TOML format of the persisted
// classifier and scaler artifacts.

/// The only artifact layout this build understands.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

fn default_format_version() -> u32 {
    ARTIFACT_FORMAT_VERSION
}

/// Custom error type for model loading, saving, and evaluation.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write artifact file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML artifact file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize artifact to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("{component} expects {expected} features, but the feature vector has {found}.")]
    ArityMismatch {
        component: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{component} is malformed: {reason}")]
    Malformed {
        component: &'static str,
        reason: String,
    },
    #[error("{0} produced a non-finite value.")]
    NonFiniteOutput(&'static str),
}

/// Anything that can estimate the probability of the positive class for one
/// aligned, scaled feature vector.
pub trait Classifier: Send + Sync {
    fn positive_probability(&self, features: ArrayView1<f64>) -> Result<f64, ModelError>;

    /// Number of features the classifier was fitted on, if it records it.
    fn n_features(&self) -> Option<usize> {
        None
    }
}

/// A deterministic numeric transform with the same arity in and out.
pub trait Scaler: Send + Sync {
    fn transform(&self, features: ArrayView1<f64>) -> Result<Array1<f64>, ModelError>;

    fn n_features(&self) -> Option<usize> {
        None
    }
}

/// A fitted binary logistic regression:
/// `P(y = 1 | x) = sigmoid(intercept + coefficients · x)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    /// Names the coefficients were fitted against, when the exporter kept them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
}

impl LogisticModel {
    pub fn new(intercept: f64, coefficients: Vec<f64>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            intercept,
            coefficients,
            feature_names: None,
        }
    }

    /// Linear predictor `intercept + coefficients · x`.
    pub fn decision_function(&self, features: ArrayView1<f64>) -> Result<f64, ModelError> {
        if features.len() != self.coefficients.len() {
            return Err(ModelError::ArityMismatch {
                component: "classifier",
                expected: self.coefficients.len(),
                found: features.len(),
            });
        }
        let weights = ArrayView1::from(self.coefficients.as_slice());
        Ok(self.intercept + weights.dot(&features))
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        save_toml(self, path)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let model = toml::from_str(&toml_string)?;
        Ok(model)
    }
}

impl Classifier for LogisticModel {
    fn positive_probability(&self, features: ArrayView1<f64>) -> Result<f64, ModelError> {
        let eta = self.decision_function(features)?;
        if !eta.is_finite() {
            return Err(ModelError::NonFiniteOutput("classifier"));
        }
        // Clamp eta to keep exp() finite.
        let eta = eta.clamp(-700.0, 700.0);
        Ok(1.0 / (1.0 + f64::exp(-eta)))
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.coefficients.len())
    }
}

/// A fitted per-feature affine transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum ScalerParams {
    /// Standardisation: `(x - mean) / scale`. A zero scale leaves the centred value as is.
    Standard { mean: Vec<f64>, scale: Vec<f64> },
    /// Range scaling: `x * scale + min`.
    MinMax { min: Vec<f64>, scale: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedScaler {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(flatten)]
    pub params: ScalerParams,
}

impl FittedScaler {
    pub fn standard(mean: Vec<f64>, scale: Vec<f64>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            params: ScalerParams::Standard { mean, scale },
        }
    }

    pub fn min_max(min: Vec<f64>, scale: Vec<f64>) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            params: ScalerParams::MinMax { min, scale },
        }
    }

    pub fn method(&self) -> &'static str {
        match self.params {
            ScalerParams::Standard { .. } => "standard",
            ScalerParams::MinMax { .. } => "min_max",
        }
    }

    /// Checks that both parameter vectors have the same length.
    pub fn validate(&self) -> Result<(), ModelError> {
        let (first, second) = self.param_slices();
        if first.len() != second.len() {
            return Err(ModelError::Malformed {
                component: "scaler",
                reason: format!(
                    "{} parameter vectors have different lengths ({} and {})",
                    self.method(),
                    first.len(),
                    second.len()
                ),
            });
        }
        Ok(())
    }

    fn param_slices(&self) -> (&[f64], &[f64]) {
        match &self.params {
            ScalerParams::Standard { mean, scale } => (mean, scale),
            ScalerParams::MinMax { min, scale } => (min, scale),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        save_toml(self, path)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let toml_string = fs::read_to_string(path)?;
        let scaler: Self = toml::from_str(&toml_string)?;
        scaler.validate()?;
        Ok(scaler)
    }
}

impl Scaler for FittedScaler {
    fn transform(&self, features: ArrayView1<f64>) -> Result<Array1<f64>, ModelError> {
        self.validate()?;
        let (offset, scale) = self.param_slices();
        if features.len() != offset.len() {
            return Err(ModelError::ArityMismatch {
                component: "scaler",
                expected: offset.len(),
                found: features.len(),
            });
        }
        let offset = ArrayView1::from(offset);
        let scale = ArrayView1::from(scale);

        let scaled = match self.params {
            ScalerParams::Standard { .. } => {
                let safe_scale = scale.mapv(|s| if s == 0.0 { 1.0 } else { s });
                (&features - &offset) / &safe_scale
            }
            ScalerParams::MinMax { .. } => &features * &scale + &offset,
        };

        if scaled.iter().any(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteOutput("scaler"));
        }
        Ok(scaled)
    }

    fn n_features(&self) -> Option<usize> {
        Some(self.param_slices().0.len())
    }
}

fn save_toml<T: Serialize>(artifact: &T, path: &Path) -> Result<(), ModelError> {
    let toml_string = toml::to_string_pretty(artifact)?;
    let mut file = BufWriter::new(fs::File::create(path)?);
    file.write_all(toml_string.as_bytes())?;
    file.flush()?;
    Ok(())
}
