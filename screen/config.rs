//! Runtime configuration: where the artifacts live and how to screen.
//!
//! Every field has a default, so an empty or absent configuration file yields
//! the stock high-sensitivity screen over `./artifacts`. Command-line flags are
//! applied on top by the binary.

use crate::pipeline::ScreeningMode;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse configuration file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("The decision threshold must lie in [0, 1], but {0} was configured.")]
    ThresholdOutOfRange(f64),
}

/// File locations of the four artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
    pub default_model: String,
    pub balanced_model: String,
    pub scaler: String,
    pub features: String,
    /// Check classifier and scaler arity against the feature list at load time.
    pub validate_schema: bool,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("artifacts"),
            default_model: "diabetes_model.toml".to_string(),
            balanced_model: "diabetes_model_balanced.toml".to_string(),
            scaler: "scaler.toml".to_string(),
            features: "features.toml".to_string(),
            validate_schema: true,
        }
    }
}

impl ArtifactPaths {
    pub fn default_model_path(&self) -> PathBuf {
        self.dir.join(&self.default_model)
    }

    pub fn balanced_model_path(&self) -> PathBuf {
        self.dir.join(&self.balanced_model)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(&self.scaler)
    }

    pub fn features_path(&self) -> PathBuf {
        self.dir.join(&self.features)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreeningSettings {
    pub mode: ScreeningMode,
    /// Overrides the mode's own threshold when set.
    pub threshold: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScreenConfig {
    pub artifacts: ArtifactPaths,
    pub screening: ScreeningSettings,
}

impl ScreenConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(threshold) = self.screening.threshold {
            check_threshold(threshold)?;
        }
        Ok(())
    }

    /// The threshold in force: the explicit override, or the mode's default.
    pub fn threshold(&self) -> f64 {
        self.screening
            .threshold
            .unwrap_or_else(|| self.screening.mode.default_threshold())
    }
}

pub fn check_threshold(threshold: f64) -> Result<f64, ConfigError> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(threshold)
    } else {
        Err(ConfigError::ThresholdOutOfRange(threshold))
    }
}
