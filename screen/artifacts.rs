//! # Artifact Store
//!
//! Loads the four persisted artifacts a screening run needs: the default
//! classifier, the rebalanced (high-sensitivity) classifier, the scaler, and the
//! canonical feature list. Loading happens once, at process start. The
//! resulting [`ArtifactBundle`] is immutable and is shared by reference with
//! every scoring call.
//!
//! All four files are TOML and carry a `format_version`. Files with a version
//! this build does not read are refused outright. When schema validation is
//! on, the arity of the scaler and both classifiers, and the classifier
//! `feature_names` if present, are checked against the feature list before the
//! bundle is handed out.

use crate::config::ArtifactPaths;
use crate::model::{ARTIFACT_FORMAT_VERSION, Classifier, FittedScaler, LogisticModel, ModelError, Scaler};
use crate::types::{CanonicalFeatures, FeatureListError};
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact '{path}' could not be loaded: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: ModelError,
    },
    #[error(
        "Artifact '{path}' uses format version {found}, but this build only reads version {supported}."
    )]
    UnsupportedFormatVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },
    #[error("Feature list '{path}' is invalid: {source}")]
    InvalidFeatureList {
        path: PathBuf,
        #[source]
        source: FeatureListError,
    },
    #[error(
        "The {component} was fitted on {found} features, but the canonical feature list has {expected}. The artifacts do not belong together."
    )]
    SchemaMismatch {
        component: &'static str,
        expected: usize,
        found: usize,
    },
    #[error(
        "The {component} names feature '{found}' at position {position}, where the canonical feature list has '{expected}'."
    )]
    FeatureNamesDiffer {
        component: &'static str,
        position: usize,
        expected: String,
        found: String,
    },
}

/// On-disk layout of the canonical feature list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureListFile {
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    pub features: Vec<String>,
}

fn default_format_version() -> u32 {
    ARTIFACT_FORMAT_VERSION
}

/// Everything a scoring call needs besides the record itself.
#[derive(Debug, Clone)]
pub struct ArtifactBundle {
    pub default_classifier: LogisticModel,
    pub balanced_classifier: LogisticModel,
    pub scaler: FittedScaler,
    pub features: CanonicalFeatures,
}

impl ArtifactBundle {
    /// Loads all four artifacts from the locations in `paths`.
    pub fn load(paths: &ArtifactPaths) -> Result<Self, ArtifactError> {
        info!("Loading screening artifacts from '{}'", paths.dir.display());

        let default_path = paths.default_model_path();
        let default_classifier = LogisticModel::load(&default_path)
            .map_err(|source| unavailable(&default_path, source))?;
        check_version(&default_path, default_classifier.format_version)?;

        let balanced_path = paths.balanced_model_path();
        let balanced_classifier = LogisticModel::load(&balanced_path)
            .map_err(|source| unavailable(&balanced_path, source))?;
        check_version(&balanced_path, balanced_classifier.format_version)?;

        let scaler_path = paths.scaler_path();
        let scaler =
            FittedScaler::load(&scaler_path).map_err(|source| unavailable(&scaler_path, source))?;
        check_version(&scaler_path, scaler.format_version)?;

        let features_path = paths.features_path();
        let features = load_feature_list(&features_path)?;

        let bundle = Self {
            default_classifier,
            balanced_classifier,
            scaler,
            features,
        };

        if paths.validate_schema {
            bundle.validate()?;
        } else {
            log::warn!("Artifact schema validation is disabled; mismatches surface at scoring time.");
        }

        info!(
            "Loaded artifacts: {} canonical features, {} scaler",
            bundle.features.len(),
            bundle.scaler.method()
        );
        Ok(bundle)
    }

    /// Checks that every component was fitted on the canonical feature list.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        let expected = self.features.len();

        if let Some(found) = Scaler::n_features(&self.scaler) {
            if found != expected {
                return Err(ArtifactError::SchemaMismatch {
                    component: "scaler",
                    expected,
                    found,
                });
            }
        }

        for (component, model) in [
            ("default classifier", &self.default_classifier),
            ("balanced classifier", &self.balanced_classifier),
        ] {
            if let Some(found) = Classifier::n_features(model) {
                if found != expected {
                    return Err(ArtifactError::SchemaMismatch {
                        component,
                        expected,
                        found,
                    });
                }
            }
            if let Some(names) = &model.feature_names {
                if names.len() != expected {
                    return Err(ArtifactError::SchemaMismatch {
                        component,
                        expected,
                        found: names.len(),
                    });
                }
                let difference = self
                    .features
                    .iter()
                    .zip(names)
                    .position(|(canonical, own)| canonical != own.as_str());
                if let Some(position) = difference {
                    return Err(ArtifactError::FeatureNamesDiffer {
                        component,
                        position,
                        expected: self.features.names()[position].clone(),
                        found: names[position].clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Writes the bundle using the file names in `paths`, creating the directory if needed.
    pub fn save(&self, paths: &ArtifactPaths) -> Result<(), ArtifactError> {
        fs::create_dir_all(&paths.dir)
            .map_err(|e| unavailable(&paths.dir, ModelError::IoError(e)))?;

        let default_path = paths.default_model_path();
        self.default_classifier
            .save(&default_path)
            .map_err(|source| unavailable(&default_path, source))?;

        let balanced_path = paths.balanced_model_path();
        self.balanced_classifier
            .save(&balanced_path)
            .map_err(|source| unavailable(&balanced_path, source))?;

        let scaler_path = paths.scaler_path();
        self.scaler
            .save(&scaler_path)
            .map_err(|source| unavailable(&scaler_path, source))?;

        let features_path = paths.features_path();
        let file = FeatureListFile {
            format_version: ARTIFACT_FORMAT_VERSION,
            features: self.features.names().to_vec(),
        };
        let text = toml::to_string_pretty(&file)
            .map_err(|e| unavailable(&features_path, ModelError::TomlSerializeError(e)))?;
        fs::write(&features_path, text)
            .map_err(|e| unavailable(&features_path, ModelError::IoError(e)))?;
        Ok(())
    }
}

fn load_feature_list(path: &Path) -> Result<CanonicalFeatures, ArtifactError> {
    let text = fs::read_to_string(path).map_err(|e| unavailable(path, ModelError::IoError(e)))?;
    let file: FeatureListFile =
        toml::from_str(&text).map_err(|e| unavailable(path, ModelError::TomlParseError(e)))?;
    check_version(path, file.format_version)?;
    CanonicalFeatures::new(file.features).map_err(|source| ArtifactError::InvalidFeatureList {
        path: path.to_path_buf(),
        source,
    })
}

fn check_version(path: &Path, found: u32) -> Result<(), ArtifactError> {
    if found != ARTIFACT_FORMAT_VERSION {
        return Err(ArtifactError::UnsupportedFormatVersion {
            path: path.to_path_buf(),
            found,
            supported: ARTIFACT_FORMAT_VERSION,
        });
    }
    Ok(())
}

fn unavailable(path: &Path, source: ModelError) -> ArtifactError {
    ArtifactError::Unavailable {
        path: path.to_path_buf(),
        source,
    }
}
