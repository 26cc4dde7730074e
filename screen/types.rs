use ndarray::{Array1, ArrayView1};
use serde::Serialize;
use std::collections::HashSet;
use std::ops::Deref;
use thiserror::Error;

/// Numeric feature values laid out in canonical feature order.
#[repr(transparent)]
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureVector(pub Array1<f64>);

impl FeatureVector {
    pub fn new(values: Array1<f64>) -> Self {
        Self(values)
    }

    pub fn as_view(&self) -> ArrayView1<'_, f64> {
        self.0.view()
    }
}

impl Deref for FeatureVector {
    type Target = Array1<f64>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Array1<f64>> for FeatureVector {
    fn from(values: Array1<f64>) -> Self {
        Self(values)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeatureListError {
    #[error("The canonical feature list is empty.")]
    Empty,
    #[error("The canonical feature list contains an empty feature name at position {0}.")]
    BlankName(usize),
    #[error("The canonical feature list names '{0}' more than once.")]
    Duplicate(String),
}

/// The ordered feature names fixed at training time. This order is the
/// contract between the encoder, the scaler and the classifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CanonicalFeatures {
    names: Vec<String>,
}

impl CanonicalFeatures {
    pub fn new(names: Vec<String>) -> Result<Self, FeatureListError> {
        if names.is_empty() {
            return Err(FeatureListError::Empty);
        }
        let mut seen = HashSet::with_capacity(names.len());
        for (i, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(FeatureListError::BlankName(i));
            }
            if !seen.insert(name.as_str()) {
                return Err(FeatureListError::Duplicate(name.clone()));
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// True if any canonical feature starts with `prefix`.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        self.names.iter().any(|n| n.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn rejects_empty_blank_and_duplicate_lists() {
        assert_eq!(
            CanonicalFeatures::new(vec![]).unwrap_err(),
            FeatureListError::Empty
        );
        assert_eq!(
            CanonicalFeatures::new(names(&["Age", " "])).unwrap_err(),
            FeatureListError::BlankName(1)
        );
        assert_eq!(
            CanonicalFeatures::new(names(&["Age", "BMI", "Age"])).unwrap_err(),
            FeatureListError::Duplicate("Age".to_string())
        );
    }

    #[test]
    fn prefix_lookup_matches_indicator_columns() {
        let features = CanonicalFeatures::new(names(&["Age", "Sex_Male", "Smoking_Yes"])).unwrap();
        assert!(features.has_prefix("Sex_"));
        assert!(features.has_prefix("Smoking_"));
        assert!(!features.has_prefix("Education_level_"));
        assert_eq!(features.iter().collect::<Vec<_>>(), ["Age", "Sex_Male", "Smoking_Yes"]);
    }
}
