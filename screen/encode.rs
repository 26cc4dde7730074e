//! # Feature Encoding
//!
//! Turns a [`PatientRecord`] into a [`FeatureVector`] laid out exactly like the
//! training matrix. Encoding happens in two steps:
//!
//! 1. **Expansion.** Numeric attributes pass through under their column name.
//!    Each categorical attribute becomes a single `{Column}_{Label}` indicator
//!    set to 1; every other label of that attribute is implicitly 0.
//! 2. **Reindexing.** The expanded row is read back in canonical order. Canonical
//!    columns the row does not carry are filled with 0, and row columns the
//!    canonical list does not name are discarded.
//!
//! Reindexing is what keeps the vector shape independent of which labels a
//! particular record happens to carry. The reference category dropped at
//! training time, or a label the training data never saw, simply leaves every
//! indicator of that attribute at 0.

use crate::pipeline::ScoringError;
use crate::record::PatientRecord;
use crate::types::{CanonicalFeatures, FeatureVector};
use log::debug;
use ndarray::Array1;
use std::collections::HashMap;

/// A single row of named numeric columns, before alignment.
#[derive(Clone, Debug, PartialEq)]
pub struct LabeledRow {
    columns: Vec<(String, f64)>,
}

impl LabeledRow {
    pub fn new(columns: Vec<(String, f64)>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[(String, f64)] {
        &self.columns
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.columns
            .iter()
            .find(|(column, _)| column == name)
            .map(|&(_, value)| value)
    }

    /// Pairs an aligned vector back up with its canonical names.
    pub fn from_aligned(vector: &FeatureVector, canonical: &CanonicalFeatures) -> Self {
        Self {
            columns: canonical
                .iter()
                .zip(vector.iter())
                .map(|(name, &value)| (name.to_string(), value))
                .collect(),
        }
    }
}

/// Indicator column name for one categorical label.
pub fn indicator_column(column: &str, label: &str) -> String {
    format!("{column}_{label}")
}

/// One-hot expands a record. Numeric columns come first, then one indicator
/// per categorical attribute, in form order.
pub fn expand(record: &PatientRecord) -> LabeledRow {
    let numeric = record
        .numeric_columns()
        .into_iter()
        .map(|(attribute, value)| (attribute.column().to_string(), value));
    let indicators = record
        .categorical_columns()
        .into_iter()
        .map(|(attribute, label)| (indicator_column(attribute.column(), label), 1.0));
    LabeledRow::new(numeric.chain(indicators).collect())
}

/// Aligns `row` to the canonical order, zero-filling absent columns and
/// dropping columns the canonical list does not name.
pub fn reindex(row: &LabeledRow, canonical: &CanonicalFeatures) -> FeatureVector {
    // First occurrence wins if a row repeats a column.
    let mut lookup: HashMap<&str, f64> = HashMap::with_capacity(row.columns.len());
    for (name, value) in &row.columns {
        lookup.entry(name.as_str()).or_insert(*value);
    }

    let values: Array1<f64> = canonical
        .iter()
        .map(|name| lookup.get(name).copied().unwrap_or(0.0))
        .collect();

    if log::log_enabled!(log::Level::Debug) {
        let canonical_set: std::collections::HashSet<&str> = canonical.iter().collect();
        for (name, _) in &row.columns {
            if !canonical_set.contains(name.as_str()) {
                debug!("Dropping column '{name}', which is not part of the canonical feature list.");
            }
        }
    }

    FeatureVector::new(values)
}

/// Verifies that every categorical attribute has at least one indicator column
/// in the canonical list. A miss means the artifacts were trained on a
/// different set of attributes than the record carries.
pub fn check_schema(
    record: &PatientRecord,
    canonical: &CanonicalFeatures,
) -> Result<(), ScoringError> {
    for (attribute, label) in record.categorical_columns() {
        let prefix = indicator_column(attribute.column(), "");
        if !canonical.has_prefix(&prefix) {
            return Err(ScoringError::SchemaMismatch {
                field: attribute.column().to_string(),
            });
        }
        let indicator = indicator_column(attribute.column(), label);
        if !canonical.iter().any(|name| name == indicator) {
            debug!("'{indicator}' has no canonical column; its indicators stay at zero.");
        }
    }
    Ok(())
}

/// Schema check, expansion and reindexing in one call.
pub fn encode(
    record: &PatientRecord,
    canonical: &CanonicalFeatures,
) -> Result<FeatureVector, ScoringError> {
    check_schema(record, canonical)?;
    Ok(reindex(&expand(record), canonical))
}
