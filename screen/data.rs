//! # Batch Input and Output
//!
//! Reads a tab-separated file of patient rows into validated [`PatientRecord`]s
//! and writes the matching predictions back out as TSV.
//!
//! The input header must carry every training column name (`Age`, `Sex`,
//! `Education_level`, ...) in any order. Extra columns are ignored, apart from
//! an optional `sample_id`, which labels the output rows. Values go through the
//! same parsing and range checks as a single interactive record, so a batch row
//! is accepted exactly when the same values typed into the form would be.

use crate::pipeline::Screening;
use crate::record::{Attribute, PatientRecord, PatientRecordBuilder, RecordError};
use itertools::Itertools;
use log::info;
use polars::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use thiserror::Error;

const SAMPLE_ID_COLUMN: &str = "sample_id";

/// Validated rows of a batch file, in file order.
#[derive(Debug)]
pub struct PatientBatch {
    /// From the `sample_id` column when present, otherwise 1-based row numbers.
    pub sample_ids: Vec<String>,
    pub records: Vec<PatientRecord>,
}

impl PatientBatch {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[derive(Error, Debug)]
pub enum DataError {
    #[error("Error from the underlying Polars DataFrame library: {0}")]
    PolarsError(#[from] PolarsError),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to write predictions: {0}")]
    CsvError(#[from] csv::Error),
    #[error(
        "The required column '{0}' was not found in the input file. Please check spelling and case."
    )]
    ColumnNotFound(String),
    #[error(
        "The required column '{column_name}' could not be converted to the expected type '{expected_type}'. (Found type: {found_type})"
    )]
    ColumnWrongType {
        column_name: String,
        expected_type: &'static str,
        found_type: String,
    },
    #[error(
        "Missing or null values were found in the required column '{0}'. Every patient row must be complete."
    )]
    MissingValuesFound(String),
    #[error("Row {row} is not a valid patient record: {source}")]
    InvalidRecord {
        row: usize,
        #[source]
        source: RecordError,
    },
    #[error("The input file contains no patient rows.")]
    EmptyInput,
    #[error("Got {predictions} predictions for {samples} samples.")]
    LengthMismatch { samples: usize, predictions: usize },
}

/// Loads and validates every row of a tab-separated patient file.
pub fn load_patient_records(path: &Path) -> Result<PatientBatch, DataError> {
    info!("Loading patient rows from '{}'", path.display());

    let df = CsvReader::new(File::open(path)?)
        .with_options(
            CsvReadOptions::default()
                .with_has_header(true)
                .with_parse_options(CsvParseOptions::default().with_separator(b'\t')),
        )
        .finish()?;

    let columns: HashSet<String> = df
        .get_column_names()
        .into_iter()
        .map(|s| s.to_string())
        .collect();
    let missing = Attribute::ALL
        .iter()
        .map(|attribute| attribute.column())
        .filter(|column| !columns.contains(*column))
        .collect::<Vec<_>>();
    if !missing.is_empty() {
        return Err(DataError::ColumnNotFound(missing.iter().join(", ")));
    }

    let n = df.height();
    if n == 0 {
        return Err(DataError::EmptyInput);
    }

    // Column-wise extraction, then one builder per row.
    let mut rows: Vec<PatientRecordBuilder> = vec![PatientRecordBuilder::default(); n];
    for attribute in Attribute::ALL {
        let values = if attribute.is_categorical() {
            extract_text_column(&df, attribute.column())?
        } else {
            extract_numeric_column(&df, attribute.column())?
                .into_iter()
                .map(|v| v.to_string())
                .collect()
        };
        for (index, (builder, raw)) in rows.iter_mut().zip(&values).enumerate() {
            builder
                .set_raw(attribute, raw)
                .map_err(|source| DataError::InvalidRecord {
                    row: index + 1,
                    source,
                })?;
        }
    }

    let records = rows
        .into_iter()
        .enumerate()
        .map(|(index, builder)| {
            builder.build().map_err(|source| DataError::InvalidRecord {
                row: index + 1,
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let sample_ids = build_sample_ids(&df, n, columns.contains(SAMPLE_ID_COLUMN))?;
    info!("Loaded {n} patient rows.");
    Ok(PatientBatch {
        sample_ids,
        records,
    })
}

fn extract_numeric_column(df: &DataFrame, column_name: &str) -> Result<Vec<f64>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }

    let wrong_type = || DataError::ColumnWrongType {
        column_name: column_name.to_string(),
        expected_type: "f64 (numeric)",
        found_type: format!("{:?}", series.dtype()),
    };
    if series.dtype() == &DataType::String {
        return Err(wrong_type());
    }
    let casted = series.cast(&DataType::Float64).map_err(|_| wrong_type())?;
    if casted.null_count() > 0 {
        return Err(wrong_type());
    }

    let chunked = casted.f64()?.rechunk();
    Ok(chunked.into_no_null_iter().collect())
}

fn extract_text_column(df: &DataFrame, column_name: &str) -> Result<Vec<String>, DataError> {
    let series = df.column(column_name)?;
    if series.null_count() > 0 {
        return Err(DataError::MissingValuesFound(column_name.to_string()));
    }
    let casted = series.cast(&DataType::String)?;
    let chunked = casted.as_materialized_series().str()?;
    Ok(chunked
        .into_no_null_iter()
        .map(|value| value.trim().to_string())
        .collect())
}

fn build_sample_ids(df: &DataFrame, n: usize, present: bool) -> Result<Vec<String>, DataError> {
    if !present {
        return Ok((1..=n).map(|i| i.to_string()).collect());
    }
    let casted = df.column(SAMPLE_ID_COLUMN)?.cast(&DataType::String)?;
    let chunked = casted.as_materialized_series().str()?;
    Ok(chunked
        .into_iter()
        .enumerate()
        .map(|(i, value)| match value {
            Some(text) if !text.is_empty() => text.to_string(),
            _ => (i + 1).to_string(),
        })
        .collect())
}

/// Writes one `sample_id  probability  decision` row per screening.
pub fn write_predictions(
    path: &Path,
    sample_ids: &[String],
    screenings: &[Screening],
) -> Result<(), DataError> {
    if sample_ids.len() != screenings.len() {
        return Err(DataError::LengthMismatch {
            samples: sample_ids.len(),
            predictions: screenings.len(),
        });
    }
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)?;
    writer.write_record(["sample_id", "probability", "decision"])?;
    for (id, screening) in sample_ids.iter().zip(screenings) {
        writer.write_record([
            id.as_str(),
            &format!("{:.6}", screening.probability),
            screening.decision.as_str(),
        ])?;
    }
    writer.flush()?;
    info!(
        "Wrote {} predictions to '{}'",
        screenings.len(),
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RiskDecision;
    use crate::record::Sex;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "sample_id\tAge\tSex\tEducation_level\tMarital_status\tLabor_status\tSmoking\tAlcohol_drinking\tPhysical_inactivity\tHigh_salt_intake\tBMI\tWaist_circumference";

    fn create_test_tsv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        write!(file, "{content}").expect("Failed to write to temp file");
        file
    }

    #[test]
    fn loads_valid_rows_with_sample_ids() {
        let content = format!(
            "{HEADER}\np1\t61\tMale\tLow\tMarried\tEmployed\tNo\tNo\tNo\tNo\t30.0\t90\np2\t45\tfemale\thigh\tsingle\tunemployed\tyes\tno\tyes\tno\t22.5\t75\n"
        );
        let file = create_test_tsv(&content);
        let batch = load_patient_records(file.path()).unwrap();
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.sample_ids, vec!["p1", "p2"]);
        assert_eq!(batch.records[0].age(), 61);
        assert_eq!(batch.records[0].sex(), Sex::Male);
        assert_eq!(batch.records[1].bmi(), 22.5);
        assert_eq!(batch.records[1].waist_circumference(), 75);
    }

    #[test]
    fn column_order_is_free_and_ids_default_to_row_numbers() {
        let content = "Waist_circumference\tBMI\tHigh_salt_intake\tPhysical_inactivity\tAlcohol_drinking\tSmoking\tLabor_status\tMarital_status\tEducation_level\tSex\tAge\tnotes\n\
                       90\t30\tNo\tNo\tNo\tNo\tEmployed\tMarried\tLow\tMale\t61\tanything\n";
        let file = create_test_tsv(content);
        let batch = load_patient_records(file.path()).unwrap();
        assert_eq!(batch.sample_ids, vec!["1"]);
        assert_eq!(batch.records[0].age(), 61);
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let content = "Age\tSex\n61\tMale\n";
        let file = create_test_tsv(content);
        match load_patient_records(file.path()) {
            Err(DataError::ColumnNotFound(names)) => {
                assert!(names.contains("Education_level"));
                assert!(!names.contains("Sex"));
            }
            other => panic!("Expected ColumnNotFound, got {:?}", other),
        }
    }

    #[test]
    fn missing_values_are_rejected() {
        let content = format!(
            "{HEADER}\np1\t61\tMale\tLow\tMarried\tEmployed\tNo\tNo\tNo\tNo\t\t90\n"
        );
        let file = create_test_tsv(&content);
        assert!(matches!(
            load_patient_records(file.path()),
            Err(DataError::MissingValuesFound(c)) if c == "BMI"
        ));
    }

    #[test]
    fn text_in_numeric_column_is_wrong_type() {
        let content = format!(
            "{HEADER}\np1\tsixty\tMale\tLow\tMarried\tEmployed\tNo\tNo\tNo\tNo\t30.0\t90\n"
        );
        let file = create_test_tsv(&content);
        assert!(matches!(
            load_patient_records(file.path()),
            Err(DataError::ColumnWrongType { column_name, .. }) if column_name == "Age"
        ));
    }

    #[test]
    fn out_of_range_and_unknown_labels_name_the_row() {
        let content = format!(
            "{HEADER}\np1\t61\tMale\tLow\tMarried\tEmployed\tNo\tNo\tNo\tNo\t30.0\t90\np2\t61\tMale\tLow\tMarried\tEmployed\tNo\tNo\tNo\tNo\t75.0\t90\n"
        );
        let file = create_test_tsv(&content);
        match load_patient_records(file.path()) {
            Err(DataError::InvalidRecord { row, source }) => {
                assert_eq!(row, 2);
                assert!(matches!(source, RecordError::InputOutOfRange { .. }));
            }
            other => panic!("Expected InvalidRecord, got {:?}", other),
        }

        let content = format!(
            "{HEADER}\np1\t61\tOther\tLow\tMarried\tEmployed\tNo\tNo\tNo\tNo\t30.0\t90\n"
        );
        let file = create_test_tsv(&content);
        assert!(matches!(
            load_patient_records(file.path()),
            Err(DataError::InvalidRecord {
                row: 1,
                source: RecordError::InvalidValue { .. }
            })
        ));
    }

    #[test]
    fn header_only_file_is_empty_input() {
        let file = create_test_tsv(&format!("{HEADER}\n"));
        assert!(matches!(
            load_patient_records(file.path()),
            Err(DataError::EmptyInput)
        ));
    }

    #[test]
    fn predictions_are_written_as_tsv() {
        let out = NamedTempFile::new().expect("Failed to create temp file");
        let screenings = [
            Screening {
                probability: 0.65,
                decision: RiskDecision::ScreenPositive,
                threshold: 0.3,
            },
            Screening {
                probability: 0.1,
                decision: RiskDecision::ScreenNegative,
                threshold: 0.3,
            },
        ];
        write_predictions(out.path(), &["a".into(), "b".into()], &screenings).unwrap();
        let text = std::fs::read_to_string(out.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "sample_id\tprobability\tdecision");
        assert_eq!(lines[1], "a\t0.650000\tscreen-positive");
        assert_eq!(lines[2], "b\t0.100000\tscreen-negative");

        assert!(matches!(
            write_predictions(out.path(), &["a".into()], &screenings),
            Err(DataError::LengthMismatch { .. })
        ));
    }
}
