//! # Patient Record
//!
//! The typed, range-validated input to the scoring pipeline. A record is built
//! once per prediction request, either field by field through
//! [`PatientRecordBuilder`] or from a name/value mapping via
//! [`PatientRecord::from_fields`], and is immutable afterwards.
//!
//! Column names and category labels are the ones the artifacts were trained
//! with (`Education_level`, `Low`, ...). They are the vocabulary of the one-hot
//! expansion in [`crate::encode`], so they must not be localised or reworded.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;
use std::str::FromStr;
use thiserror::Error;

pub const AGE_RANGE: RangeInclusive<u32> = 18..=100;
pub const BMI_RANGE: RangeInclusive<f64> = 10.0..=60.0;
pub const WAIST_RANGE: RangeInclusive<u32> = 50..=150;


/// Errors raised while collecting a patient record.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("'{field}' must be between {min} and {max}, but {value} was given.")]
    InputOutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
        value: f64,
    },
    #[error("'{value}' is not a valid value for '{field}'. Expected one of: {expected}.")]
    InvalidValue {
        field: String,
        value: String,
        expected: String,
    },
    #[error("Unknown patient attribute '{0}'.")]
    UnknownField(String),
    #[error("The patient attribute '{0}' is required but was not supplied.")]
    MissingField(&'static str),
}

/// The eleven attributes collected for every patient, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Age,
    Sex,
    EducationLevel,
    MaritalStatus,
    LaborStatus,
    Smoking,
    AlcoholDrinking,
    PhysicalInactivity,
    HighSaltIntake,
    Bmi,
    WaistCircumference,
}

impl Attribute {
    pub const ALL: [Attribute; 11] = [
        Attribute::Age,
        Attribute::Sex,
        Attribute::EducationLevel,
        Attribute::MaritalStatus,
        Attribute::LaborStatus,
        Attribute::Smoking,
        Attribute::AlcoholDrinking,
        Attribute::PhysicalInactivity,
        Attribute::HighSaltIntake,
        Attribute::Bmi,
        Attribute::WaistCircumference,
    ];

    /// Column name used at training time. Indicator columns are `{column}_{value}`.
    pub fn column(self) -> &'static str {
        match self {
            Attribute::Age => "Age",
            Attribute::Sex => "Sex",
            Attribute::EducationLevel => "Education_level",
            Attribute::MaritalStatus => "Marital_status",
            Attribute::LaborStatus => "Labor_status",
            Attribute::Smoking => "Smoking",
            Attribute::AlcoholDrinking => "Alcohol_drinking",
            Attribute::PhysicalInactivity => "Physical_inactivity",
            Attribute::HighSaltIntake => "High_salt_intake",
            Attribute::Bmi => "BMI",
            Attribute::WaistCircumference => "Waist_circumference",
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            Attribute::Age => "age",
            Attribute::Sex => "sex",
            Attribute::EducationLevel => "education_level",
            Attribute::MaritalStatus => "marital_status",
            Attribute::LaborStatus => "labor_status",
            Attribute::Smoking => "smoking",
            Attribute::AlcoholDrinking => "alcohol_drinking",
            Attribute::PhysicalInactivity => "physical_inactivity",
            Attribute::HighSaltIntake => "high_salt_intake",
            Attribute::Bmi => "bmi",
            Attribute::WaistCircumference => "waist_circumference",
        }
    }

    fn short_name(self) -> &'static str {
        match self {
            Attribute::Age => "age",
            Attribute::Sex => "sex",
            Attribute::EducationLevel => "education",
            Attribute::MaritalStatus => "marital",
            Attribute::LaborStatus => "labor",
            Attribute::Smoking => "smoking",
            Attribute::AlcoholDrinking => "alcohol",
            Attribute::PhysicalInactivity => "physical",
            Attribute::HighSaltIntake => "salt",
            Attribute::Bmi => "bmi",
            Attribute::WaistCircumference => "waist",
        }
    }

    pub fn is_categorical(self) -> bool {
        !matches!(
            self,
            Attribute::Age | Attribute::Bmi | Attribute::WaistCircumference
        )
    }

    /// Resolves a field name given as the snake_case attribute, the training
    /// column name, or the short form label. Matching is case-insensitive.
    pub fn from_name(name: &str) -> Result<Self, RecordError> {
        let wanted = name.trim().to_ascii_lowercase();
        Attribute::ALL
            .into_iter()
            .find(|a| {
                wanted == a.field_name()
                    || wanted == a.short_name()
                    || wanted == a.column().to_ascii_lowercase()
            })
            .ok_or_else(|| RecordError::UnknownField(name.to_string()))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// A closed set of labels for one categorical attribute.
pub trait Category: Sized + Copy + 'static {
    const ATTRIBUTE: Attribute;
    const ALL: &'static [Self];

    /// The label as it appears in training data and indicator column names.
    fn label(self) -> &'static str;

    fn parse_label(raw: &str) -> Result<Self, RecordError> {
        let trimmed = raw.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| RecordError::InvalidValue {
                field: Self::ATTRIBUTE.column().to_string(),
                value: raw.to_string(),
                expected: Self::ALL
                    .iter()
                    .map(|c| c.label())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sex {
    Female,
    Male,
}

impl Category for Sex {
    const ATTRIBUTE: Attribute = Attribute::Sex;
    const ALL: &'static [Self] = &[Sex::Female, Sex::Male];

    fn label(self) -> &'static str {
        match self {
            Sex::Female => "Female",
            Sex::Male => "Male",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EducationLevel {
    Low,
    Medium,
    High,
}

impl Category for EducationLevel {
    const ATTRIBUTE: Attribute = Attribute::EducationLevel;
    const ALL: &'static [Self] = &[
        EducationLevel::Low,
        EducationLevel::Medium,
        EducationLevel::High,
    ];

    fn label(self) -> &'static str {
        match self {
            EducationLevel::Low => "Low",
            EducationLevel::Medium => "Medium",
            EducationLevel::High => "High",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MaritalStatus {
    Single,
    Married,
}

impl Category for MaritalStatus {
    const ATTRIBUTE: Attribute = Attribute::MaritalStatus;
    const ALL: &'static [Self] = &[MaritalStatus::Single, MaritalStatus::Married];

    fn label(self) -> &'static str {
        match self {
            MaritalStatus::Single => "Single",
            MaritalStatus::Married => "Married",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LaborStatus {
    Unemployed,
    Employed,
}

impl Category for LaborStatus {
    const ATTRIBUTE: Attribute = Attribute::LaborStatus;
    const ALL: &'static [Self] = &[LaborStatus::Unemployed, LaborStatus::Employed];

    fn label(self) -> &'static str {
        match self {
            LaborStatus::Unemployed => "Unemployed",
            LaborStatus::Employed => "Employed",
        }
    }
}

/// Answer to the four lifestyle questions. The attribute it answers is only
/// known from context, so parse errors name the generic field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum YesNo {
    No,
    Yes,
}

impl YesNo {
    fn label(self) -> &'static str {
        match self {
            YesNo::No => "No",
            YesNo::Yes => "Yes",
        }
    }

    fn parse_for(attribute: Attribute, raw: &str) -> Result<Self, RecordError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "no" => Ok(YesNo::No),
            "yes" => Ok(YesNo::Yes),
            _ => Err(RecordError::InvalidValue {
                field: attribute.column().to_string(),
                value: raw.to_string(),
                expected: "No, Yes".to_string(),
            }),
        }
    }
}

macro_rules! impl_from_str_for_category {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromStr for $ty {
                type Err = RecordError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    <$ty as Category>::parse_label(s)
                }
            }

            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }
        )*
    };
}

impl_from_str_for_category!(Sex, EducationLevel, MaritalStatus, LaborStatus);

impl FromStr for YesNo {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "no" => Ok(YesNo::No),
            "yes" => Ok(YesNo::Yes),
            _ => Err(RecordError::InvalidValue {
                field: "yes/no answer".to_string(),
                value: s.to_string(),
                expected: "No, Yes".to_string(),
            }),
        }
    }
}

impl fmt::Display for YesNo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One patient's attributes, all present and within their declared ranges.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientRecord {
    age: u32,
    sex: Sex,
    education_level: EducationLevel,
    marital_status: MaritalStatus,
    labor_status: LaborStatus,
    smoking: YesNo,
    alcohol_drinking: YesNo,
    physical_inactivity: YesNo,
    high_salt_intake: YesNo,
    bmi: f64,
    waist_circumference: u32,
}

impl PatientRecord {
    pub fn builder() -> PatientRecordBuilder {
        PatientRecordBuilder::default()
    }

    /// Builds a record from `(attribute, value)` pairs, in any order.
    ///
    /// Every attribute must appear; a repeated attribute keeps its last value.
    pub fn from_fields<I, K, V>(fields: I) -> Result<Self, RecordError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut builder = PatientRecordBuilder::default();
        for (name, value) in fields {
            builder.set_raw(Attribute::from_name(name.as_ref())?, value.as_ref())?;
        }
        builder.build()
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    pub fn bmi(&self) -> f64 {
        self.bmi
    }

    pub fn waist_circumference(&self) -> u32 {
        self.waist_circumference
    }

    /// Numeric attributes paired with their training column names.
    pub fn numeric_columns(&self) -> [(Attribute, f64); 3] {
        [
            (Attribute::Age, f64::from(self.age)),
            (Attribute::Bmi, self.bmi),
            (
                Attribute::WaistCircumference,
                f64::from(self.waist_circumference),
            ),
        ]
    }

    /// Categorical attributes paired with their category labels.
    pub fn categorical_columns(&self) -> [(Attribute, &'static str); 8] {
        [
            (Attribute::Sex, self.sex.label()),
            (Attribute::EducationLevel, self.education_level.label()),
            (Attribute::MaritalStatus, self.marital_status.label()),
            (Attribute::LaborStatus, self.labor_status.label()),
            (Attribute::Smoking, self.smoking.label()),
            (Attribute::AlcoholDrinking, self.alcohol_drinking.label()),
            (Attribute::PhysicalInactivity, self.physical_inactivity.label()),
            (Attribute::HighSaltIntake, self.high_salt_intake.label()),
        ]
    }
}

/// Collects attributes one at a time and validates them on [`build`](Self::build).
#[derive(Debug, Clone, Default)]
pub struct PatientRecordBuilder {
    age: Option<u32>,
    sex: Option<Sex>,
    education_level: Option<EducationLevel>,
    marital_status: Option<MaritalStatus>,
    labor_status: Option<LaborStatus>,
    smoking: Option<YesNo>,
    alcohol_drinking: Option<YesNo>,
    physical_inactivity: Option<YesNo>,
    high_salt_intake: Option<YesNo>,
    bmi: Option<f64>,
    waist_circumference: Option<u32>,
}

impl PatientRecordBuilder {
    /// A builder pre-filled with the values the screening form opens with.
    pub fn form_defaults() -> Self {
        Self {
            age: Some(61),
            sex: Some(Sex::Female),
            education_level: Some(EducationLevel::Low),
            marital_status: Some(MaritalStatus::Single),
            labor_status: Some(LaborStatus::Unemployed),
            smoking: Some(YesNo::No),
            alcohol_drinking: Some(YesNo::No),
            physical_inactivity: Some(YesNo::No),
            high_salt_intake: Some(YesNo::No),
            bmi: Some(30.0),
            waist_circumference: Some(90),
        }
    }

    pub fn age(mut self, years: u32) -> Self {
        self.age = Some(years);
        self
    }

    pub fn sex(mut self, sex: Sex) -> Self {
        self.sex = Some(sex);
        self
    }

    pub fn education_level(mut self, level: EducationLevel) -> Self {
        self.education_level = Some(level);
        self
    }

    pub fn marital_status(mut self, status: MaritalStatus) -> Self {
        self.marital_status = Some(status);
        self
    }

    pub fn labor_status(mut self, status: LaborStatus) -> Self {
        self.labor_status = Some(status);
        self
    }

    pub fn smoking(mut self, answer: YesNo) -> Self {
        self.smoking = Some(answer);
        self
    }

    pub fn alcohol_drinking(mut self, answer: YesNo) -> Self {
        self.alcohol_drinking = Some(answer);
        self
    }

    pub fn physical_inactivity(mut self, answer: YesNo) -> Self {
        self.physical_inactivity = Some(answer);
        self
    }

    pub fn high_salt_intake(mut self, answer: YesNo) -> Self {
        self.high_salt_intake = Some(answer);
        self
    }

    pub fn bmi(mut self, bmi: f64) -> Self {
        self.bmi = Some(bmi);
        self
    }

    pub fn waist_circumference(mut self, centimetres: u32) -> Self {
        self.waist_circumference = Some(centimetres);
        self
    }

    /// Parses `raw` for `attribute` and stores it, replacing any earlier value.
    pub fn set_raw(&mut self, attribute: Attribute, raw: &str) -> Result<(), RecordError> {
        let invalid_number = |expected: &str| RecordError::InvalidValue {
            field: attribute.column().to_string(),
            value: raw.to_string(),
            expected: expected.to_string(),
        };
        match attribute {
            Attribute::Age => {
                self.age = Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| invalid_number("a whole number of years"))?,
                )
            }
            Attribute::Bmi => {
                self.bmi = Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| invalid_number("a decimal number"))?,
                )
            }
            Attribute::WaistCircumference => {
                self.waist_circumference = Some(
                    raw.trim()
                        .parse()
                        .map_err(|_| invalid_number("a whole number of centimetres"))?,
                )
            }
            Attribute::Sex => self.sex = Some(Sex::parse_label(raw)?),
            Attribute::EducationLevel => {
                self.education_level = Some(EducationLevel::parse_label(raw)?)
            }
            Attribute::MaritalStatus => {
                self.marital_status = Some(MaritalStatus::parse_label(raw)?)
            }
            Attribute::LaborStatus => self.labor_status = Some(LaborStatus::parse_label(raw)?),
            Attribute::Smoking => self.smoking = Some(YesNo::parse_for(attribute, raw)?),
            Attribute::AlcoholDrinking => {
                self.alcohol_drinking = Some(YesNo::parse_for(attribute, raw)?)
            }
            Attribute::PhysicalInactivity => {
                self.physical_inactivity = Some(YesNo::parse_for(attribute, raw)?)
            }
            Attribute::HighSaltIntake => {
                self.high_salt_intake = Some(YesNo::parse_for(attribute, raw)?)
            }
        }
        Ok(())
    }

    /// Checks that every attribute is present and inside its range.
    pub fn build(self) -> Result<PatientRecord, RecordError> {
        fn required<T>(value: Option<T>, attribute: Attribute) -> Result<T, RecordError> {
            value.ok_or(RecordError::MissingField(attribute.field_name()))
        }

        let age = required(self.age, Attribute::Age)?;
        if !AGE_RANGE.contains(&age) {
            return Err(out_of_range(
                Attribute::Age,
                f64::from(*AGE_RANGE.start()),
                f64::from(*AGE_RANGE.end()),
                f64::from(age),
            ));
        }

        let bmi = required(self.bmi, Attribute::Bmi)?;
        // NaN fails `contains`, so non-finite input is rejected here too.
        if !BMI_RANGE.contains(&bmi) {
            return Err(out_of_range(
                Attribute::Bmi,
                *BMI_RANGE.start(),
                *BMI_RANGE.end(),
                bmi,
            ));
        }

        let waist_circumference = required(self.waist_circumference, Attribute::WaistCircumference)?;
        if !WAIST_RANGE.contains(&waist_circumference) {
            return Err(out_of_range(
                Attribute::WaistCircumference,
                f64::from(*WAIST_RANGE.start()),
                f64::from(*WAIST_RANGE.end()),
                f64::from(waist_circumference),
            ));
        }

        Ok(PatientRecord {
            age,
            sex: required(self.sex, Attribute::Sex)?,
            education_level: required(self.education_level, Attribute::EducationLevel)?,
            marital_status: required(self.marital_status, Attribute::MaritalStatus)?,
            labor_status: required(self.labor_status, Attribute::LaborStatus)?,
            smoking: required(self.smoking, Attribute::Smoking)?,
            alcohol_drinking: required(self.alcohol_drinking, Attribute::AlcoholDrinking)?,
            physical_inactivity: required(
                self.physical_inactivity,
                Attribute::PhysicalInactivity,
            )?,
            high_salt_intake: required(self.high_salt_intake, Attribute::HighSaltIntake)?,
            bmi,
            waist_circumference,
        })
    }
}

fn out_of_range(attribute: Attribute, min: f64, max: f64, value: f64) -> RecordError {
    RecordError::InputOutOfRange {
        field: attribute.field_name(),
        min,
        max,
        value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_defaults_build_a_valid_record() {
        let record = PatientRecordBuilder::form_defaults().build().unwrap();
        assert_eq!(record.age(), 61);
        assert_eq!(record.sex(), Sex::Female);
        assert_eq!(record.bmi(), 30.0);
        assert_eq!(record.waist_circumference(), 90);
    }

    #[test]
    fn range_bounds_are_inclusive() {
        assert!(PatientRecordBuilder::form_defaults().age(18).build().is_ok());
        assert!(PatientRecordBuilder::form_defaults().age(100).build().is_ok());
        assert!(PatientRecordBuilder::form_defaults().bmi(10.0).build().is_ok());
        assert!(PatientRecordBuilder::form_defaults().bmi(60.0).build().is_ok());
        assert!(
            PatientRecordBuilder::form_defaults()
                .waist_circumference(150)
                .build()
                .is_ok()
        );
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        let err = PatientRecordBuilder::form_defaults().age(17).build().unwrap_err();
        match err {
            RecordError::InputOutOfRange { field, value, .. } => {
                assert_eq!(field, "age");
                assert_eq!(value, 17.0);
            }
            other => panic!("Expected InputOutOfRange(age), got {:?}", other),
        }

        let err = PatientRecordBuilder::form_defaults()
            .bmi(f64::NAN)
            .build()
            .unwrap_err();
        assert!(matches!(err, RecordError::InputOutOfRange { field: "bmi", .. }));

        let err = PatientRecordBuilder::form_defaults()
            .waist_circumference(49)
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            RecordError::InputOutOfRange {
                field: "waist_circumference",
                ..
            }
        ));
    }

    #[test]
    fn missing_attribute_is_reported_by_name() {
        let err = PatientRecord::builder()
            .age(40)
            .sex(Sex::Male)
            .build()
            .unwrap_err();
        assert_eq!(err, RecordError::MissingField("bmi"));
    }

    #[test]
    fn from_fields_accepts_aliases_and_any_case() {
        let record = PatientRecord::from_fields([
            ("waist", "90"),
            ("Sex", "male"),
            ("education", "LOW"),
            ("marital_status", "Married"),
            ("Labor_status", "employed"),
            ("smoking", "no"),
            ("alcohol", "No"),
            ("physical", "No"),
            ("salt", "No"),
            ("BMI", "30.0"),
            ("age", "61"),
        ])
        .unwrap();
        let expected = PatientRecord::builder()
            .age(61)
            .sex(Sex::Male)
            .education_level(EducationLevel::Low)
            .marital_status(MaritalStatus::Married)
            .labor_status(LaborStatus::Employed)
            .smoking(YesNo::No)
            .alcohol_drinking(YesNo::No)
            .physical_inactivity(YesNo::No)
            .high_salt_intake(YesNo::No)
            .bmi(30.0)
            .waist_circumference(90)
            .build()
            .unwrap();
        assert_eq!(record, expected);
    }

    #[test]
    fn from_fields_rejects_unknown_attribute_and_bad_label() {
        let err = PatientRecord::from_fields([("glucose", "5.4")]).unwrap_err();
        assert_eq!(err, RecordError::UnknownField("glucose".to_string()));

        let err = PatientRecord::from_fields([("education_level", "PhD")]).unwrap_err();
        match err {
            RecordError::InvalidValue {
                field, expected, ..
            } => {
                assert_eq!(field, "Education_level");
                assert_eq!(expected, "Low, Medium, High");
            }
            other => panic!("Expected InvalidValue, got {:?}", other),
        }
    }

    #[test]
    fn categorical_columns_use_training_labels() {
        let record = PatientRecordBuilder::form_defaults()
            .sex(Sex::Male)
            .smoking(YesNo::Yes)
            .build()
            .unwrap();
        let columns = record.categorical_columns();
        assert_eq!(columns[0], (Attribute::Sex, "Male"));
        assert_eq!(columns[4], (Attribute::Smoking, "Yes"));
        assert!(columns.iter().all(|(a, _)| a.is_categorical()));
        assert!(record.numeric_columns().iter().all(|(a, _)| !a.is_categorical()));
    }
}
