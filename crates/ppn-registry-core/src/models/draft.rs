//! New-record drafts and required-field validation.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::record::{Column, TreatmentRecord, CHEMICALS, FOCUS_AREAS, INTAKE_FORMS, SEX_OPTIONS};

/// Validation failures raised before any write is attempted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Practitioner name is required")]
    MissingPractitioner,

    #[error("Client ID is required")]
    MissingClientId,

    #[error("{column} must be between {min} and {max}, got {value}")]
    OutOfRange {
        column: Column,
        min: i64,
        max: i64,
        value: i64,
    },
}

/// Inclusive ranges the record form allows.
const FORM_RANGES: [(Column, i64, i64); 3] = [
    (Column::PatientAge, 21, 75),
    (Column::DosageMg, 0, 2000),
    (Column::TreatmentOutcomeRating, 1, 5),
];

/// Raw form input for a new record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRecord {
    pub practitioner_name: String,
    pub client_id: String,
    pub treatment_date: NaiveDate,
    pub patient_age: i64,
    pub patient_sex: String,
    pub focus_area: String,
    pub chemical_used: String,
    pub dosage_mg: i64,
    pub intake_form: String,
    pub protocol_description: String,
    pub treatment_outcome_rating: i64,
    pub detailed_results: String,
    pub next_steps: String,
}

impl NewRecord {
    /// Create a draft with the form's default selections.
    pub fn new(practitioner_name: String, client_id: String, treatment_date: NaiveDate) -> Self {
        Self {
            practitioner_name,
            client_id,
            treatment_date,
            patient_age: 35,
            patient_sex: SEX_OPTIONS[0].to_string(),
            focus_area: FOCUS_AREAS[0].to_string(),
            chemical_used: CHEMICALS[0].to_string(),
            dosage_mg: 25,
            intake_form: INTAKE_FORMS[0].to_string(),
            protocol_description: String::new(),
            treatment_outcome_rating: 4,
            detailed_results: String::new(),
            next_steps: String::new(),
        }
    }

    /// Check required fields and build the record to store.
    ///
    /// Text fields are trimmed. Numeric ranges are not checked here; see
    /// [`NewRecord::validate_strict`].
    pub fn validate(&self) -> Result<TreatmentRecord, ValidationError> {
        let record = TreatmentRecord {
            practitioner_name: self.practitioner_name.trim().to_string(),
            client_id: self.client_id.trim().to_string(),
            treatment_date: Some(self.treatment_date),
            patient_age: self.patient_age,
            patient_sex: self.patient_sex.trim().to_string(),
            focus_area: self.focus_area.trim().to_string(),
            chemical_used: self.chemical_used.trim().to_string(),
            dosage_mg: self.dosage_mg,
            intake_form: self.intake_form.trim().to_string(),
            protocol_description: self.protocol_description.trim().to_string(),
            treatment_outcome_rating: self.treatment_outcome_rating,
            detailed_results: self.detailed_results.trim().to_string(),
            next_steps: self.next_steps.trim().to_string(),
        };
        validate_required(&record)?;
        Ok(record)
    }

    /// Like [`NewRecord::validate`], also enforcing the form's numeric ranges.
    pub fn validate_strict(&self) -> Result<TreatmentRecord, ValidationError> {
        let record = self.validate()?;
        for (column, min, max) in FORM_RANGES {
            let value = match column {
                Column::PatientAge => record.patient_age,
                Column::DosageMg => record.dosage_mg,
                _ => record.treatment_outcome_rating,
            };
            if value < min || value > max {
                return Err(ValidationError::OutOfRange {
                    column,
                    min,
                    max,
                    value,
                });
            }
        }
        Ok(record)
    }
}

/// Practitioner name and client id must be non-blank.
pub fn validate_required(record: &TreatmentRecord) -> Result<(), ValidationError> {
    if record.practitioner_name.trim().is_empty() {
        return Err(ValidationError::MissingPractitioner);
    }
    if record.client_id.trim().is_empty() {
        return Err(ValidationError::MissingClientId);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> NewRecord {
        NewRecord::new(
            " Dr. A. Smith ".into(),
            "P-1234 ".into(),
            NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        )
    }

    #[test]
    fn test_validate_trims_text() {
        let record = draft().validate().unwrap();
        assert_eq!(record.practitioner_name, "Dr. A. Smith");
        assert_eq!(record.client_id, "P-1234");
        assert_eq!(record.focus_area, "PTSD");
        assert_eq!(record.treatment_outcome_rating, 4);
    }

    #[test]
    fn test_blank_practitioner_rejected() {
        let mut d = draft();
        d.practitioner_name = "   ".into();
        assert_eq!(d.validate(), Err(ValidationError::MissingPractitioner));
    }

    #[test]
    fn test_blank_client_rejected() {
        let mut d = draft();
        d.client_id = String::new();
        assert_eq!(d.validate(), Err(ValidationError::MissingClientId));
    }

    #[test]
    fn test_strict_checks_ranges() {
        let mut d = draft();
        d.treatment_outcome_rating = 0;
        assert!(d.validate().is_ok());

        let err = d.validate_strict().unwrap_err();
        assert_eq!(
            err,
            ValidationError::OutOfRange {
                column: Column::TreatmentOutcomeRating,
                min: 1,
                max: 5,
                value: 0,
            }
        );
        assert_eq!(
            err.to_string(),
            "Treatment_Outcome_Rating must be between 1 and 5, got 0"
        );
    }

    #[test]
    fn test_strict_accepts_form_defaults() {
        assert!(draft().validate_strict().is_ok());
    }
}
