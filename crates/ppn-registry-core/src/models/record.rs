//! Treatment record model.

use std::borrow::Cow;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Focus areas offered by the record form.
pub const FOCUS_AREAS: [&str; 4] = ["PTSD", "Addiction", "General Personal Health", "Spirituality"];

/// Chemicals offered by the record form.
pub const CHEMICALS: [&str; 7] = [
    "Psilocybin",
    "Ketamine",
    "MDMA",
    "DMT",
    "LSD",
    "Cannabis",
    "Other",
];

/// Intake forms offered by the record form.
pub const INTAKE_FORMS: [&str; 6] = ["Inhaled", "Eaten", "Drank", "Injected", "Topical", "Other"];

/// Sex options offered by the record form.
pub const SEX_OPTIONS: [&str; 3] = ["M", "F", "Non-Binary"];

/// Date format used by the backing store and exports.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// One treatment encounter.
///
/// The vocabularies above are what the form offers, but stored values are
/// plain strings and are never checked against them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreatmentRecord {
    /// Practitioner who ran the session
    pub practitioner_name: String,
    /// Anonymous client code (not unique across records)
    pub client_id: String,
    /// Session date, `None` when the stored value was missing or unparseable
    pub treatment_date: Option<NaiveDate>,
    /// Patient age in years
    pub patient_age: i64,
    /// One of [`SEX_OPTIONS`], free text tolerated
    pub patient_sex: String,
    /// One of [`FOCUS_AREAS`]
    pub focus_area: String,
    /// One of [`CHEMICALS`]
    pub chemical_used: String,
    /// Dosage in milligrams
    pub dosage_mg: i64,
    /// One of [`INTAKE_FORMS`]
    pub intake_form: String,
    /// How the session was run
    pub protocol_description: String,
    /// 1 (no effect) to 5 (highly successful); 0 means unrated
    pub treatment_outcome_rating: i64,
    /// Clinical observations
    pub detailed_results: String,
    /// Follow-up plan
    pub next_steps: String,
}

impl TreatmentRecord {
    /// Stringified value of a single column.
    ///
    /// Dates render as `YYYY-MM-DD`; a missing date renders as the empty string.
    pub fn field(&self, column: Column) -> Cow<'_, str> {
        match column {
            Column::PractitionerName => Cow::Borrowed(&self.practitioner_name),
            Column::ClientId => Cow::Borrowed(&self.client_id),
            Column::TreatmentDate => Cow::Owned(self.date_string()),
            Column::PatientAge => Cow::Owned(self.patient_age.to_string()),
            Column::PatientSex => Cow::Borrowed(&self.patient_sex),
            Column::FocusArea => Cow::Borrowed(&self.focus_area),
            Column::ChemicalUsed => Cow::Borrowed(&self.chemical_used),
            Column::DosageMg => Cow::Owned(self.dosage_mg.to_string()),
            Column::IntakeForm => Cow::Borrowed(&self.intake_form),
            Column::ProtocolDescription => Cow::Borrowed(&self.protocol_description),
            Column::TreatmentOutcomeRating => {
                Cow::Owned(self.treatment_outcome_rating.to_string())
            }
            Column::DetailedResults => Cow::Borrowed(&self.detailed_results),
            Column::NextSteps => Cow::Borrowed(&self.next_steps),
        }
    }

    /// All thirteen fields in canonical column order.
    pub fn fields(&self) -> impl Iterator<Item = Cow<'_, str>> {
        Column::ALL.iter().map(move |column| self.field(*column))
    }

    /// Treatment date as `YYYY-MM-DD`, or empty when unset.
    pub fn date_string(&self) -> String {
        self.treatment_date
            .map(|d| d.format(DATE_FORMAT).to_string())
            .unwrap_or_default()
    }

    /// Whether the outcome rating came from real input (non-zero).
    pub fn is_rated(&self) -> bool {
        self.treatment_outcome_rating != 0
    }
}

/// How a column's raw values are coerced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Free text, kept as-is
    Text,
    /// Categorical text, trimmed of surrounding whitespace
    TrimmedText,
    /// Integer, unparseable values become 0
    Integer,
    /// Calendar date, unparseable values become unset
    Date,
}

/// The thirteen columns of the registry, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Column {
    PractitionerName,
    ClientId,
    TreatmentDate,
    PatientAge,
    PatientSex,
    FocusArea,
    ChemicalUsed,
    DosageMg,
    IntakeForm,
    ProtocolDescription,
    TreatmentOutcomeRating,
    DetailedResults,
    NextSteps,
}

impl Column {
    /// Canonical column order of the backing store.
    pub const ALL: [Column; 13] = [
        Column::PractitionerName,
        Column::ClientId,
        Column::TreatmentDate,
        Column::PatientAge,
        Column::PatientSex,
        Column::FocusArea,
        Column::ChemicalUsed,
        Column::DosageMg,
        Column::IntakeForm,
        Column::ProtocolDescription,
        Column::TreatmentOutcomeRating,
        Column::DetailedResults,
        Column::NextSteps,
    ];

    /// Header written to the backing store.
    pub fn header(self) -> &'static str {
        match self {
            Column::PractitionerName => "Practitioner_Name",
            Column::ClientId => "Client_ID",
            Column::TreatmentDate => "Treatment_Date",
            Column::PatientAge => "Patient_Age",
            Column::PatientSex => "Patient_Sex",
            Column::FocusArea => "Focus_Area",
            Column::ChemicalUsed => "Chemical_Used",
            Column::DosageMg => "Dosage_Mg",
            Column::IntakeForm => "Intake_Form",
            Column::ProtocolDescription => "Protocol_Description",
            Column::TreatmentOutcomeRating => "Treatment_Outcome_Rating",
            Column::DetailedResults => "Detailed_Results",
            Column::NextSteps => "Next_Steps",
        }
    }

    pub fn kind(self) -> ColumnKind {
        match self {
            Column::PractitionerName
            | Column::ClientId
            | Column::PatientSex
            | Column::FocusArea
            | Column::ChemicalUsed
            | Column::IntakeForm => ColumnKind::TrimmedText,
            Column::ProtocolDescription | Column::DetailedResults | Column::NextSteps => {
                ColumnKind::Text
            }
            Column::PatientAge | Column::DosageMg | Column::TreatmentOutcomeRating => {
                ColumnKind::Integer
            }
            Column::TreatmentDate => ColumnKind::Date,
        }
    }

    /// Resolve a header loosely: case-insensitive, surrounding whitespace
    /// ignored, inner spaces treated as underscores.
    pub fn from_header(header: &str) -> Option<Column> {
        let wanted = header.trim().replace(' ', "_").to_lowercase();
        Column::ALL
            .iter()
            .copied()
            .find(|column| column.header().to_lowercase() == wanted)
    }

    /// Header row of the backing store, without line terminator.
    pub fn header_row() -> String {
        Column::ALL
            .iter()
            .map(|column| column.header())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.header())
    }
}
