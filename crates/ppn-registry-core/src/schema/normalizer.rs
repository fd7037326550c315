//! Record normalizer.
//!
//! Handles:
//! - Missing columns (synthesized as empty text, zero, or unset date)
//! - Numeric coercion (unparseable → 0, fractional values truncated)
//! - Date parsing (several layouts, unparseable → unset)
//! - Trimming of categorical text columns
//!
//! Nothing here fails. Every defaulted cell is reported so strict callers can
//! inspect what was filled in.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;

use super::{RawTable, RawValue};
use crate::models::{Column, ColumnKind, Dataset, TreatmentRecord};

/// Date-only layouts accepted on load.
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Date-time layouts accepted on load; only the date part is kept.
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"];

static MISSING: RawValue = RawValue::Missing;

/// Columns that were filled with a default for one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowDefaults {
    /// Zero-based row index
    pub row: usize,
    pub columns: Vec<Column>,
}

/// Output of [`normalize`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedTable {
    pub dataset: Dataset,
    /// Rows with at least one defaulted column, in row order
    pub defaulted: Vec<RowDefaults>,
}

impl NormalizedTable {
    /// True when no cell needed a default.
    pub fn is_clean(&self) -> bool {
        self.defaulted.is_empty()
    }
}

/// Coerce a raw table into the canonical dataset.
///
/// Headers are matched with [`Column::from_header`]; unknown columns are
/// ignored and the first of any duplicate headers wins.
pub fn normalize(table: &RawTable) -> NormalizedTable {
    let mut by_column: HashMap<Column, &[RawValue]> = HashMap::new();
    for raw in table.columns() {
        if let Some(column) = Column::from_header(&raw.name) {
            by_column.entry(column).or_insert(raw.values.as_slice());
        }
    }

    let row_count = table.row_count();
    let mut records = Vec::with_capacity(row_count);
    let mut defaulted = Vec::new();

    for row in 0..row_count {
        let (record, columns) = normalize_row(|column| {
            by_column
                .get(&column)
                .map(|values| values.get(row).unwrap_or(&MISSING))
        });
        if !columns.is_empty() {
            defaulted.push(RowDefaults { row, columns });
        }
        records.push(record);
    }

    NormalizedTable {
        dataset: Dataset::new(records),
        defaulted,
    }
}

/// Normalize a single row.
///
/// `value_of` returns `None` when the column is absent from the input
/// altogether. Returns the fully populated record and the columns that were
/// defaulted.
pub fn normalize_row<'a, F>(value_of: F) -> (TreatmentRecord, Vec<Column>)
where
    F: Fn(Column) -> Option<&'a RawValue>,
{
    let mut record = TreatmentRecord::default();
    let mut defaulted = Vec::new();

    for column in Column::ALL {
        let value = value_of(column).unwrap_or(&MISSING);
        let filled = match column.kind() {
            ColumnKind::Text | ColumnKind::TrimmedText => match coerce_text(value) {
                Some(text) => {
                    let text = if column.kind() == ColumnKind::TrimmedText {
                        text.trim().to_string()
                    } else {
                        text
                    };
                    set_text(&mut record, column, text);
                    true
                }
                None => false,
            },
            ColumnKind::Integer => match coerce_integer(value) {
                Some(n) => {
                    set_integer(&mut record, column, n);
                    true
                }
                None => false,
            },
            ColumnKind::Date => {
                record.treatment_date = coerce_date(value);
                record.treatment_date.is_some()
            }
        };
        if !filled {
            defaulted.push(column);
        }
    }

    (record, defaulted)
}

/// Parse a calendar date from any accepted layout.
pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(datetime.date());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|datetime| datetime.date_naive())
}

/// Parse an integer, accepting finite decimals (truncated toward zero).
pub fn parse_integer(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    trimmed.parse::<f64>().ok().and_then(truncate_float)
}

fn truncate_float(f: f64) -> Option<i64> {
    if f.is_finite() {
        Some(f.trunc() as i64)
    } else {
        None
    }
}

fn coerce_text(value: &RawValue) -> Option<String> {
    match value {
        RawValue::Missing => None,
        RawValue::Text(s) => Some(s.clone()),
        RawValue::Integer(n) => Some(n.to_string()),
        RawValue::Float(f) => Some(f.to_string()),
    }
}

fn coerce_integer(value: &RawValue) -> Option<i64> {
    match value {
        RawValue::Missing => None,
        RawValue::Text(s) => parse_integer(s),
        RawValue::Integer(n) => Some(*n),
        RawValue::Float(f) => truncate_float(*f),
    }
}

fn coerce_date(value: &RawValue) -> Option<NaiveDate> {
    match value {
        RawValue::Text(s) => parse_date(s),
        _ => None,
    }
}

fn set_text(record: &mut TreatmentRecord, column: Column, text: String) {
    let slot = match column {
        Column::PractitionerName => &mut record.practitioner_name,
        Column::ClientId => &mut record.client_id,
        Column::PatientSex => &mut record.patient_sex,
        Column::FocusArea => &mut record.focus_area,
        Column::ChemicalUsed => &mut record.chemical_used,
        Column::IntakeForm => &mut record.intake_form,
        Column::ProtocolDescription => &mut record.protocol_description,
        Column::DetailedResults => &mut record.detailed_results,
        Column::NextSteps => &mut record.next_steps,
        _ => return,
    };
    *slot = text;
}

fn set_integer(record: &mut TreatmentRecord, column: Column, n: i64) {
    match column {
        Column::PatientAge => record.patient_age = n,
        Column::DosageMg => record.dosage_mg = n,
        Column::TreatmentOutcomeRating => record.treatment_outcome_rating = n,
        _ => {}
    }
}
