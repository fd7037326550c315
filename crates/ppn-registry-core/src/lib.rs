//! PPN Registry Core Library
//!
//! Practitioner registry of psychedelic-assisted treatment sessions, backed
//! by a single CSV file.
//!
//! # Architecture
//!
//! ```text
//!   seed_data.csv ──(missing/unreadable)──► built-in sample records
//!         │                                          │
//!         └──────────────► Raw table ◄───────────────┘
//!                              │
//!                        Normalization
//!                              │
//!                     Dataset snapshot (cached)
//!                              │
//!                 Search → Filter (focus, chemical, rating)
//!                              │
//!         ┌────────────────────┼─────────────────────┐
//!         ▼                    ▼                     ▼
//!     Aggregates          Client drill-down        Export
//!  (means, counts)                              (CSV, JSON)
//!
//!   New-record form → validation → append row → cache invalidated
//! ```
//!
//! # Modules
//!
//! - [`models`]: Record, column schema, dataset, new-record drafts
//! - [`schema`]: Raw tables and normalization into records
//! - [`store`]: CSV store with load cache, fallback data and append
//! - [`query`]: Free-text search and categorical filters
//! - [`analytics`]: Group-by aggregates and per-client drill-down
//! - [`export`]: Result-set download as CSV or JSON
//! - [`config`]: File and environment configuration

pub mod analytics;
pub mod config;
pub mod export;
pub mod models;
pub mod query;
pub mod schema;
pub mod store;

// Re-export commonly used types
pub use analytics::{CategoryValue, OutcomePolicy, Summary};
pub use config::RegistryConfig;
pub use export::DatasetExport;
pub use models::{Column, Dataset, NewRecord, TreatmentRecord, ValidationError};
pub use query::{CategoryFilter, RecordFilter};
pub use schema::{normalize, RawTable, RawValue};
pub use store::{DataSource, RecordStore, Snapshot, StoreError};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
#[uniffi(flat_error)]
pub enum RegistryError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Store locked: {0}")]
    Locked(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("Unexpected error: {0}")]
    Unexpected(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Invalid(_) => RegistryError::InvalidInput(e.to_string()),
            StoreError::Locked { .. } => RegistryError::Locked(e.to_string()),
            StoreError::Io { .. } => RegistryError::Io(e.to_string()),
            StoreError::Unexpected { .. } => RegistryError::Unexpected(e.to_string()),
        }
    }
}

impl From<ValidationError> for RegistryError {
    fn from(e: ValidationError) -> Self {
        RegistryError::InvalidInput(e.to_string())
    }
}

impl From<config::ConfigError> for RegistryError {
    fn from(e: config::ConfigError) -> Self {
        RegistryError::InvalidInput(e.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(e: serde_json::Error) -> Self {
        RegistryError::Serialization(e.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for RegistryError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        RegistryError::Unexpected(format!("Lock poisoned: {}", e))
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Open the registry backed by the CSV file at `path`.
///
/// The file need not exist; loads fall back to sample records until the
/// first append creates it.
#[uniffi::export]
pub fn open_registry(path: String) -> Arc<RegistryCore> {
    let config = RegistryConfig {
        store_path: path.into(),
        ..Default::default()
    };
    RegistryCore::from_config(&config)
}

/// Open the registry from a config file, or from `ppn-registry.toml` and the
/// environment when `config_path` is `None`.
#[uniffi::export]
pub fn open_registry_with_config(
    config_path: Option<String>,
) -> Result<Arc<RegistryCore>, RegistryError> {
    let config = RegistryConfig::discover(config_path.as_deref().map(std::path::Path::new))?;
    Ok(RegistryCore::from_config(&config))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe registry wrapper for FFI.
#[derive(uniffi::Object)]
pub struct RegistryCore {
    store: Arc<Mutex<RecordStore>>,
    policy: OutcomePolicy,
}

impl RegistryCore {
    pub fn from_config(config: &RegistryConfig) -> Arc<Self> {
        Arc::new(Self {
            store: Arc::new(Mutex::new(config.open_store())),
            policy: config.outcome_policy,
        })
    }

    fn snapshot(&self) -> Result<Snapshot, RegistryError> {
        let mut store = self.store.lock()?;
        Ok(store.load())
    }

    fn select(&self, query: &FfiQuery) -> Result<Dataset, RegistryError> {
        let snapshot = self.snapshot()?;
        Ok(query::run_query(&snapshot.dataset, &query.text, &query.filter()))
    }
}

#[uniffi::export]
impl RegistryCore {
    // =========================================================================
    // Load Operations
    // =========================================================================

    /// Load (or reuse) the dataset and describe where it came from.
    pub fn load_info(&self) -> Result<FfiLoadInfo, RegistryError> {
        Ok(self.snapshot()?.into())
    }

    /// Whether the current dataset is the built-in sample set.
    pub fn is_using_fallback(&self) -> Result<bool, RegistryError> {
        Ok(self.snapshot()?.source.is_fallback())
    }

    /// Choices offered by the new-record form.
    pub fn form_options(&self) -> FfiFormOptions {
        FfiFormOptions::default()
    }

    // =========================================================================
    // Query Operations
    // =========================================================================

    /// Search and filter records.
    pub fn query(&self, query: FfiQuery) -> Result<Vec<FfiRecord>, RegistryError> {
        let hits = self.select(&query)?;
        Ok(hits.into_records().into_iter().map(|r| r.into()).collect())
    }

    /// Record count and mean rating of the query's result set.
    pub fn summary(&self, query: FfiQuery) -> Result<FfiSummary, RegistryError> {
        let hits = self.select(&query)?;
        Ok(analytics::summarize(&hits, self.policy).into())
    }

    /// Mean outcome rating per chemical.
    pub fn mean_rating_by_chemical(
        &self,
        query: FfiQuery,
    ) -> Result<Vec<FfiCategoryValue>, RegistryError> {
        let hits = self.select(&query)?;
        let means = analytics::mean_outcome_by_category(&hits, Column::ChemicalUsed, self.policy);
        Ok(means.into_iter().map(|m| m.into()).collect())
    }

    /// Record count per focus area, most frequent first.
    pub fn count_by_focus_area(
        &self,
        query: FfiQuery,
    ) -> Result<Vec<FfiCategoryValue>, RegistryError> {
        let hits = self.select(&query)?;
        let counts = analytics::count_by_category(&hits, Column::FocusArea);
        Ok(counts.into_iter().map(|c| c.into()).collect())
    }

    // =========================================================================
    // Drill-down Operations
    // =========================================================================

    /// Client ids present in the query's result set.
    pub fn client_ids(&self, query: FfiQuery) -> Result<Vec<String>, RegistryError> {
        let hits = self.select(&query)?;
        Ok(analytics::client_ids(&hits))
    }

    /// The client's latest record within the query's result set.
    pub fn most_recent_for_client(
        &self,
        query: FfiQuery,
        client_id: String,
    ) -> Result<Option<FfiRecord>, RegistryError> {
        let hits = self.select(&query)?;
        Ok(analytics::most_recent_for_client(&hits, &client_id)
            .cloned()
            .map(|r| r.into()))
    }

    // =========================================================================
    // Write Operations
    // =========================================================================

    /// Validate and append a new record. Returns the stored record.
    pub fn add_record(&self, record: FfiNewRecord) -> Result<FfiRecord, RegistryError> {
        let draft = NewRecord::try_from(record)?;
        let record = draft.validate_strict()?;
        let mut store = self.store.lock()?;
        store.append(&record)?;
        Ok(record.into())
    }

    // =========================================================================
    // Export Operations
    // =========================================================================

    /// Export the query's result set as CSV.
    pub fn export_csv(&self, query: FfiQuery) -> Result<String, RegistryError> {
        let hits = self.select(&query)?;
        Ok(DatasetExport::new(hits).with_query(&query.text).to_csv())
    }

    /// Export the query's result set as JSON.
    pub fn export_json(&self, query: FfiQuery) -> Result<String, RegistryError> {
        let hits = self.select(&query)?;
        Ok(DatasetExport::new(hits).with_query(&query.text).to_json()?)
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe query: text search plus filters. `None` category lists mean
/// "no restriction".
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiQuery {
    pub text: String,
    pub focus_areas: Option<Vec<String>>,
    pub chemicals: Option<Vec<String>>,
    pub min_rating: i64,
}

impl FfiQuery {
    fn filter(&self) -> RecordFilter {
        let category = |values: &Option<Vec<String>>| match values {
            Some(values) => CategoryFilter::one_of(values.iter().cloned()),
            None => CategoryFilter::Any,
        };
        RecordFilter::new()
            .focus(category(&self.focus_areas))
            .chemical(category(&self.chemicals))
            .min_rating(self.min_rating)
    }
}

impl Default for FfiQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            focus_areas: None,
            chemicals: None,
            min_rating: RecordFilter::default().min_rating,
        }
    }
}

/// FFI-safe record. Dates are `YYYY-MM-DD`, empty when unset.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRecord {
    pub practitioner_name: String,
    pub client_id: String,
    pub treatment_date: String,
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

impl From<TreatmentRecord> for FfiRecord {
    fn from(record: TreatmentRecord) -> Self {
        Self {
            treatment_date: record.date_string(),
            practitioner_name: record.practitioner_name,
            client_id: record.client_id,
            patient_age: record.patient_age,
            patient_sex: record.patient_sex,
            focus_area: record.focus_area,
            chemical_used: record.chemical_used,
            dosage_mg: record.dosage_mg,
            intake_form: record.intake_form,
            protocol_description: record.protocol_description,
            treatment_outcome_rating: record.treatment_outcome_rating,
            detailed_results: record.detailed_results,
            next_steps: record.next_steps,
        }
    }
}

/// FFI-safe new-record form input.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNewRecord {
    pub practitioner_name: String,
    pub client_id: String,
    pub treatment_date: String,
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

impl TryFrom<FfiNewRecord> for NewRecord {
    type Error = RegistryError;

    fn try_from(record: FfiNewRecord) -> Result<Self, Self::Error> {
        let treatment_date = schema::parse_date(&record.treatment_date).ok_or_else(|| {
            RegistryError::InvalidInput(format!(
                "Unrecognised treatment date: {:?}",
                record.treatment_date
            ))
        })?;
        Ok(NewRecord {
            practitioner_name: record.practitioner_name,
            client_id: record.client_id,
            treatment_date,
            patient_age: record.patient_age,
            patient_sex: record.patient_sex,
            focus_area: record.focus_area,
            chemical_used: record.chemical_used,
            dosage_mg: record.dosage_mg,
            intake_form: record.intake_form,
            protocol_description: record.protocol_description,
            treatment_outcome_rating: record.treatment_outcome_rating,
            detailed_results: record.detailed_results,
            next_steps: record.next_steps,
        })
    }
}

/// FFI-safe chart bar.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCategoryValue {
    pub category: String,
    pub value: f64,
}

impl From<CategoryValue> for FfiCategoryValue {
    fn from(cv: CategoryValue) -> Self {
        Self {
            category: cv.category,
            value: cv.value,
        }
    }
}

/// FFI-safe summary metrics.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSummary {
    pub total: u64,
    pub average_rating: f64,
}

impl From<Summary> for FfiSummary {
    fn from(summary: Summary) -> Self {
        Self {
            total: summary.total as u64,
            average_rating: summary.average_rating,
        }
    }
}

/// FFI-safe load report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLoadInfo {
    pub record_count: u64,
    pub using_fallback: bool,
    pub fallback_reason: Option<String>,
    /// Rows with at least one cell filled by a default
    pub defaulted_rows: u64,
}

impl From<Snapshot> for FfiLoadInfo {
    fn from(snapshot: Snapshot) -> Self {
        let fallback_reason = match &snapshot.source {
            DataSource::Fallback { reason } => Some(reason.clone()),
            DataSource::File => None,
        };
        Self {
            record_count: snapshot.dataset.len() as u64,
            using_fallback: fallback_reason.is_some(),
            fallback_reason,
            defaulted_rows: snapshot.defaulted.len() as u64,
        }
    }
}

/// FFI-safe form choices.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFormOptions {
    pub focus_areas: Vec<String>,
    pub chemicals: Vec<String>,
    pub intake_forms: Vec<String>,
    pub sex_options: Vec<String>,
}

impl Default for FfiFormOptions {
    fn default() -> Self {
        let owned = |values: &[&str]| -> Vec<String> {
            values.iter().map(|v| v.to_string()).collect()
        };
        Self {
            focus_areas: owned(&models::FOCUS_AREAS),
            chemicals: owned(&models::CHEMICALS),
            intake_forms: owned(&models::INTAKE_FORMS),
            sex_options: owned(&models::SEX_OPTIONS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_record(client_id: &str, date: &str) -> FfiNewRecord {
        FfiNewRecord {
            practitioner_name: "Dr. A. Smith".into(),
            client_id: client_id.into(),
            treatment_date: date.into(),
            patient_age: 40,
            patient_sex: "F".into(),
            focus_area: "PTSD".into(),
            chemical_used: "Ketamine".into(),
            dosage_mg: 50,
            intake_form: "Injected".into(),
            protocol_description: "Low dose".into(),
            treatment_outcome_rating: 4,
            detailed_results: String::new(),
            next_steps: String::new(),
        }
    }

    #[test]
    fn test_missing_store_reports_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let core = open_registry(dir.path().join("seed_data.csv").display().to_string());

        let info = core.load_info().unwrap();
        assert!(info.using_fallback);
        assert!(info.fallback_reason.is_some());
        assert_eq!(info.record_count, 4);
    }

    #[test]
    fn test_load_info_counts_defaulted_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partial.csv");
        std::fs::write(&path, "Client_ID,Chemical_Used\nP-1,LSD\nP-2,DMT\n").unwrap();
        let core = open_registry(path.display().to_string());

        let info = core.load_info().unwrap();
        assert!(!info.using_fallback);
        assert_eq!(info.record_count, 2);
        assert_eq!(info.defaulted_rows, 2u64);
    }

    #[test]
    fn test_add_then_query() {
        let dir = tempfile::tempdir().unwrap();
        let core = open_registry(dir.path().join("seed_data.csv").display().to_string());

        core.add_record(new_record("P-9", "2024-05-01")).unwrap();
        assert!(!core.is_using_fallback().unwrap());

        let hits = core.query(FfiQuery::default()).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].treatment_date, "2024-05-01");

        let latest = core
            .most_recent_for_client(FfiQuery::default(), "P-9".into())
            .unwrap()
            .unwrap();
        assert_eq!(latest.chemical_used, "Ketamine");
    }

    #[test]
    fn test_add_rejects_bad_input() {
        let dir = tempfile::tempdir().unwrap();
        let core = open_registry(dir.path().join("seed_data.csv").display().to_string());

        let err = core.add_record(new_record("", "2024-05-01")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));

        let err = core.add_record(new_record("P-1", "someday")).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidInput(_)));

        let mut out_of_range = new_record("P-1", "2024-05-01");
        out_of_range.treatment_outcome_rating = 9;
        assert!(core.add_record(out_of_range).is_err());

        assert!(!dir.path().join("seed_data.csv").exists());
    }

    #[test]
    fn test_query_filters() {
        let dir = tempfile::tempdir().unwrap();
        let core = open_registry(dir.path().join("missing.csv").display().to_string());

        let query = FfiQuery {
            chemicals: Some(vec!["Psilocybin".into()]),
            ..Default::default()
        };
        let hits = core.query(query.clone()).unwrap();
        assert!(hits.iter().all(|r| r.chemical_used == "Psilocybin"));

        let summary = core.summary(query).unwrap();
        assert_eq!(summary.total, hits.len() as u64);
    }

    #[test]
    fn test_export_json_has_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let core = open_registry(dir.path().join("missing.csv").display().to_string());

        let json = core.export_json(FfiQuery::default()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["metadata"]["record_count"], 4);
        assert_eq!(value["records"].as_array().unwrap().len(), 4);
    }
}
