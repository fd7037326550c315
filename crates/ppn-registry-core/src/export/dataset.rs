//! Dataset export for download.

use serde::Serialize;

use crate::models::Dataset;
use crate::store::csv::format_table;

/// Suggested file name for a downloaded result set.
pub const DEFAULT_EXPORT_FILE: &str = "ppn_search_results.csv";

/// Export metadata.
#[derive(Debug, Clone, Serialize)]
pub struct ExportMetadata {
    /// Export timestamp
    pub exported_at: String,
    /// Number of exported records
    pub record_count: usize,
    /// Search text that produced the set, if any
    pub query: Option<String>,
}

/// A result set ready for download.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetExport {
    pub metadata: ExportMetadata,
    pub records: Dataset,
}

impl DatasetExport {
    pub fn new(records: Dataset) -> Self {
        Self {
            metadata: ExportMetadata {
                exported_at: chrono::Utc::now().to_rfc3339(),
                record_count: records.len(),
                query: None,
            },
            records,
        }
    }

    /// Record the search text that produced this set.
    pub fn with_query(mut self, query: &str) -> Self {
        let query = query.trim();
        self.metadata.query = (!query.is_empty()).then(|| query.to_string());
        self
    }

    /// Export to JSON (metadata plus records).
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Export to CSV in backing-store format.
    pub fn to_csv(&self) -> String {
        format_table(&self.records)
    }
}

/// Store-format CSV bytes for a dataset.
pub fn to_csv_bytes(dataset: &Dataset) -> Vec<u8> {
    format_table(dataset).into_bytes()
}
