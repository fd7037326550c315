//! Free-text search across every field of a record.

use crate::models::{Dataset, TreatmentRecord};

/// Separator placed between fields when building a record's search text.
pub const FIELD_SEPARATOR: &str = " | ";

/// All fields stringified, joined with [`FIELD_SEPARATOR`], lower-cased.
pub fn search_text(record: &TreatmentRecord) -> String {
    record
        .fields()
        .collect::<Vec<_>>()
        .join(FIELD_SEPARATOR)
        .to_lowercase()
}

/// Records whose search text contains `query` (trimmed, case-insensitive).
///
/// A blank query returns a copy of the whole dataset. Plain substring
/// containment: no tokenizing, no ranking, original order kept.
pub fn search(dataset: &Dataset, query: &str) -> Dataset {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return dataset.clone();
    }
    dataset.retain_cloned(|record| search_text(record).contains(&needle))
}
