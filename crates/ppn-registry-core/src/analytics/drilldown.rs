//! Per-client drill-down.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::models::{Dataset, TreatmentRecord};

/// The client's record with the latest treatment date.
///
/// Client ids match exactly. Unset dates rank below every real date; among
/// equal dates (or when every date is unset) the first record in dataset
/// order wins. `None` when the client has no records.
pub fn most_recent_for_client<'a>(
    dataset: &'a Dataset,
    client_id: &str,
) -> Option<&'a TreatmentRecord> {
    let mut best: Option<&TreatmentRecord> = None;
    for record in dataset.iter().filter(|r| r.client_id == client_id) {
        best = match best {
            Some(current) if recency(record, current) != Ordering::Greater => Some(current),
            _ => Some(record),
        };
    }
    best
}

/// Every record for the client, newest first, unset dates last.
pub fn client_history(dataset: &Dataset, client_id: &str) -> Dataset {
    let mut records: Vec<TreatmentRecord> = dataset
        .iter()
        .filter(|r| r.client_id == client_id)
        .cloned()
        .collect();
    records.sort_by(|a, b| recency(b, a));
    Dataset::new(records)
}

/// Distinct non-blank client ids, sorted.
pub fn client_ids(dataset: &Dataset) -> Vec<String> {
    dataset
        .iter()
        .filter(|r| !r.client_id.is_empty())
        .map(|r| r.client_id.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Order by treatment date, unset dates lowest.
fn recency(a: &TreatmentRecord, b: &TreatmentRecord) -> Ordering {
    // Option orders None below Some
    a.treatment_date.cmp(&b.treatment_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(client_id: &str, date: Option<(i32, u32, u32)>, notes: &str) -> TreatmentRecord {
        TreatmentRecord {
            client_id: client_id.into(),
            treatment_date: date.and_then(|(y, m, d)| NaiveDate::from_ymd_opt(y, m, d)),
            next_steps: notes.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_latest_date_wins() {
        let ds: Dataset = vec![
            record("P-1", Some((2024, 1, 1)), "old"),
            record("P-1", Some((2024, 3, 1)), "new"),
            record("P-1", Some((2024, 2, 1)), "mid"),
        ]
        .into();
        assert_eq!(most_recent_for_client(&ds, "P-1").unwrap().next_steps, "new");
    }

    #[test]
    fn test_unset_dates_rank_last() {
        let ds: Dataset = vec![
            record("P-1", None, "undated"),
            record("P-1", Some((2020, 1, 1)), "dated"),
        ]
        .into();
        assert_eq!(most_recent_for_client(&ds, "P-1").unwrap().next_steps, "dated");
    }

    #[test]
    fn test_all_unset_returns_first() {
        let ds: Dataset = vec![record("P-1", None, "first"), record("P-1", None, "second")].into();
        assert_eq!(most_recent_for_client(&ds, "P-1").unwrap().next_steps, "first");
    }

    #[test]
    fn test_tie_returns_first() {
        let ds: Dataset = vec![
            record("P-1", Some((2024, 1, 1)), "first"),
            record("P-1", Some((2024, 1, 1)), "second"),
        ]
        .into();
        assert_eq!(most_recent_for_client(&ds, "P-1").unwrap().next_steps, "first");
    }

    #[test]
    fn test_unknown_client() {
        let ds: Dataset = vec![record("P-1", None, "")].into();
        assert!(most_recent_for_client(&ds, "P-2").is_none());
        assert!(most_recent_for_client(&ds, "p-1").is_none());
    }

    #[test]
    fn test_client_history_order() {
        let ds: Dataset = vec![
            record("P-1", None, "undated"),
            record("P-1", Some((2024, 1, 1)), "old"),
            record("P-2", Some((2024, 6, 1)), "other"),
            record("P-1", Some((2024, 5, 1)), "new"),
        ]
        .into();

        let history = client_history(&ds, "P-1");
        let notes: Vec<_> = history.iter().map(|r| r.next_steps.as_str()).collect();
        assert_eq!(notes, vec!["new", "old", "undated"]);
    }

    #[test]
    fn test_client_ids_sorted_distinct() {
        let ds: Dataset = vec![
            record("P-7", None, ""),
            record("P-1", None, ""),
            record("", None, ""),
            record("P-7", None, ""),
        ]
        .into();
        assert_eq!(client_ids(&ds), vec!["P-1".to_string(), "P-7".to_string()]);
    }
}
