//! Ordered collection of treatment records.

use serde::{Deserialize, Serialize};

use super::record::TreatmentRecord;

/// Records in file order (insertion order = append order).
///
/// Query and aggregation code only ever reads a dataset; derived views are
/// new datasets.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<TreatmentRecord>,
}

impl Dataset {
    pub fn new(records: Vec<TreatmentRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TreatmentRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TreatmentRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&TreatmentRecord> {
        self.records.get(index)
    }

    pub fn last(&self) -> Option<&TreatmentRecord> {
        self.records.last()
    }

    pub fn into_records(self) -> Vec<TreatmentRecord> {
        self.records
    }

    /// New dataset holding the records that satisfy `keep`, order preserved.
    pub fn retain_cloned<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&TreatmentRecord) -> bool,
    {
        self.records.iter().filter(|r| keep(r)).cloned().collect()
    }
}

impl From<Vec<TreatmentRecord>> for Dataset {
    fn from(records: Vec<TreatmentRecord>) -> Self {
        Self::new(records)
    }
}

impl FromIterator<TreatmentRecord> for Dataset {
    fn from_iter<I: IntoIterator<Item = TreatmentRecord>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a TreatmentRecord;
    type IntoIter = std::slice::Iter<'a, TreatmentRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
