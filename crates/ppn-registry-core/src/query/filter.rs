//! Categorical and rating filters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{Dataset, TreatmentRecord};

/// Allowed values for one categorical column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CategoryFilter {
    /// Every value passes
    #[default]
    Any,
    /// Only exact (case-sensitive) members pass; an empty set passes nothing
    OneOf(BTreeSet<String>),
}

impl CategoryFilter {
    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategoryFilter::OneOf(values.into_iter().map(Into::into).collect())
    }

    pub fn allows(&self, value: &str) -> bool {
        match self {
            CategoryFilter::Any => true,
            CategoryFilter::OneOf(allowed) => allowed.contains(value),
        }
    }
}

/// Focus area, chemical and minimum rating predicates, ANDed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordFilter {
    pub focus: CategoryFilter,
    pub chemical: CategoryFilter,
    /// Inclusive lower bound on the outcome rating
    pub min_rating: i64,
}

impl Default for RecordFilter {
    fn default() -> Self {
        Self {
            focus: CategoryFilter::Any,
            chemical: CategoryFilter::Any,
            min_rating: 1,
        }
    }
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(mut self, focus: CategoryFilter) -> Self {
        self.focus = focus;
        self
    }

    pub fn chemical(mut self, chemical: CategoryFilter) -> Self {
        self.chemical = chemical;
        self
    }

    pub fn min_rating(mut self, min_rating: i64) -> Self {
        self.min_rating = min_rating;
        self
    }

    pub fn matches(&self, record: &TreatmentRecord) -> bool {
        passes(record, &self.focus, &self.chemical, self.min_rating)
    }

    /// Matching records, order preserved.
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        dataset.retain_cloned(|record| self.matches(record))
    }
}

/// Equivalent to building a [`RecordFilter`] and applying it.
pub fn filter(
    dataset: &Dataset,
    focus: &CategoryFilter,
    chemical: &CategoryFilter,
    min_rating: i64,
) -> Dataset {
    dataset.retain_cloned(|record| passes(record, focus, chemical, min_rating))
}

fn passes(
    record: &TreatmentRecord,
    focus: &CategoryFilter,
    chemical: &CategoryFilter,
    min_rating: i64,
) -> bool {
    focus.allows(&record.focus_area)
        && chemical.allows(&record.chemical_used)
        && record.treatment_outcome_rating >= min_rating
}
