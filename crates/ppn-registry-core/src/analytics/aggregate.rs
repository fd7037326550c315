//! Group-by aggregates feeding the summary charts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::models::{Column, Dataset, TreatmentRecord};

/// How an outcome rating of 0 (only produced by malformed input) is treated
/// when averaging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomePolicy {
    /// 0 means unrated and is left out of every mean
    #[default]
    ExcludeUnrated,
    /// 0 is averaged like any other score
    IncludeUnrated,
}

impl OutcomePolicy {
    pub fn counts(self, record: &TreatmentRecord) -> bool {
        match self {
            OutcomePolicy::ExcludeUnrated => record.is_rated(),
            OutcomePolicy::IncludeUnrated => true,
        }
    }
}

/// One bar of a chart: a category label and its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryValue {
    pub category: String,
    pub value: f64,
}

/// Mean outcome rating per distinct value of `column`, ascending by category.
///
/// Categories compare as stringified values, so an empty value is its own
/// group labelled `""`. Under [`OutcomePolicy::ExcludeUnrated`] a group whose
/// records are all unrated has no mean and is left out.
pub fn mean_outcome_by_category(
    dataset: &Dataset,
    column: Column,
    policy: OutcomePolicy,
) -> Vec<CategoryValue> {
    // summed as f64: ratings come from unchecked input and can be huge
    let mut groups: BTreeMap<String, (f64, usize)> = BTreeMap::new();
    for record in dataset.iter().filter(|r| policy.counts(r)) {
        let entry = groups.entry(record.field(column).into_owned()).or_default();
        entry.0 += record.treatment_outcome_rating as f64;
        entry.1 += 1;
    }

    groups
        .into_iter()
        .map(|(category, (sum, count))| CategoryValue {
            category,
            value: sum / count as f64,
        })
        .collect()
}

/// Number of records per distinct value of `column`, most frequent first,
/// ties in ascending category order.
pub fn count_by_category(dataset: &Dataset, column: Column) -> Vec<CategoryValue> {
    let mut groups: BTreeMap<String, usize> = BTreeMap::new();
    for record in dataset {
        *groups.entry(record.field(column).into_owned()).or_default() += 1;
    }

    let mut counts: Vec<(String, usize)> = groups.into_iter().collect();
    // stable sort keeps ascending category order among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));

    counts
        .into_iter()
        .map(|(category, count)| CategoryValue {
            category,
            value: count as f64,
        })
        .collect()
}

/// Headline metrics for a result set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Summary {
    /// Records in the result set
    pub total: usize,
    /// Mean outcome rating, 0.0 when nothing is averaged
    pub average_rating: f64,
}

pub fn summarize(dataset: &Dataset, policy: OutcomePolicy) -> Summary {
    let (sum, count) = dataset
        .iter()
        .filter(|r| policy.counts(r))
        .fold((0f64, 0usize), |(sum, count), r| {
            (sum + r.treatment_outcome_rating as f64, count + 1)
        });

    Summary {
        total: dataset.len(),
        average_rating: if count == 0 {
            0.0
        } else {
            sum / count as f64
        },
    }
}
