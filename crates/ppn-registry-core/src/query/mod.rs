//! Query engine over an immutable dataset snapshot.
//!
//! Pipeline: Search (free text) → Filter (focus, chemical, minimum rating)

mod filter;
mod search;

pub use filter::*;
pub use search::*;

use crate::models::Dataset;

/// A full query as a front end issues it: text search, then filters.
pub fn run_query(dataset: &Dataset, text: &str, filter: &RecordFilter) -> Dataset {
    filter.apply(&search(dataset, text))
}
