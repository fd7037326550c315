//! Export of result sets as CSV (store format) or JSON.

mod dataset;

pub use dataset::*;
