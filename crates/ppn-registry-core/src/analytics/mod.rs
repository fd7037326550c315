//! Aggregates and drill-down derived from a (filtered) dataset.

mod aggregate;
mod drilldown;

pub use aggregate::*;
pub use drilldown::*;
