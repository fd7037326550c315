//! Domain models for the treatment registry.

mod dataset;
mod draft;
mod record;

pub use dataset::*;
pub use draft::*;
pub use record::*;
