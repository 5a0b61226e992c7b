//! Domain models for the eye-scan portal.

mod history;
mod prediction;
mod scan;
mod validation;

pub use history::*;
pub use prediction::*;
pub use scan::*;
pub use validation::*;
