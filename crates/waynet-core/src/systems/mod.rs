//! Systems - logic that operates on components

mod stats;
mod traversal;

pub use stats::*;
pub use traversal::*;
