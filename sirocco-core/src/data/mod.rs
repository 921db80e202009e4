//! Market data structures.

mod bar;
mod enriched;

pub use bar::Bar;
pub use enriched::{EnrichedBar, Field};
