//! Shared traits

pub mod clock;

// Re-export commonly used traits
pub use clock::{Clock, FixedClock, SystemClock};
