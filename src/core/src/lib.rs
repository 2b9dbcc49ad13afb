//! # POAMFlow Core
//!
//! Shared identifiers, the clock seam, and error handling for the POAMFlow
//! crates. Kept dependency-light so the authority model and the workflow
//! engine can both build on it without pulling in storage or async runtimes.

pub mod types;
pub mod traits;
pub mod error;

// Re-export commonly used types
pub use error::{CoreError, Result};
pub use types::{RecordId, RecordKey, TenantId, UserId};
pub use traits::{Clock, FixedClock, SystemClock};
