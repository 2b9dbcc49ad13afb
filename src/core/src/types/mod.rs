//! Shared types for the POAMFlow crates

pub mod ids;

// Re-export commonly used types
pub use ids::{RecordId, RecordKey, TenantId, UserId};
