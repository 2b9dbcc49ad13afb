//! Error types for the authority model

use thiserror::Error;

/// Authority model errors
///
/// Lookups never fail once a model is built; these only surface while
/// parsing identifiers or validating a role table.
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Role table rejected during validation
    #[error("Invalid role table: {0}")]
    InvalidRoleTable(String),

    /// Unrecognized role name
    #[error("Unknown role: {0}")]
    UnknownRole(String),

    /// Unrecognized resource name
    #[error("Unknown resource: {0}")]
    UnknownResource(String),

    /// Unrecognized permission name
    #[error("Unknown permission: {0}")]
    UnknownPermission(String),

    /// Approval level outside 0..=5
    #[error("Approval level {0} out of range (0-5)")]
    LevelOutOfRange(u8),
}

/// Result type for authority model operations
pub type Result<T> = std::result::Result<T, AuthzError>;
