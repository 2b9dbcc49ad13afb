//! Unified error types shared by the POAMFlow crates

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed identifier or key
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

impl CoreError {
    /// Create an invalid identifier error
    pub fn invalid_identifier<S: Into<String>>(msg: S) -> Self {
        CoreError::InvalidIdentifier(msg.into())
    }
}
