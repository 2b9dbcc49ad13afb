//! Error types for the approval workflow

use crate::status::StatusName;
use poamflow_authz::{ApprovalLevel, AuthzError, Permission, ProtectedResource, Role};
use poamflow_core::{CoreError, RecordKey, UserId};
use thiserror::Error;

/// Approval workflow errors
///
/// Every variant is local and non-fatal. Nothing is retried internally;
/// callers retry [`WorkflowError::VersionConflict`] with a fresh read and
/// route the rest to a person.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// No record under this tenant/id pair
    #[error("Record not found: {0}")]
    NotFound(RecordKey),

    /// Store already holds a record under this key
    #[error("Record already exists: {0}")]
    AlreadyExists(RecordKey),

    /// Action not permitted from the record's current status
    #[error("Cannot {action} a record in status {status}")]
    InvalidState {
        action: &'static str,
        status: StatusName,
    },

    /// Actor's approval level is below what the action needs
    #[error("Role {role} (level {actual}) lacks authority for level {required}")]
    InsufficientAuthority {
        role: Role,
        actual: ApprovalLevel,
        required: ApprovalLevel,
    },

    /// Actor's role is missing a resource permission
    #[error("Role {role} lacks {permission} permission on {resource}")]
    PermissionDenied {
        role: Role,
        resource: ProtectedResource,
        permission: Permission,
    },

    /// Escalation requested from the top of the ladder
    #[error("No approval authority above level {0}")]
    NoHigherAuthority(ApprovalLevel),

    /// Role may not escalate at all
    #[error("Role {role} cannot escalate")]
    CannotEscalate { role: Role },

    /// Delegation without a target user
    #[error("Delegation requires a target user")]
    MissingDelegate,

    /// Only the creator may withdraw a record
    #[error("User {actor} cannot withdraw a record created by {owner}")]
    NotRecordOwner { actor: UserId, owner: UserId },

    /// Optimistic write lost a race
    #[error("Version conflict on {key}: expected {expected}, found {actual}")]
    VersionConflict {
        key: RecordKey,
        expected: u64,
        actual: u64,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Authority model error
    #[error(transparent)]
    Authz(#[from] AuthzError),

    /// Core error
    #[error(transparent)]
    Core(#[from] CoreError),
}

impl WorkflowError {
    /// Whether re-reading the record and repeating the action may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::VersionConflict { .. })
    }

    /// Stable short name, used in the attempt log
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowError::NotFound(_) => "not_found",
            WorkflowError::AlreadyExists(_) => "already_exists",
            WorkflowError::InvalidState { .. } => "invalid_state",
            WorkflowError::InsufficientAuthority { .. } => "insufficient_authority",
            WorkflowError::PermissionDenied { .. } => "permission_denied",
            WorkflowError::NoHigherAuthority(_) => "no_higher_authority",
            WorkflowError::CannotEscalate { .. } => "cannot_escalate",
            WorkflowError::MissingDelegate => "missing_delegate",
            WorkflowError::NotRecordOwner { .. } => "not_record_owner",
            WorkflowError::VersionConflict { .. } => "version_conflict",
            WorkflowError::InvalidInput(_) => "invalid_input",
            WorkflowError::Database(_) => "database",
            WorkflowError::Serialization(_) => "serialization",
            WorkflowError::Authz(_) => "authz",
            WorkflowError::Core(_) => "core",
        }
    }
}

impl From<serde_json::Error> for WorkflowError {
    fn from(err: serde_json::Error) -> Self {
        WorkflowError::Serialization(err.to_string())
    }
}

/// Result type for workflow operations
pub type Result<T> = std::result::Result<T, WorkflowError>;
