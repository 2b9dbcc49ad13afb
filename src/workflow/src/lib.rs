//! # POAMFlow Approval Workflow
//!
//! Moves POA&M records through the DoD review chain
//! (ISSE → ISSO → ISSM → RMO → AO), enforcing who may act at each tier and
//! keeping an append-only approval history on every record.
//!
//! ## Features
//!
//! - **Pure transitions**: [`ApprovalEngine`] takes a record snapshot and
//!   returns a new one; no I/O, no locks
//! - **Optimistic concurrency**: stores condition every write on the record
//!   `version` and report [`WorkflowError::VersionConflict`] on a lost race
//! - **Attempt audit**: BLAKE3 hash-chained log of accepted and rejected attempts
//! - **Multi-tenant**: records are keyed by `(tenantId, id)`
//!
//! ## Example
//!
//! ```rust
//! use poamflow_authz::{AuthorityModel, Role};
//! use poamflow_workflow::{Actor, ApprovalAction, ApprovalEngine, NewPoam, RiskLevel, StatusName};
//! use std::sync::Arc;
//!
//! let engine = ApprovalEngine::new(Arc::new(AuthorityModel::dod_default()));
//! let engineer = Actor::new("alice", Role::SecurityEngineer);
//!
//! let draft = engine
//!     .create_record("tenant-a", NewPoam::new("Disable TLS 1.0", RiskLevel::High), &engineer)
//!     .unwrap();
//! let submitted = engine.submit_for_approval(&draft, &engineer, None).unwrap();
//! let reviewed = engine
//!     .process_approval_action(&submitted, &ApprovalAction::Approve, &engineer, Some("looks good"))
//!     .unwrap();
//!
//! assert_eq!(reviewed.status.name(), StatusName::IssoReview);
//! assert_eq!(reviewed.approval_history.len(), 2);
//! ```

pub mod action;
pub mod audit;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod progress;
pub mod record;
pub mod service;
pub mod stats;
pub mod status;
pub mod store;

// Re-export commonly used types
pub use action::ApprovalAction;
pub use audit::{AttemptEntry, AttemptLog, AttemptOutcome, AttemptStats};
pub use engine::ApprovalEngine;
pub use error::{Result, WorkflowError};
pub use metrics::{MetricsSnapshot, WorkflowMetrics};
pub use progress::{
    pending_approvals_for, workflow_progress, workflow_status, ProgressStep, StageState,
    WorkflowStatus,
};
pub use record::{
    Actor, ExceptionDetails, ExceptionRequest, ExceptionType, HistoryAction, HistoryEntry,
    NewPoam, PoamRecord, RiskLevel,
};
pub use service::{PoamService, ServiceConfig};
pub use stats::{compute_statistics, WorkflowStatistics};
pub use status::{ApprovalStatus, ReviewStage, StatusName};
pub use store::{InMemoryRecordStore, RecordStore};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
