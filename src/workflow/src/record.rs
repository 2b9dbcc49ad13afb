//! POA&M record and its audit history

use crate::status::{ApprovalStatus, StatusName};
use chrono::{DateTime, Utc};
use poamflow_authz::{ApprovalLevel, Role};
use poamflow_core::{RecordId, RecordKey, TenantId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who is acting, as resolved by the identity layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: impl Into<UserId>, role: Role) -> Self {
        Self { id: id.into(), role }
    }
}

/// Residual risk of the weakness being remediated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Very Low")]
    VeryLow,
    Low,
    Moderate,
    High,
    #[serde(rename = "Very High")]
    VeryHigh,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskLevel::VeryLow => "Very Low",
            RiskLevel::Low => "Low",
            RiskLevel::Moderate => "Moderate",
            RiskLevel::High => "High",
            RiskLevel::VeryHigh => "Very High",
        };
        f.write_str(name)
    }
}

/// Kind of exception being requested
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionType {
    RiskAcceptance,
    FalsePositive,
    OperationalRequirement,
    TechnicalLimitation,
}

/// Fields supplied with an exception request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRequest {
    pub exception_type: ExceptionType,
    pub justification: String,
    pub risk_acceptance_statement: String,
    #[serde(default)]
    pub compensating_controls: Vec<String>,
}

/// Exception metadata stamped onto a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionDetails {
    pub exception_type: ExceptionType,
    pub justification: String,
    pub risk_acceptance_statement: String,
    #[serde(default)]
    pub compensating_controls: Vec<String>,
    pub requested_by: UserId,
    pub requested_at: DateTime<Utc>,
}

/// Kind of transition recorded in the history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryAction {
    Submitted,
    ExceptionRequested,
    Resubmitted,
    Approve,
    Reject,
    RequestModification,
    Escalate,
    Delegate,
    Withdraw,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Submitted => "submitted",
            HistoryAction::ExceptionRequested => "exception_requested",
            HistoryAction::Resubmitted => "resubmitted",
            HistoryAction::Approve => "approve",
            HistoryAction::Reject => "reject",
            HistoryAction::RequestModification => "request_modification",
            HistoryAction::Escalate => "escalate",
            HistoryAction::Delegate => "delegate",
            HistoryAction::Withdraw => "withdraw",
        }
    }
}

impl fmt::Display for HistoryAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One successful transition. Entries are never rewritten or removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub actor_id: UserId,
    pub actor_role: Role,
    pub action: HistoryAction,
    pub from_status: StatusName,
    pub to_status: StatusName,
    pub from_level: ApprovalLevel,
    pub to_level: ApprovalLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delegated_to: Option<UserId>,
}

/// Caller-supplied fields for a new record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPoam {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_acronym: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_completion_date: Option<DateTime<Utc>>,
}

impl NewPoam {
    pub fn new(title: impl Into<String>, risk_level: RiskLevel) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            risk_level,
            system_id: None,
            control_acronym: None,
            scheduled_completion_date: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system(mut self, system_id: impl Into<String>) -> Self {
        self.system_id = Some(system_id.into());
        self
    }

    pub fn with_control(mut self, control_acronym: impl Into<String>) -> Self {
        self.control_acronym = Some(control_acronym.into());
        self
    }

    pub fn with_scheduled_completion(mut self, date: DateTime<Utc>) -> Self {
        self.scheduled_completion_date = Some(date);
        self
    }
}

/// Plan of Action & Milestones record under review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoamRecord {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_acronym: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_completion_date: Option<DateTime<Utc>>,
    pub created_by: UserId,

    /// Serialized as `approvalStatus` + `approvalLevel`
    #[serde(flatten)]
    pub status: ApprovalStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_approver: Option<UserId>,
    #[serde(default)]
    pub approval_history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<ExceptionDetails>,

    /// Bumped on every mutation; stores condition writes on it
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_date: Option<DateTime<Utc>>,
}

impl PoamRecord {
    /// Fresh Draft record at level 0 with empty history
    pub fn draft(key: RecordKey, fields: NewPoam, created_by: UserId, now: DateTime<Utc>) -> Self {
        Self {
            id: key.id,
            tenant_id: key.tenant_id,
            title: fields.title,
            description: fields.description,
            risk_level: fields.risk_level,
            system_id: fields.system_id,
            control_acronym: fields.control_acronym,
            scheduled_completion_date: fields.scheduled_completion_date,
            created_by,
            status: ApprovalStatus::Draft,
            current_approver: None,
            approval_history: Vec::new(),
            exception: None,
            version: 1,
            created_at: now,
            updated_at: now,
            submitted_date: None,
            submitted_by: None,
            approved_date: None,
        }
    }

    /// Tenant-partitioned key
    pub fn key(&self) -> RecordKey {
        RecordKey {
            tenant_id: self.tenant_id.clone(),
            id: self.id.clone(),
        }
    }

    pub fn approval_level(&self) -> ApprovalLevel {
        self.status.level()
    }

    /// Waiting on one of the five review tiers
    pub fn is_pending_approval(&self) -> bool {
        self.status.review_stage().is_some()
    }

    /// Past its scheduled completion date without final approval
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != ApprovalStatus::Approved
            && self.scheduled_completion_date.is_some_and(|due| due < now)
    }

    /// Days between submission and final approval
    pub fn approval_duration_days(&self) -> Option<f64> {
        let submitted = self.submitted_date?;
        let approved = self.approved_date?;
        Some((approved - submitted).num_seconds() as f64 / 86_400.0)
    }
}
