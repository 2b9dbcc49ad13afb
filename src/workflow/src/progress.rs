//! Workflow progress views
//!
//! Read-only projections over a record and the authority model, used to
//! render progress bars and reviewer queues.

use crate::record::{HistoryAction, HistoryEntry, PoamRecord};
use crate::status::{ApprovalStatus, StatusName};
use poamflow_authz::{ApprovalLevel, AuthorityModel, Role};
use poamflow_core::{RecordId, UserId};
use serde::{Deserialize, Serialize};

/// Position of one hierarchy level relative to a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Completed,
    Current,
    Pending,
}

/// One entry of the progress bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStep {
    pub level: ApprovalLevel,
    pub roles: Vec<Role>,
    pub description: String,
    pub state: StageState,
    /// Approval that closed this level, when there was one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_by: Option<HistoryEntry>,
}

/// Summary returned by the workflow status query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatus {
    pub record_id: RecordId,
    pub current_status: StatusName,
    pub current_level: ApprovalLevel,
    pub next_approvers: Vec<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_approver: Option<UserId>,
    pub workflow_progress: Vec<ProgressStep>,
}

/// Classify every approval-eligible level against the record's level
///
/// An approved record has completed every level. A level passed over by an
/// escalation counts as completed with no approver.
pub fn workflow_progress(authority: &AuthorityModel, record: &PoamRecord) -> Vec<ProgressStep> {
    let approved = record.status == ApprovalStatus::Approved;
    let current = record.approval_level();

    authority
        .approval_hierarchy()
        .into_iter()
        .map(|entry| {
            let state = if approved || entry.level < current {
                StageState::Completed
            } else if entry.level == current {
                StageState::Current
            } else {
                StageState::Pending
            };

            let completed_by = match state {
                StageState::Completed => last_approval_at(record, entry.level).cloned(),
                _ => None,
            };

            ProgressStep {
                level: entry.level,
                roles: entry.roles,
                description: entry.description,
                state,
                completed_by,
            }
        })
        .collect()
}

/// Level, next approvers and progress for one record
pub fn workflow_status(authority: &AuthorityModel, record: &PoamRecord) -> WorkflowStatus {
    let next_approvers = match record.status.review_stage() {
        Some(stage) => authority.roles_for_approval_level(stage.level()),
        None => Vec::new(),
    };

    WorkflowStatus {
        record_id: record.id.clone(),
        current_status: record.status.name(),
        current_level: record.approval_level(),
        next_approvers,
        current_approver: record.current_approver.clone(),
        workflow_progress: workflow_progress(authority, record),
    }
}

/// Records under review at exactly the role's approval level
pub fn pending_approvals_for<'a>(
    authority: &AuthorityModel,
    role: Role,
    records: impl IntoIterator<Item = &'a PoamRecord>,
) -> Vec<&'a PoamRecord> {
    let level = authority.approval_level_of(role);
    records
        .into_iter()
        .filter(|r| r.is_pending_approval() && r.approval_level() == level)
        .collect()
}

fn last_approval_at(record: &PoamRecord, level: ApprovalLevel) -> Option<&HistoryEntry> {
    record
        .approval_history
        .iter()
        .rev()
        .find(|e| e.action == HistoryAction::Approve && e.from_level == level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NewPoam, RiskLevel};
    use crate::status::ReviewStage;
    use chrono::{TimeZone, Utc};
    use poamflow_core::RecordKey;

    fn record_at(status: ApprovalStatus) -> PoamRecord {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let mut record = PoamRecord::draft(
            RecordKey::new("tenant-a", "poam-1").unwrap(),
            NewPoam::new("Rotate keys", RiskLevel::Moderate),
            "alice".to_string(),
            now,
        );
        record.status = status;
        record
    }

    #[test]
    fn test_progress_for_issm_review() {
        let model = AuthorityModel::dod_default();
        let record = record_at(ApprovalStatus::InReview(ReviewStage::Issm));

        let states: Vec<StageState> = workflow_progress(&model, &record)
            .iter()
            .map(|s| s.state)
            .collect();
        assert_eq!(
            states,
            vec![
                StageState::Completed,
                StageState::Completed,
                StageState::Current,
                StageState::Pending,
                StageState::Pending,
            ]
        );
    }

    #[test]
    fn test_approved_record_is_fully_completed() {
        let model = AuthorityModel::dod_default();
        let record = record_at(ApprovalStatus::Approved);

        assert!(workflow_progress(&model, &record)
            .iter()
            .all(|s| s.state == StageState::Completed));
    }

    #[test]
    fn test_draft_is_all_pending() {
        let model = AuthorityModel::dod_default();
        let record = record_at(ApprovalStatus::Draft);

        assert!(workflow_progress(&model, &record)
            .iter()
            .all(|s| s.state == StageState::Pending));
        assert!(workflow_status(&model, &record).next_approvers.is_empty());
    }

    #[test]
    fn test_next_approvers_include_seniors() {
        let model = AuthorityModel::dod_default();
        let record = record_at(ApprovalStatus::InReview(ReviewStage::Rmo));
        let status = workflow_status(&model, &record);

        assert_eq!(
            status.next_approvers,
            vec![Role::RiskManagementOfficer, Role::AuthorizingOfficer]
        );
        assert_eq!(status.current_status, StatusName::RmoReview);
    }

    #[test]
    fn test_pending_matches_exact_level() {
        let model = AuthorityModel::dod_default();
        let records = vec![
            record_at(ApprovalStatus::InReview(ReviewStage::Isso)),
            record_at(ApprovalStatus::InReview(ReviewStage::Issm)),
            record_at(ApprovalStatus::RequiresModification {
                level: ApprovalLevel::saturating(2),
            }),
        ];

        let pending = pending_approvals_for(&model, Role::Isso, &records);
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].status, ApprovalStatus::InReview(ReviewStage::Isso));

        assert!(pending_approvals_for(&model, Role::Engineer, &records).is_empty());
    }
}
