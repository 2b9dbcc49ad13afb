//! Approval status and review stages
//!
//! A record's status and its approval level travel together in
//! [`ApprovalStatus`], so they cannot drift apart. On the wire they are
//! still the familiar `approvalStatus` / `approvalLevel` pair; deserializing
//! a pair that disagrees is an error.

use poamflow_authz::ApprovalLevel;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five sequential review tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReviewStage {
    #[serde(rename = "ISSE_Review")]
    Isse,
    #[serde(rename = "ISSO_Review")]
    Isso,
    #[serde(rename = "ISSM_Review")]
    Issm,
    #[serde(rename = "RMO_Review")]
    Rmo,
    #[serde(rename = "AO_Review")]
    Ao,
}

impl ReviewStage {
    /// Stages in chain order
    pub const ALL: [ReviewStage; 5] = [
        ReviewStage::Isse,
        ReviewStage::Isso,
        ReviewStage::Issm,
        ReviewStage::Rmo,
        ReviewStage::Ao,
    ];

    /// Approval level required to act on this stage
    pub fn level(self) -> ApprovalLevel {
        ApprovalLevel::saturating(self as u8 + 1)
    }

    /// Stage reviewed at `level`, if any
    pub fn from_level(level: ApprovalLevel) -> Option<Self> {
        match level.value() {
            1 => Some(ReviewStage::Isse),
            2 => Some(ReviewStage::Isso),
            3 => Some(ReviewStage::Issm),
            4 => Some(ReviewStage::Rmo),
            5 => Some(ReviewStage::Ao),
            _ => None,
        }
    }

    /// Following stage, or `None` after the AO
    pub fn next(self) -> Option<Self> {
        match self {
            ReviewStage::Isse => Some(ReviewStage::Isso),
            ReviewStage::Isso => Some(ReviewStage::Issm),
            ReviewStage::Issm => Some(ReviewStage::Rmo),
            ReviewStage::Rmo => Some(ReviewStage::Ao),
            ReviewStage::Ao => None,
        }
    }

    pub fn name(self) -> StatusName {
        match self {
            ReviewStage::Isse => StatusName::IsseReview,
            ReviewStage::Isso => StatusName::IssoReview,
            ReviewStage::Issm => StatusName::IssmReview,
            ReviewStage::Rmo => StatusName::RmoReview,
            ReviewStage::Ao => StatusName::AoReview,
        }
    }
}

impl fmt::Display for ReviewStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().as_str())
    }
}

/// Flat status name, as stored and reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StatusName {
    Draft,
    #[serde(rename = "ISSE_Review")]
    IsseReview,
    #[serde(rename = "ISSO_Review")]
    IssoReview,
    #[serde(rename = "ISSM_Review")]
    IssmReview,
    #[serde(rename = "RMO_Review")]
    RmoReview,
    #[serde(rename = "AO_Review")]
    AoReview,
    Approved,
    Rejected,
    #[serde(rename = "Requires_Modification")]
    RequiresModification,
    Withdrawn,
}

impl StatusName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusName::Draft => "Draft",
            StatusName::IsseReview => "ISSE_Review",
            StatusName::IssoReview => "ISSO_Review",
            StatusName::IssmReview => "ISSM_Review",
            StatusName::RmoReview => "RMO_Review",
            StatusName::AoReview => "AO_Review",
            StatusName::Approved => "Approved",
            StatusName::Rejected => "Rejected",
            StatusName::RequiresModification => "Requires_Modification",
            StatusName::Withdrawn => "Withdrawn",
        }
    }

    /// Review stage this name stands for, if it is one of the five tiers
    pub fn review_stage(&self) -> Option<ReviewStage> {
        ReviewStage::ALL.into_iter().find(|s| s.name() == *self)
    }
}

impl fmt::Display for StatusName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Workflow position of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "StatusRepr", into = "StatusRepr")]
pub enum ApprovalStatus {
    /// Being drafted, level 0
    Draft,
    /// Waiting on a review tier
    InReview(ReviewStage),
    /// Sent back to the submitter from the tier at `level`
    RequiresModification { level: ApprovalLevel },
    /// Final approval by the AO, level 5
    Approved,
    /// Rejected at some tier, level 0
    Rejected,
    /// Pulled by the submitter, level 0
    Withdrawn,
}

impl ApprovalStatus {
    /// Approval level implied by the status
    pub fn level(&self) -> ApprovalLevel {
        match self {
            ApprovalStatus::Draft | ApprovalStatus::Rejected | ApprovalStatus::Withdrawn => {
                ApprovalLevel::NONE
            }
            ApprovalStatus::InReview(stage) => stage.level(),
            ApprovalStatus::RequiresModification { level } => *level,
            ApprovalStatus::Approved => ApprovalLevel::MAX,
        }
    }

    pub fn name(&self) -> StatusName {
        match self {
            ApprovalStatus::Draft => StatusName::Draft,
            ApprovalStatus::InReview(stage) => stage.name(),
            ApprovalStatus::RequiresModification { .. } => StatusName::RequiresModification,
            ApprovalStatus::Approved => StatusName::Approved,
            ApprovalStatus::Rejected => StatusName::Rejected,
            ApprovalStatus::Withdrawn => StatusName::Withdrawn,
        }
    }

    pub fn review_stage(&self) -> Option<ReviewStage> {
        match self {
            ApprovalStatus::InReview(stage) => Some(*stage),
            _ => None,
        }
    }

    /// Approved, Rejected and Withdrawn accept no further actions
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ApprovalStatus::Approved | ApprovalStatus::Rejected | ApprovalStatus::Withdrawn
        )
    }
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (level {})", self.name(), self.level())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusRepr {
    approval_status: StatusName,
    approval_level: ApprovalLevel,
}

impl From<ApprovalStatus> for StatusRepr {
    fn from(status: ApprovalStatus) -> Self {
        Self {
            approval_status: status.name(),
            approval_level: status.level(),
        }
    }
}

impl TryFrom<StatusRepr> for ApprovalStatus {
    type Error = String;

    fn try_from(repr: StatusRepr) -> std::result::Result<Self, Self::Error> {
        let status = match repr.approval_status {
            StatusName::Draft => ApprovalStatus::Draft,
            StatusName::Approved => ApprovalStatus::Approved,
            StatusName::Rejected => ApprovalStatus::Rejected,
            StatusName::Withdrawn => ApprovalStatus::Withdrawn,
            StatusName::RequiresModification => {
                if ReviewStage::from_level(repr.approval_level).is_none() {
                    return Err(format!(
                        "Requires_Modification must carry a review level (1-5), got {}",
                        repr.approval_level
                    ));
                }
                ApprovalStatus::RequiresModification {
                    level: repr.approval_level,
                }
            }
            name => match name.review_stage() {
                Some(stage) => ApprovalStatus::InReview(stage),
                None => return Err(format!("unrecognized status {}", name)),
            },
        };

        if status.level() != repr.approval_level {
            return Err(format!(
                "approval level {} does not match status {} (expected {})",
                repr.approval_level,
                status.name(),
                status.level()
            ));
        }

        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stage_levels_follow_chain() {
        let levels: Vec<u8> = ReviewStage::ALL.iter().map(|s| s.level().value()).collect();
        assert_eq!(levels, vec![1, 2, 3, 4, 5]);

        for stage in ReviewStage::ALL {
            assert_eq!(ReviewStage::from_level(stage.level()), Some(stage));
        }
        assert_eq!(ReviewStage::from_level(ApprovalLevel::NONE), None);
        assert_eq!(ReviewStage::Ao.next(), None);
    }

    #[test]
    fn test_status_levels() {
        assert_eq!(ApprovalStatus::Draft.level().value(), 0);
        assert_eq!(ApprovalStatus::InReview(ReviewStage::Isso).level().value(), 2);
        assert_eq!(ApprovalStatus::Approved.level().value(), 5);
        assert_eq!(ApprovalStatus::Rejected.level().value(), 0);
        assert!(ApprovalStatus::Withdrawn.is_terminal());
        assert!(!ApprovalStatus::RequiresModification { level: ApprovalLevel::saturating(3) }.is_terminal());
    }

    #[test]
    fn test_status_serializes_as_pair() {
        let status = ApprovalStatus::InReview(ReviewStage::Issm);
        let value = serde_json::to_value(status).unwrap();
        assert_eq!(value, json!({"approvalStatus": "ISSM_Review", "approvalLevel": 3}));

        let parsed: ApprovalStatus = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_mismatched_pair_rejected() {
        let bad = json!({"approvalStatus": "ISSO_Review", "approvalLevel": 4});
        assert!(serde_json::from_value::<ApprovalStatus>(bad).is_err());

        let bad = json!({"approvalStatus": "Requires_Modification", "approvalLevel": 0});
        assert!(serde_json::from_value::<ApprovalStatus>(bad).is_err());

        let ok = json!({"approvalStatus": "Requires_Modification", "approvalLevel": 2});
        assert_eq!(
            serde_json::from_value::<ApprovalStatus>(ok).unwrap(),
            ApprovalStatus::RequiresModification { level: ApprovalLevel::saturating(2) }
        );
    }
}
