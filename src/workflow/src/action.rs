//! Reviewer actions

use crate::record::HistoryAction;
use poamflow_core::UserId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Action a reviewer takes on a record under review
///
/// `Delegate` carries its target, so a delegation without one cannot be
/// expressed; a blank target is still rejected at processing time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ApprovalAction {
    Approve,
    Reject,
    RequestModification,
    Escalate,
    Delegate {
        #[serde(rename = "delegateToUserId")]
        delegate_to: UserId,
    },
}

impl ApprovalAction {
    pub fn delegate(to: impl Into<UserId>) -> Self {
        ApprovalAction::Delegate {
            delegate_to: to.into(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        self.history_action().as_str()
    }

    /// History entry kind written when this action succeeds
    pub fn history_action(&self) -> HistoryAction {
        match self {
            ApprovalAction::Approve => HistoryAction::Approve,
            ApprovalAction::Reject => HistoryAction::Reject,
            ApprovalAction::RequestModification => HistoryAction::RequestModification,
            ApprovalAction::Escalate => HistoryAction::Escalate,
            ApprovalAction::Delegate { .. } => HistoryAction::Delegate,
        }
    }
}

impl fmt::Display for ApprovalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
