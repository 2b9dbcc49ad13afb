//! Approval workflow engine
//!
//! Enforces the DoD approval state machine:
//!
//! ```text
//! Draft(0) → ISSE_Review(1) → ISSO_Review(2) → ISSM_Review(3) → RMO_Review(4) → AO_Review(5) → Approved(5)
//!               │ any review stage ──reject──────────────→ Rejected(0)
//!               │ any review stage ──request_modification→ Requires_Modification(level kept) ──resubmit→ ISSE_Review(1)
//!               │ any review stage ──escalate────────────→ next approval-eligible level
//!               └ Draft / review / Requires_Modification ──withdraw (creator)→ Withdrawn(0)
//! ```
//!
//! Every operation takes a record snapshot and returns a new one, leaving
//! the input untouched. Nothing here performs I/O; persisting the result
//! (conditioned on the input's `version`) is the caller's job, so a failed
//! write can be retried by re-reading and calling the same operation again.

use crate::action::ApprovalAction;
use crate::error::{Result, WorkflowError};
use crate::record::{
    Actor, ExceptionDetails, ExceptionRequest, HistoryAction, HistoryEntry, NewPoam, PoamRecord,
};
use crate::status::{ApprovalStatus, ReviewStage};
use poamflow_authz::{AuthorityModel, Permission, ProtectedResource, DELEGATION_MIN_LEVEL};
use poamflow_core::{Clock, RecordKey, SystemClock, TenantId};
use std::sync::Arc;
use tracing::{debug, info};

/// Pure transition function over POA&M records
#[derive(Clone)]
pub struct ApprovalEngine {
    authority: Arc<AuthorityModel>,
    clock: Arc<dyn Clock>,
}

impl ApprovalEngine {
    /// Engine using wall-clock time
    pub fn new(authority: Arc<AuthorityModel>) -> Self {
        Self::with_clock(authority, Arc::new(SystemClock))
    }

    /// Engine with an injected time source
    pub fn with_clock(authority: Arc<AuthorityModel>, clock: Arc<dyn Clock>) -> Self {
        Self { authority, clock }
    }

    pub fn authority(&self) -> &AuthorityModel {
        &self.authority
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Create a Draft record owned by `actor`
    pub fn create_record(
        &self,
        tenant_id: impl Into<TenantId>,
        fields: NewPoam,
        actor: &Actor,
    ) -> Result<PoamRecord> {
        self.require_permission(actor, ProtectedResource::Poams, Permission::Write)?;

        if fields.title.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "POA&M title cannot be empty".to_string(),
            ));
        }

        let key = RecordKey::generate(tenant_id)?;
        let record = PoamRecord::draft(key, fields, actor.id.clone(), self.clock.now());

        debug!("Created POA&M {} for {}", record.key(), actor.id);
        Ok(record)
    }

    /// Move a Draft into the first review tier
    pub fn submit_for_approval(
        &self,
        record: &PoamRecord,
        actor: &Actor,
        comments: Option<&str>,
    ) -> Result<PoamRecord> {
        self.require_status(record, "submit", |s| matches!(s, ApprovalStatus::Draft))?;
        self.require_permission(actor, ProtectedResource::Poams, Permission::Write)?;

        let mut next = self.apply(
            record,
            actor,
            HistoryAction::Submitted,
            ApprovalStatus::InReview(ReviewStage::Isse),
            comments,
        );
        next.submitted_date = Some(next.updated_at);
        next.submitted_by = Some(actor.id.clone());

        Ok(next)
    }

    /// Submit a Draft as an exception request, stamping the exception fields
    pub fn request_exception(
        &self,
        record: &PoamRecord,
        actor: &Actor,
        exception: ExceptionRequest,
    ) -> Result<PoamRecord> {
        self.require_status(record, "request an exception for", |s| {
            matches!(s, ApprovalStatus::Draft)
        })?;
        self.require_permission(actor, ProtectedResource::Poams, Permission::Write)?;

        if exception.justification.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "exception justification cannot be empty".to_string(),
            ));
        }
        if exception.risk_acceptance_statement.trim().is_empty() {
            return Err(WorkflowError::InvalidInput(
                "risk acceptance statement cannot be empty".to_string(),
            ));
        }

        let mut next = self.apply(
            record,
            actor,
            HistoryAction::ExceptionRequested,
            ApprovalStatus::InReview(ReviewStage::Isse),
            Some(exception.justification.as_str()),
        );
        next.submitted_date = Some(next.updated_at);
        next.submitted_by = Some(actor.id.clone());
        next.exception = Some(ExceptionDetails {
            exception_type: exception.exception_type,
            justification: exception.justification,
            risk_acceptance_statement: exception.risk_acceptance_statement,
            compensating_controls: exception.compensating_controls,
            requested_by: actor.id.clone(),
            requested_at: next.updated_at,
        });

        Ok(next)
    }

    /// Send reworked record back to the first review tier
    ///
    /// Progress made before the modification request is discarded.
    pub fn resubmit(
        &self,
        record: &PoamRecord,
        actor: &Actor,
        comments: Option<&str>,
    ) -> Result<PoamRecord> {
        self.require_status(record, "resubmit", |s| {
            matches!(s, ApprovalStatus::RequiresModification { .. })
        })?;
        self.require_permission(actor, ProtectedResource::Poams, Permission::Write)?;

        Ok(self.apply(
            record,
            actor,
            HistoryAction::Resubmitted,
            ApprovalStatus::InReview(ReviewStage::Isse),
            comments,
        ))
    }

    /// Pull a record out of the workflow; only its creator may do this
    pub fn withdraw(
        &self,
        record: &PoamRecord,
        actor: &Actor,
        comments: Option<&str>,
    ) -> Result<PoamRecord> {
        self.require_status(record, "withdraw", |s| {
            matches!(
                s,
                ApprovalStatus::Draft
                    | ApprovalStatus::InReview(_)
                    | ApprovalStatus::RequiresModification { .. }
            )
        })?;

        if actor.id != record.created_by {
            return Err(WorkflowError::NotRecordOwner {
                actor: actor.id.clone(),
                owner: record.created_by.clone(),
            });
        }

        Ok(self.apply(
            record,
            actor,
            HistoryAction::Withdraw,
            ApprovalStatus::Withdrawn,
            comments,
        ))
    }

    /// Apply a reviewer action to a record under review
    ///
    /// The action must be legal for the current status, and the actor's
    /// approval level must be at least the record's. Senior roles may act on
    /// junior tiers.
    pub fn process_approval_action(
        &self,
        record: &PoamRecord,
        action: &ApprovalAction,
        actor: &Actor,
        comments: Option<&str>,
    ) -> Result<PoamRecord> {
        let stage = record
            .status
            .review_stage()
            .ok_or(WorkflowError::InvalidState {
                action: action.as_str(),
                status: record.status.name(),
            })?;

        let actual = self.authority.approval_level_of(actor.role);
        let required = stage.level();
        if actual < required {
            debug!(
                "Denied {} on {}: {} is level {}, record needs {}",
                action,
                record.key(),
                actor.role,
                actual,
                required
            );
            return Err(WorkflowError::InsufficientAuthority {
                role: actor.role,
                actual,
                required,
            });
        }

        let next_status = match action {
            ApprovalAction::Approve => match stage.next() {
                Some(next_stage) => ApprovalStatus::InReview(next_stage),
                None => ApprovalStatus::Approved,
            },
            ApprovalAction::Reject => ApprovalStatus::Rejected,
            ApprovalAction::RequestModification => ApprovalStatus::RequiresModification {
                level: required,
            },
            ApprovalAction::Escalate => {
                let target = self
                    .authority
                    .next_approval_level(required)
                    .and_then(ReviewStage::from_level)
                    .ok_or(WorkflowError::NoHigherAuthority(required))?;

                if !self.authority.can_escalate(actor.role) {
                    return Err(WorkflowError::CannotEscalate { role: actor.role });
                }

                ApprovalStatus::InReview(target)
            }
            ApprovalAction::Delegate { delegate_to } => {
                if delegate_to.trim().is_empty() {
                    return Err(WorkflowError::MissingDelegate);
                }
                if !self.authority.can_delegate(actor.role) {
                    return Err(WorkflowError::InsufficientAuthority {
                        role: actor.role,
                        actual,
                        required: DELEGATION_MIN_LEVEL,
                    });
                }

                let mut next = self.apply_with_delegate(
                    record,
                    actor,
                    HistoryAction::Delegate,
                    record.status,
                    comments,
                    Some(delegate_to.clone()),
                );
                next.current_approver = Some(delegate_to.clone());
                return Ok(next);
            }
        };

        Ok(self.apply(record, actor, action.history_action(), next_status, comments))
    }

    fn require_status(
        &self,
        record: &PoamRecord,
        action: &'static str,
        allowed: impl Fn(&ApprovalStatus) -> bool,
    ) -> Result<()> {
        if allowed(&record.status) {
            Ok(())
        } else {
            Err(WorkflowError::InvalidState {
                action,
                status: record.status.name(),
            })
        }
    }

    fn require_permission(
        &self,
        actor: &Actor,
        resource: ProtectedResource,
        permission: Permission,
    ) -> Result<()> {
        if self.authority.has_permission(actor.role, resource, permission) {
            Ok(())
        } else {
            Err(WorkflowError::PermissionDenied {
                role: actor.role,
                resource,
                permission,
            })
        }
    }

    fn apply(
        &self,
        record: &PoamRecord,
        actor: &Actor,
        action: HistoryAction,
        to: ApprovalStatus,
        comments: Option<&str>,
    ) -> PoamRecord {
        self.apply_with_delegate(record, actor, action, to, comments, None)
    }

    /// Append one history entry and move to `to`
    fn apply_with_delegate(
        &self,
        record: &PoamRecord,
        actor: &Actor,
        action: HistoryAction,
        to: ApprovalStatus,
        comments: Option<&str>,
        delegated_to: Option<String>,
    ) -> PoamRecord {
        let now = self.clock.now();
        let from = record.status;
        let mut next = record.clone();

        next.approval_history.push(HistoryEntry {
            timestamp: now,
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            action,
            from_status: from.name(),
            to_status: to.name(),
            from_level: from.level(),
            to_level: to.level(),
            comments: comments.map(str::to_string),
            delegated_to,
        });

        // A delegation only covers the stage it was made for
        if from != to {
            next.current_approver = None;
        }
        if to == ApprovalStatus::Approved {
            next.approved_date = Some(now);
        }

        next.status = to;
        next.version += 1;
        next.updated_at = now;

        info!(
            "POA&M {} {}: {} -> {} by {} ({})",
            next.key(),
            action,
            from.name(),
            to.name(),
            actor.id,
            actor.role
        );

        next
    }
}
