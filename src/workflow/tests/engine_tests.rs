//! Approval engine integration tests
//!
//! Drives records through the review chain with the built-in DoD table and
//! checks the state machine's guarantees, including property tests over
//! arbitrary action sequences.

use chrono::{Duration, TimeZone, Utc};
use poamflow_authz::{ApprovalLevel, AuthorityModel, Role};
use poamflow_core::FixedClock;
use poamflow_workflow::{
    Actor, ApprovalAction, ApprovalEngine, ApprovalStatus, ExceptionRequest, ExceptionType,
    HistoryAction, NewPoam, PoamRecord, ReviewStage, RiskLevel, StatusName, WorkflowError,
};
use proptest::prelude::*;
use std::sync::Arc;

fn engine_with_clock() -> (ApprovalEngine, Arc<FixedClock>) {
    let clock = Arc::new(FixedClock::new(
        Utc.with_ymd_and_hms(2024, 4, 1, 8, 0, 0).unwrap(),
    ));
    let engine = ApprovalEngine::with_clock(Arc::new(AuthorityModel::dod_default()), clock.clone());
    (engine, clock)
}

fn engine() -> ApprovalEngine {
    engine_with_clock().0
}

fn actor(role: Role) -> Actor {
    let id = format!("user-{}", role.as_str().to_lowercase());
    Actor::new(id, role)
}

fn draft(engine: &ApprovalEngine) -> PoamRecord {
    engine
        .create_record(
            "tenant-a",
            NewPoam::new("Remediate weak ciphers", RiskLevel::High).with_control("SC-13"),
            &actor(Role::SecurityEngineer),
        )
        .unwrap()
}

fn submitted(engine: &ApprovalEngine) -> PoamRecord {
    let record = draft(engine);
    engine
        .submit_for_approval(&record, &actor(Role::SecurityEngineer), None)
        .unwrap()
}

fn at_stage(engine: &ApprovalEngine, stage: ReviewStage) -> PoamRecord {
    let ao = actor(Role::AuthorizingOfficer);
    let mut record = submitted(engine);
    while record.status != ApprovalStatus::InReview(stage) {
        record = engine
            .process_approval_action(&record, &ApprovalAction::Approve, &ao, None)
            .unwrap();
    }
    record
}

// ============================================================================
// CONCRETE SCENARIOS
// ============================================================================

#[test]
fn test_high_risk_scenario() {
    let engine = engine();
    let record = draft(&engine);
    assert_eq!(record.risk_level, RiskLevel::High);

    let record = engine
        .submit_for_approval(&record, &actor(Role::SecurityEngineer), None)
        .unwrap();
    assert_eq!(record.status.name(), StatusName::IsseReview);
    assert_eq!(record.approval_level().value(), 1);
    assert_eq!(record.approval_history.len(), 1);

    let record = engine
        .process_approval_action(&record, &ApprovalAction::Approve, &actor(Role::Isso), None)
        .unwrap();
    assert_eq!(record.status.name(), StatusName::IssoReview);
    assert_eq!(record.approval_level().value(), 2);
    assert_eq!(record.approval_history.len(), 2);

    let err = engine
        .process_approval_action(&record, &ApprovalAction::Approve, &actor(Role::Engineer), None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InsufficientAuthority { .. }));
    assert_eq!(record.status.name(), StatusName::IssoReview);
    assert_eq!(record.approval_history.len(), 2);
}

#[test]
fn test_round_trip_to_approval() {
    let (engine, clock) = engine_with_clock();
    let ao = actor(Role::AuthorizingOfficer);

    let mut record = engine
        .submit_for_approval(&draft(&engine), &actor(Role::SecurityEngineer), None)
        .unwrap();
    for _ in 0..5 {
        clock.advance(Duration::days(1));
        record = engine
            .process_approval_action(&record, &ApprovalAction::Approve, &ao, None)
            .unwrap();
    }

    assert_eq!(record.status, ApprovalStatus::Approved);
    assert_eq!(record.approval_level(), ApprovalLevel::MAX);
    assert!(record.approved_date.is_some());
    assert_eq!(record.approval_history.len(), 6);
    assert_eq!(record.approval_duration_days(), Some(5.0));
    assert_eq!(record.version, 7);
}

#[test]
fn test_submit_records_actual_role() {
    let engine = engine();
    let engineer = actor(Role::Engineer);
    let record = engine
        .create_record("tenant-a", NewPoam::new("Patch", RiskLevel::Low), &engineer)
        .unwrap();

    let record = engine.submit_for_approval(&record, &engineer, Some("ready")).unwrap();
    let entry = &record.approval_history[0];
    assert_eq!(entry.actor_role, Role::Engineer);
    assert_eq!(entry.action, HistoryAction::Submitted);
    assert_eq!(entry.comments.as_deref(), Some("ready"));
    assert_eq!(record.submitted_by.as_deref(), Some("user-engineer"));
}

#[test]
fn test_submit_requires_write_permission() {
    let engine = engine();
    let record = draft(&engine);

    let err = engine
        .submit_for_approval(&record, &actor(Role::ReadOnlyUser), None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::PermissionDenied { .. }));
}

#[test]
fn test_submit_twice_is_invalid_state() {
    let engine = engine();
    let record = submitted(&engine);

    let err = engine
        .submit_for_approval(&record, &actor(Role::SecurityEngineer), None)
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::InvalidState {
            status: StatusName::IsseReview,
            ..
        }
    ));
}

#[test]
fn test_approving_draft_is_invalid_state() {
    let engine = engine();
    let err = engine
        .process_approval_action(
            &draft(&engine),
            &ApprovalAction::Approve,
            &actor(Role::AuthorizingOfficer),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { action: "approve", .. }));
}

#[test]
fn test_request_exception_stamps_details() {
    let engine = engine();
    let requester = actor(Role::Isso);
    let request = ExceptionRequest {
        exception_type: ExceptionType::OperationalRequirement,
        justification: "Legacy controller cannot be patched".to_string(),
        risk_acceptance_statement: "Isolated on a management VLAN".to_string(),
        compensating_controls: vec!["SC-7".to_string()],
    };

    let record = engine
        .request_exception(&draft(&engine), &requester, request)
        .unwrap();

    assert_eq!(record.status, ApprovalStatus::InReview(ReviewStage::Isse));
    let exception = record.exception.as_ref().unwrap();
    assert_eq!(exception.requested_by, requester.id);
    assert_eq!(exception.compensating_controls, vec!["SC-7"]);
    assert_eq!(record.approval_history[0].action, HistoryAction::ExceptionRequested);
    assert_eq!(record.approval_history[0].actor_role, Role::Isso);
}

#[test]
fn test_request_exception_requires_statement() {
    let engine = engine();
    let request = ExceptionRequest {
        exception_type: ExceptionType::RiskAcceptance,
        justification: "Vendor end of life".to_string(),
        risk_acceptance_statement: "  ".to_string(),
        compensating_controls: Vec::new(),
    };

    let err = engine
        .request_exception(&draft(&engine), &actor(Role::SecurityEngineer), request)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidInput(_)));
}

// ============================================================================
// REVIEWER ACTIONS
// ============================================================================

#[test]
fn test_senior_role_acts_on_junior_tier() {
    let engine = engine();
    let record = submitted(&engine);

    let record = engine
        .process_approval_action(&record, &ApprovalAction::Approve, &actor(Role::Issm), None)
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::InReview(ReviewStage::Isso));
}

#[test]
fn test_reject_goes_to_level_zero() {
    let engine = engine();
    let record = at_stage(&engine, ReviewStage::Issm);

    let record = engine
        .process_approval_action(&record, &ApprovalAction::Reject, &actor(Role::Issm), Some("no plan"))
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::Rejected);
    assert_eq!(record.approval_level(), ApprovalLevel::NONE);

    let last = record.approval_history.last().unwrap();
    assert_eq!(last.from_level.value(), 3);
    assert_eq!(last.to_status, StatusName::Rejected);
}

#[test]
fn test_request_modification_keeps_level_then_resubmit_restarts() {
    let engine = engine();
    let owner = actor(Role::SecurityEngineer);
    let record = at_stage(&engine, ReviewStage::Rmo);

    let record = engine
        .process_approval_action(
            &record,
            &ApprovalAction::RequestModification,
            &actor(Role::RiskManagementOfficer),
            Some("add milestones"),
        )
        .unwrap();
    assert_eq!(record.status.name(), StatusName::RequiresModification);
    assert_eq!(record.approval_level().value(), 4);

    let record = engine.resubmit(&record, &owner, Some("milestones added")).unwrap();
    assert_eq!(record.status, ApprovalStatus::InReview(ReviewStage::Isse));
    assert_eq!(record.approval_level().value(), 1);
    assert_eq!(record.approval_history.last().unwrap().action, HistoryAction::Resubmitted);
}

#[test]
fn test_resubmit_only_from_requires_modification() {
    let engine = engine();
    let err = engine
        .resubmit(&submitted(&engine), &actor(Role::SecurityEngineer), None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { .. }));
}

#[test]
fn test_escalate_moves_to_next_level() {
    let engine = engine();
    let record = at_stage(&engine, ReviewStage::Isso);

    let record = engine
        .process_approval_action(&record, &ApprovalAction::Escalate, &actor(Role::Isso), None)
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::InReview(ReviewStage::Issm));
    assert_eq!(record.approval_history.last().unwrap().action, HistoryAction::Escalate);
}

#[test]
fn test_escalate_at_ceiling() {
    let engine = engine();
    let record = at_stage(&engine, ReviewStage::Ao);

    let err = engine
        .process_approval_action(
            &record,
            &ApprovalAction::Escalate,
            &actor(Role::AuthorizingOfficer),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NoHigherAuthority(level) if level.is_max()));
    assert_eq!(engine.authority().next_approval_level(ApprovalLevel::MAX), None);
}

#[test]
fn test_delegate_sets_current_approver() {
    let engine = engine();
    let record = at_stage(&engine, ReviewStage::Issm);

    let record = engine
        .process_approval_action(&record, &ApprovalAction::delegate("deputy"), &actor(Role::Issm), None)
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::InReview(ReviewStage::Issm));
    assert_eq!(record.current_approver.as_deref(), Some("deputy"));

    let last = record.approval_history.last().unwrap();
    assert_eq!(last.action, HistoryAction::Delegate);
    assert_eq!(last.delegated_to.as_deref(), Some("deputy"));

    // Moving to the next stage ends the delegation
    let record = engine
        .process_approval_action(&record, &ApprovalAction::Approve, &actor(Role::Issm), None)
        .unwrap();
    assert_eq!(record.current_approver, None);
}

#[test]
fn test_delegate_requires_target_and_seniority() {
    let engine = engine();
    let record = at_stage(&engine, ReviewStage::Isso);

    let err = engine
        .process_approval_action(&record, &ApprovalAction::delegate(""), &actor(Role::Issm), None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::MissingDelegate));

    let err = engine
        .process_approval_action(&record, &ApprovalAction::delegate("deputy"), &actor(Role::Isso), None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InsufficientAuthority { .. }));
}

#[test]
fn test_withdraw_by_creator_only() {
    let engine = engine();
    let record = at_stage(&engine, ReviewStage::Isso);

    let err = engine
        .withdraw(&record, &actor(Role::AuthorizingOfficer), None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::NotRecordOwner { .. }));

    let record = engine
        .withdraw(&record, &actor(Role::SecurityEngineer), Some("duplicate"))
        .unwrap();
    assert_eq!(record.status, ApprovalStatus::Withdrawn);
    assert_eq!(record.approval_level(), ApprovalLevel::NONE);

    let err = engine
        .withdraw(&record, &actor(Role::SecurityEngineer), None)
        .unwrap_err();
    assert!(matches!(err, WorkflowError::InvalidState { .. }));
}

fn terminal_records(engine: &ApprovalEngine) -> Vec<PoamRecord> {
    let approved = engine
        .process_approval_action(
            &at_stage(engine, ReviewStage::Ao),
            &ApprovalAction::Approve,
            &actor(Role::AuthorizingOfficer),
            None,
        )
        .unwrap();
    let rejected = engine
        .process_approval_action(
            &at_stage(engine, ReviewStage::Issm),
            &ApprovalAction::Reject,
            &actor(Role::Issm),
            Some("compensating controls insufficient"),
        )
        .unwrap();
    let withdrawn = engine
        .withdraw(
            &at_stage(engine, ReviewStage::Isso),
            &actor(Role::SecurityEngineer),
            Some("superseded"),
        )
        .unwrap();

    assert_eq!(approved.status, ApprovalStatus::Approved);
    assert_eq!(rejected.status, ApprovalStatus::Rejected);
    assert_eq!(withdrawn.status, ApprovalStatus::Withdrawn);
    vec![approved, rejected, withdrawn]
}

#[test]
fn test_terminal_records_refuse_every_actor() {
    let engine = engine();

    for record in terminal_records(&engine) {
        for role in Role::ALL {
            for action in [ApprovalAction::Approve, ApprovalAction::Reject, ApprovalAction::Escalate] {
                let err = engine
                    .process_approval_action(&record, &action, &actor(role), None)
                    .unwrap_err();
                assert!(
                    matches!(err, WorkflowError::InvalidState { status, .. } if status == record.status.name()),
                    "{} {} on {}",
                    role,
                    action,
                    record.status
                );
            }
        }
    }
}

#[test]
fn test_escalate_refused_for_roles_that_cannot_escalate() {
    let engine = engine();
    let record = submitted(&engine);

    // AO outranks the ISSE tier but has nowhere to escalate to
    let err = engine
        .process_approval_action(
            &record,
            &ApprovalAction::Escalate,
            &actor(Role::AuthorizingOfficer),
            None,
        )
        .unwrap_err();
    assert!(matches!(err, WorkflowError::CannotEscalate { role: Role::AuthorizingOfficer }));
    assert_eq!(err.to_string(), "Role AuthorizingOfficer cannot escalate");
    assert_eq!(err.kind(), "cannot_escalate");
}

// ============================================================================
// PROPERTIES
// ============================================================================

fn role_strategy() -> impl Strategy<Value = Role> {
    prop::sample::select(Role::ALL.to_vec())
}

fn action_strategy() -> impl Strategy<Value = ApprovalAction> {
    prop_oneof![
        4 => Just(ApprovalAction::Approve),
        1 => Just(ApprovalAction::Reject),
        1 => Just(ApprovalAction::RequestModification),
        1 => Just(ApprovalAction::Escalate),
        1 => Just(ApprovalAction::delegate("deputy")),
    ]
}

proptest! {
    #[test]
    fn prop_approve_advances_one_stage(steps in 0usize..5) {
        let engine = engine();
        let ao = actor(Role::AuthorizingOfficer);
        let mut record = submitted(&engine);

        for _ in 0..steps {
            let before = record.approval_level().value();
            record = engine
                .process_approval_action(&record, &ApprovalAction::Approve, &ao, None)
                .unwrap();
            prop_assert_eq!(record.approval_level().value(), before + 1);
        }
    }

    #[test]
    fn prop_level_zero_roles_never_transition(
        stage in prop::sample::select(ReviewStage::ALL.to_vec()),
        action in action_strategy(),
        role in prop::sample::select(vec![Role::Engineer, Role::ReadOnlyUser]),
    ) {
        let engine = engine();
        let record = at_stage(&engine, stage);
        let result = engine.process_approval_action(&record, &action, &actor(role), None);
        let denied = matches!(result, Err(WorkflowError::InsufficientAuthority { .. }));
        prop_assert!(denied);
    }

    #[test]
    fn prop_success_requires_authority(
        stage in prop::sample::select(ReviewStage::ALL.to_vec()),
        action in action_strategy(),
        role in role_strategy(),
    ) {
        let engine = engine();
        let record = at_stage(&engine, stage);

        if engine.process_approval_action(&record, &action, &actor(role), None).is_ok() {
            prop_assert!(engine.authority().approval_level_of(role) >= stage.level());
        }
    }

    /// Rejected attempts leave no trace on the record itself; they are only
    /// visible through the service's attempt log.
    #[test]
    fn prop_history_counts_successes(
        steps in prop::collection::vec((role_strategy(), action_strategy()), 0..20),
    ) {
        let engine = engine();
        let mut record = submitted(&engine);
        let mut successes = 1;

        for (role, action) in steps {
            match engine.process_approval_action(&record, &action, &actor(role), None) {
                Ok(next) => {
                    prop_assert_eq!(next.approval_history.len(), record.approval_history.len() + 1);
                    prop_assert_eq!(&next.approval_history[..record.approval_history.len()], &record.approval_history[..]);
                    prop_assert_eq!(next.version, record.version + 1);
                    successes += 1;
                    record = next;
                }
                Err(_) => {}
            }
        }

        prop_assert_eq!(record.approval_history.len(), successes);
    }

    #[test]
    fn prop_terminal_records_stay_put(
        steps in prop::collection::vec((role_strategy(), action_strategy()), 0..20),
        follow_up in prop::sample::select(vec![
            ApprovalAction::Approve,
            ApprovalAction::Reject,
            ApprovalAction::Escalate,
        ]),
        role in role_strategy(),
    ) {
        let engine = engine();
        let mut record = submitted(&engine);

        for (step_role, action) in steps {
            if let Ok(next) = engine.process_approval_action(&record, &action, &actor(step_role), None) {
                record = next;
            }
        }

        if record.status.is_terminal() {
            let result = engine.process_approval_action(&record, &follow_up, &actor(role), None);
            let refused = matches!(result, Err(WorkflowError::InvalidState { .. }));
            prop_assert!(refused);
        }
    }
}
