//! Records file persistence across overlapping CLI invocations

use poamflow_authz::{AuthorityModel, Role};
use poamflow_core::RecordKey;
use poamflow_node::{NodeConfig, RecordBackend, RecordFile};
use poamflow_workflow::{
    Actor, ApprovalAction, HistoryAction, NewPoam, PoamService, RiskLevel, ServiceConfig,
    StatusName, WorkflowError,
};
use std::path::Path;
use std::sync::Arc;

async fn open(path: &Path) -> (RecordBackend, PoamService) {
    let backend = RecordBackend::open(&NodeConfig::default(), RecordFile::new(path))
        .await
        .unwrap();
    let service = PoamService::new(
        backend.store(),
        Arc::new(AuthorityModel::dod_default()),
        ServiceConfig::default(),
    );
    (backend, service)
}

async fn seed_submitted(path: &Path, title: &str) -> RecordKey {
    let (backend, service) = open(path).await;
    let sam = Actor::new("sam", Role::SecurityEngineer);

    let record = service
        .create_record("army", NewPoam::new(title, RiskLevel::High), &sam)
        .await
        .unwrap();
    service
        .submit_for_approval(&record.key(), &sam, None)
        .await
        .unwrap();
    backend.persist().await.unwrap();
    record.key()
}

#[tokio::test]
async fn test_overlapping_runs_conflict_instead_of_overwriting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let key = seed_submitted(&path, "Rotate service keys").await;

    let (first_backend, first) = open(&path).await;
    let (second_backend, second) = open(&path).await;

    first
        .process_approval_action(&key, &ApprovalAction::Approve, &Actor::new("ivy", Role::Isso), None)
        .await
        .unwrap();
    second
        .process_approval_action(&key, &ApprovalAction::Reject, &Actor::new("max", Role::Issm), None)
        .await
        .unwrap();

    first_backend.persist().await.unwrap();
    let err = second_backend.persist().await.unwrap_err();
    let err = err.downcast_ref::<WorkflowError>().unwrap();
    assert!(matches!(err, WorkflowError::VersionConflict { expected: 2, actual: 3, .. }));
    assert!(err.is_retryable());

    // The first run's approval survives on disk
    let records = RecordFile::new(&path).load().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status.name(), StatusName::IssoReview);
    let actions: Vec<HistoryAction> = records[0].approval_history.iter().map(|h| h.action).collect();
    assert_eq!(actions, vec![HistoryAction::Submitted, HistoryAction::Approve]);
}

#[tokio::test]
async fn test_overlapping_runs_on_different_records_both_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let first_key = seed_submitted(&path, "Rotate service keys").await;
    let second_key = seed_submitted(&path, "Patch OpenSSL").await;

    let (first_backend, first) = open(&path).await;
    let (second_backend, second) = open(&path).await;
    let isso = Actor::new("ivy", Role::Isso);

    first
        .process_approval_action(&first_key, &ApprovalAction::Approve, &isso, None)
        .await
        .unwrap();
    second
        .process_approval_action(&second_key, &ApprovalAction::Approve, &isso, None)
        .await
        .unwrap();

    first_backend.persist().await.unwrap();
    second_backend.persist().await.unwrap();

    let records = RecordFile::new(&path).load().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records
        .iter()
        .all(|r| r.status.name() == StatusName::IssoReview && r.version == 3));
}

#[tokio::test]
async fn test_repeated_persist_after_commit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.json");
    let key = seed_submitted(&path, "Rotate service keys").await;

    let (backend, service) = open(&path).await;
    let isso = Actor::new("ivy", Role::Isso);
    service
        .process_approval_action(&key, &ApprovalAction::Approve, &isso, None)
        .await
        .unwrap();
    backend.persist().await.unwrap();
    backend.persist().await.unwrap();

    service
        .process_approval_action(&key, &ApprovalAction::Approve, &Actor::new("mia", Role::Issm), None)
        .await
        .unwrap();
    backend.persist().await.unwrap();

    let records = RecordFile::new(&path).load().unwrap();
    assert_eq!(records[0].status.name(), StatusName::IssmReview);
    assert_eq!(records[0].approval_history.len(), 3);
}
