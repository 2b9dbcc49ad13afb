//! Service facade over the engine and a record store
//!
//! Each mutating call reads the record, runs the pure transition, and writes
//! the result back conditioned on the version it read. Every attempt, accepted
//! or not, goes to the attempt log and the metrics when those are enabled.

use crate::action::ApprovalAction;
use crate::audit::AttemptLog;
use crate::engine::ApprovalEngine;
use crate::error::{Result, WorkflowError};
use crate::metrics::WorkflowMetrics;
use crate::progress::{pending_approvals_for, workflow_status, WorkflowStatus};
use crate::record::{Actor, ExceptionRequest, NewPoam, PoamRecord};
use crate::stats::{compute_statistics, WorkflowStatistics};
use crate::store::RecordStore;
use poamflow_authz::{AuthorityModel, Role};
use poamflow_core::{Clock, RecordKey, SystemClock};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

/// Service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Keep a hash-chained log of every attempted transition
    pub enable_audit: bool,

    /// Entries retained by the attempt log
    pub audit_capacity: usize,

    /// Count accepted/rejected transitions
    pub enable_metrics: bool,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            enable_audit: true,
            audit_capacity: 10_000,
            enable_metrics: true,
        }
    }
}

/// POA&M approval service
pub struct PoamService {
    engine: ApprovalEngine,
    store: Arc<dyn RecordStore>,
    audit: Option<AttemptLog>,
    metrics: Option<WorkflowMetrics>,
}

impl PoamService {
    pub fn new(
        store: Arc<dyn RecordStore>,
        authority: Arc<AuthorityModel>,
        config: ServiceConfig,
    ) -> Self {
        Self::with_clock(store, authority, Arc::new(SystemClock), config)
    }

    pub fn with_clock(
        store: Arc<dyn RecordStore>,
        authority: Arc<AuthorityModel>,
        clock: Arc<dyn Clock>,
        config: ServiceConfig,
    ) -> Self {
        let audit = config
            .enable_audit
            .then(|| AttemptLog::new(config.audit_capacity));
        let metrics = config.enable_metrics.then(WorkflowMetrics::new);

        info!(
            "POA&M service ready (audit: {}, metrics: {})",
            config.enable_audit, config.enable_metrics
        );

        Self {
            engine: ApprovalEngine::with_clock(authority, clock),
            store,
            audit,
            metrics,
        }
    }

    pub fn engine(&self) -> &ApprovalEngine {
        &self.engine
    }

    pub fn authority(&self) -> &AuthorityModel {
        self.engine.authority()
    }

    pub fn audit_log(&self) -> Option<&AttemptLog> {
        self.audit.as_ref()
    }

    pub fn metrics(&self) -> Option<&WorkflowMetrics> {
        self.metrics.as_ref()
    }

    /// Create a Draft record and persist it
    pub async fn create_record(
        &self,
        tenant_id: &str,
        fields: NewPoam,
        actor: &Actor,
    ) -> Result<PoamRecord> {
        let result = match self.engine.create_record(tenant_id, fields, actor) {
            Ok(record) => self.store.create(record.clone()).await.map(|_| record),
            Err(err) => Err(err),
        };

        match &result {
            Ok(record) => {
                self.observe_accepted(actor, record.key(), "create", None, record)
                    .await
            }
            Err(err) => self.observe_rejected(actor, None, "create", err).await,
        }
        result
    }

    pub async fn submit_for_approval(
        &self,
        key: &RecordKey,
        actor: &Actor,
        comments: Option<&str>,
    ) -> Result<PoamRecord> {
        self.mutate(key, actor, "submit", |record| {
            self.engine.submit_for_approval(record, actor, comments)
        })
        .await
    }

    pub async fn request_exception(
        &self,
        key: &RecordKey,
        actor: &Actor,
        exception: ExceptionRequest,
    ) -> Result<PoamRecord> {
        self.mutate(key, actor, "request_exception", move |record| {
            self.engine.request_exception(record, actor, exception)
        })
        .await
    }

    pub async fn process_approval_action(
        &self,
        key: &RecordKey,
        action: &ApprovalAction,
        actor: &Actor,
        comments: Option<&str>,
    ) -> Result<PoamRecord> {
        self.mutate(key, actor, action.as_str(), |record| {
            self.engine
                .process_approval_action(record, action, actor, comments)
        })
        .await
    }

    pub async fn resubmit(
        &self,
        key: &RecordKey,
        actor: &Actor,
        comments: Option<&str>,
    ) -> Result<PoamRecord> {
        self.mutate(key, actor, "resubmit", |record| {
            self.engine.resubmit(record, actor, comments)
        })
        .await
    }

    pub async fn withdraw(
        &self,
        key: &RecordKey,
        actor: &Actor,
        comments: Option<&str>,
    ) -> Result<PoamRecord> {
        self.mutate(key, actor, "withdraw", |record| {
            self.engine.withdraw(record, actor, comments)
        })
        .await
    }

    pub async fn get_record(&self, key: &RecordKey) -> Result<PoamRecord> {
        self.store
            .get(key)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(key.clone()))
    }

    /// Records waiting on exactly this role's tier
    pub async fn get_pending_approvals(&self, role: Role, tenant_id: &str) -> Result<Vec<PoamRecord>> {
        let records = self.store.query_by_tenant(tenant_id).await?;
        Ok(pending_approvals_for(self.authority(), role, &records)
            .into_iter()
            .cloned()
            .collect())
    }

    pub async fn get_workflow_status(&self, key: &RecordKey) -> Result<WorkflowStatus> {
        let record = self.get_record(key).await?;
        Ok(workflow_status(self.authority(), &record))
    }

    pub async fn get_statistics(&self, tenant_id: &str) -> Result<WorkflowStatistics> {
        let records = self.store.query_by_tenant(tenant_id).await?;
        Ok(compute_statistics(&records, self.engine.clock().now()))
    }

    /// Read, transition, and write back conditioned on the read version
    async fn mutate<F>(
        &self,
        key: &RecordKey,
        actor: &Actor,
        action: &str,
        transition: F,
    ) -> Result<PoamRecord>
    where
        F: FnOnce(&PoamRecord) -> Result<PoamRecord>,
    {
        let current = match self.get_record(key).await {
            Ok(record) => record,
            Err(err) => {
                self.observe_rejected(actor, Some(key.clone()), action, &err)
                    .await;
                return Err(err);
            }
        };

        let result = match transition(&current) {
            Ok(next) => self
                .store
                .replace(next.clone(), current.version)
                .await
                .map(|_| next),
            Err(err) => Err(err),
        };

        match &result {
            Ok(next) => {
                self.observe_accepted(actor, key.clone(), action, Some(&current), next)
                    .await
            }
            Err(err) => {
                self.observe_rejected(actor, Some(key.clone()), action, err)
                    .await
            }
        }
        result
    }

    async fn observe_accepted(
        &self,
        actor: &Actor,
        key: RecordKey,
        action: &str,
        before: Option<&PoamRecord>,
        after: &PoamRecord,
    ) {
        let from = before.map(|r| r.status.name()).unwrap_or(after.status.name());

        if let Some(audit) = &self.audit {
            audit
                .record_accepted(
                    self.engine.clock().now(),
                    actor,
                    key,
                    action,
                    from,
                    after.status.name(),
                )
                .await;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(action, true).await;
        }
    }

    async fn observe_rejected(
        &self,
        actor: &Actor,
        key: Option<RecordKey>,
        action: &str,
        err: &WorkflowError,
    ) {
        warn!("Rejected {} by {} ({}): {}", action, actor.id, actor.role, err);

        if let Some(audit) = &self.audit {
            audit
                .record_rejected(self.engine.clock().now(), actor, key, action, err)
                .await;
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_attempt(action, false).await;
            if matches!(err, WorkflowError::VersionConflict { .. }) {
                metrics.record_version_conflict().await;
            }
        }
    }
}
