//! Tenant-level workflow statistics

use crate::record::{PoamRecord, RiskLevel};
use crate::status::StatusName;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate counts over a set of records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStatistics {
    pub total: usize,
    pub by_status: BTreeMap<StatusName, usize>,
    pub by_risk_level: BTreeMap<RiskLevel, usize>,
    /// Records waiting on one of the five review tiers
    pub pending_approval: usize,
    /// Past their scheduled completion date and not yet approved
    pub overdue: usize,
    /// Mean submit-to-approve time; `None` when nothing has been approved
    pub average_approval_days: Option<f64>,
}

pub fn compute_statistics<'a>(
    records: impl IntoIterator<Item = &'a PoamRecord>,
    now: DateTime<Utc>,
) -> WorkflowStatistics {
    let mut stats = WorkflowStatistics::default();
    let mut durations = Vec::new();

    for record in records {
        stats.total += 1;
        *stats.by_status.entry(record.status.name()).or_default() += 1;
        *stats.by_risk_level.entry(record.risk_level).or_default() += 1;

        if record.is_pending_approval() {
            stats.pending_approval += 1;
        }
        if record.is_overdue(now) {
            stats.overdue += 1;
        }
        if let Some(days) = record.approval_duration_days() {
            durations.push(days);
        }
    }

    if !durations.is_empty() {
        stats.average_approval_days = Some(durations.iter().sum::<f64>() / durations.len() as f64);
    }

    stats
}
