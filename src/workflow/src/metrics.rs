//! Transition counters for workflow observability

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Accepted/rejected counts for one action kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCounts {
    pub accepted: u64,
    pub rejected: u64,
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_attempts: u64,
    pub accepted: u64,
    pub rejected: u64,
    pub version_conflicts: u64,
    pub by_action: BTreeMap<String, ActionCounts>,
}

impl MetricsSnapshot {
    /// Share of attempts that went through
    pub fn acceptance_rate(&self) -> f64 {
        if self.total_attempts == 0 {
            0.0
        } else {
            self.accepted as f64 / self.total_attempts as f64
        }
    }
}

/// Shared counter set
#[derive(Debug, Clone, Default)]
pub struct WorkflowMetrics {
    inner: Arc<RwLock<MetricsSnapshot>>,
}

impl WorkflowMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one attempt of `action`
    pub async fn record_attempt(&self, action: &str, accepted: bool) {
        let mut metrics = self.inner.write().await;
        metrics.total_attempts += 1;

        let counts = metrics.by_action.entry(action.to_string()).or_default();
        if accepted {
            counts.accepted += 1;
            metrics.accepted += 1;
        } else {
            counts.rejected += 1;
            metrics.rejected += 1;
        }
    }

    /// Record a lost optimistic-write race
    pub async fn record_version_conflict(&self) {
        self.inner.write().await.version_conflicts += 1;
    }

    pub async fn snapshot(&self) -> MetricsSnapshot {
        self.inner.read().await.clone()
    }

    pub async fn reset(&self) {
        *self.inner.write().await = MetricsSnapshot::default();
    }
}
