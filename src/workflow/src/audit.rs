//! Hash-chained log of every attempted transition
//!
//! The record's own `approvalHistory` only grows on success. This log also
//! keeps the rejected attempts, so an auditor can see who tried what and why
//! it was refused. Each entry commits to its predecessor with BLAKE3; editing
//! or dropping an entry in the middle breaks [`AttemptLog::verify_chain`].

use crate::error::WorkflowError;
use crate::record::Actor;
use crate::status::StatusName;
use chrono::{DateTime, Utc};
use poamflow_authz::Role;
use poamflow_core::{RecordKey, UserId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// `prevHash` of the first entry ever written
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Result of an attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted {
        #[serde(rename = "fromStatus")]
        from_status: StatusName,
        #[serde(rename = "toStatus")]
        to_status: StatusName,
    },
    Rejected {
        kind: String,
        reason: String,
    },
}

/// One attempted transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptEntry {
    pub sequence: u64,
    pub timestamp: DateTime<Utc>,
    pub actor_id: UserId,
    pub actor_role: Role,
    pub record: Option<RecordKey>,
    pub action: String,
    #[serde(flatten)]
    pub outcome: AttemptOutcome,
    pub prev_hash: String,
    pub entry_hash: String,
}

impl AttemptEntry {
    pub fn is_accepted(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Accepted { .. })
    }

    /// Hash over the entry's content and its predecessor's hash
    ///
    /// Variable-length fields are length-prefixed so bytes cannot slide
    /// from one field into its neighbour without changing the digest.
    fn compute_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        update_field(&mut hasher, self.prev_hash.as_bytes());
        hasher.update(&self.sequence.to_le_bytes());
        update_field(&mut hasher, self.timestamp.to_rfc3339().as_bytes());
        update_field(&mut hasher, self.actor_id.as_bytes());
        update_field(&mut hasher, self.actor_role.as_str().as_bytes());
        match &self.record {
            Some(key) => {
                hasher.update(&[1]);
                update_field(&mut hasher, key.tenant_id.as_bytes());
                update_field(&mut hasher, key.id.as_bytes());
            }
            None => {
                hasher.update(&[0]);
            }
        }
        update_field(&mut hasher, self.action.as_bytes());

        match &self.outcome {
            AttemptOutcome::Accepted {
                from_status,
                to_status,
            } => {
                hasher.update(&[1]);
                update_field(&mut hasher, from_status.as_str().as_bytes());
                update_field(&mut hasher, to_status.as_str().as_bytes());
            }
            AttemptOutcome::Rejected { kind, reason } => {
                hasher.update(&[2]);
                update_field(&mut hasher, kind.as_bytes());
                update_field(&mut hasher, reason.as_bytes());
            }
        }

        hasher.finalize().to_hex().to_string()
    }
}

fn update_field(hasher: &mut blake3::Hasher, bytes: &[u8]) {
    hasher.update(&(bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

/// Attempt log statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptStats {
    /// Entries ever written, including those trimmed away
    pub total_attempts: u64,
    /// Entries currently retained
    pub retained: usize,
    pub accepted: usize,
    pub rejected: usize,
}

#[derive(Debug)]
struct LogState {
    entries: VecDeque<AttemptEntry>,
    next_sequence: u64,
    head_hash: String,
}

/// Bounded, append-only attempt log
///
/// When full, the oldest entries are dropped. The retained suffix still
/// verifies because each entry carries its own `prevHash`.
#[derive(Debug, Clone)]
pub struct AttemptLog {
    state: Arc<RwLock<LogState>>,
    capacity: usize,
}

impl AttemptLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(RwLock::new(LogState {
                entries: VecDeque::new(),
                next_sequence: 0,
                head_hash: GENESIS_HASH.to_string(),
            })),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Record a successful transition
    pub async fn record_accepted(
        &self,
        timestamp: DateTime<Utc>,
        actor: &Actor,
        record: RecordKey,
        action: &str,
        from_status: StatusName,
        to_status: StatusName,
    ) -> AttemptEntry {
        self.append(
            timestamp,
            actor,
            Some(record),
            action,
            AttemptOutcome::Accepted {
                from_status,
                to_status,
            },
        )
        .await
    }

    /// Record a refused transition
    pub async fn record_rejected(
        &self,
        timestamp: DateTime<Utc>,
        actor: &Actor,
        record: Option<RecordKey>,
        action: &str,
        error: &WorkflowError,
    ) -> AttemptEntry {
        self.append(
            timestamp,
            actor,
            record,
            action,
            AttemptOutcome::Rejected {
                kind: error.kind().to_string(),
                reason: error.to_string(),
            },
        )
        .await
    }

    async fn append(
        &self,
        timestamp: DateTime<Utc>,
        actor: &Actor,
        record: Option<RecordKey>,
        action: &str,
        outcome: AttemptOutcome,
    ) -> AttemptEntry {
        let mut state = self.state.write().await;

        let mut entry = AttemptEntry {
            sequence: state.next_sequence,
            timestamp,
            actor_id: actor.id.clone(),
            actor_role: actor.role,
            record,
            action: action.to_string(),
            outcome,
            prev_hash: state.head_hash.clone(),
            entry_hash: String::new(),
        };
        entry.entry_hash = entry.compute_hash();

        state.next_sequence += 1;
        state.head_hash = entry.entry_hash.clone();
        state.entries.push_back(entry.clone());
        while state.entries.len() > self.capacity {
            state.entries.pop_front();
        }

        debug!("Attempt {} logged: {} by {}", entry.sequence, entry.action, entry.actor_id);
        entry
    }

    /// Retained entries, oldest first
    pub async fn entries(&self) -> Vec<AttemptEntry> {
        self.state.read().await.entries.iter().cloned().collect()
    }

    /// Retained entries touching one record
    pub async fn entries_for_record(&self, key: &RecordKey) -> Vec<AttemptEntry> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .filter(|e| e.record.as_ref() == Some(key))
            .cloned()
            .collect()
    }

    /// Retained entries made by one user
    pub async fn entries_for_actor(&self, actor_id: &str) -> Vec<AttemptEntry> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .filter(|e| e.actor_id == actor_id)
            .cloned()
            .collect()
    }

    /// Recompute every retained hash and check the links between them
    pub async fn verify_chain(&self) -> bool {
        let state = self.state.read().await;
        let mut expected_prev: Option<&str> = None;

        for entry in &state.entries {
            if let Some(prev) = expected_prev {
                if entry.prev_hash != prev {
                    warn!("Attempt log broken at sequence {}: bad prevHash", entry.sequence);
                    return false;
                }
            } else if entry.sequence == 0 && entry.prev_hash != GENESIS_HASH {
                warn!("Attempt log does not start from genesis");
                return false;
            }

            if entry.compute_hash() != entry.entry_hash {
                warn!("Attempt log broken at sequence {}: hash mismatch", entry.sequence);
                return false;
            }
            expected_prev = Some(&entry.entry_hash);
        }

        if let Some(last) = state.entries.back() {
            if last.entry_hash != state.head_hash {
                warn!("Attempt log head does not match last entry");
                return false;
            }
        }

        true
    }

    pub async fn stats(&self) -> AttemptStats {
        let state = self.state.read().await;
        let accepted = state.entries.iter().filter(|e| e.is_accepted()).count();

        AttemptStats {
            total_attempts: state.next_sequence,
            retained: state.entries.len(),
            accepted,
            rejected: state.entries.len() - accepted,
        }
    }

    #[cfg(test)]
    async fn tamper<F: FnOnce(&mut AttemptEntry)>(&self, index: usize, edit: F) {
        let mut state = self.state.write().await;
        if let Some(entry) = state.entries.get_mut(index) {
            edit(entry);
        }
    }
}

impl Default for AttemptLog {
    fn default() -> Self {
        Self::new(10_000)
    }
}
