//! In-memory record store

use super::RecordStore;
use crate::error::{Result, WorkflowError};
use crate::record::PoamRecord;
use async_trait::async_trait;
use poamflow_core::{RecordId, RecordKey, TenantId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Map-backed store; records are ordered by creation time on query
#[derive(Debug, Clone, Default)]
pub struct InMemoryRecordStore {
    records: Arc<RwLock<HashMap<(TenantId, RecordId), PoamRecord>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store, e.g. from a JSON snapshot
    pub fn with_records(records: impl IntoIterator<Item = PoamRecord>) -> Self {
        let map = records
            .into_iter()
            .map(|r| ((r.tenant_id.clone(), r.id.clone()), r))
            .collect();
        Self {
            records: Arc::new(RwLock::new(map)),
        }
    }

    /// Every record across tenants, ordered by tenant then creation time
    pub async fn all_records(&self) -> Vec<PoamRecord> {
        let mut records: Vec<PoamRecord> = self.records.read().await.values().cloned().collect();
        records.sort_by(|a, b| {
            (&a.tenant_id, a.created_at, &a.id).cmp(&(&b.tenant_id, b.created_at, &b.id))
        });
        records
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

fn map_key(key: &RecordKey) -> (TenantId, RecordId) {
    (key.tenant_id.clone(), key.id.clone())
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<PoamRecord>> {
        let records = self.records.read().await;
        Ok(records.get(&map_key(key)).cloned())
    }

    async fn create(&self, record: PoamRecord) -> Result<()> {
        let key = record.key();
        let mut records = self.records.write().await;
        if records.contains_key(&map_key(&key)) {
            return Err(WorkflowError::AlreadyExists(key));
        }
        records.insert(map_key(&key), record);
        Ok(())
    }

    async fn replace(&self, record: PoamRecord, expected_version: u64) -> Result<()> {
        let key = record.key();
        let mut records = self.records.write().await;

        let stored = records
            .get_mut(&map_key(&key))
            .ok_or_else(|| WorkflowError::NotFound(key.clone()))?;

        if stored.version != expected_version {
            return Err(WorkflowError::VersionConflict {
                key,
                expected: expected_version,
                actual: stored.version,
            });
        }

        *stored = record;
        Ok(())
    }

    async fn query_by_tenant(&self, tenant_id: &str) -> Result<Vec<PoamRecord>> {
        let records = self.records.read().await;
        let mut matching: Vec<PoamRecord> = records
            .iter()
            .filter(|((tenant, _), _)| tenant == tenant_id)
            .map(|(_, r)| r.clone())
            .collect();
        matching.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(matching)
    }

    async fn tenants(&self) -> Result<Vec<TenantId>> {
        let records = self.records.read().await;
        let tenants: BTreeSet<&TenantId> = records.keys().map(|(tenant, _)| tenant).collect();
        Ok(tenants.into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{NewPoam, RiskLevel};
    use chrono::{TimeZone, Utc};

    fn record(tenant: &str, id: &str) -> PoamRecord {
        PoamRecord::draft(
            RecordKey::new(tenant, id).unwrap(),
            NewPoam::new(id, RiskLevel::Low),
            "alice".to_string(),
            Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let store = InMemoryRecordStore::new();
        store.create(record("tenant-a", "poam-1")).await.unwrap();

        let key = RecordKey::new("tenant-a", "poam-1").unwrap();
        assert!(store.get(&key).await.unwrap().is_some());

        let err = store.create(record("tenant-a", "poam-1")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_same_id_in_two_tenants() {
        let store = InMemoryRecordStore::new();
        store.create(record("tenant-a", "poam-1")).await.unwrap();
        store.create(record("tenant-b", "poam-1")).await.unwrap();

        assert_eq!(store.query_by_tenant("tenant-a").await.unwrap().len(), 1);
        assert_eq!(store.tenants().await.unwrap(), vec!["tenant-a", "tenant-b"]);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn test_replace_checks_version() {
        let store = InMemoryRecordStore::new();
        let original = record("tenant-a", "poam-1");
        store.create(original.clone()).await.unwrap();

        let mut updated = original.clone();
        updated.title = "Updated".to_string();
        updated.version = 2;
        store.replace(updated.clone(), 1).await.unwrap();

        let mut stale = original;
        stale.version = 2;
        let err = store.replace(stale, 1).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::VersionConflict {
                expected: 1,
                actual: 2,
                ..
            }
        ));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_replace_missing_record() {
        let store = InMemoryRecordStore::new();
        let err = store.replace(record("tenant-a", "ghost"), 1).await.unwrap_err();
        assert!(matches!(err, WorkflowError::NotFound(_)));
    }
}
