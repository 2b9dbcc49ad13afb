//! Record persistence
//!
//! Stores are partitioned by tenant and versioned: `replace` only lands when
//! the stored record still carries the version the caller read.

use crate::error::Result;
use crate::record::PoamRecord;
use async_trait::async_trait;
use poamflow_core::{RecordKey, TenantId};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;

pub use memory::InMemoryRecordStore;
#[cfg(feature = "postgres")]
pub use postgres::PostgresRecordStore;

/// Record store trait
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch a record by tenant and id
    async fn get(&self, key: &RecordKey) -> Result<Option<PoamRecord>>;

    /// Insert a new record; fails with `AlreadyExists` if the key is taken
    async fn create(&self, record: PoamRecord) -> Result<()>;

    /// Overwrite a record if its stored version equals `expected_version`
    async fn replace(&self, record: PoamRecord, expected_version: u64) -> Result<()>;

    /// Every record belonging to a tenant
    async fn query_by_tenant(&self, tenant_id: &str) -> Result<Vec<PoamRecord>>;

    /// Tenants with at least one record
    async fn tenants(&self) -> Result<Vec<TenantId>>;
}
