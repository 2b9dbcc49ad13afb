//! Identifier types
//!
//! Records are partitioned by tenant, so every lookup goes through the
//! `(tenant_id, id)` pair carried by [`RecordKey`].

use crate::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Multi-tenancy tenant identifier
pub type TenantId = String;

/// User identifier supplied by the identity layer
pub type UserId = String;

/// Unique record identifier
pub type RecordId = String;

/// Tenant-partitioned record key
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordKey {
    pub tenant_id: TenantId,
    pub id: RecordId,
}

impl RecordKey {
    /// Build a key, rejecting blank components
    pub fn new(tenant_id: impl Into<TenantId>, id: impl Into<RecordId>) -> Result<Self> {
        let tenant_id = tenant_id.into();
        let id = id.into();

        if tenant_id.trim().is_empty() {
            return Err(CoreError::invalid_identifier("tenant id cannot be empty"));
        }
        if id.trim().is_empty() {
            return Err(CoreError::invalid_identifier("record id cannot be empty"));
        }

        Ok(Self { tenant_id, id })
    }

    /// Generate a fresh key under the given tenant
    pub fn generate(tenant_id: impl Into<TenantId>) -> Result<Self> {
        Self::new(tenant_id, Uuid::new_v4().to_string())
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.id)
    }
}
