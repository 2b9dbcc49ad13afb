//! Role definitions and the role table
//!
//! A [`RoleTable`] is plain configuration: it can be deserialized from TOML
//! or JSON, or taken from [`RoleTable::dod_default`]. It only becomes usable
//! for decisions once [`crate::AuthorityModel::new`] has validated it.

use crate::error::{AuthzError, Result};
use crate::types::{ApprovalLevel, Permission, ProtectedResource, Role};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Permissions granted per resource
pub type PermissionTable = BTreeMap<ProtectedResource, BTreeSet<Permission>>;

/// Static authority attached to one role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDefinition {
    /// Role being defined
    pub role: Role,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    /// Approval authority (0 = none)
    pub approval_level: ApprovalLevel,

    /// Whether this role may sign off on POA&M exceptions
    #[serde(default)]
    pub can_approve_exceptions: bool,

    /// Resource -> granted permissions. Missing resources grant nothing.
    #[serde(default)]
    pub permissions: PermissionTable,
}

impl RoleDefinition {
    /// Create a definition with no permissions
    pub fn new(role: Role, approval_level: ApprovalLevel, can_approve_exceptions: bool) -> Self {
        Self {
            role,
            description: String::new(),
            approval_level,
            can_approve_exceptions,
            permissions: PermissionTable::new(),
        }
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Grant permissions on a resource
    pub fn grant(mut self, resource: ProtectedResource, permissions: &[Permission]) -> Self {
        self.permissions
            .entry(resource)
            .or_default()
            .extend(permissions.iter().copied());
        self
    }

    /// Whether this definition grants `permission` on `resource`
    pub fn allows(&self, resource: ProtectedResource, permission: Permission) -> bool {
        self.permissions
            .get(&resource)
            .is_some_and(|granted| granted.contains(&permission))
    }

    /// Whether this role takes part in the approval chain
    pub fn is_approver(&self) -> bool {
        self.can_approve_exceptions && self.approval_level > ApprovalLevel::NONE
    }
}

/// Complete role table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleTable {
    pub roles: Vec<RoleDefinition>,
}

impl RoleTable {
    /// Build a table from definitions
    pub fn new(roles: Vec<RoleDefinition>) -> Self {
        Self { roles }
    }

    /// The DoD multi-level approval table
    pub fn dod_default() -> Self {
        use Permission::{Admin, Approve, Read, Write};
        use ProtectedResource::*;

        let level = ApprovalLevel::saturating;

        Self::new(vec![
            RoleDefinition::new(Role::Engineer, level(0), false)
                .with_description("System engineer remediating findings")
                .grant(Systems, &[Read])
                .grant(Controls, &[Read])
                .grant(Poams, &[Read, Write])
                .grant(Reports, &[Read]),
            RoleDefinition::new(Role::SecurityEngineer, level(1), true)
                .with_description("Information Systems Security Engineer (ISSE)")
                .grant(Systems, &[Read, Write])
                .grant(Controls, &[Read, Write])
                .grant(Poams, &[Read, Write, Approve])
                .grant(Exceptions, &[Read, Write])
                .grant(Reports, &[Read, Write]),
            RoleDefinition::new(Role::Isso, level(2), true)
                .with_description("Information System Security Officer")
                .grant(Systems, &[Read, Write])
                .grant(Controls, &[Read, Write, Approve])
                .grant(Poams, &[Read, Write, Approve])
                .grant(Exceptions, &[Read, Write, Approve])
                .grant(Reports, &[Read, Write])
                .grant(Users, &[Read]),
            RoleDefinition::new(Role::Issm, level(3), true)
                .with_description("Information System Security Manager")
                .grant(Systems, &[Read, Write, Approve])
                .grant(Controls, &[Read, Write, Approve])
                .grant(Poams, &[Read, Write, Approve])
                .grant(Exceptions, &[Read, Write, Approve])
                .grant(Reports, &[Read, Write])
                .grant(Users, &[Read, Write]),
            RoleDefinition::new(Role::RiskManagementOfficer, level(4), true)
                .with_description("Risk Management Officer")
                .grant(Systems, &[Read, Approve])
                .grant(Controls, &[Read, Approve])
                .grant(Poams, &[Read, Write, Approve])
                .grant(Exceptions, &[Read, Write, Approve])
                .grant(Reports, &[Read, Write])
                .grant(Users, &[Read]),
            RoleDefinition::new(Role::AuthorizingOfficer, level(5), true)
                .with_description("Authorizing Official")
                .grant(Systems, &[Read, Write, Approve, Admin])
                .grant(Controls, &[Read, Write, Approve])
                .grant(Poams, &[Read, Write, Approve])
                .grant(Exceptions, &[Read, Write, Approve])
                .grant(Reports, &[Read, Write])
                .grant(Users, &[Read, Write, Admin])
                .grant(Settings, &[Read, Write, Admin]),
            RoleDefinition::new(Role::ReadOnlyUser, level(0), false)
                .with_description("Auditor or observer with read access")
                .grant(Systems, &[Read])
                .grant(Controls, &[Read])
                .grant(Poams, &[Read])
                .grant(Exceptions, &[Read])
                .grant(Reports, &[Read]),
        ])
    }

    /// Check that every role is defined exactly once and that at least one
    /// role can approve
    pub fn validate(&self) -> Result<()> {
        let mut seen = BTreeSet::new();
        for definition in &self.roles {
            if !seen.insert(definition.role) {
                return Err(AuthzError::InvalidRoleTable(format!(
                    "role '{}' is defined more than once",
                    definition.role
                )));
            }
        }

        for role in Role::ALL {
            if !seen.contains(&role) {
                return Err(AuthzError::InvalidRoleTable(format!(
                    "role '{}' is not defined",
                    role
                )));
            }
        }

        if !self.roles.iter().any(RoleDefinition::is_approver) {
            return Err(AuthzError::InvalidRoleTable(
                "no role is able to approve".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for RoleTable {
    fn default() -> Self {
        Self::dod_default()
    }
}
