//! Authority model
//!
//! Answers every authorization question the approval workflow asks, without
//! side effects. Build one at startup and share it by reference.

use crate::error::Result;
use crate::roles::{RoleDefinition, RoleTable};
use crate::types::{ApprovalLevel, Permission, ProtectedResource, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Minimum approval level allowed to hand a review to someone else
pub const DELEGATION_MIN_LEVEL: ApprovalLevel = ApprovalLevel::saturating(3);

/// One rung of the approval ladder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HierarchyLevel {
    pub level: ApprovalLevel,
    pub roles: Vec<Role>,
    pub description: String,
}

/// Validated, immutable role table with lookup operations
#[derive(Debug, Clone)]
pub struct AuthorityModel {
    /// Indexed by `Role::index()`
    definitions: Vec<RoleDefinition>,
}

impl AuthorityModel {
    /// Validate `table` and build a model from it
    pub fn new(table: RoleTable) -> Result<Self> {
        table.validate()?;
        let model = Self::from_table(table);
        debug!("Authority model built with {} roles", model.definitions.len());
        Ok(model)
    }

    /// Model over the built-in DoD table
    pub fn dod_default() -> Self {
        Self::from_table(RoleTable::dod_default())
    }

    fn from_table(table: RoleTable) -> Self {
        let mut definitions = table.roles;
        definitions.sort_by_key(|d| d.role.index());
        Self { definitions }
    }

    /// Full definition for a role
    pub fn definition(&self, role: Role) -> &RoleDefinition {
        &self.definitions[role.index()]
    }

    /// All definitions in role order
    pub fn definitions(&self) -> &[RoleDefinition] {
        &self.definitions
    }

    /// True iff the role's table grants `permission` on `resource`
    pub fn has_permission(
        &self,
        role: Role,
        resource: ProtectedResource,
        permission: Permission,
    ) -> bool {
        self.definition(role).allows(resource, permission)
    }

    /// Approval level of a role
    pub fn approval_level_of(&self, role: Role) -> ApprovalLevel {
        self.definition(role).approval_level
    }

    /// Whether the role may approve exceptions at `required` or below
    pub fn can_approve_at_level(&self, role: Role, required: ApprovalLevel) -> bool {
        let definition = self.definition(role);
        definition.can_approve_exceptions && definition.approval_level >= required
    }

    /// Smallest approval-eligible level strictly above `current`
    pub fn next_approval_level(&self, current: ApprovalLevel) -> Option<ApprovalLevel> {
        self.approval_levels()
            .into_iter()
            .find(|level| *level > current)
    }

    /// Roles able to approve at `min_level` or higher, lowest level first
    pub fn roles_for_approval_level(&self, min_level: ApprovalLevel) -> Vec<Role> {
        let mut roles: Vec<&RoleDefinition> = self
            .definitions
            .iter()
            .filter(|d| d.can_approve_exceptions && d.approval_level >= min_level)
            .collect();
        roles.sort_by_key(|d| (d.approval_level, d.role.index()));
        roles.into_iter().map(|d| d.role).collect()
    }

    /// Roles sitting exactly at `level`
    pub fn roles_at_level(&self, level: ApprovalLevel) -> Vec<Role> {
        self.definitions
            .iter()
            .filter(|d| d.approval_level == level)
            .map(|d| d.role)
            .collect()
    }

    /// Ascending approval ladder, one entry per approval-eligible level
    pub fn approval_hierarchy(&self) -> Vec<HierarchyLevel> {
        self.approval_levels()
            .into_iter()
            .map(|level| HierarchyLevel {
                level,
                roles: self
                    .definitions
                    .iter()
                    .filter(|d| d.is_approver() && d.approval_level == level)
                    .map(|d| d.role)
                    .collect(),
                description: level_description(level).to_string(),
            })
            .collect()
    }

    /// Only senior reviewers may hand off their review
    pub fn can_delegate(&self, role: Role) -> bool {
        self.approval_level_of(role) >= DELEGATION_MIN_LEVEL
    }

    /// An approver below the top of the ladder may push a record upward
    pub fn can_escalate(&self, role: Role) -> bool {
        let definition = self.definition(role);
        definition.can_approve_exceptions && !definition.approval_level.is_max()
    }

    fn approval_levels(&self) -> BTreeSet<ApprovalLevel> {
        self.definitions
            .iter()
            .filter(|d| d.is_approver())
            .map(|d| d.approval_level)
            .collect()
    }
}

impl Default for AuthorityModel {
    fn default() -> Self {
        Self::dod_default()
    }
}

fn level_description(level: ApprovalLevel) -> &'static str {
    match level.value() {
        1 => "Security engineering review (ISSE)",
        2 => "Information System Security Officer review",
        3 => "Information System Security Manager review",
        4 => "Risk Management Officer review",
        5 => "Authorizing Official decision",
        _ => "Unassigned",
    }
}
