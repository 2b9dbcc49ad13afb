//! Core authority types
//!
//! The role, resource and permission spaces are closed enums so a lookup
//! against the role table can never miss.

use crate::error::{AuthzError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role held by an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Role {
    Engineer,
    SecurityEngineer,
    #[serde(rename = "ISSO")]
    Isso,
    #[serde(rename = "ISSM")]
    Issm,
    RiskManagementOfficer,
    AuthorizingOfficer,
    ReadOnlyUser,
}

impl Role {
    /// Every role, in declaration order
    pub const ALL: [Role; 7] = [
        Role::Engineer,
        Role::SecurityEngineer,
        Role::Isso,
        Role::Issm,
        Role::RiskManagementOfficer,
        Role::AuthorizingOfficer,
        Role::ReadOnlyUser,
    ];

    /// Position in [`Role::ALL`]
    pub(crate) fn index(self) -> usize {
        self as usize
    }

    /// Canonical name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Engineer => "Engineer",
            Role::SecurityEngineer => "SecurityEngineer",
            Role::Isso => "ISSO",
            Role::Issm => "ISSM",
            Role::RiskManagementOfficer => "RiskManagementOfficer",
            Role::AuthorizingOfficer => "AuthorizingOfficer",
            Role::ReadOnlyUser => "ReadOnlyUser",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AuthzError;

    /// Accepts the canonical names case-insensitively, ignoring `-` and `_`,
    /// plus the short forms `isse`, `rmo` and `ao`.
    fn from_str(s: &str) -> Result<Self> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_' && !c.is_whitespace())
            .flat_map(char::to_lowercase)
            .collect();

        match normalized.as_str() {
            "engineer" => Ok(Role::Engineer),
            "securityengineer" | "isse" => Ok(Role::SecurityEngineer),
            "isso" => Ok(Role::Isso),
            "issm" => Ok(Role::Issm),
            "riskmanagementofficer" | "rmo" => Ok(Role::RiskManagementOfficer),
            "authorizingofficer" | "authorizingofficial" | "ao" => Ok(Role::AuthorizingOfficer),
            "readonlyuser" | "readonly" => Ok(Role::ReadOnlyUser),
            _ => Err(AuthzError::UnknownRole(s.to_string())),
        }
    }
}

/// Resource guarded by the permission table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtectedResource {
    Systems,
    Controls,
    Poams,
    Exceptions,
    Reports,
    Users,
    Settings,
}

impl ProtectedResource {
    pub const ALL: [ProtectedResource; 7] = [
        ProtectedResource::Systems,
        ProtectedResource::Controls,
        ProtectedResource::Poams,
        ProtectedResource::Exceptions,
        ProtectedResource::Reports,
        ProtectedResource::Users,
        ProtectedResource::Settings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProtectedResource::Systems => "systems",
            ProtectedResource::Controls => "controls",
            ProtectedResource::Poams => "poams",
            ProtectedResource::Exceptions => "exceptions",
            ProtectedResource::Reports => "reports",
            ProtectedResource::Users => "users",
            ProtectedResource::Settings => "settings",
        }
    }
}

impl fmt::Display for ProtectedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProtectedResource {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        ProtectedResource::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| AuthzError::UnknownResource(s.to_string()))
    }
}

/// Permission on a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Approve,
    Admin,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::Read => "read",
            Permission::Write => "write",
            Permission::Approve => "approve",
            Permission::Admin => "admin",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Permission {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "read" => Ok(Permission::Read),
            "write" => Ok(Permission::Write),
            "approve" => Ok(Permission::Approve),
            "admin" => Ok(Permission::Admin),
            _ => Err(AuthzError::UnknownPermission(s.to_string())),
        }
    }
}

/// Approval authority on the 0..=5 scale
///
/// Level 0 carries no approval authority; level 5 is the Authorizing
/// Official.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ApprovalLevel(u8);

impl ApprovalLevel {
    pub const NONE: ApprovalLevel = ApprovalLevel(0);
    pub const MAX: ApprovalLevel = ApprovalLevel(5);

    /// Build a level, rejecting values above [`ApprovalLevel::MAX`]
    pub fn new(value: u8) -> Result<Self> {
        if value > Self::MAX.0 {
            return Err(AuthzError::LevelOutOfRange(value));
        }
        Ok(Self(value))
    }

    /// Build a level, clamping values above [`ApprovalLevel::MAX`]
    pub const fn saturating(value: u8) -> Self {
        if value > Self::MAX.0 {
            Self::MAX
        } else {
            Self(value)
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    /// Whether this is the top of the scale
    pub fn is_max(self) -> bool {
        self == Self::MAX
    }
}

impl TryFrom<u8> for ApprovalLevel {
    type Error = AuthzError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<ApprovalLevel> for u8 {
    fn from(level: ApprovalLevel) -> Self {
        level.0
    }
}

impl fmt::Display for ApprovalLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
