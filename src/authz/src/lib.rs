//! # POAMFlow Authority Model
//!
//! Maps a role to its permission table, its approval level (0-5) and its
//! exception-approval eligibility. Every operation is a pure lookup over a
//! validated [`RoleTable`]; nothing here touches storage or the network.
//!
//! ## Example
//!
//! ```rust
//! use poamflow_authz::{AuthorityModel, ApprovalLevel, Permission, ProtectedResource, Role};
//!
//! let model = AuthorityModel::dod_default();
//!
//! assert!(model.has_permission(Role::Isso, ProtectedResource::Poams, Permission::Approve));
//! assert_eq!(model.approval_level_of(Role::Issm).value(), 3);
//! assert_eq!(model.next_approval_level(ApprovalLevel::MAX), None);
//! ```

pub mod types;
pub mod roles;
pub mod model;
pub mod error;

// Re-export commonly used types
pub use types::{ApprovalLevel, Permission, ProtectedResource, Role};
pub use roles::{PermissionTable, RoleDefinition, RoleTable};
pub use model::{AuthorityModel, HierarchyLevel, DELEGATION_MIN_LEVEL};
pub use error::{AuthzError, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
