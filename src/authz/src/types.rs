//! Core record types shared by the stores and the resolver

use serde::{Deserialize, Serialize};

/// Numeric user identifier supplied by the identity collaborator
pub type UserId = u64;

/// Numeric role identifier
pub type RoleId = u64;

/// Numeric resource identifier
pub type ResourceId = u64;

/// Numeric action identifier
pub type ActionId = u64;

/// Numeric grant (permission) identifier
pub type GrantId = u64;

/// Lifecycle status. Deactivation is the soft-delete signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

impl Status {
    pub fn is_active(self) -> bool {
        self == Status::Active
    }
}

/// Role record
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier
    pub id: RoleId,

    /// Unique role name (e.g., "editor")
    pub name: String,

    /// Active roles participate in resolution; inactive roles are inert
    #[serde(default)]
    pub status: Status,
}

impl Role {
    /// Create a new active role
    pub fn new(id: RoleId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: Status::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Parent → child hierarchy edge. The child inherits the parent's grants
/// when `inherits_permissions` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleEdge {
    pub parent: RoleId,
    pub child: RoleId,
    pub inherits_permissions: bool,
}

/// Resource record ("what" of a permission)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource identifier
    pub id: ResourceId,

    /// Globally unique resource name (e.g., "user", "salary")
    pub name: String,

    /// Parent in the resource tree (menu/module grouping)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<ResourceId>,

    #[serde(default)]
    pub status: Status,
}

impl Resource {
    /// Create a new active root resource
    pub fn new(id: ResourceId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            parent_id: None,
            status: Status::Active,
        }
    }

    /// Attach the resource under a parent
    pub fn with_parent(mut self, parent_id: ResourceId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}

/// Action record ("verb" of a permission)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Action identifier
    pub id: ActionId,

    /// Globally unique action name (e.g., "read", "update")
    pub name: String,

    #[serde(default)]
    pub status: Status,
}

impl Action {
    /// Create a new active action
    pub fn new(id: ActionId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            status: Status::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }
}
