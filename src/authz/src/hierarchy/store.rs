//! Role store: roles, user assignments and the role hierarchy
//!
//! All hierarchy reads that feed a decision happen under one read guard, so a
//! decision observes either the graph before an edge change or after it.

use super::graph::RoleGraph;
use crate::error::{AuthzError, Result};
use crate::types::{Role, RoleEdge, RoleId, Status, UserId};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Role store trait
#[async_trait]
pub trait RoleStore: Send + Sync {
    /// Create an active role with a unique name
    async fn create_role(&self, name: &str) -> Result<Role>;

    /// Get a role by ID
    async fn get_role(&self, id: RoleId) -> Result<Option<Role>>;

    /// Find a role by name
    async fn find_role(&self, name: &str) -> Result<Option<Role>>;

    /// List all roles, active or not
    async fn list_roles(&self) -> Result<Vec<Role>>;

    /// Change a role's status (deactivation is the soft delete)
    async fn set_role_status(&self, id: RoleId, status: Status) -> Result<Role>;

    /// Register a user or change its status
    async fn upsert_user(&self, user: UserId, status: Status) -> Result<()>;

    /// Assign a role to a user directly
    async fn assign_role(&self, user: UserId, role: RoleId) -> Result<()>;

    /// Remove a direct assignment, returning whether it existed
    async fn unassign_role(&self, user: UserId, role: RoleId) -> Result<bool>;

    /// Directly assigned active roles. Unknown or inactive users have none.
    async fn user_roles(&self, user: UserId) -> Result<Vec<Role>>;

    /// Insert a hierarchy edge after checking it does not close a cycle
    async fn add_edge(&self, edge: RoleEdge) -> Result<()>;

    /// Delete a hierarchy edge, returning whether it existed
    async fn remove_edge(&self, parent: RoleId, child: RoleId) -> Result<bool>;

    /// All hierarchy edges
    async fn edges(&self) -> Result<Vec<RoleEdge>>;

    /// A role plus its inheriting ancestors (active roles only)
    async fn expand(&self, role: RoleId) -> Result<Vec<Role>>;

    /// Closure of a user's direct roles under inheritance, read from one snapshot
    async fn effective_roles(&self, user: UserId) -> Result<Vec<Role>>;
}

#[derive(Debug, Default)]
struct RoleDirectory {
    roles: HashMap<RoleId, Role>,
    by_name: HashMap<String, RoleId>,
    users: HashMap<UserId, Status>,
    assignments: HashMap<UserId, BTreeSet<RoleId>>,
    graph: RoleGraph,
    next_id: RoleId,
}

fn role_name(roles: &HashMap<RoleId, Role>, id: RoleId) -> String {
    roles
        .get(&id)
        .map(|r| r.name.clone())
        .unwrap_or_else(|| format!("#{}", id))
}

impl RoleDirectory {
    fn name_of(&self, id: RoleId) -> String {
        role_name(&self.roles, id)
    }

    fn is_active(&self, id: RoleId) -> bool {
        self.roles.get(&id).map(Role::is_active).unwrap_or(false)
    }

    fn require_role(&self, id: RoleId) -> Result<&Role> {
        self.roles
            .get(&id)
            .ok_or_else(|| AuthzError::NotFound(format!("role {}", id)))
    }

    fn direct_roles(&self, user: UserId) -> Vec<RoleId> {
        match self.users.get(&user) {
            Some(Status::Active) => self
                .assignments
                .get(&user)
                .map(|set| set.iter().copied().collect())
                .unwrap_or_default(),
            _ => Vec::new(),
        }
    }

    fn materialize(&self, ids: BTreeSet<RoleId>) -> Vec<Role> {
        ids.into_iter()
            .filter_map(|id| self.roles.get(&id).cloned())
            .collect()
    }
}

/// In-memory role store implementation
pub struct InMemoryRoleStore {
    directory: Arc<RwLock<RoleDirectory>>,
}

impl InMemoryRoleStore {
    /// Create a new in-memory role store
    pub fn new() -> Self {
        Self {
            directory: Arc::new(RwLock::new(RoleDirectory {
                next_id: 1,
                ..Default::default()
            })),
        }
    }
}

impl Default for InMemoryRoleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoleStore for InMemoryRoleStore {
    async fn create_role(&self, name: &str) -> Result<Role> {
        let name = name.trim();
        if name.is_empty() {
            return Err(AuthzError::InvalidRequest("role name cannot be empty".to_string()));
        }

        let mut dir = self.directory.write().await;
        if dir.by_name.contains_key(name) {
            return Err(AuthzError::Conflict(format!("role '{}' already exists", name)));
        }

        let role = Role::new(dir.next_id, name);
        dir.next_id += 1;
        dir.by_name.insert(role.name.clone(), role.id);
        dir.roles.insert(role.id, role.clone());
        Ok(role)
    }

    async fn get_role(&self, id: RoleId) -> Result<Option<Role>> {
        let dir = self.directory.read().await;
        Ok(dir.roles.get(&id).cloned())
    }

    async fn find_role(&self, name: &str) -> Result<Option<Role>> {
        let dir = self.directory.read().await;
        Ok(dir
            .by_name
            .get(name)
            .and_then(|id| dir.roles.get(id))
            .cloned())
    }

    async fn list_roles(&self) -> Result<Vec<Role>> {
        let dir = self.directory.read().await;
        let mut roles: Vec<Role> = dir.roles.values().cloned().collect();
        roles.sort_by_key(|r| r.id);
        Ok(roles)
    }

    async fn set_role_status(&self, id: RoleId, status: Status) -> Result<Role> {
        let mut dir = self.directory.write().await;
        let role = dir
            .roles
            .get_mut(&id)
            .ok_or_else(|| AuthzError::NotFound(format!("role {}", id)))?;
        role.status = status;
        Ok(role.clone())
    }

    async fn upsert_user(&self, user: UserId, status: Status) -> Result<()> {
        let mut dir = self.directory.write().await;
        dir.users.insert(user, status);
        Ok(())
    }

    async fn assign_role(&self, user: UserId, role: RoleId) -> Result<()> {
        let mut dir = self.directory.write().await;
        dir.require_role(role)?;
        if !dir.users.contains_key(&user) {
            return Err(AuthzError::NotFound(format!("user {}", user)));
        }
        dir.assignments.entry(user).or_default().insert(role);
        Ok(())
    }

    async fn unassign_role(&self, user: UserId, role: RoleId) -> Result<bool> {
        let mut dir = self.directory.write().await;
        Ok(dir
            .assignments
            .get_mut(&user)
            .map(|set| set.remove(&role))
            .unwrap_or(false))
    }

    async fn user_roles(&self, user: UserId) -> Result<Vec<Role>> {
        let dir = self.directory.read().await;
        let direct: BTreeSet<RoleId> = dir
            .direct_roles(user)
            .into_iter()
            .filter(|id| dir.is_active(*id))
            .collect();
        Ok(dir.materialize(direct))
    }

    async fn add_edge(&self, edge: RoleEdge) -> Result<()> {
        let mut dir = self.directory.write().await;
        dir.require_role(edge.parent)?;
        dir.require_role(edge.child)?;

        if dir.graph.contains_edge(edge.parent, edge.child) {
            return Err(AuthzError::Conflict(format!(
                "edge {} -> {} already exists",
                dir.name_of(edge.parent),
                dir.name_of(edge.child)
            )));
        }

        // add_edge validates against the current graph before inserting
        let RoleDirectory { graph, roles, .. } = &mut *dir;
        graph.add_edge(edge, |id| role_name(roles, id))?;
        Ok(())
    }

    async fn remove_edge(&self, parent: RoleId, child: RoleId) -> Result<bool> {
        let mut dir = self.directory.write().await;
        Ok(dir.graph.remove_edge(parent, child).is_some())
    }

    async fn edges(&self) -> Result<Vec<RoleEdge>> {
        let dir = self.directory.read().await;
        Ok(dir.graph.edges())
    }

    async fn expand(&self, role: RoleId) -> Result<Vec<Role>> {
        let dir = self.directory.read().await;
        let ids = dir
            .graph
            .expand_all(std::iter::once(role), |id| dir.is_active(id));
        Ok(dir.materialize(ids))
    }

    async fn effective_roles(&self, user: UserId) -> Result<Vec<Role>> {
        let dir = self.directory.read().await;
        let ids = dir
            .graph
            .expand_all(dir.direct_roles(user), |id| dir.is_active(id));
        Ok(dir.materialize(ids))
    }
}
