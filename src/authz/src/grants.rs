//! Grant index and resource/action catalog
//!
//! Two kinds of grants coexist:
//!
//! - **Simple grants** name a role, a resource and an action. Once the role is
//!   held they allow unconditionally.
//! - **Extended grants** reference role/resource/action by ID, carry optional
//!   ABAC conditions and a priority. Higher priority wins.
//!
//! A grant that references an inactive or unknown role, resource or action is
//! inert: it stays in the index (deactivation is the removal signal) but never
//! matches.

use crate::condition::ConditionSet;
use crate::error::{AuthzError, Result};
use crate::types::{Action, ActionId, GrantId, Resource, ResourceId, Role, RoleId, Status};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Unconditional RBAC grant, keyed by names
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimpleGrant {
    pub id: GrantId,

    /// Role name
    pub role: String,

    /// Resource name
    pub resource: String,

    /// Action name
    pub action: String,

    #[serde(default)]
    pub status: Status,
}

/// Conditional, prioritized ABAC grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedGrant {
    pub id: GrantId,
    pub role_id: RoleId,
    pub resource_id: ResourceId,
    pub action_id: ActionId,

    /// Optional AND-ed condition clauses
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<ConditionSet>,

    /// Grant priority (higher = evaluated first)
    #[serde(default)]
    pub priority: i32,

    #[serde(default)]
    pub status: Status,

    pub created_at: DateTime<Utc>,
}

/// Input for creating an extended grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewExtendedGrant {
    pub role_id: RoleId,
    pub resource_id: ResourceId,
    pub action_id: ActionId,
    #[serde(default)]
    pub conditions: Option<ConditionSet>,
    #[serde(default)]
    pub priority: i32,
}

/// Either kind of grant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Grant {
    Simple(SimpleGrant),
    Extended(ExtendedGrant),
}

impl Grant {
    pub fn id(&self) -> GrantId {
        match self {
            Grant::Simple(g) => g.id,
            Grant::Extended(g) => g.id,
        }
    }

    pub fn status(&self) -> Status {
        match self {
            Grant::Simple(g) => g.status,
            Grant::Extended(g) => g.status,
        }
    }

    /// Conditions to evaluate before the grant applies. Simple grants have none.
    pub fn conditions(&self) -> Option<&ConditionSet> {
        match self {
            Grant::Simple(_) => None,
            Grant::Extended(g) => g.conditions.as_ref(),
        }
    }

    pub fn is_simple(&self) -> bool {
        matches!(self, Grant::Simple(_))
    }
}

/// Candidate ordering: simple grants first, then extended grants by priority
/// descending, most recently created first, highest ID first.
fn candidate_order(a: &Grant, b: &Grant) -> Ordering {
    match (a, b) {
        (Grant::Simple(x), Grant::Simple(y)) => x.id.cmp(&y.id),
        (Grant::Simple(_), Grant::Extended(_)) => Ordering::Less,
        (Grant::Extended(_), Grant::Simple(_)) => Ordering::Greater,
        (Grant::Extended(x), Grant::Extended(y)) => y
            .priority
            .cmp(&x.priority)
            .then_with(|| y.created_at.cmp(&x.created_at))
            .then_with(|| y.id.cmp(&x.id)),
    }
}

/// Grant index trait
///
/// Owns the resource and action catalog as well, since grant matching depends
/// on their status.
#[async_trait]
pub trait GrantIndex: Send + Sync {
    /// Register a resource, optionally under a parent resource
    async fn register_resource(&self, name: &str, parent: Option<ResourceId>) -> Result<Resource>;

    /// Register an action
    async fn register_action(&self, name: &str) -> Result<Action>;

    /// Find a resource by name
    async fn find_resource(&self, name: &str) -> Result<Option<Resource>>;

    /// Find an action by name
    async fn find_action(&self, name: &str) -> Result<Option<Action>>;

    /// Change a resource's status
    async fn set_resource_status(&self, id: ResourceId, status: Status) -> Result<Resource>;

    /// Change an action's status
    async fn set_action_status(&self, id: ActionId, status: Status) -> Result<Action>;

    /// Add a simple grant
    async fn add_simple(&self, role: &str, resource: &str, action: &str) -> Result<SimpleGrant>;

    /// Add an extended grant
    async fn add_extended(&self, grant: NewExtendedGrant) -> Result<ExtendedGrant>;

    /// Get a grant by ID
    async fn get(&self, id: GrantId) -> Result<Option<Grant>>;

    /// List all grants, active or not
    async fn list(&self) -> Result<Vec<Grant>>;

    /// Change a grant's status (deactivation is revocation)
    async fn set_grant_status(&self, id: GrantId, status: Status) -> Result<Grant>;

    /// First active simple grant that matches, if any
    async fn find_simple(
        &self,
        roles: &[Role],
        resource: &str,
        action: &str,
        include_ancestors: bool,
    ) -> Result<Option<SimpleGrant>>;

    /// Fast path: does any active simple grant match?
    async fn check_simple(
        &self,
        roles: &[Role],
        resource: &str,
        action: &str,
        include_ancestors: bool,
    ) -> Result<bool> {
        Ok(self
            .find_simple(roles, resource, action, include_ancestors)
            .await?
            .is_some())
    }

    /// Every active grant that matches, in evaluation order
    async fn candidates_for(
        &self,
        roles: &[Role],
        resource: &str,
        action: &str,
        include_ancestors: bool,
    ) -> Result<Vec<Grant>>;
}

#[derive(Debug, Default)]
struct GrantCatalog {
    resources: HashMap<ResourceId, Resource>,
    resources_by_name: HashMap<String, ResourceId>,
    actions: HashMap<ActionId, Action>,
    actions_by_name: HashMap<String, ActionId>,
    simple: HashMap<GrantId, SimpleGrant>,
    extended: HashMap<GrantId, ExtendedGrant>,
    /// (resource name, action name) -> simple grant IDs
    simple_by_target: HashMap<(String, String), Vec<GrantId>>,
    /// (resource ID, action ID) -> extended grant IDs
    extended_by_target: HashMap<(ResourceId, ActionId), Vec<GrantId>>,
    next_resource_id: ResourceId,
    next_action_id: ActionId,
    next_grant_id: GrantId,
}

impl GrantCatalog {
    fn active_resource(&self, name: &str) -> Option<&Resource> {
        self.resources_by_name
            .get(name)
            .and_then(|id| self.resources.get(id))
            .filter(|r| r.is_active())
    }

    fn active_action(&self, name: &str) -> Option<&Action> {
        self.actions_by_name
            .get(name)
            .and_then(|id| self.actions.get(id))
            .filter(|a| a.is_active())
    }

    /// Active resource plus active ancestors. Stops at the first inactive or
    /// repeated ancestor.
    fn chain(&self, start: ResourceId) -> Vec<&Resource> {
        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = Some(start);

        while let Some(id) = current {
            if !visited.insert(id) {
                break;
            }
            match self.resources.get(&id) {
                Some(resource) if resource.is_active() => {
                    chain.push(resource);
                    current = resource.parent_id;
                }
                _ => break,
            }
        }

        chain
    }

    /// Resources whose grants apply to a request for `resource`
    fn targets(&self, resource: &str, include_ancestors: bool) -> Vec<&Resource> {
        match self.active_resource(resource) {
            Some(r) if include_ancestors => self.chain(r.id),
            Some(r) => vec![r],
            None => Vec::new(),
        }
    }

    fn matching_simple(
        &self,
        roles: &[Role],
        resource: &str,
        action: &str,
        include_ancestors: bool,
    ) -> Vec<&SimpleGrant> {
        if self.active_action(action).is_none() {
            return Vec::new();
        }

        let role_names: HashSet<&str> = roles
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.name.as_str())
            .collect();

        self.targets(resource, include_ancestors)
            .into_iter()
            .filter_map(|r| {
                self.simple_by_target
                    .get(&(r.name.clone(), action.to_string()))
            })
            .flatten()
            .filter_map(|id| self.simple.get(id))
            .filter(|g| g.status.is_active() && role_names.contains(g.role.as_str()))
            .collect()
    }

    fn matching_extended(
        &self,
        roles: &[Role],
        resource: &str,
        action: &str,
        include_ancestors: bool,
    ) -> Vec<&ExtendedGrant> {
        let Some(action) = self.active_action(action) else {
            return Vec::new();
        };

        let role_ids: HashSet<RoleId> = roles
            .iter()
            .filter(|r| r.is_active())
            .map(|r| r.id)
            .collect();

        self.targets(resource, include_ancestors)
            .into_iter()
            .filter_map(|r| self.extended_by_target.get(&(r.id, action.id)))
            .flatten()
            .filter_map(|id| self.extended.get(id))
            .filter(|g| g.status.is_active() && role_ids.contains(&g.role_id))
            .collect()
    }

    fn grant(&self, id: GrantId) -> Option<Grant> {
        self.simple
            .get(&id)
            .cloned()
            .map(Grant::Simple)
            .or_else(|| self.extended.get(&id).cloned().map(Grant::Extended))
    }

    fn allocate_grant_id(&mut self) -> GrantId {
        let id = self.next_grant_id;
        self.next_grant_id += 1;
        id
    }
}

fn require_name(kind: &str, name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AuthzError::InvalidRequest(format!("{} name cannot be empty", kind)));
    }
    Ok(name.to_string())
}

/// In-memory grant index implementation
pub struct InMemoryGrantIndex {
    catalog: Arc<RwLock<GrantCatalog>>,
}

impl InMemoryGrantIndex {
    /// Create a new in-memory grant index
    pub fn new() -> Self {
        Self {
            catalog: Arc::new(RwLock::new(GrantCatalog {
                next_resource_id: 1,
                next_action_id: 1,
                next_grant_id: 1,
                ..Default::default()
            })),
        }
    }
}

impl Default for InMemoryGrantIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GrantIndex for InMemoryGrantIndex {
    async fn register_resource(&self, name: &str, parent: Option<ResourceId>) -> Result<Resource> {
        let name = require_name("resource", name)?;
        let mut catalog = self.catalog.write().await;

        if catalog.resources_by_name.contains_key(&name) {
            return Err(AuthzError::Conflict(format!("resource '{}' already exists", name)));
        }
        if let Some(parent) = parent {
            if !catalog.resources.contains_key(&parent) {
                return Err(AuthzError::NotFound(format!("resource {}", parent)));
            }
        }

        let mut resource = Resource::new(catalog.next_resource_id, name);
        resource.parent_id = parent;
        catalog.next_resource_id += 1;
        catalog
            .resources_by_name
            .insert(resource.name.clone(), resource.id);
        catalog.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    async fn register_action(&self, name: &str) -> Result<Action> {
        let name = require_name("action", name)?;
        let mut catalog = self.catalog.write().await;

        if catalog.actions_by_name.contains_key(&name) {
            return Err(AuthzError::Conflict(format!("action '{}' already exists", name)));
        }

        let action = Action::new(catalog.next_action_id, name);
        catalog.next_action_id += 1;
        catalog.actions_by_name.insert(action.name.clone(), action.id);
        catalog.actions.insert(action.id, action.clone());
        Ok(action)
    }

    async fn find_resource(&self, name: &str) -> Result<Option<Resource>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .resources_by_name
            .get(name)
            .and_then(|id| catalog.resources.get(id))
            .cloned())
    }

    async fn find_action(&self, name: &str) -> Result<Option<Action>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .actions_by_name
            .get(name)
            .and_then(|id| catalog.actions.get(id))
            .cloned())
    }

    async fn set_resource_status(&self, id: ResourceId, status: Status) -> Result<Resource> {
        let mut catalog = self.catalog.write().await;
        let resource = catalog
            .resources
            .get_mut(&id)
            .ok_or_else(|| AuthzError::NotFound(format!("resource {}", id)))?;
        resource.status = status;
        Ok(resource.clone())
    }

    async fn set_action_status(&self, id: ActionId, status: Status) -> Result<Action> {
        let mut catalog = self.catalog.write().await;
        let action = catalog
            .actions
            .get_mut(&id)
            .ok_or_else(|| AuthzError::NotFound(format!("action {}", id)))?;
        action.status = status;
        Ok(action.clone())
    }

    async fn add_simple(&self, role: &str, resource: &str, action: &str) -> Result<SimpleGrant> {
        let role = require_name("role", role)?;
        let resource = require_name("resource", resource)?;
        let action = require_name("action", action)?;

        let mut catalog = self.catalog.write().await;
        let target = (resource.clone(), action.clone());

        let duplicate = catalog
            .simple_by_target
            .get(&target)
            .into_iter()
            .flatten()
            .filter_map(|id| catalog.simple.get(id))
            .any(|g| g.role == role && g.status.is_active());
        if duplicate {
            return Err(AuthzError::Conflict(format!(
                "simple grant ({}, {}, {}) already exists",
                role, resource, action
            )));
        }

        let grant = SimpleGrant {
            id: catalog.allocate_grant_id(),
            role,
            resource,
            action,
            status: Status::Active,
        };
        catalog.simple_by_target.entry(target).or_default().push(grant.id);
        catalog.simple.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn add_extended(&self, grant: NewExtendedGrant) -> Result<ExtendedGrant> {
        let mut catalog = self.catalog.write().await;

        if !catalog.resources.contains_key(&grant.resource_id) {
            return Err(AuthzError::NotFound(format!("resource {}", grant.resource_id)));
        }
        if !catalog.actions.contains_key(&grant.action_id) {
            return Err(AuthzError::NotFound(format!("action {}", grant.action_id)));
        }

        let grant = ExtendedGrant {
            id: catalog.allocate_grant_id(),
            role_id: grant.role_id,
            resource_id: grant.resource_id,
            action_id: grant.action_id,
            conditions: grant.conditions.filter(|c| !c.is_empty()),
            priority: grant.priority,
            status: Status::Active,
            created_at: Utc::now(),
        };
        catalog
            .extended_by_target
            .entry((grant.resource_id, grant.action_id))
            .or_default()
            .push(grant.id);
        catalog.extended.insert(grant.id, grant.clone());
        Ok(grant)
    }

    async fn get(&self, id: GrantId) -> Result<Option<Grant>> {
        let catalog = self.catalog.read().await;
        Ok(catalog.grant(id))
    }

    async fn list(&self) -> Result<Vec<Grant>> {
        let catalog = self.catalog.read().await;
        let mut grants: Vec<Grant> = catalog
            .simple
            .values()
            .cloned()
            .map(Grant::Simple)
            .chain(catalog.extended.values().cloned().map(Grant::Extended))
            .collect();
        grants.sort_by_key(Grant::id);
        Ok(grants)
    }

    async fn set_grant_status(&self, id: GrantId, status: Status) -> Result<Grant> {
        let mut catalog = self.catalog.write().await;

        if let Some(grant) = catalog.simple.get_mut(&id) {
            grant.status = status;
            return Ok(Grant::Simple(grant.clone()));
        }
        if let Some(grant) = catalog.extended.get_mut(&id) {
            grant.status = status;
            return Ok(Grant::Extended(grant.clone()));
        }

        Err(AuthzError::NotFound(format!("grant {}", id)))
    }

    async fn find_simple(
        &self,
        roles: &[Role],
        resource: &str,
        action: &str,
        include_ancestors: bool,
    ) -> Result<Option<SimpleGrant>> {
        let catalog = self.catalog.read().await;
        Ok(catalog
            .matching_simple(roles, resource, action, include_ancestors)
            .into_iter()
            .min_by_key(|g| g.id)
            .cloned())
    }

    async fn candidates_for(
        &self,
        roles: &[Role],
        resource: &str,
        action: &str,
        include_ancestors: bool,
    ) -> Result<Vec<Grant>> {
        let catalog = self.catalog.read().await;

        let mut candidates: Vec<Grant> = catalog
            .matching_simple(roles, resource, action, include_ancestors)
            .into_iter()
            .cloned()
            .map(Grant::Simple)
            .chain(
                catalog
                    .matching_extended(roles, resource, action, include_ancestors)
                    .into_iter()
                    .cloned()
                    .map(Grant::Extended),
            )
            .collect();

        candidates.sort_by(candidate_order);
        Ok(candidates)
    }
}
