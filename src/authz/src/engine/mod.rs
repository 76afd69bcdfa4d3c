//! Permission resolver
//!
//! Orchestrates role expansion, grant lookup, condition evaluation and
//! priority selection into one decision, then hands an audit entry to the
//! recorder.

pub mod audit;
pub mod decision;
pub mod metrics;

pub use audit::{
    AuditConfig, AuditLogEntry, AuditRecorder, AuditSink, AuditStats, InMemoryAuditSink,
    Operation, OverflowPolicy,
};
pub use decision::{
    context_fingerprint, Decision, DecisionReason, DecisionRequest, RequestContext, Stage,
};
pub use metrics::{EngineMetrics, MetricsCollector, DEFAULT_LATENCY_WINDOW};

use crate::attributes::{
    Attribute, AttributeMap, AttributeOwner, AttributeStore, AttributeType, InMemoryAttributeStore,
};
use crate::condition::{self, ConditionSet, EvalContext};
use crate::error::{AuthzError, ResolutionError, Result};
use crate::grants::{
    ExtendedGrant, Grant, GrantIndex, InMemoryGrantIndex, NewExtendedGrant, SimpleGrant,
};
use crate::hierarchy::{InMemoryRoleStore, RoleStore};
use crate::types::{
    Action, ActionId, GrantId, Resource, ResourceId, Role, RoleEdge, Status, UserId,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Resolver configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Deadline for one resolution. `None` disables the timeout.
    pub decision_timeout: Option<Duration>,

    /// Apply grants on ancestor resources to their descendants
    pub inherit_resource_grants: bool,

    /// Enable metrics collection
    pub enable_metrics: bool,

    /// Latency samples kept for percentiles
    pub latency_window: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            decision_timeout: Some(Duration::from_secs(1)),
            inherit_resource_grants: false,
            enable_metrics: true,
            latency_window: DEFAULT_LATENCY_WINDOW,
        }
    }
}

/// Extended grant addressed by names, as administrators write it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtendedGrantSpec {
    pub role: String,
    pub resource: String,
    pub action: String,
    #[serde(default)]
    pub conditions: Option<ConditionSet>,
    #[serde(default)]
    pub priority: i32,
}

/// Catalog IDs of the requested resource and action, when known
#[derive(Debug, Clone, Copy, Default)]
struct Target {
    resource_id: Option<ResourceId>,
    action_id: Option<ActionId>,
}

struct Resolved {
    decision: Decision,
    target: Target,
}

/// Wrap a store error in a resolution error labelled with the active stage
fn failed_at(stage: Stage) -> impl FnOnce(AuthzError) -> AuthzError {
    move |err| match err {
        AuthzError::Resolution(_) => err,
        other => ResolutionError::Storage {
            stage,
            message: other.to_string(),
        }
        .into(),
    }
}

/// Access-control decision engine
///
/// # Architecture
///
/// ```text
/// Request → RoleStore → GrantIndex → Conditions → Decision
///              ↓            ↓            ↓           ↓
///       (effective roles) (candidates) (attributes) [AuditRecorder] → AuditSink
///                                                    [Metrics]
/// ```
///
/// The stores are injected, so each test can run against isolated instances.
pub struct PermissionResolver {
    roles: Arc<dyn RoleStore>,
    grants: Arc<dyn GrantIndex>,
    attributes: Arc<dyn AttributeStore>,
    audit: Arc<AuditRecorder>,
    metrics: Option<Arc<MetricsCollector>>,
    config: EngineConfig,
}

impl PermissionResolver {
    /// Create a resolver over the given stores and audit recorder
    pub fn new(
        config: EngineConfig,
        roles: Arc<dyn RoleStore>,
        grants: Arc<dyn GrantIndex>,
        attributes: Arc<dyn AttributeStore>,
        audit: Arc<AuditRecorder>,
    ) -> Self {
        let metrics = config
            .enable_metrics
            .then(|| Arc::new(MetricsCollector::with_window(config.latency_window)));

        info!(
            timeout_ms = config.decision_timeout.map(|d| d.as_millis() as u64),
            inherit_resource_grants = config.inherit_resource_grants,
            metrics = config.enable_metrics,
            "PermissionResolver initialized"
        );

        Self {
            roles,
            grants,
            attributes,
            audit,
            metrics,
            config,
        }
    }

    /// Create a resolver with fresh in-memory stores. Must be called within a
    /// Tokio runtime (the audit consumer is spawned here).
    pub fn in_memory(config: EngineConfig, audit_config: AuditConfig) -> Self {
        Self::new(
            config,
            Arc::new(InMemoryRoleStore::new()),
            Arc::new(InMemoryGrantIndex::new()),
            Arc::new(InMemoryAttributeStore::new()),
            Arc::new(AuditRecorder::in_memory(audit_config)),
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Decide whether a user may perform an action on a resource.
    ///
    /// # Pipeline
    ///
    /// 1. Validate the request (malformed requests are rejected, not audited)
    /// 2. Expand the user's effective roles
    /// 3. Short-circuit on a simple grant, else gather extended candidates
    /// 4. Evaluate candidate conditions in priority order, first match wins
    /// 5. Record an audit entry without waiting for it to be written
    ///
    /// Storage failures and timeouts in steps 2-4 return
    /// [`AuthzError::Resolution`]; callers must treat them as denial.
    pub async fn decide(&self, request: &DecisionRequest) -> Result<Decision> {
        let start = Instant::now();

        debug!(
            target: "warden::decision",
            user_id = request.user_id,
            resource = %request.resource,
            action = %request.action,
            "Decision request"
        );

        // Step 1: Validate
        if let Err(e) = Self::validate(request) {
            if let Some(metrics) = &self.metrics {
                metrics.record_invalid_request();
            }
            return Err(e);
        }

        let environment = request.context.environment(Utc::now());

        // Steps 2-4 under the caller's deadline
        let resolution = self.resolve(request, &environment);
        let outcome = match self.config.decision_timeout {
            Some(limit) => tokio::time::timeout(limit, resolution)
                .await
                .unwrap_or_else(|_| Err(ResolutionError::Timeout { after: limit }.into())),
            None => resolution.await,
        };

        let snapshot = serde_json::to_value(&environment).unwrap_or(serde_json::Value::Null);
        let fingerprint = context_fingerprint(request, &environment);

        if let Some(metrics) = &self.metrics {
            metrics.record_latency(start.elapsed());
        }

        // Step 5: Audit
        match outcome {
            Ok(Resolved { decision, target }) => {
                if let Some(metrics) = &self.metrics {
                    metrics.record_decision(decision.allowed, &decision.reason.code());
                }

                info!(
                    target: "warden::decision",
                    user_id = request.user_id,
                    resource = %request.resource,
                    action = %request.action,
                    reason = %decision.reason,
                    "Decision: {}",
                    if decision.allowed { "ALLOW" } else { "DENY" }
                );

                let operation = if decision.allowed {
                    Operation::Check
                } else {
                    Operation::Deny
                };
                self.audit.record(
                    AuditLogEntry::new(
                        request.user_id,
                        &request.resource,
                        &request.action,
                        operation,
                        decision.allowed,
                        decision.reason.code(),
                    )
                    .with_target(target.resource_id, target.action_id)
                    .with_permission(decision.matched_grant)
                    .with_context(snapshot, fingerprint),
                );

                Ok(decision)
            }
            Err(err) => {
                let code = match &err {
                    AuthzError::Resolution(e) => e.code(),
                    _ => "resolution-error",
                };

                warn!(
                    target: "warden::health",
                    user_id = request.user_id,
                    resource = %request.resource,
                    action = %request.action,
                    code,
                    "Resolution failed, denying: {}", err
                );

                if let Some(metrics) = &self.metrics {
                    metrics.record_resolution_error(code);
                }

                self.audit.record(
                    AuditLogEntry::new(
                        request.user_id,
                        &request.resource,
                        &request.action,
                        Operation::Deny,
                        false,
                        code,
                    )
                    .with_context(snapshot, fingerprint),
                );

                Err(err)
            }
        }
    }

    /// Effective role names of a user, for diagnostics
    pub async fn expand_roles(&self, user: UserId) -> Result<BTreeSet<String>> {
        let roles = self.roles.effective_roles(user).await?;
        Ok(roles.into_iter().map(|r| r.name).collect())
    }

    /// Audit entries for a user, most recent first.
    ///
    /// Waits for entries recorded before the call to reach the sink.
    pub async fn query_audit_trail(&self, user: UserId, limit: usize) -> Result<Vec<AuditLogEntry>> {
        self.audit.flush().await;
        self.audit.query(user, limit).await
    }

    /// Get engine metrics
    pub fn get_metrics(&self) -> Option<EngineMetrics> {
        self.metrics.as_ref().map(|m| m.get_metrics())
    }

    /// Metrics in Prometheus text format, if collection is enabled
    pub fn export_metrics(&self) -> Option<String> {
        self.metrics.as_ref().map(|m| m.export_prometheus())
    }

    /// Get audit recorder counters
    pub fn audit_stats(&self) -> AuditStats {
        self.audit.stats()
    }

    /// The audit recorder decisions are written to
    pub fn audit(&self) -> &AuditRecorder {
        &self.audit
    }

    /// Drain pending audit entries and stop the audit consumer
    pub async fn shutdown(&self) {
        self.audit.flush().await;
        self.audit.shutdown().await;
        info!("PermissionResolver shut down");
    }

    // Administration. Every write validates before it commits.

    /// Create a role
    pub async fn create_role(&self, name: &str) -> Result<Role> {
        let role = self.roles.create_role(name).await?;
        info!(role = %role.name, id = role.id, "Role created");
        Ok(role)
    }

    /// Deactivate a role. Its grants and edges stay but no longer apply.
    pub async fn deactivate_role(&self, name: &str) -> Result<Role> {
        let role = self.require_role(name).await?;
        let role = self.roles.set_role_status(role.id, Status::Inactive).await?;
        info!(role = %role.name, "Role deactivated");
        Ok(role)
    }

    /// Register a user or change its status
    pub async fn register_user(&self, user: UserId, status: Status) -> Result<()> {
        self.roles.upsert_user(user, status).await
    }

    /// Assign a role to a user
    pub async fn assign_role(&self, user: UserId, role: &str) -> Result<()> {
        let role = self.require_role(role).await?;
        self.roles.assign_role(user, role.id).await?;
        info!(user_id = user, role = %role.name, "Role assigned");
        Ok(())
    }

    /// Remove a direct role assignment
    pub async fn unassign_role(&self, user: UserId, role: &str) -> Result<bool> {
        let role = self.require_role(role).await?;
        let removed = self.roles.unassign_role(user, role.id).await?;
        if removed {
            info!(user_id = user, role = %role.name, "Role unassigned");
        }
        Ok(removed)
    }

    /// Add a hierarchy edge; `child` inherits `parent`'s grants when
    /// `inherits_permissions` is set. Rejected with [`AuthzError::Cycle`] if
    /// the edge would close a cycle, leaving the hierarchy unchanged.
    pub async fn add_role_edge(
        &self,
        parent: &str,
        child: &str,
        inherits_permissions: bool,
    ) -> Result<RoleEdge> {
        let (parent_role, child_role) =
            futures::try_join!(self.require_role(parent), self.require_role(child))?;

        let edge = RoleEdge {
            parent: parent_role.id,
            child: child_role.id,
            inherits_permissions,
        };

        if let Err(e) = self.roles.add_edge(edge).await {
            warn!(parent, child, "Role edge rejected: {}", e);
            return Err(e);
        }

        info!(parent, child, inherits_permissions, "Role edge added");
        Ok(edge)
    }

    /// Remove a hierarchy edge
    pub async fn remove_role_edge(&self, parent: &str, child: &str) -> Result<bool> {
        let (parent_role, child_role) =
            futures::try_join!(self.require_role(parent), self.require_role(child))?;
        let removed = self.roles.remove_edge(parent_role.id, child_role.id).await?;
        if removed {
            info!(parent, child, "Role edge removed");
        }
        Ok(removed)
    }

    /// Register a resource, optionally under a named parent
    pub async fn register_resource(&self, name: &str, parent: Option<&str>) -> Result<Resource> {
        let parent_id = match parent {
            Some(parent) => Some(self.require_resource(parent).await?.id),
            None => None,
        };
        self.grants.register_resource(name, parent_id).await
    }

    /// Register an action
    pub async fn register_action(&self, name: &str) -> Result<Action> {
        self.grants.register_action(name).await
    }

    /// Deactivate a resource. Grants on it, and inherited through it, stop matching.
    pub async fn deactivate_resource(&self, name: &str) -> Result<Resource> {
        let resource = self.require_resource(name).await?;
        let resource = self
            .grants
            .set_resource_status(resource.id, Status::Inactive)
            .await?;
        info!(resource = %resource.name, "Resource deactivated");
        Ok(resource)
    }

    /// Deactivate an action. Grants for it stop matching.
    pub async fn deactivate_action(&self, name: &str) -> Result<Action> {
        let action = self.require_action(name).await?;
        let action = self.grants.set_action_status(action.id, Status::Inactive).await?;
        info!(action = %action.name, "Action deactivated");
        Ok(action)
    }

    /// Every role, active or not, ordered by id
    pub async fn list_roles(&self) -> Result<Vec<Role>> {
        self.roles.list_roles().await
    }

    /// Every grant, including revoked ones, ordered by id
    pub async fn list_grants(&self) -> Result<Vec<Grant>> {
        self.grants.list().await
    }

    /// Add a simple grant and audit it
    pub async fn add_simple_grant(
        &self,
        actor: UserId,
        role: &str,
        resource: &str,
        action: &str,
    ) -> Result<SimpleGrant> {
        self.require_role(role).await?;
        let grant = self.grants.add_simple(role, resource, action).await?;

        info!(grant_id = grant.id, role, resource, action, "Simple grant added");
        self.audit.record(
            AuditLogEntry::new(actor, resource, action, Operation::Grant, true, "grant-created")
                .with_permission(Some(grant.id)),
        );

        Ok(grant)
    }

    /// Add an extended grant and audit it
    pub async fn add_extended_grant(
        &self,
        actor: UserId,
        spec: ExtendedGrantSpec,
    ) -> Result<ExtendedGrant> {
        let (role, resource, action) = futures::try_join!(
            self.require_role(&spec.role),
            self.require_resource(&spec.resource),
            self.require_action(&spec.action)
        )?;

        let grant = self
            .grants
            .add_extended(NewExtendedGrant {
                role_id: role.id,
                resource_id: resource.id,
                action_id: action.id,
                conditions: spec.conditions,
                priority: spec.priority,
            })
            .await?;

        info!(
            grant_id = grant.id,
            role = %spec.role,
            resource = %spec.resource,
            action = %spec.action,
            priority = grant.priority,
            "Extended grant added"
        );
        self.audit.record(
            AuditLogEntry::new(
                actor,
                &spec.resource,
                &spec.action,
                Operation::Grant,
                true,
                "grant-created",
            )
            .with_target(Some(resource.id), Some(action.id))
            .with_permission(Some(grant.id)),
        );

        Ok(grant)
    }

    /// Revoke a grant by deactivating it, and audit the revocation
    pub async fn revoke_grant(&self, actor: UserId, id: GrantId) -> Result<Grant> {
        let grant = self.grants.set_grant_status(id, Status::Inactive).await?;

        let entry = match &grant {
            Grant::Simple(g) => AuditLogEntry::new(
                actor,
                &g.resource,
                &g.action,
                Operation::Revoke,
                true,
                "grant-revoked",
            ),
            Grant::Extended(g) => {
                AuditLogEntry::new(actor, "", "", Operation::Revoke, true, "grant-revoked")
                    .with_target(Some(g.resource_id), Some(g.action_id))
            }
        };
        self.audit.record(entry.with_permission(Some(id)));

        info!(grant_id = id, "Grant revoked");
        Ok(grant)
    }

    /// Set a user attribute from its raw value and type tag
    pub async fn set_user_attribute(
        &self,
        user: UserId,
        key: &str,
        raw: &str,
        value_type: AttributeType,
    ) -> Result<()> {
        Self::require_key(key)?;
        self.attributes
            .put(Attribute::new(AttributeOwner::User(user), key, raw, value_type))
            .await
    }

    /// Set a resource attribute from its raw value and type tag
    pub async fn set_resource_attribute(
        &self,
        resource: &str,
        key: &str,
        raw: &str,
        value_type: AttributeType,
    ) -> Result<()> {
        Self::require_key(key)?;
        let resource = self.require_resource(resource).await?;
        self.attributes
            .put(Attribute::new(
                AttributeOwner::Resource(resource.id),
                key,
                raw,
                value_type,
            ))
            .await
    }

    // Private helper methods

    fn validate(request: &DecisionRequest) -> Result<()> {
        if request.user_id == 0 {
            return Err(AuthzError::InvalidRequest("user id is required".to_string()));
        }
        if request.resource.trim().is_empty() {
            return Err(AuthzError::InvalidRequest("resource is required".to_string()));
        }
        if request.action.trim().is_empty() {
            return Err(AuthzError::InvalidRequest("action is required".to_string()));
        }
        Ok(())
    }

    fn require_key(key: &str) -> Result<()> {
        if key.trim().is_empty() {
            return Err(AuthzError::InvalidRequest("attribute key cannot be empty".to_string()));
        }
        Ok(())
    }

    async fn require_role(&self, name: &str) -> Result<Role> {
        self.roles
            .find_role(name)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("role '{}'", name)))
    }

    async fn require_resource(&self, name: &str) -> Result<Resource> {
        self.grants
            .find_resource(name)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("resource '{}'", name)))
    }

    async fn require_action(&self, name: &str) -> Result<Action> {
        self.grants
            .find_action(name)
            .await?
            .ok_or_else(|| AuthzError::NotFound(format!("action '{}'", name)))
    }

    async fn resolve(&self, request: &DecisionRequest, environment: &AttributeMap) -> Result<Resolved> {
        // Step 2: Expand roles
        let roles = self
            .roles
            .effective_roles(request.user_id)
            .await
            .map_err(failed_at(Stage::RolesExpanded))?;

        let mut role_names: Vec<String> = roles.iter().map(|r| r.name.clone()).collect();
        role_names.sort();
        debug!(user_id = request.user_id, roles = ?role_names, "Effective roles");

        if roles.is_empty() {
            return Ok(Resolved {
                decision: Decision::deny(DecisionReason::UserHasNoRoles, role_names),
                target: Target::default(),
            });
        }

        // Step 3: Gather candidates, simple grants first
        let include_ancestors = self.config.inherit_resource_grants;
        let (resource, action) = futures::try_join!(
            self.grants.find_resource(&request.resource),
            self.grants.find_action(&request.action)
        )
        .map_err(failed_at(Stage::CandidatesGathered))?;

        let target = Target {
            resource_id: resource.as_ref().map(|r| r.id),
            action_id: action.as_ref().map(|a| a.id),
        };

        if let Some(grant) = self
            .grants
            .find_simple(&roles, &request.resource, &request.action, include_ancestors)
            .await
            .map_err(failed_at(Stage::CandidatesGathered))?
        {
            debug!(grant_id = grant.id, role = %grant.role, "Simple grant matched");
            return Ok(Resolved {
                decision: Decision::allow(DecisionReason::SimpleGrantMatch, grant.id, role_names),
                target,
            });
        }

        let candidates = self
            .grants
            .candidates_for(&roles, &request.resource, &request.action, include_ancestors)
            .await
            .map_err(failed_at(Stage::CandidatesGathered))?;

        debug!(count = candidates.len(), "Candidate grants");

        if candidates.is_empty() {
            return Ok(Resolved {
                decision: Decision::deny(DecisionReason::NoMatchingGrant, role_names),
                target,
            });
        }

        // Step 4: Filter by conditions in priority order
        let needs_attributes = candidates
            .iter()
            .any(|g| g.conditions().is_some_and(|c| !c.is_empty()));

        let ctx = if needs_attributes {
            self.load_context(request, resource.as_ref(), environment)
                .await
                .map_err(failed_at(Stage::ConditionsFiltered))?
        } else {
            EvalContext::new().with_environment(environment.clone())
        };

        for grant in &candidates {
            if !condition::evaluate(grant.conditions(), &ctx) {
                debug!(grant_id = grant.id(), "Grant conditions not met");
                continue;
            }

            let reason = match grant {
                Grant::Simple(_) => DecisionReason::SimpleGrantMatch,
                Grant::Extended(g) => DecisionReason::ExtendedGrantPriority(g.priority),
            };
            debug!(grant_id = grant.id(), %reason, "Grant matched");

            return Ok(Resolved {
                decision: Decision::allow(reason, grant.id(), role_names),
                target,
            });
        }

        debug!("No candidate passed its conditions");
        Ok(Resolved {
            decision: Decision::deny(DecisionReason::NoMatchingGrant, role_names),
            target,
        })
    }

    /// Load user and resource attributes concurrently. Request-supplied
    /// resource-instance attributes override stored ones.
    async fn load_context(
        &self,
        request: &DecisionRequest,
        resource: Option<&Resource>,
        environment: &AttributeMap,
    ) -> Result<EvalContext> {
        let user_attributes = self
            .attributes
            .get_all(AttributeOwner::User(request.user_id));
        let resource_attributes = async {
            match resource {
                Some(r) => self.attributes.get_all(AttributeOwner::Resource(r.id)).await,
                None => Ok(AttributeMap::new()),
            }
        };

        let (user, mut resource_attrs) = futures::try_join!(user_attributes, resource_attributes)?;
        resource_attrs.extend(
            request
                .context
                .resource_attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Ok(EvalContext::new()
            .with_user(user)
            .with_resource(resource_attrs)
            .with_environment(environment.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn resolver() -> PermissionResolver {
        PermissionResolver::in_memory(EngineConfig::default(), AuditConfig::default())
    }

    #[tokio::test]
    async fn test_resolver_creation() {
        let resolver = resolver().await;
        assert!(resolver.metrics.is_some());
        assert_eq!(resolver.config().decision_timeout, Some(Duration::from_secs(1)));
    }

    #[tokio::test]
    async fn test_validation_rejects_malformed_requests() {
        let resolver = resolver().await;

        for request in [
            DecisionRequest::new(0, "doc", "read"),
            DecisionRequest::new(1, "", "read"),
            DecisionRequest::new(1, "doc", "  "),
        ] {
            let err = resolver.decide(&request).await.unwrap_err();
            assert!(matches!(err, AuthzError::InvalidRequest(_)));
        }

        let metrics = resolver.get_metrics().unwrap();
        assert_eq!(metrics.invalid_requests, 3);
        assert_eq!(metrics.total_decisions, 0);
    }

    #[tokio::test]
    async fn test_export_metrics_follows_enable_flag() {
        let resolver = resolver().await;
        resolver.decide(&DecisionRequest::new(1, "doc", "read")).await.unwrap();

        let exported = resolver.export_metrics().unwrap();
        assert!(exported.contains("warden_decisions_total 1"));
        assert!(exported.contains("warden_denied_total 1"));
        assert!(exported.contains("reason=\"user-has-no-roles\""));

        let silent = PermissionResolver::in_memory(
            EngineConfig {
                enable_metrics: false,
                ..EngineConfig::default()
            },
            AuditConfig::default(),
        );
        assert!(silent.export_metrics().is_none());
        assert!(silent.get_metrics().is_none());
    }

    #[tokio::test]
    async fn test_failed_at_keeps_resolution_errors() {
        let timeout: AuthzError = ResolutionError::Timeout {
            after: Duration::from_millis(1),
        }
        .into();
        assert!(matches!(
            failed_at(Stage::RolesExpanded)(timeout),
            AuthzError::Resolution(ResolutionError::Timeout { .. })
        ));

        let wrapped = failed_at(Stage::CandidatesGathered)(AuthzError::Storage("down".into()));
        match wrapped {
            AuthzError::Resolution(ResolutionError::Storage { stage, message }) => {
                assert_eq!(stage, Stage::CandidatesGathered);
                assert!(message.contains("down"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_admin_requires_known_names() {
        let resolver = resolver().await;

        assert!(matches!(
            resolver.assign_role(1, "ghost").await,
            Err(AuthzError::NotFound(_))
        ));
        assert!(matches!(
            resolver.add_simple_grant(1, "ghost", "doc", "read").await,
            Err(AuthzError::NotFound(_))
        ));
        assert!(matches!(
            resolver.set_resource_attribute("nowhere", "k", "v", AttributeType::String).await,
            Err(AuthzError::NotFound(_))
        ));
        assert!(matches!(
            resolver.set_user_attribute(1, " ", "v", AttributeType::String).await,
            Err(AuthzError::InvalidRequest(_))
        ));
    }
}
