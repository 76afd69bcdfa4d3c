//! Seed documents: bulk-load roles, users, resources and grants
//!
//! Seeds go through the resolver's administrative API, so they get the same
//! validation as any other write (unique names, cycle-checked edges).
//!
//! ```toml
//! roles = ["viewer", "editor"]
//! actions = ["read"]
//!
//! [[edges]]
//! parent = "viewer"
//! child = "editor"
//!
//! [[resources]]
//! name = "doc"
//!
//! [[users]]
//! id = 1
//! roles = ["editor"]
//!
//! [[simple_grants]]
//! role = "viewer"
//! resource = "doc"
//! action = "read"
//! ```

use crate::attributes::AttributeType;
use crate::engine::{ExtendedGrantSpec, PermissionResolver};
use crate::error::{AuthzError, Result};
use crate::types::{Status, UserId};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SeedDocument {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub edges: Vec<SeedEdge>,
    #[serde(default)]
    pub actions: Vec<String>,
    /// Parents must be listed before their children
    #[serde(default)]
    pub resources: Vec<SeedResource>,
    #[serde(default)]
    pub users: Vec<SeedUser>,
    #[serde(default)]
    pub simple_grants: Vec<SeedSimpleGrant>,
    #[serde(default)]
    pub extended_grants: Vec<ExtendedGrantSpec>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeedEdge {
    pub parent: String,
    pub child: String,
    #[serde(default = "default_true")]
    pub inherits_permissions: bool,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeedResource {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub attributes: Vec<SeedAttribute>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeedUser {
    pub id: UserId,
    #[serde(default)]
    pub status: Status,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub attributes: Vec<SeedAttribute>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeedAttribute {
    pub key: String,
    /// Raw value, coerced on read according to `type`
    pub value: String,
    #[serde(rename = "type", default)]
    pub value_type: AttributeType,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SeedSimpleGrant {
    pub role: String,
    pub resource: String,
    pub action: String,
}

/// Counts of records created by [`SeedDocument::apply`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeedSummary {
    pub roles: usize,
    pub edges: usize,
    pub actions: usize,
    pub resources: usize,
    pub users: usize,
    pub grants: usize,
    pub attributes: usize,
}

fn default_true() -> bool { true }

impl SeedDocument {
    /// Load a seed from a `.json` or TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

        if is_json {
            Self::from_json_str(&contents)
        } else {
            Self::from_toml_str(&contents)
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents)
            .map_err(|e| AuthzError::Config(format!("failed to parse seed document: {}", e)))
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        serde_json::from_str(contents)
            .map_err(|e| AuthzError::Config(format!("failed to parse seed document: {}", e)))
    }

    /// Apply the seed in dependency order. Stops at the first failing record;
    /// records applied before it stay applied.
    pub async fn apply(&self, resolver: &PermissionResolver, actor: UserId) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for role in &self.roles {
            resolver.create_role(role).await?;
            summary.roles += 1;
        }

        for edge in &self.edges {
            resolver
                .add_role_edge(&edge.parent, &edge.child, edge.inherits_permissions)
                .await?;
            summary.edges += 1;
        }

        for action in &self.actions {
            resolver.register_action(action).await?;
            summary.actions += 1;
        }

        for resource in &self.resources {
            resolver
                .register_resource(&resource.name, resource.parent.as_deref())
                .await?;
            summary.resources += 1;

            for attr in &resource.attributes {
                resolver
                    .set_resource_attribute(&resource.name, &attr.key, &attr.value, attr.value_type)
                    .await?;
                summary.attributes += 1;
            }
        }

        for user in &self.users {
            resolver.register_user(user.id, user.status).await?;
            summary.users += 1;

            for role in &user.roles {
                resolver.assign_role(user.id, role).await?;
            }

            for attr in &user.attributes {
                resolver
                    .set_user_attribute(user.id, &attr.key, &attr.value, attr.value_type)
                    .await?;
                summary.attributes += 1;
            }
        }

        for grant in &self.simple_grants {
            resolver
                .add_simple_grant(actor, &grant.role, &grant.resource, &grant.action)
                .await?;
            summary.grants += 1;
        }

        for grant in &self.extended_grants {
            resolver.add_extended_grant(actor, grant.clone()).await?;
            summary.grants += 1;
        }

        info!(?summary, "Seed applied");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::{Comparator, Operand, Scope};

    const SEED: &str = r#"
roles = ["viewer", "editor", "manager"]
actions = ["read", "view"]

[[edges]]
parent = "viewer"
child = "editor"

[[resources]]
name = "doc"

[[resources]]
name = "salary"
attributes = [{ key = "department", value = "HR" }]

[[users]]
id = 1
roles = ["editor"]

[[users]]
id = 2
roles = ["manager"]
attributes = [
    { key = "department", value = "IT" },
    { key = "level", value = "4", type = "number" },
]

[[simple_grants]]
role = "viewer"
resource = "doc"
action = "read"

[[extended_grants]]
role = "manager"
resource = "salary"
action = "view"
priority = 1
conditions = [
    { scope = "user", key = "department", comparator = "eq", value = { scope = "resource", key = "department" } },
]
"#;

    #[test]
    fn test_parse_toml_seed() {
        let seed = SeedDocument::from_toml_str(SEED).unwrap();

        assert_eq!(seed.roles.len(), 3);
        assert!(seed.edges[0].inherits_permissions);
        assert_eq!(seed.users[1].attributes[1].value_type, AttributeType::Number);

        let conditions = seed.extended_grants[0].conditions.as_ref().unwrap();
        let clause = &conditions.clauses()[0];
        assert_eq!(clause.scope, Scope::User);
        assert_eq!(clause.comparator, Comparator::Eq);
        assert_eq!(clause.value, Operand::attribute(Scope::Resource, "department"));
    }

    #[test]
    fn test_parse_error_is_config_error() {
        let err = SeedDocument::from_toml_str("roles = 3").unwrap_err();
        assert!(matches!(err, AuthzError::Config(_)));
    }

    #[tokio::test]
    async fn test_apply_seed() {
        let resolver = PermissionResolver::in_memory(Default::default(), Default::default());
        let seed = SeedDocument::from_toml_str(SEED).unwrap();

        let summary = seed.apply(&resolver, 99).await.unwrap();
        assert_eq!(summary.roles, 3);
        assert_eq!(summary.edges, 1);
        assert_eq!(summary.users, 2);
        assert_eq!(summary.grants, 2);
        assert_eq!(summary.attributes, 3);

        let roles = resolver.expand_roles(1).await.unwrap();
        assert!(roles.contains("viewer"));
        assert!(roles.contains("editor"));
    }

    #[tokio::test]
    async fn test_cyclic_seed_is_rejected() {
        let resolver = PermissionResolver::in_memory(Default::default(), Default::default());
        let seed = SeedDocument::from_json_str(
            r#"{
                "roles": ["a", "b"],
                "edges": [{"parent": "a", "child": "b"}, {"parent": "b", "child": "a"}]
            }"#,
        )
        .unwrap();

        let err = seed.apply(&resolver, 1).await.unwrap_err();
        assert!(matches!(err, AuthzError::Cycle(_)));
    }
}
