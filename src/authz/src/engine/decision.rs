//! Decision request, request context and decision types

use crate::attributes::{AttributeMap, AttributeValue};
use crate::types::{GrantId, UserId};
use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A single access check: may `user_id` perform `action` on `resource`?
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRequest {
    /// Authenticated user, supplied by the identity collaborator
    pub user_id: UserId,

    /// Resource name (e.g. "user", "doc")
    pub resource: String,

    /// Action name (e.g. "update", "read")
    pub action: String,

    /// Ambient request information
    #[serde(default)]
    pub context: RequestContext,
}

impl DecisionRequest {
    pub fn new(user_id: UserId, resource: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            user_id,
            resource: resource.into(),
            action: action.into(),
            context: RequestContext::default(),
        }
    }

    pub fn with_context(mut self, context: RequestContext) -> Self {
        self.context = context;
        self
    }
}

/// Ambient request information supplied by the request-context collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Client network address
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,

    /// Request time. Defaults to the decision time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_time: Option<DateTime<Utc>>,

    /// Free-form request metadata, exposed to conditions as environment keys
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,

    /// Attributes of the specific resource instance, layered over stored
    /// resource attributes
    #[serde(default)]
    pub resource_attributes: AttributeMap,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client_ip(mut self, ip: impl Into<String>) -> Self {
        self.client_ip = Some(ip.into());
        self
    }

    pub fn with_request_time(mut self, at: DateTime<Utc>) -> Self {
        self.request_time = Some(at);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn with_resource_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.resource_attributes.insert(key.into(), value.into());
        self
    }

    /// Environment attributes visible to conditions.
    ///
    /// Metadata keys come first so the derived keys (`client_ip`,
    /// `request_time`, `hour_of_day`, `day_of_week`) cannot be spoofed by them.
    pub fn environment(&self, now: DateTime<Utc>) -> AttributeMap {
        let mut env: AttributeMap = self
            .metadata
            .iter()
            .map(|(k, v)| (k.clone(), AttributeValue::String(v.clone())))
            .collect();

        let at = self.request_time.unwrap_or(now);
        if let Some(ip) = &self.client_ip {
            env.insert("client_ip".to_string(), AttributeValue::String(ip.clone()));
        }
        env.insert("request_time".to_string(), AttributeValue::Date(at));
        env.insert("hour_of_day".to_string(), AttributeValue::Number(at.hour() as f64));
        env.insert(
            "day_of_week".to_string(),
            AttributeValue::String(at.weekday().to_string().to_lowercase()),
        );

        env
    }
}

/// BLAKE3 fingerprint of a request and its environment.
///
/// Fields are fed in a fixed order and maps are sorted, so equal requests
/// always hash equally.
pub fn context_fingerprint(request: &DecisionRequest, environment: &AttributeMap) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(&request.user_id.to_le_bytes());
    for part in [request.resource.as_str(), request.action.as_str()] {
        hasher.update(part.as_bytes());
        hasher.update(&[0]);
    }
    for (key, value) in environment
        .iter()
        .chain(request.context.resource_attributes.iter())
    {
        hasher.update(key.as_bytes());
        hasher.update(&[0x1f]);
        hasher.update(value.to_string().as_bytes());
        hasher.update(&[0x1e]);
    }
    hasher.finalize().to_hex().to_string()
}

/// Stable, enumerated reason code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum DecisionReason {
    /// A simple grant matched (fast path)
    SimpleGrantMatch,

    /// An extended grant with this priority was the first to pass its conditions
    ExtendedGrantPriority(i32),

    /// Roles were held but no grant applied
    NoMatchingGrant,

    /// The user holds no active roles
    UserHasNoRoles,
}

impl DecisionReason {
    pub fn code(&self) -> String {
        match self {
            DecisionReason::SimpleGrantMatch => "simple-grant-match".to_string(),
            DecisionReason::ExtendedGrantPriority(p) => format!("extended-grant-priority-{}", p),
            DecisionReason::NoMatchingGrant => "no-matching-grant".to_string(),
            DecisionReason::UserHasNoRoles => "user-has-no-roles".to_string(),
        }
    }
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

impl From<DecisionReason> for String {
    fn from(reason: DecisionReason) -> Self {
        reason.code()
    }
}

impl TryFrom<String> for DecisionReason {
    type Error = String;

    fn try_from(code: String) -> Result<Self, Self::Error> {
        match code.as_str() {
            "simple-grant-match" => Ok(DecisionReason::SimpleGrantMatch),
            "no-matching-grant" => Ok(DecisionReason::NoMatchingGrant),
            "user-has-no-roles" => Ok(DecisionReason::UserHasNoRoles),
            other => other
                .strip_prefix("extended-grant-priority-")
                .and_then(|p| p.parse().ok())
                .map(DecisionReason::ExtendedGrantPriority)
                .ok_or_else(|| format!("unknown reason code '{}'", other)),
        }
    }
}

/// Outcome of one resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    /// Unique decision ID
    pub id: String,

    /// Whether the request is allowed
    pub allowed: bool,

    /// Reason code
    pub reason: DecisionReason,

    /// Grant that allowed the request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_grant: Option<GrantId>,

    /// Effective role names the decision was computed from
    pub effective_roles: Vec<String>,

    /// Decision timestamp
    pub decided_at: DateTime<Utc>,
}

impl Decision {
    /// Create an allow decision
    pub fn allow(reason: DecisionReason, grant: GrantId, effective_roles: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            allowed: true,
            reason,
            matched_grant: Some(grant),
            effective_roles,
            decided_at: Utc::now(),
        }
    }

    /// Create a deny decision
    pub fn deny(reason: DecisionReason, effective_roles: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            allowed: false,
            reason,
            matched_grant: None,
            effective_roles,
            decided_at: Utc::now(),
        }
    }

    /// `(allowed, reason)`: the part of a decision that must be deterministic
    pub fn outcome(&self) -> (bool, DecisionReason) {
        (self.allowed, self.reason)
    }
}

/// Resolver state, used to label where a resolution failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Start,
    RolesExpanded,
    CandidatesGathered,
    ConditionsFiltered,
    Decided,
    Audited,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::RolesExpanded => "roles-expanded",
            Stage::CandidatesGathered => "candidates-gathered",
            Stage::ConditionsFiltered => "conditions-filtered",
            Stage::Decided => "decided",
            Stage::Audited => "audited",
        };
        f.write_str(name)
    }
}
