//! ABAC condition evaluation
//!
//! A condition set is a list of clauses, each comparing one attribute from the
//! user, the resource, or the request environment against a literal, a list, or
//! another attribute. Clauses are AND-ed. Evaluation is a pure, total function:
//! anything missing or incomparable evaluates to `false`.
//!
//! # Example
//!
//! ```rust
//! use warden_authz::condition::{Comparator, Condition, ConditionSet, EvalContext, Operand, Scope};
//!
//! // userAttributes.department == resourceAttributes.department
//! let conditions = ConditionSet::new(vec![Condition::new(
//!     Scope::User,
//!     "department",
//!     Comparator::Eq,
//!     Operand::attribute(Scope::Resource, "department"),
//! )]);
//!
//! let ctx = EvalContext::new()
//!     .with_user_attribute("department", "IT")
//!     .with_resource_attribute("department", "HR");
//!
//! assert!(!conditions.evaluate(&ctx));
//! ```

use crate::attributes::{AttributeMap, AttributeType, AttributeValue};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Where a clause reads its attribute from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[serde(alias = "userAttributes", alias = "user_attributes")]
    User,
    #[serde(alias = "resourceAttributes", alias = "resource_attributes")]
    Resource,
    #[serde(alias = "env")]
    Environment,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::User => f.write_str("userAttributes"),
            Scope::Resource => f.write_str("resourceAttributes"),
            Scope::Environment => f.write_str("environment"),
        }
    }
}

/// Clause comparator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparator {
    #[serde(alias = "==")]
    Eq,
    #[serde(alias = "!=")]
    Ne,
    #[serde(alias = ">")]
    Gt,
    #[serde(alias = ">=")]
    Gte,
    #[serde(alias = "<")]
    Lt,
    #[serde(alias = "<=")]
    Lte,
    /// Substring match on the string rendering
    Contains,
    NotContains,
    /// Membership in a literal list
    In,
}

/// Right-hand side of a clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Operand {
    /// Another attribute, e.g. `{ "scope": "resource", "key": "department" }`
    Attribute { scope: Scope, key: String },

    /// Literal list, used with [`Comparator::In`]
    List(Vec<AttributeValue>),

    /// Literal value
    Literal(AttributeValue),
}

impl Operand {
    pub fn attribute(scope: Scope, key: impl Into<String>) -> Self {
        Operand::Attribute {
            scope,
            key: key.into(),
        }
    }

    pub fn literal(value: impl Into<AttributeValue>) -> Self {
        Operand::Literal(value.into())
    }
}

/// One `{scope, key, comparator, value}` clause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub scope: Scope,
    pub key: String,
    #[serde(alias = "op")]
    pub comparator: Comparator,
    pub value: Operand,
}

impl Condition {
    pub fn new(scope: Scope, key: impl Into<String>, comparator: Comparator, value: Operand) -> Self {
        Self {
            scope,
            key: key.into(),
            comparator,
            value,
        }
    }

    /// Evaluate this clause. Missing attributes make it false.
    pub fn evaluate(&self, ctx: &EvalContext) -> bool {
        let Some(left) = ctx.lookup(self.scope, &self.key) else {
            return false;
        };

        match &self.value {
            Operand::Attribute { scope, key } => match ctx.lookup(*scope, key) {
                Some(right) => compare(left, self.comparator, right),
                None => false,
            },
            Operand::List(items) => match self.comparator {
                Comparator::In => items.iter().any(|item| typed_eq(left, item)),
                _ => false,
            },
            Operand::Literal(right) => compare(left, self.comparator, right),
        }
    }
}

/// AND-ed list of clauses. Empty means unconditional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionSet {
    clauses: Vec<Condition>,
}

impl ConditionSet {
    pub fn new(clauses: Vec<Condition>) -> Self {
        Self { clauses }
    }

    pub fn clauses(&self) -> &[Condition] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    /// True when every clause holds (vacuously true when empty)
    pub fn evaluate(&self, ctx: &EvalContext) -> bool {
        self.clauses.iter().all(|clause| clause.evaluate(ctx))
    }
}

/// Evaluate an optional condition set. Absent conditions always pass.
pub fn evaluate(conditions: Option<&ConditionSet>, ctx: &EvalContext) -> bool {
    conditions.map(|set| set.evaluate(ctx)).unwrap_or(true)
}

/// Attribute values visible to condition clauses during one decision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvalContext {
    /// Attributes of the requesting user
    pub user: AttributeMap,

    /// Attributes of the target resource
    pub resource: AttributeMap,

    /// Request environment (client IP, time of day, request metadata)
    pub environment: AttributeMap,
}

impl EvalContext {
    /// Create an empty evaluation context
    pub fn new() -> Self {
        Self::default()
    }

    /// Create context with user attributes
    pub fn with_user(mut self, user: AttributeMap) -> Self {
        self.user = user;
        self
    }

    /// Create context with resource attributes
    pub fn with_resource(mut self, resource: AttributeMap) -> Self {
        self.resource = resource;
        self
    }

    /// Create context with environment attributes
    pub fn with_environment(mut self, environment: AttributeMap) -> Self {
        self.environment = environment;
        self
    }

    pub fn with_user_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.user.insert(key.into(), value.into());
        self
    }

    pub fn with_resource_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.resource.insert(key.into(), value.into());
        self
    }

    pub fn with_environment_attribute(
        mut self,
        key: impl Into<String>,
        value: impl Into<AttributeValue>,
    ) -> Self {
        self.environment.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute in the given scope
    pub fn lookup(&self, scope: Scope, key: &str) -> Option<&AttributeValue> {
        match scope {
            Scope::User => self.user.get(key),
            Scope::Resource => self.resource.get(key),
            Scope::Environment => self.environment.get(key),
        }
    }
}

fn compare(left: &AttributeValue, comparator: Comparator, right: &AttributeValue) -> bool {
    match comparator {
        Comparator::Eq => typed_eq(left, right),
        Comparator::Ne => !typed_eq(left, right),
        Comparator::Gt => matches!(typed_order(left, right), Some(Ordering::Greater)),
        Comparator::Gte => matches!(
            typed_order(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        Comparator::Lt => matches!(typed_order(left, right), Some(Ordering::Less)),
        Comparator::Lte => matches!(
            typed_order(left, right),
            Some(Ordering::Less | Ordering::Equal)
        ),
        Comparator::Contains => left.to_string().contains(&right.to_string()),
        Comparator::NotContains => !left.to_string().contains(&right.to_string()),
        // `In` against a scalar degrades to equality
        Comparator::In => typed_eq(left, right),
    }
}

/// Bring both sides to a common type, preferring the typed side.
fn align(left: &AttributeValue, right: &AttributeValue) -> Option<(AttributeValue, AttributeValue)> {
    let (lt, rt) = (left.value_type(), right.value_type());

    if lt == rt {
        return Some((left.clone(), right.clone()));
    }

    if lt != AttributeType::String {
        return right.as_type(lt).map(|r| (left.clone(), r));
    }

    left.as_type(rt).map(|l| (l, right.clone()))
}

fn typed_eq(left: &AttributeValue, right: &AttributeValue) -> bool {
    match align(left, right) {
        Some((l, r)) => l == r,
        // Incomparable types: exact match on the string renderings
        None => left.to_string() == right.to_string(),
    }
}

fn typed_order(left: &AttributeValue, right: &AttributeValue) -> Option<Ordering> {
    match align(left, right)? {
        (AttributeValue::Number(l), AttributeValue::Number(r)) => l.partial_cmp(&r),
        (AttributeValue::Date(l), AttributeValue::Date(r)) => Some(l.cmp(&r)),
        // Booleans and strings have no ordering
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn clause(scope: Scope, key: &str, comparator: Comparator, value: Operand) -> ConditionSet {
        ConditionSet::new(vec![Condition::new(scope, key, comparator, value)])
    }

    #[test]
    fn test_absent_and_empty_conditions_pass() {
        let ctx = EvalContext::new();
        assert!(evaluate(None, &ctx));
        assert!(evaluate(Some(&ConditionSet::default()), &ctx));
    }

    #[test]
    fn test_attribute_reference_mismatch() {
        let conditions = clause(
            Scope::User,
            "department",
            Comparator::Eq,
            Operand::attribute(Scope::Resource, "department"),
        );

        let ctx = EvalContext::new()
            .with_user_attribute("department", "IT")
            .with_resource_attribute("department", "HR");
        assert!(!conditions.evaluate(&ctx));

        let ctx = EvalContext::new()
            .with_user_attribute("department", "HR")
            .with_resource_attribute("department", "HR");
        assert!(conditions.evaluate(&ctx));
    }

    #[test]
    fn test_missing_attribute_fails_closed() {
        let ctx = EvalContext::new().with_resource_attribute("department", "HR");

        for comparator in [Comparator::Eq, Comparator::Ne, Comparator::NotContains] {
            let conditions = clause(
                Scope::User,
                "department",
                comparator,
                Operand::literal("HR"),
            );
            assert!(!conditions.evaluate(&ctx), "{:?} on missing attribute", comparator);
        }

        // Missing right-hand attribute as well
        let conditions = clause(
            Scope::Resource,
            "department",
            Comparator::Ne,
            Operand::attribute(Scope::User, "department"),
        );
        assert!(!conditions.evaluate(&ctx));
    }

    #[test]
    fn test_numeric_comparisons() {
        let ctx = EvalContext::new().with_user_attribute("level", 5.0);

        assert!(clause(Scope::User, "level", Comparator::Gt, Operand::literal(3.0)).evaluate(&ctx));
        assert!(clause(Scope::User, "level", Comparator::Gte, Operand::literal(5.0)).evaluate(&ctx));
        assert!(!clause(Scope::User, "level", Comparator::Lt, Operand::literal(5.0)).evaluate(&ctx));
        assert!(clause(Scope::User, "level", Comparator::Lte, Operand::literal(5.0)).evaluate(&ctx));

        // Numeric literal written as a string still compares numerically
        assert!(!clause(Scope::User, "level", Comparator::Gt, Operand::literal("10")).evaluate(&ctx));
        assert!(clause(Scope::User, "level", Comparator::Lt, Operand::literal("10")).evaluate(&ctx));
    }

    #[test]
    fn test_degraded_string_is_not_ordered() {
        // A "number" attribute that failed to parse is a plain string
        let ctx = EvalContext::new().with_user_attribute("level", "senior");

        assert!(!clause(Scope::User, "level", Comparator::Gt, Operand::literal(3.0)).evaluate(&ctx));
        assert!(!clause(Scope::User, "level", Comparator::Lt, Operand::literal(3.0)).evaluate(&ctx));
        assert!(!clause(Scope::User, "level", Comparator::Eq, Operand::literal(3.0)).evaluate(&ctx));
    }

    #[test]
    fn test_boolean_comparisons() {
        let ctx = EvalContext::new().with_user_attribute("mfa", true);

        assert!(clause(Scope::User, "mfa", Comparator::Eq, Operand::literal(true)).evaluate(&ctx));
        assert!(clause(Scope::User, "mfa", Comparator::Eq, Operand::literal("true")).evaluate(&ctx));
        assert!(!clause(Scope::User, "mfa", Comparator::Gt, Operand::literal(false)).evaluate(&ctx));
    }

    #[test]
    fn test_date_comparisons() {
        let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
        let ctx = EvalContext::new().with_environment_attribute("request_time", now);

        let before = clause(
            Scope::Environment,
            "request_time",
            Comparator::Lt,
            Operand::literal("2024-12-31"),
        );
        assert!(before.evaluate(&ctx));

        let after = clause(
            Scope::Environment,
            "request_time",
            Comparator::Gt,
            Operand::literal("2025-01-01T00:00:00Z"),
        );
        assert!(!after.evaluate(&ctx));
    }

    #[test]
    fn test_string_fallback() {
        let ctx = EvalContext::new()
            .with_environment_attribute("client_ip", "10.1.2.3")
            .with_user_attribute("email", "alice@example.com");

        assert!(clause(Scope::Environment, "client_ip", Comparator::Contains, Operand::literal("10.1."))
            .evaluate(&ctx));
        assert!(!clause(Scope::Environment, "client_ip", Comparator::Eq, Operand::literal("10.1."))
            .evaluate(&ctx));
        assert!(clause(Scope::User, "email", Comparator::NotContains, Operand::literal("@corp"))
            .evaluate(&ctx));
        // Strings have no ordering
        assert!(!clause(Scope::User, "email", Comparator::Gt, Operand::literal("a")).evaluate(&ctx));
    }

    #[test]
    fn test_in_list() {
        let ctx = EvalContext::new().with_user_attribute("department", "HR");

        let conditions = clause(
            Scope::User,
            "department",
            Comparator::In,
            Operand::List(vec!["HR".into(), "Finance".into()]),
        );
        assert!(conditions.evaluate(&ctx));

        let conditions = clause(
            Scope::User,
            "department",
            Comparator::In,
            Operand::List(vec!["IT".into()]),
        );
        assert!(!conditions.evaluate(&ctx));

        // Lists only make sense with `in`
        let conditions = clause(
            Scope::User,
            "department",
            Comparator::Eq,
            Operand::List(vec!["HR".into()]),
        );
        assert!(!conditions.evaluate(&ctx));
    }

    #[test]
    fn test_clauses_are_anded() {
        let conditions = ConditionSet::new(vec![
            Condition::new(Scope::User, "department", Comparator::Eq, Operand::literal("HR")),
            Condition::new(Scope::User, "level", Comparator::Gte, Operand::literal(3.0)),
        ]);

        let ctx = EvalContext::new()
            .with_user_attribute("department", "HR")
            .with_user_attribute("level", 2.0);
        assert!(!conditions.evaluate(&ctx));

        let ctx = ctx.with_user_attribute("level", 4.0);
        assert!(conditions.evaluate(&ctx));
    }

    #[test]
    fn test_deserialize_clauses() {
        let json = r#"[
            {"scope": "userAttributes", "key": "department", "op": "==",
             "value": {"scope": "resourceAttributes", "key": "department"}},
            {"scope": "environment", "key": "hour_of_day", "comparator": "lt", "value": 18},
            {"scope": "user", "key": "region", "comparator": "in", "value": ["eu", "us"]}
        ]"#;

        let conditions: ConditionSet = serde_json::from_str(json).unwrap();
        assert_eq!(conditions.clauses().len(), 3);
        assert_eq!(conditions.clauses()[0].comparator, Comparator::Eq);
        assert_eq!(
            conditions.clauses()[0].value,
            Operand::attribute(Scope::Resource, "department")
        );
        assert_eq!(conditions.clauses()[1].value, Operand::literal(18.0));
        assert!(matches!(conditions.clauses()[2].value, Operand::List(_)));
    }
}
