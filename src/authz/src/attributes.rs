//! Typed attributes for users and resources
//!
//! Attributes are persisted as raw strings with a type tag. Reads coerce the raw
//! string into an [`AttributeValue`] following the tag, and coercion never fails:
//! a value that does not parse as its declared type degrades to the raw string.

use crate::error::Result;
use crate::types::{ResourceId, UserId};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Key → typed value mapping, sorted for deterministic iteration
pub type AttributeMap = BTreeMap<String, AttributeValue>;

/// Declared type of a stored attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttributeType {
    #[default]
    String,
    Number,
    #[serde(alias = "bool")]
    Boolean,
    Date,
}

/// Typed attribute value
///
/// Deserializes untagged, so condition literals can be written naturally in
/// JSON/TOML (`"HR"`, `5`, `true`, `"2024-05-01T00:00:00Z"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Boolean(bool),
    Number(f64),
    Date(DateTime<Utc>),
    String(String),
}

impl AttributeValue {
    /// Coerce a raw persisted string according to its type tag
    pub fn coerce(raw: &str, value_type: AttributeType) -> Self {
        let parsed = match value_type {
            AttributeType::Number => parse_number(raw).map(AttributeValue::Number),
            AttributeType::Boolean => parse_bool(raw).map(AttributeValue::Boolean),
            AttributeType::Date => parse_date(raw).map(AttributeValue::Date),
            AttributeType::String => None,
        };

        parsed.unwrap_or_else(|| AttributeValue::String(raw.to_string()))
    }

    /// Type of the value as held (after any degradation)
    pub fn value_type(&self) -> AttributeType {
        match self {
            AttributeValue::Boolean(_) => AttributeType::Boolean,
            AttributeValue::Number(_) => AttributeType::Number,
            AttributeValue::Date(_) => AttributeType::Date,
            AttributeValue::String(_) => AttributeType::String,
        }
    }

    /// Re-read this value as another type, if it can be represented as one.
    ///
    /// Strings are parsed with the same rules as persisted attributes.
    pub fn as_type(&self, target: AttributeType) -> Option<AttributeValue> {
        if self.value_type() == target {
            return Some(self.clone());
        }

        match (self, target) {
            (AttributeValue::String(raw), _) => {
                let coerced = AttributeValue::coerce(raw, target);
                (coerced.value_type() == target).then_some(coerced)
            }
            (_, AttributeType::String) => Some(AttributeValue::String(self.to_string())),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Boolean(b) => write!(f, "{}", b),
            AttributeValue::Number(n) => write!(f, "{}", n),
            AttributeValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            AttributeValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Number(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Number(value as f64)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Boolean(value)
    }
}

impl From<DateTime<Utc>> for AttributeValue {
    fn from(value: DateTime<Utc>) -> Self {
        AttributeValue::Date(value)
    }
}

// Raw text is parsed as stored; padded values stay strings.
fn parse_number(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok()
}

// Accepts the usual spellings: 1/0, t/f, true/false in lower, upper or title case.
fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Owner of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum AttributeOwner {
    User(UserId),
    Resource(ResourceId),
}

impl fmt::Display for AttributeOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeOwner::User(id) => write!(f, "user:{}", id),
            AttributeOwner::Resource(id) => write!(f, "resource:{}", id),
        }
    }
}

/// Persisted attribute record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Owning user or resource
    pub owner: AttributeOwner,

    /// Attribute key, unique per owner
    pub key: String,

    /// Raw persisted value
    pub raw: String,

    /// Declared type tag
    #[serde(rename = "type", default)]
    pub value_type: AttributeType,
}

impl Attribute {
    pub fn new(
        owner: AttributeOwner,
        key: impl Into<String>,
        raw: impl Into<String>,
        value_type: AttributeType,
    ) -> Self {
        Self {
            owner,
            key: key.into(),
            raw: raw.into(),
            value_type,
        }
    }

    /// Typed view of the raw value
    pub fn value(&self) -> AttributeValue {
        AttributeValue::coerce(&self.raw, self.value_type)
    }
}

/// Attribute store trait
#[async_trait]
pub trait AttributeStore: Send + Sync {
    /// Get one typed attribute. `None` means the key is not set for the owner.
    async fn get(&self, owner: AttributeOwner, key: &str) -> Result<Option<AttributeValue>>;

    /// Get every typed attribute of an owner
    async fn get_all(&self, owner: AttributeOwner) -> Result<AttributeMap>;

    /// Create or replace an attribute (keys are unique per owner)
    async fn put(&self, attribute: Attribute) -> Result<()>;

    /// Remove an attribute, returning whether it existed
    async fn remove(&self, owner: AttributeOwner, key: &str) -> Result<bool>;
}

/// In-memory attribute store implementation
pub struct InMemoryAttributeStore {
    attributes: Arc<RwLock<HashMap<AttributeOwner, HashMap<String, Attribute>>>>,
}

impl InMemoryAttributeStore {
    /// Create a new in-memory attribute store
    pub fn new() -> Self {
        Self {
            attributes: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemoryAttributeStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AttributeStore for InMemoryAttributeStore {
    async fn get(&self, owner: AttributeOwner, key: &str) -> Result<Option<AttributeValue>> {
        let attributes = self.attributes.read().await;
        Ok(attributes
            .get(&owner)
            .and_then(|by_key| by_key.get(key))
            .map(Attribute::value))
    }

    async fn get_all(&self, owner: AttributeOwner) -> Result<AttributeMap> {
        let attributes = self.attributes.read().await;
        Ok(attributes
            .get(&owner)
            .map(|by_key| {
                by_key
                    .values()
                    .map(|attr| (attr.key.clone(), attr.value()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn put(&self, attribute: Attribute) -> Result<()> {
        let mut attributes = self.attributes.write().await;
        attributes
            .entry(attribute.owner)
            .or_default()
            .insert(attribute.key.clone(), attribute);
        Ok(())
    }

    async fn remove(&self, owner: AttributeOwner, key: &str) -> Result<bool> {
        let mut attributes = self.attributes.write().await;
        Ok(attributes
            .get_mut(&owner)
            .map(|by_key| by_key.remove(key).is_some())
            .unwrap_or(false))
    }
}
