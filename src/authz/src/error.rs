//! Error types for the decision engine

use crate::engine::decision::Stage;
use std::time::Duration;
use thiserror::Error;

/// Decision engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Malformed request (missing identifiers). Never audited.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// A role hierarchy edge was rejected because it would close a cycle
    #[error(transparent)]
    Cycle(#[from] CycleError),

    /// Storage failure or timeout while a decision was being resolved
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    /// Referenced record does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record already exists (duplicate unique name or edge)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Backing store failure outside of a decision
    #[error("Storage error: {0}")]
    Storage(String),

    /// Invalid configuration or seed document
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// Whether the error indicates a degraded system rather than a caller bug.
    ///
    /// Callers deny on every error; this only separates health alerts from
    /// request validation noise.
    pub fn is_system_failure(&self) -> bool {
        matches!(
            self,
            AuthzError::Resolution(_) | AuthzError::Storage(_) | AuthzError::Io(_)
        )
    }

    /// HTTP status class hint for the transport layer
    pub fn status_class(&self) -> u16 {
        match self {
            AuthzError::InvalidRequest(_) | AuthzError::Config(_) => 400,
            AuthzError::NotFound(_) => 404,
            AuthzError::Cycle(_) | AuthzError::Conflict(_) => 409,
            AuthzError::Resolution(_) | AuthzError::Storage(_) | AuthzError::Io(_) => 500,
        }
    }
}

/// Rejected role hierarchy edge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Role hierarchy cycle detected: {}", .path.join(" -> "))]
pub struct CycleError {
    /// Offending path, starting and ending at the same role
    pub path: Vec<String>,
}

impl CycleError {
    pub fn new(path: Vec<String>) -> Self {
        Self { path }
    }
}

/// Failure while resolving a decision. Always fail-closed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// A store returned an error during one of the resolution stages
    #[error("Storage failure during {stage}: {message}")]
    Storage { stage: Stage, message: String },

    /// The caller-imposed deadline elapsed before a decision was reached
    #[error("Decision timed out after {after:?}")]
    Timeout { after: Duration },
}

impl ResolutionError {
    /// Stable code recorded on audit entries for failed resolutions
    pub fn code(&self) -> &'static str {
        match self {
            ResolutionError::Storage { .. } => "resolution-error",
            ResolutionError::Timeout { .. } => "resolution-timeout",
        }
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, AuthzError>;
