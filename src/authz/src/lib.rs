//! # Warden Authorization Engine
//!
//! Access-control decision engine combining role hierarchies (RBAC) with
//! attribute conditions (ABAC).
//!
//! ## Features
//!
//! - **Role hierarchy** with cycle-checked edges and inheritance expansion
//! - **Simple and extended grants**, with priority ordering for conditional grants
//! - **Typed attributes** for users, resources and the request environment
//! - **Fail-closed decisions**: missing data denies, store failures surface as errors
//! - **Asynchronous audit trail** that never blocks the decision path
//!
//! ## Example
//!
//! ```rust
//! use warden_authz::{DecisionReason, DecisionRequest, PermissionResolver};
//! use warden_authz::types::Status;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let resolver = PermissionResolver::in_memory(Default::default(), Default::default());
//!
//!     resolver.create_role("viewer").await?;
//!     resolver.create_role("editor").await?;
//!     resolver.add_role_edge("viewer", "editor", true).await?;
//!
//!     resolver.register_resource("doc", None).await?;
//!     resolver.register_action("read").await?;
//!     resolver.add_simple_grant(0, "viewer", "doc", "read").await?;
//!
//!     resolver.register_user(42, Status::Active).await?;
//!     resolver.assign_role(42, "editor").await?;
//!
//!     let decision = resolver.decide(&DecisionRequest::new(42, "doc", "read")).await?;
//!     assert!(decision.allowed);
//!     assert_eq!(decision.reason, DecisionReason::SimpleGrantMatch);
//!
//!     Ok(())
//! }
//! ```

pub mod attributes;
pub mod condition;
pub mod config;
pub mod engine;
pub mod error;
pub mod grants;
pub mod hierarchy;
pub mod seed;
pub mod types;

// Re-export commonly used types
pub use attributes::{AttributeMap, AttributeStore, AttributeType, AttributeValue};
pub use condition::{Comparator, Condition, ConditionSet, Operand, Scope};
pub use config::WardenConfig;
pub use engine::{
    AuditConfig, AuditLogEntry, AuditRecorder, Decision, DecisionReason, DecisionRequest,
    EngineConfig, ExtendedGrantSpec, PermissionResolver, RequestContext,
};
pub use error::{AuthzError, CycleError, ResolutionError, Result};
pub use grants::{Grant, GrantIndex};
pub use hierarchy::RoleStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
