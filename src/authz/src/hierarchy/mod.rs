//! Role hierarchy module
//!
//! Provides the parent → child role graph with cycle-checked edge insertion,
//! inheritance expansion, and the role store that owns roles, user assignments
//! and the graph.
//!
//! # Example
//!
//! ```rust
//! use warden_authz::hierarchy::{InMemoryRoleStore, RoleStore};
//! use warden_authz::types::{RoleEdge, Status};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryRoleStore::new();
//! let viewer = store.create_role("viewer").await?;
//! let editor = store.create_role("editor").await?;
//!
//! // editor inherits viewer's grants
//! store.add_edge(RoleEdge { parent: viewer.id, child: editor.id, inherits_permissions: true }).await?;
//!
//! store.upsert_user(1, Status::Active).await?;
//! store.assign_role(1, editor.id).await?;
//!
//! let effective = store.effective_roles(1).await?;
//! assert_eq!(effective.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod graph;
pub mod store;

pub use graph::RoleGraph;
pub use store::{InMemoryRoleStore, RoleStore};
