//! Role hierarchy graph with cycle-checked edge insertion
//!
//! Edges point from parent to child. A child inherits its parent's grants when the
//! edge carries `inherits_permissions`. This module:
//! 1. Rejects edges that would make a role its own ancestor
//! 2. Expands a role to itself plus every inheriting ancestor
//! 3. Reports the full offending path when an edge is rejected

use crate::error::CycleError;
use crate::types::{RoleEdge, RoleId};
use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

/// Parent → child role graph
///
/// Stored as child → parents adjacency; expansion and cycle validation both
/// walk upward.
///
/// # Example
///
/// ```
/// use warden_authz::hierarchy::RoleGraph;
/// use warden_authz::types::RoleEdge;
///
/// let mut graph = RoleGraph::new();
/// // role 2 ("editor") inherits role 1 ("viewer")
/// graph.add_edge(RoleEdge { parent: 1, child: 2, inherits_permissions: true }, |id| id.to_string()).unwrap();
///
/// let expanded = graph.expand(2);
/// assert!(expanded.contains(&1) && expanded.contains(&2));
///
/// // 1 -> 2 -> 1 would be a cycle
/// let err = graph.add_edge(RoleEdge { parent: 2, child: 1, inherits_permissions: true }, |id| id.to_string());
/// assert!(err.is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    /// child → [(parent, inherits_permissions)]
    parents: HashMap<RoleId, Vec<(RoleId, bool)>>,
}

impl RoleGraph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an edge exists between the two roles
    pub fn contains_edge(&self, parent: RoleId, child: RoleId) -> bool {
        self.parents
            .get(&child)
            .map(|ps| ps.iter().any(|(p, _)| *p == parent))
            .unwrap_or(false)
    }

    /// All edges, sorted by (parent, child)
    pub fn edges(&self) -> Vec<RoleEdge> {
        let mut edges: Vec<RoleEdge> = self
            .parents
            .iter()
            .flat_map(|(child, ps)| {
                ps.iter().map(move |(parent, inherits)| RoleEdge {
                    parent: *parent,
                    child: *child,
                    inherits_permissions: *inherits,
                })
            })
            .collect();
        edges.sort_by_key(|e| (e.parent, e.child));
        edges
    }

    /// Check whether `edge` may be inserted without creating a cycle.
    ///
    /// Adding `parent → child` closes a cycle exactly when `child` is already an
    /// ancestor of `parent` (or they are the same role). The returned error
    /// carries the full path, named through `name_of`.
    pub fn validate_edge<F>(&self, edge: &RoleEdge, name_of: F) -> Result<(), CycleError>
    where
        F: Fn(RoleId) -> String,
    {
        if edge.parent == edge.child {
            let name = name_of(edge.child);
            return Err(CycleError::new(vec![name.clone(), name]));
        }

        if let Some(path_up) = self.path_to_ancestor(edge.parent, edge.child) {
            // path_up runs parent → ... → child walking upwards; flip it into
            // parent→child direction and close the loop back at child.
            let mut path: Vec<String> = path_up.into_iter().rev().map(&name_of).collect();
            path.push(name_of(edge.child));
            return Err(CycleError::new(path));
        }

        Ok(())
    }

    /// Validate, then insert. On error the graph is left untouched.
    pub fn add_edge<F>(&mut self, edge: RoleEdge, name_of: F) -> Result<(), CycleError>
    where
        F: Fn(RoleId) -> String,
    {
        self.validate_edge(&edge, name_of)?;
        self.insert_unchecked(edge);
        Ok(())
    }

    fn insert_unchecked(&mut self, edge: RoleEdge) {
        let parents = self.parents.entry(edge.child).or_default();
        match parents.iter_mut().find(|(p, _)| *p == edge.parent) {
            Some(existing) => existing.1 = edge.inherits_permissions,
            None => parents.push((edge.parent, edge.inherits_permissions)),
        }
    }

    /// Remove an edge, returning it if it existed
    pub fn remove_edge(&mut self, parent: RoleId, child: RoleId) -> Option<RoleEdge> {
        let parents = self.parents.get_mut(&child)?;
        let idx = parents.iter().position(|(p, _)| *p == parent)?;
        let (_, inherits) = parents.remove(idx);
        if parents.is_empty() {
            self.parents.remove(&child);
        }

        Some(RoleEdge {
            parent,
            child,
            inherits_permissions: inherits,
        })
    }

    /// Direct parents of a role (any inheritance flag)
    pub fn parents_of(&self, role: RoleId) -> Vec<RoleId> {
        self.parents
            .get(&role)
            .map(|ps| ps.iter().map(|(p, _)| *p).collect())
            .unwrap_or_default()
    }

    /// The role itself plus every ancestor reachable over inheriting edges
    pub fn expand(&self, role: RoleId) -> BTreeSet<RoleId> {
        self.expand_all(std::iter::once(role), |_| true)
    }

    /// Closure of `roles` under inheritance.
    ///
    /// `include` gates every role, including the starting ones: a role for which
    /// it returns false is neither part of the result nor traversed through.
    /// The visited set bounds the walk, so a corrupt (cyclic) graph still
    /// terminates with whatever was accumulated.
    pub fn expand_all<I, F>(&self, roles: I, include: F) -> BTreeSet<RoleId>
    where
        I: IntoIterator<Item = RoleId>,
        F: Fn(RoleId) -> bool,
    {
        let mut visited: HashSet<RoleId> = HashSet::new();
        let mut expanded = BTreeSet::new();
        let mut queue: VecDeque<RoleId> = VecDeque::new();

        for role in roles {
            if include(role) && visited.insert(role) {
                queue.push_back(role);
            }
        }

        while let Some(current) = queue.pop_front() {
            expanded.insert(current);

            if let Some(parents) = self.parents.get(&current) {
                for (parent, inherits) in parents {
                    if *inherits && include(*parent) && visited.insert(*parent) {
                        queue.push_back(*parent);
                    }
                }
            }
        }

        expanded
    }

    /// Upward path from `from` to `target` over all edges, inclusive of both
    fn path_to_ancestor(&self, from: RoleId, target: RoleId) -> Option<Vec<RoleId>> {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        if self.dfs_up(from, target, &mut visited, &mut path) {
            Some(path)
        } else {
            None
        }
    }

    fn dfs_up(
        &self,
        node: RoleId,
        target: RoleId,
        visited: &mut HashSet<RoleId>,
        path: &mut Vec<RoleId>,
    ) -> bool {
        if !visited.insert(node) {
            return false;
        }

        path.push(node);
        if node == target {
            return true;
        }

        for parent in self.parents_of(node) {
            if self.dfs_up(parent, target, visited, path) {
                return true;
            }
        }

        path.pop();
        false
    }
}
