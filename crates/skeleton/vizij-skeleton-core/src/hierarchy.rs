//! Transform hierarchy: ordered nodes with parent indices.
//!
//! Nodes are stored parent-before-child: node 0 is the root and every other
//! node's parent index is strictly smaller than its own. Forward kinematics
//! relies on this ordering to solve the whole tree in one left-to-right pass.

use serde::{Deserialize, Serialize};

use crate::error::SkeletonError;
use crate::names::bounded_name;

const DEFAULT_NODE_NAME: &str = "unnamed node";

/// A single named node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub name: String,
    /// Position in the hierarchy.
    pub index: usize,
    /// Parent position; `None` only for the root.
    pub parent: Option<usize>,
}

/// Immutable, validated node tree. Share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hierarchy {
    nodes: Vec<HierarchyNode>,
}

impl Hierarchy {
    /// Build a hierarchy from `(name, parent)` pairs in storage order.
    pub fn new<S: AsRef<str>>(nodes: Vec<(S, Option<usize>)>) -> Result<Self, SkeletonError> {
        if nodes.is_empty() {
            return Err(SkeletonError::InvalidHierarchy {
                reason: "hierarchy must contain at least one node".into(),
            });
        }

        let mut out = Vec::with_capacity(nodes.len());
        for (index, (name, parent)) in nodes.into_iter().enumerate() {
            match (index, parent) {
                (0, Some(p)) => {
                    return Err(SkeletonError::InvalidHierarchy {
                        reason: format!("root node cannot have a parent (got {p})"),
                    })
                }
                (i, None) if i > 0 => {
                    return Err(SkeletonError::InvalidHierarchy {
                        reason: format!("node {i} has no parent; only node 0 may be a root"),
                    })
                }
                (i, Some(p)) if p >= i => {
                    return Err(SkeletonError::InvalidHierarchy {
                        reason: format!("node {i} has parent {p}; parents must precede children"),
                    })
                }
                _ => {}
            }
            out.push(HierarchyNode {
                name: bounded_name(name.as_ref(), DEFAULT_NODE_NAME),
                index,
                parent,
            });
        }

        Ok(Self { nodes: out })
    }

    /// Start a builder that links nodes by parent name.
    pub fn builder() -> HierarchyBuilder {
        HierarchyBuilder::default()
    }

    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn nodes(&self) -> &[HierarchyNode] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, index: usize) -> Option<&HierarchyNode> {
        self.nodes.get(index)
    }

    /// Parent of `index`, or `None` for the root or an out-of-range index.
    #[inline]
    pub fn parent_index(&self, index: usize) -> Option<usize> {
        self.nodes.get(index).and_then(|n| n.parent)
    }

    /// First node whose name matches exactly.
    pub fn node_index(&self, name: &str) -> Option<usize> {
        self.nodes.iter().position(|n| n.name == name)
    }

    pub fn is_parent_of(&self, parent: usize, child: usize) -> bool {
        self.parent_index(child) == Some(parent)
    }

    /// Walks up from `node`; a node is not its own ancestor.
    pub fn is_ancestor_of(&self, ancestor: usize, node: usize) -> bool {
        let mut current = self.parent_index(node);
        while let Some(p) = current {
            if p == ancestor {
                return true;
            }
            // p < node always holds, so this terminates at the root.
            current = self.parent_index(p);
        }
        false
    }
}

/// Incremental construction by parent name.
#[derive(Debug, Default)]
pub struct HierarchyBuilder {
    nodes: Vec<(String, Option<usize>)>,
    error: Option<SkeletonError>,
}

impl HierarchyBuilder {
    /// Append a node. `parent` must name a node added earlier; `None` adds the root.
    pub fn node(mut self, name: &str, parent: Option<&str>) -> Self {
        if self.error.is_some() {
            return self;
        }
        let parent_index = match parent {
            None => None,
            Some(parent_name) => match self.nodes.iter().position(|(n, _)| n == parent_name) {
                Some(i) => Some(i),
                None => {
                    self.error = Some(SkeletonError::NotFound {
                        what: "parent node",
                        name: parent_name.to_string(),
                    });
                    return self;
                }
            },
        };
        self.nodes.push((name.to_string(), parent_index));
        self
    }

    pub fn build(self) -> Result<Hierarchy, SkeletonError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        Hierarchy::new(self.nodes)
    }
}
