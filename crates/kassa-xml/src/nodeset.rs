#![forbid(unsafe_code)]

//! NodeSet type for canonicalization and the enveloped-signature transform.
//!
//! A `NodeSet` is the set of nodes of one parsed document that a reference
//! selects, identified by their `roxmltree::NodeId`.

use roxmltree::{Node, NodeId};
use std::collections::HashSet;

/// A set of document nodes identified by `NodeId`.
#[derive(Debug, Clone, Default)]
pub struct NodeSet {
    nodes: HashSet<NodeId>,
}

impl NodeSet {
    /// Create an empty node set.
    pub fn new() -> Self {
        Self::default()
    }

    /// The subtree rooted at `root`, without comment nodes.
    ///
    /// This is what a same-document `#id` reference selects.
    pub fn tree_without_comments(root: Node<'_, '_>) -> Self {
        let mut set = Self::new();
        collect_subtree(root, &mut set.nodes, false);
        set
    }

    /// The subtree rooted at `root`, comments included.
    pub fn tree_with_comments(root: Node<'_, '_>) -> Self {
        let mut set = Self::new();
        collect_subtree(root, &mut set.nodes, true);
        set
    }

    /// Remove `root` and all of its descendants from the set.
    pub fn remove_subtree(&mut self, root: Node<'_, '_>) {
        for node in root.descendants() {
            self.nodes.remove(&node.id());
        }
    }

    pub fn contains(&self, node: Node<'_, '_>) -> bool {
        self.nodes.contains(&node.id())
    }

    pub fn contains_id(&self, id: NodeId) -> bool {
        self.nodes.contains(&id)
    }

    pub fn insert(&mut self, node: Node<'_, '_>) {
        self.nodes.insert(node.id());
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }
}

fn collect_subtree(root: Node<'_, '_>, set: &mut HashSet<NodeId>, include_comments: bool) {
    for node in root.descendants() {
        if include_comments || !node.is_comment() {
            set.insert(node.id());
        }
    }
}
