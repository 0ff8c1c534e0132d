//! Conversation tree.
//!
//! An arena of [`MessageNode`]s keyed by id. Parent/child links are ids, so
//! deletion and reparenting are a handful of map updates.
//!
//! ## Invariants
//!
//! 1. The root (if any) has no parent.
//! 2. Every parent link resolves, and the parent lists the child exactly once.
//! 3. Parent links never form a cycle.
//! 4. `current_node` (if any) references an existing node.
//!
//! Deleting a root with several children promotes the first child and leaves
//! the others parentless. Those subtrees stay in the arena (reachable by id)
//! but no chain walk from the root reaches them.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tracing::{debug, warn};

use super::model::{MessageNode, NodeId, Role};

#[derive(Debug, Clone, Default)]
pub struct ConversationTree {
    nodes: HashMap<NodeId, MessageNode>,
    root: Option<NodeId>,
    current_node: Option<NodeId>,
}

impl ConversationTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a tree from stored parts without touching any links.
    pub(crate) fn from_parts(
        nodes: Vec<MessageNode>,
        root: Option<NodeId>,
        current_node: Option<NodeId>,
    ) -> Self {
        let nodes = nodes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self {
            nodes,
            root,
            current_node,
        }
    }

    pub fn root(&self) -> Option<&NodeId> {
        self.root.as_ref()
    }

    pub fn current_node(&self) -> Option<&NodeId> {
        self.current_node.as_ref()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    pub fn get(&self, id: &NodeId) -> Option<&MessageNode> {
        self.nodes.get(id)
    }

    pub(crate) fn get_mut(&mut self, id: &NodeId) -> Option<&mut MessageNode> {
        self.nodes.get_mut(id)
    }

    /// Iterates all nodes in arbitrary order.
    pub fn nodes(&self) -> impl Iterator<Item = &MessageNode> {
        self.nodes.values()
    }

    pub fn children_of(&self, id: &NodeId) -> Option<&[NodeId]> {
        self.nodes.get(id).map(|n| n.children.as_slice())
    }

    /// Inserts a new message and makes it the current node.
    ///
    /// An unresolvable `parent_id` yields a parentless node. A parentless node
    /// becomes the root only when the tree has no root yet; otherwise it is
    /// stored detached.
    pub fn insert(
        &mut self,
        role: Role,
        content: impl Into<String>,
        parent_id: Option<&NodeId>,
    ) -> &MessageNode {
        let id = NodeId::generate();

        let parent = match parent_id {
            Some(requested) if self.nodes.contains_key(requested) => Some(requested.clone()),
            Some(requested) => {
                warn!(parent = %requested, "insert: parent does not resolve; creating parentless node");
                None
            }
            None => None,
        };

        match &parent {
            Some(parent_id) => {
                if let Some(parent) = self.nodes.get_mut(parent_id) {
                    parent.children.push(id.clone());
                }
            }
            None if self.root.is_none() => self.root = Some(id.clone()),
            None => {
                warn!(node = %id, "insert: root already exists; node is detached");
            }
        }

        self.current_node = Some(id.clone());
        let node = MessageNode::new(id.clone(), role, content.into(), parent);
        self.nodes.entry(id).or_insert(node)
    }

    /// Moves `current_node` to an existing node (branch switch).
    pub fn checkout(&mut self, id: &NodeId) -> bool {
        if self.nodes.contains_key(id) {
            self.current_node = Some(id.clone());
            true
        } else {
            false
        }
    }

    /// Sets `current_node` directly, ignoring ids that do not resolve.
    pub(crate) fn set_current_node(&mut self, id: Option<NodeId>) {
        match id {
            Some(id) if !self.nodes.contains_key(&id) => {
                debug!(node = %id, "ignoring current node that no longer exists");
            }
            other => self.current_node = other,
        }
    }

    /// Walks parent links upward starting at `id` (inclusive).
    pub fn ancestors(&self, id: &NodeId) -> Ancestors<'_> {
        let next = self.nodes.get(id);
        if next.is_none() {
            warn!(node = %id, "chain walk started at an unknown node");
        }
        Ancestors {
            tree: self,
            next,
            seen: HashSet::new(),
        }
    }

    /// Returns the chain from the top-most ancestor down to `tail`.
    pub fn chain_to(&self, tail: &NodeId) -> Vec<&MessageNode> {
        let mut chain: Vec<&MessageNode> = self.ancestors(tail).collect();
        chain.reverse();
        chain
    }

    /// Returns the displayed path, oldest first.
    pub fn get_chain(&self) -> Vec<&MessageNode> {
        match &self.current_node {
            Some(current) => self.chain_to(current),
            None => Vec::new(),
        }
    }

    /// Deletes a node, splicing its children into its former parent.
    ///
    /// Returns `false` when the id is unknown.
    pub fn delete_by_id(&mut self, id: &NodeId) -> bool {
        let Some(node) = self.nodes.remove(id) else {
            return false;
        };

        let parent_id = node
            .parent_id
            .as_ref()
            .filter(|p| self.nodes.contains_key(*p));

        if let Some(parent_id) = parent_id {
            for child in &node.children {
                if let Some(child) = self.nodes.get_mut(child) {
                    child.parent_id = Some(parent_id.clone());
                }
            }
            if let Some(parent) = self.nodes.get_mut(parent_id) {
                parent.children.retain(|c| c != id);
                parent.children.extend(node.children.iter().cloned());
            }
        } else {
            if node.parent_id.is_some() {
                warn!(node = %id, "delete: parent link did not resolve; children become parentless");
            }
            for child in &node.children {
                if let Some(child) = self.nodes.get_mut(child) {
                    child.parent_id = None;
                }
            }
            if self.root.as_ref() == Some(id) {
                self.root = node.children.first().cloned();
                if node.children.len() > 1 {
                    debug!(
                        detached = node.children.len() - 1,
                        "root deleted; only the first child was promoted"
                    );
                }
            }
        }

        if self.current_node.as_ref() == Some(id) {
            self.current_node = parent_id.cloned();
        }
        true
    }

    /// Reports every structural invariant violation in the tree.
    pub fn check_invariants(&self) -> Vec<InvariantViolation> {
        let mut violations = Vec::new();

        if let Some(root) = &self.root {
            match self.nodes.get(root) {
                None => violations.push(InvariantViolation::MissingRoot(root.clone())),
                Some(node) if node.parent_id.is_some() => {
                    violations.push(InvariantViolation::RootHasParent(root.clone()));
                }
                Some(_) => {}
            }
        }

        for node in self.nodes.values() {
            if let Some(parent_id) = &node.parent_id {
                match self.nodes.get(parent_id) {
                    None => violations.push(InvariantViolation::MissingParent {
                        node: node.id.clone(),
                        parent: parent_id.clone(),
                    }),
                    Some(parent) => {
                        let count = parent.children.iter().filter(|c| **c == node.id).count();
                        if count != 1 {
                            violations.push(InvariantViolation::ChildListed {
                                parent: parent_id.clone(),
                                child: node.id.clone(),
                                count,
                            });
                        }
                    }
                }
            }

            for child in &node.children {
                let links_back = self
                    .nodes
                    .get(child)
                    .is_some_and(|c| c.parent_id.as_ref() == Some(&node.id));
                if !links_back {
                    violations.push(InvariantViolation::StrayChild {
                        parent: node.id.clone(),
                        child: child.clone(),
                    });
                }
            }

            if self.has_cycle_from(&node.id) {
                violations.push(InvariantViolation::Cycle(node.id.clone()));
            }
        }

        if let Some(current) = &self.current_node
            && !self.nodes.contains_key(current)
        {
            violations.push(InvariantViolation::MissingCurrent(current.clone()));
        }

        violations
    }

    fn has_cycle_from(&self, start: &NodeId) -> bool {
        let mut seen = HashSet::new();
        let mut next = Some(start);
        while let Some(id) = next {
            if !seen.insert(id) {
                return true;
            }
            next = self.nodes.get(id).and_then(|n| n.parent_id.as_ref());
        }
        false
    }
}

/// Iterator over a node and its ancestors.
///
/// Stops (truncating the walk) on an unresolved parent link or a cycle; both
/// indicate a corrupted tree and are logged.
pub struct Ancestors<'a> {
    tree: &'a ConversationTree,
    next: Option<&'a MessageNode>,
    seen: HashSet<&'a NodeId>,
}

impl<'a> Iterator for Ancestors<'a> {
    type Item = &'a MessageNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.next.take()?;
        if !self.seen.insert(&node.id) {
            warn!(node = %node.id, "chain walk hit a cycle; chain truncated");
            return None;
        }
        if let Some(parent_id) = &node.parent_id {
            self.next = self.tree.nodes.get(parent_id);
            if self.next.is_none() {
                warn!(node = %node.id, parent = %parent_id, "chain walk hit an unresolved link; chain truncated");
            }
        }
        Some(node)
    }
}

/// A broken structural invariant found by [`ConversationTree::check_invariants`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvariantViolation {
    MissingRoot(NodeId),
    RootHasParent(NodeId),
    MissingParent {
        node: NodeId,
        parent: NodeId,
    },
    ChildListed {
        parent: NodeId,
        child: NodeId,
        count: usize,
    },
    StrayChild {
        parent: NodeId,
        child: NodeId,
    },
    Cycle(NodeId),
    MissingCurrent(NodeId),
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingRoot(id) => write!(f, "root {id} does not exist"),
            Self::RootHasParent(id) => write!(f, "root {id} has a parent"),
            Self::MissingParent { node, parent } => {
                write!(f, "node {node} points at missing parent {parent}")
            }
            Self::ChildListed {
                parent,
                child,
                count,
            } => write!(f, "parent {parent} lists child {child} {count} times"),
            Self::StrayChild { parent, child } => {
                write!(f, "parent {parent} lists {child}, which does not link back")
            }
            Self::Cycle(id) => write!(f, "parent links from {id} form a cycle"),
            Self::MissingCurrent(id) => write!(f, "current node {id} does not exist"),
        }
    }
}
