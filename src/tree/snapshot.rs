//! Arena-backed tree snapshots.
//!
//! A snapshot owns every node of one build in a flat table. Parent and child
//! links are indices into that table, so dropping the snapshot drops the tree.

use std::sync::Arc;

use crate::tree::node::{CollapseState, NodeKey, TreeNode};

/// Index of a node inside its snapshot. Only meaningful for the snapshot that
/// issued it: the indexing accessors below panic on an id from a larger
/// snapshot, and [`TreeSnapshot::get`] returns `None` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Default)]
pub struct TreeSnapshot {
    nodes: Vec<TreeNode>,
    roots: Vec<NodeId>,
}

impl TreeSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, node: TreeNode) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    pub fn add_root(&mut self, node: TreeNode) -> NodeId {
        let id = self.push(node);
        self.roots.push(id);
        id
    }

    /// Attaches `child` under `parent` and returns the child's id.
    ///
    /// Sets the child's back-reference and moves a `None` parent to
    /// `Collapsed`; an `Expanded` parent stays expanded. A synthetic child is
    /// re-keyed under its parent's key so equal labels in different branches
    /// stay distinct.
    ///
    /// # Panics
    ///
    /// If `parent` was not issued by this snapshot.
    pub fn add_child(&mut self, parent: NodeId, mut child: TreeNode) -> NodeId {
        if let NodeKey::Synthetic(label) = &child.key {
            child.key = NodeKey::Synthetic(format!("{}/{}", self.nodes[parent.0].key, label));
        }
        child.parent = Some(parent);
        let id = self.push(child);

        let parent_node = &mut self.nodes[parent.0];
        parent_node.children.push(id);
        if parent_node.collapse == CollapseState::None {
            parent_node.make_collapsible();
        }
        id
    }

    /// Panics if `id` was not issued by this snapshot.
    pub fn node(&self, id: NodeId) -> &TreeNode {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut TreeNode {
        &mut self.nodes[id.0]
    }

    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Panics if `id` was not issued by this snapshot.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Panics if `id` was not issued by this snapshot.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Every node, depth first in display order.
    pub fn walk(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<NodeId> = self.roots.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.children(id).iter().rev().copied());
        }
        out
    }

    /// Identity keys in display order; equal for two builds over the same data.
    pub fn keys(&self) -> Vec<NodeKey> {
        self.walk().into_iter().map(|id| self.node(id).key.clone()).collect()
    }

    pub fn find(&self, key: &NodeKey) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| &n.key == key)
            .map(NodeId)
    }
}

/// A node handed to the host: the snapshot it lives in plus its id.
#[derive(Debug, Clone)]
pub struct NodeRef {
    snapshot: Arc<TreeSnapshot>,
    id: NodeId,
}

impl NodeRef {
    pub fn new(snapshot: Arc<TreeSnapshot>, id: NodeId) -> Self {
        Self { snapshot, id }
    }

    pub fn roots(snapshot: &Arc<TreeSnapshot>) -> Vec<NodeRef> {
        snapshot
            .roots()
            .iter()
            .map(|&id| NodeRef::new(Arc::clone(snapshot), id))
            .collect()
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn node(&self) -> &TreeNode {
        self.snapshot.node(self.id)
    }

    pub fn children(&self) -> Vec<NodeRef> {
        self.snapshot
            .children(self.id)
            .iter()
            .map(|&id| NodeRef::new(Arc::clone(&self.snapshot), id))
            .collect()
    }

    pub fn parent(&self) -> Option<NodeRef> {
        self.snapshot
            .parent(self.id)
            .map(|id| NodeRef::new(Arc::clone(&self.snapshot), id))
    }

    /// Whether both refer to the same node of the same snapshot.
    pub fn same_as(&self, other: &NodeRef) -> bool {
        Arc::ptr_eq(&self.snapshot, &other.snapshot) && self.id == other.id
    }
}
