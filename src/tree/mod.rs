//! In-memory attachment tree.
//!
//! The tree is strictly owned: every container owns its children in a `Vec`,
//! so a node has exactly one parent and cycles cannot be expressed except by
//! a move, which [`Tree::move_node`] guards against. Nodes are addressed by
//! [`NodeId`]s that stay valid across edits and are never reused.
//!
//! - [`builder`] - turn raw attachment feeds into a tree
//! - [`mutator`] - rename, add, delete, move, expand/collapse
//! - [`search`] - keyword search with path expansion and result cycling

pub mod builder;
pub mod mutator;
pub mod search;


use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{FileInfo, NodeId, NodeKind};

pub use builder::TreeBuilder;
pub use search::{SearchState, TreeSearch};

/// Allocator of node ids, monotonically increasing
#[derive(Clone, Debug)]
pub struct NodeIdGen {
    next: u64,
}

impl Default for NodeIdGen {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl NodeIdGen {
    /// Hand out the next unused id
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// One node of the attachment tree
#[derive(Clone, Debug, Serialize)]
pub struct TreeNode {
    id: NodeId,
    name: String,
    kind: NodeKind,
    depth: usize,
    collapsed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    children: Vec<TreeNode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    file_info: Option<FileInfo>,
}

impl TreeNode {
    fn container(id: NodeId, name: impl Into<String>, kind: NodeKind, depth: usize) -> Self {
        debug_assert!(kind.is_container());
        Self {
            id,
            name: name.into(),
            kind,
            depth,
            collapsed: false,
            children: Vec::new(),
            file_info: None,
        }
    }

    fn file(id: NodeId, name: impl Into<String>, depth: usize, file_info: Option<FileInfo>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: NodeKind::File,
            depth,
            collapsed: false,
            children: Vec::new(),
            file_info,
        }
    }

    /// Stable id
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Root, folder or file
    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Distance from the root (root = 0)
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the container hides its descendants from display
    pub fn is_collapsed(&self) -> bool {
        self.collapsed
    }

    /// Children in display order; always empty for files
    pub fn children(&self) -> &[TreeNode] {
        &self.children
    }

    /// Metadata snapshot; only file nodes built from a record carry one
    pub fn file_info(&self) -> Option<&FileInfo> {
        self.file_info.as_ref()
    }

    /// Whether this node may own children
    pub fn is_container(&self) -> bool {
        self.kind.is_container()
    }

    /// Number of file descendants (a file counts itself)
    pub fn file_count(&self) -> usize {
        match self.kind {
            NodeKind::File => 1,
            _ => self.children.iter().map(TreeNode::file_count).sum(),
        }
    }

    /// Iterate this node and all descendants in pre-order
    pub fn pre_order(&self) -> PreOrder<'_> {
        PreOrder { stack: vec![self] }
    }

    /// Find a node in this subtree
    pub fn find(&self, id: NodeId) -> Option<&TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    fn find_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Whether `id` is this node or one of its descendants
    pub fn contains(&self, id: NodeId) -> bool {
        self.find(id).is_some()
    }

    /// Same names, kinds and shape, ignoring ids, depth and collapse state
    pub fn is_isomorphic(&self, other: &TreeNode) -> bool {
        self.name == other.name
            && self.kind == other.kind
            && self.children.len() == other.children.len()
            && self
                .children
                .iter()
                .zip(&other.children)
                .all(|(a, b)| a.is_isomorphic(b))
    }

    /// Ids from this node down to `id`, both ends included
    fn path_to(&self, id: NodeId) -> Option<Vec<NodeId>> {
        if self.id == id {
            return Some(vec![self.id]);
        }
        for child in &self.children {
            if let Some(mut path) = child.path_to(id) {
                path.insert(0, self.id);
                return Some(path);
            }
        }
        None
    }

    /// Detach the node `id` from whichever descendant container owns it
    fn detach(&mut self, id: NodeId) -> Option<TreeNode> {
        if let Some(pos) = self.children.iter().position(|c| c.id == id) {
            return Some(self.children.remove(pos));
        }
        self.children.iter_mut().find_map(|c| c.detach(id))
    }

    /// Reset depth for this subtree, top-down
    fn set_depth(&mut self, depth: usize) {
        self.depth = depth;
        for child in &mut self.children {
            child.set_depth(depth + 1);
        }
    }

    fn sibling_names(&self) -> HashSet<String> {
        self.children.iter().map(|c| c.name.clone()).collect()
    }
}

/// Pre-order iterator over a subtree
pub struct PreOrder<'a> {
    stack: Vec<&'a TreeNode>,
}

impl<'a> Iterator for PreOrder<'a> {
    type Item = &'a TreeNode;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

/// One displayed row of the tree
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct VisibleRow {
    /// Node id
    pub id: NodeId,
    /// Display name
    pub name: String,
    /// Node kind
    pub kind: NodeKind,
    /// Indentation level
    pub depth: usize,
    /// Number of file descendants
    pub file_count: usize,
    /// Whether the row is the current selection
    pub selected: bool,
}

/// The live, editable attachment tree of one session
#[derive(Clone, Debug)]
pub struct Tree {
    root: TreeNode,
    ids: NodeIdGen,
    selected: Option<NodeId>,
    new_folder_label: String,
}

impl Tree {
    /// Create a tree holding only a root node
    pub fn new(root_name: impl Into<String>, new_folder_label: impl Into<String>) -> Self {
        Self::with_ids(root_name, new_folder_label, NodeIdGen::default())
    }

    /// Create an empty tree continuing an existing id sequence
    pub fn with_ids(
        root_name: impl Into<String>,
        new_folder_label: impl Into<String>,
        mut ids: NodeIdGen,
    ) -> Self {
        let root = TreeNode::container(ids.next_id(), root_name, NodeKind::Root, 0);
        Self {
            root,
            ids,
            selected: None,
            new_folder_label: new_folder_label.into(),
        }
    }

    /// The root node
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// Find a node by id
    pub fn get(&self, id: NodeId) -> Option<&TreeNode> {
        self.root.find(id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut TreeNode> {
        self.root.find_mut(id)
    }

    /// Ids from the root down to `id`, both included
    pub fn path_to(&self, id: NodeId) -> Option<Vec<NodeId>> {
        self.root.path_to(id)
    }

    /// The parent of `id`, `None` for the root or unknown ids
    pub fn parent_of(&self, id: NodeId) -> Option<&TreeNode> {
        let path = self.path_to(id)?;
        let parent = *path.iter().rev().nth(1)?;
        self.get(parent)
    }

    /// Total number of nodes, root included
    pub fn len(&self) -> usize {
        self.root.pre_order().count()
    }

    /// Whether the tree holds only its root
    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    /// Number of file leaves
    pub fn file_count(&self) -> usize {
        self.root.file_count()
    }

    /// Currently selected node
    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    /// Select a node, or clear the selection with `None`
    pub fn select(&mut self, id: Option<NodeId>) -> Result<(), crate::error::TreeError> {
        if let Some(id) = id
            && self.get(id).is_none()
        {
            return Err(crate::error::TreeError::NodeNotFound(id));
        }
        self.selected = id;
        Ok(())
    }

    /// Rows to display: pre-order, not descending into collapsed containers
    pub fn visible_rows(&self) -> Vec<VisibleRow> {
        let mut rows = Vec::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            rows.push(VisibleRow {
                id: node.id,
                name: node.name.clone(),
                kind: node.kind,
                depth: node.depth,
                file_count: node.file_count(),
                selected: self.selected == Some(node.id),
            });
            if !node.collapsed {
                stack.extend(node.children.iter().rev());
            }
        }
        rows
    }

    /// Deep-copy the tree into a read-only snapshot for export
    pub fn freeze(&self) -> FrozenTree {
        FrozenTree {
            root: self.root.clone(),
            frozen_at: Utc::now(),
        }
    }

    /// Give up the tree, keeping its id sequence for a rebuild
    pub fn into_ids(self) -> NodeIdGen {
        self.ids
    }

    /// Check every structural invariant
    ///
    /// Exactly one root at depth 0, `child.depth == parent.depth + 1`, files
    /// are leaves, and no id appears twice (which would indicate shared
    /// ownership or a cycle).
    pub fn is_consistent(&self) -> bool {
        if self.root.kind != NodeKind::Root || self.root.depth != 0 {
            return false;
        }
        let mut seen = HashSet::new();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            if !seen.insert(node.id) {
                return false;
            }
            if node.kind == NodeKind::File && !node.children.is_empty() {
                return false;
            }
            for child in &node.children {
                if child.kind == NodeKind::Root || child.depth != node.depth + 1 {
                    return false;
                }
                stack.push(child);
            }
        }
        true
    }
}

/// Read-only deep copy of a tree taken when the user confirms the export
#[derive(Clone, Debug)]
pub struct FrozenTree {
    root: TreeNode,
    frozen_at: DateTime<Utc>,
}

impl FrozenTree {
    /// The root of the snapshot
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// When the snapshot was taken
    pub fn frozen_at(&self) -> DateTime<Utc> {
        self.frozen_at
    }

    /// Number of file leaves in the snapshot
    pub fn file_count(&self) -> usize {
        self.root.file_count()
    }
}
