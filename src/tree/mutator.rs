//! Edits on a live tree.
//!
//! Every operation validates completely before it mutates, so a rejected edit
//! returns a [`TreeError`] and leaves the tree exactly as it was.

use crate::error::TreeError;
use crate::types::{NodeId, NodeKind};
use crate::utils::unique_name;

use super::{Tree, TreeNode};

fn visit_mut(node: &mut TreeNode, f: &mut impl FnMut(&mut TreeNode)) {
    f(node);
    for child in &mut node.children {
        visit_mut(child, f);
    }
}

impl Tree {
    /// Rename a node; blank names are rejected
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> Result<(), TreeError> {
        let new_name = new_name.trim();
        if new_name.is_empty() {
            return Err(TreeError::EmptyName);
        }
        let node = self.get_mut(id).ok_or(TreeError::NodeNotFound(id))?;
        node.name = new_name.to_string();
        Ok(())
    }

    /// Append an empty folder under `parent` and expand the parent
    ///
    /// The folder gets the configured default name, suffixed when a sibling
    /// already uses it. Returns the new folder's id.
    pub fn add_folder(&mut self, parent: NodeId) -> Result<NodeId, TreeError> {
        self.check_container(parent)?;
        let label = self.new_folder_label.clone();
        self.insert_child(parent, |id, depth, taken| {
            TreeNode::container(id, unique_name(&label, taken), NodeKind::Folder, depth)
        })
    }

    /// Append a file leaf without metadata under `parent`
    ///
    /// Export resolves such leaves by name through the record map.
    pub fn add_file_reference(&mut self, parent: NodeId, name: &str) -> Result<NodeId, TreeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(TreeError::EmptyName);
        }
        self.check_container(parent)?;
        self.insert_child(parent, |id, depth, _| TreeNode::file(id, name, depth, None))
    }

    /// Remove a node and its subtree, returning it
    ///
    /// Clears the selection when it pointed at the removed subtree.
    pub fn delete(&mut self, id: NodeId) -> Result<TreeNode, TreeError> {
        if id == self.root.id {
            return Err(TreeError::RootImmutable);
        }
        let removed = self.root.detach(id).ok_or(TreeError::NodeNotFound(id))?;
        if let Some(selected) = self.selected
            && removed.contains(selected)
        {
            self.selected = None;
        }
        debug_assert!(self.is_consistent());
        Ok(removed)
    }

    /// Move `dragged` with its subtree to the end of `target`'s children
    pub fn move_node(&mut self, dragged: NodeId, target: NodeId) -> Result<(), TreeError> {
        if dragged == target {
            return Err(TreeError::SameNode(dragged));
        }
        if dragged == self.root.id {
            return Err(TreeError::RootImmutable);
        }
        let dragged_node = self.get(dragged).ok_or(TreeError::NodeNotFound(dragged))?;
        let target_node = self.get(target).ok_or(TreeError::NodeNotFound(target))?;
        if !target_node.is_container() {
            return Err(TreeError::NotAContainer(target));
        }
        if dragged_node.contains(target) {
            return Err(TreeError::CycleDetected { dragged, target });
        }

        let origin = self
            .parent_of(dragged)
            .and_then(|parent| {
                let index = parent.children.iter().position(|c| c.id == dragged)?;
                Some((parent.id, index))
            })
            .ok_or(TreeError::NodeNotFound(dragged))?;
        let node = self
            .root
            .detach(dragged)
            .ok_or(TreeError::NodeNotFound(dragged))?;
        self.attach(node, target, origin)?;
        debug_assert!(self.is_consistent());
        Ok(())
    }

    /// Append a detached subtree to `target`
    ///
    /// When `target` is gone the subtree goes back to `origin` (parent id,
    /// child index) and the tree is left as it was before the detach.
    pub(super) fn attach(
        &mut self,
        mut node: TreeNode,
        target: NodeId,
        origin: (NodeId, usize),
    ) -> Result<(), TreeError> {
        if let Some(parent) = self.root.find_mut(target) {
            node.set_depth(parent.depth + 1);
            parent.children.push(node);
            return Ok(());
        }
        let (parent_id, index) = origin;
        if let Some(parent) = self.root.find_mut(parent_id) {
            let index = index.min(parent.children.len());
            parent.children.insert(index, node);
        }
        Err(TreeError::NodeNotFound(target))
    }

    /// Expand containers shallower than `level`, collapse the rest
    pub fn expand_to_level(&mut self, level: usize) {
        visit_mut(&mut self.root, &mut |node| {
            if node.is_container() {
                node.collapsed = node.depth >= level;
            }
        });
    }

    /// Collapse every container, root included
    pub fn collapse_all(&mut self) {
        self.set_all_collapsed(true);
    }

    /// Expand every container
    pub fn expand_all(&mut self) {
        self.set_all_collapsed(false);
    }

    /// Flip one container's collapse state, returning the new state
    pub fn toggle(&mut self, id: NodeId) -> Result<bool, TreeError> {
        self.check_container(id)?;
        let node = self.get_mut(id).ok_or(TreeError::NodeNotFound(id))?;
        node.collapsed = !node.collapsed;
        Ok(node.collapsed)
    }

    /// Expand every container on the path from the root to `id`
    pub fn reveal(&mut self, id: NodeId) -> Result<(), TreeError> {
        let path = self.path_to(id).ok_or(TreeError::NodeNotFound(id))?;
        for ancestor in &path[..path.len() - 1] {
            if let Some(node) = self.get_mut(*ancestor) {
                node.collapsed = false;
            }
        }
        Ok(())
    }

    fn set_all_collapsed(&mut self, collapsed: bool) {
        visit_mut(&mut self.root, &mut |node| {
            if node.is_container() {
                node.collapsed = collapsed;
            }
        });
    }

    fn check_container(&self, id: NodeId) -> Result<(), TreeError> {
        let node = self.get(id).ok_or(TreeError::NodeNotFound(id))?;
        if node.is_container() {
            Ok(())
        } else {
            Err(TreeError::NotAContainer(id))
        }
    }

    /// Allocate an id and push the node made by `make` under a checked container
    fn insert_child(
        &mut self,
        parent: NodeId,
        make: impl FnOnce(NodeId, usize, &mut std::collections::HashSet<String>) -> TreeNode,
    ) -> Result<NodeId, TreeError> {
        let id = self.ids.next_id();
        let parent_node = self
            .root
            .find_mut(parent)
            .ok_or(TreeError::NodeNotFound(parent))?;
        let mut taken = parent_node.sibling_names();
        let child = make(id, parent_node.depth + 1, &mut taken);
        parent_node.children.push(child);
        parent_node.collapsed = false;
        Ok(id)
    }
}
