//! Keyword search over file leaves.

use serde::Serialize;

use crate::types::{NodeId, NodeKind, SearchMode};

use super::{Tree, TreeNode};

/// Outcome of the last search
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SearchState {
    /// No search has run, or it was cleared
    Idle,
    /// The last search matched nothing
    NoMatches,
    /// The last search matched `count` files; `current` is the focused one
    Matches {
        /// Number of matching files
        count: usize,
        /// Index of the focused result
        current: usize,
    },
}

/// Search results and the cursor cycling through them
#[derive(Clone, Debug, Default)]
pub struct TreeSearch {
    keyword: String,
    mode: SearchMode,
    results: Vec<NodeId>,
    cursor: Option<usize>,
    searched: bool,
}

impl TreeSearch {
    /// Create an idle search
    pub fn new() -> Self {
        Self::default()
    }

    /// Search file leaves, expand the path to every match and focus the first one
    ///
    /// Matching is a case-insensitive substring test against the file name
    /// ([`SearchMode::Filename`]) or the attachment remark
    /// ([`SearchMode::Remark`]). Results are in tree pre-order. A blank
    /// keyword clears the search.
    pub fn run(&mut self, tree: &mut Tree, keyword: &str, mode: SearchMode) -> SearchState {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            self.clear();
            return SearchState::Idle;
        }

        let needle = keyword.to_lowercase();
        self.results = tree
            .root()
            .pre_order()
            .filter(|node| node.kind() == NodeKind::File && matches(node, &needle, mode))
            .map(TreeNode::id)
            .collect();
        self.keyword = keyword.to_string();
        self.mode = mode;
        self.searched = true;
        self.cursor = None;

        for id in &self.results {
            let revealed = tree.reveal(*id);
            debug_assert!(revealed.is_ok(), "search result {id:?} missing from tree");
        }
        tracing::debug!(keyword, ?mode, matches = self.results.len(), "tree search");

        if !self.results.is_empty() {
            self.focus(tree, 0);
        }
        self.state()
    }

    /// Focus the next result, wrapping after the last one
    ///
    /// Results deleted since the search are dropped first. Returns `None` when
    /// nothing is left to focus.
    pub fn next(&mut self, tree: &mut Tree) -> Option<NodeId> {
        let before = self.results.len();
        self.results.retain(|id| tree.get(*id).is_some());
        if self.results.is_empty() {
            self.cursor = None;
            return None;
        }
        let next = match self.cursor {
            Some(current) if self.results.len() == before => (current + 1) % self.results.len(),
            Some(current) => current.min(self.results.len() - 1),
            None => 0,
        };
        Some(self.focus(tree, next))
    }

    /// Reset to the idle state
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Matching node ids in pre-order
    pub fn results(&self) -> &[NodeId] {
        &self.results
    }

    /// The focused result
    pub fn current(&self) -> Option<NodeId> {
        self.cursor.map(|i| self.results[i])
    }

    /// Keyword of the last search
    pub fn keyword(&self) -> &str {
        &self.keyword
    }

    /// Mode of the last search
    pub fn mode(&self) -> SearchMode {
        self.mode
    }

    /// Idle, no matches, or the match count with the focused index
    pub fn state(&self) -> SearchState {
        if !self.searched {
            return SearchState::Idle;
        }
        match (self.results.len(), self.cursor) {
            (0, _) => SearchState::NoMatches,
            (count, current) => SearchState::Matches {
                count,
                current: current.unwrap_or(0),
            },
        }
    }

    fn focus(&mut self, tree: &mut Tree, index: usize) -> NodeId {
        let id = self.results[index];
        self.cursor = Some(index);
        let focused = tree.reveal(id).and_then(|()| tree.select(Some(id)));
        debug_assert!(focused.is_ok(), "search result {id:?} missing from tree");
        id
    }
}

fn matches(node: &TreeNode, needle: &str, mode: SearchMode) -> bool {
    let haystack = match mode {
        SearchMode::Filename => Some(node.name()),
        SearchMode::Remark => node.file_info().and_then(|info| info.remark.as_deref()),
    };
    haystack.is_some_and(|text| text.to_lowercase().contains(needle))
}
