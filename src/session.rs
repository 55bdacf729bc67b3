//! One editing session over a form's attachments.
//!
//! [`EditorSession`] owns the raw sources, the live tree, the search state
//! and the notice board. Every edit goes through it so rejected edits surface
//! as notices while the tree stays untouched.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::error::{Error, Result, TreeError};
use crate::export::{ExportPipeline, ExportReport, SaveSink};
use crate::notice::{Notice, NoticeBoard};
use crate::record_map::AttachmentRecordMap;
use crate::tree::{FrozenTree, SearchState, Tree, TreeBuilder, TreeNode, TreeSearch};
use crate::types::{AttachmentSources, Layout, NodeId, SearchMode};

/// A saved export
#[derive(Clone, Debug)]
pub struct SavedExport {
    /// Where the sink stored the archive
    pub location: String,
    /// Per-file results
    pub report: ExportReport,
}

/// Editing session: sources, tree, search and notices
#[derive(Debug)]
pub struct EditorSession {
    sources: AttachmentSources,
    records: Arc<AttachmentRecordMap>,
    builder: TreeBuilder,
    layout: Layout,
    tree: Tree,
    search: TreeSearch,
    notices: NoticeBoard,
}

impl EditorSession {
    /// Build the initial tree and open the session
    ///
    /// Fails with [`Error::NoAttachments`] when no source contributes a
    /// single file, and with [`Error::Config`] for invalid configuration.
    pub fn open(sources: AttachmentSources, config: &Config) -> Result<Self> {
        config.validate()?;
        if sources.file_count() == 0 {
            tracing::info!("no attachments in any source, not opening editor");
            return Err(Error::NoAttachments);
        }

        let builder = TreeBuilder::new(config.builder.clone());
        let layout = config.builder.default_layout;
        let tree = builder.build(&sources, layout);
        let records = Arc::new(AttachmentRecordMap::from_sources(&sources));

        tracing::info!(
            files = tree.file_count(),
            nodes = tree.len(),
            ?layout,
            "editor session opened"
        );

        Ok(Self {
            sources,
            records,
            builder,
            layout,
            tree,
            search: TreeSearch::new(),
            notices: NoticeBoard::new(config.notices.display_duration),
        })
    }

    /// The live tree
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    /// Current layout
    pub fn layout(&self) -> Layout {
        self.layout
    }

    /// Record map for export fallbacks
    pub fn records(&self) -> Arc<AttachmentRecordMap> {
        Arc::clone(&self.records)
    }

    /// The session's notice board
    pub fn notices(&self) -> &NoticeBoard {
        &self.notices
    }

    /// Current search state
    pub fn search_state(&self) -> SearchState {
        self.search.state()
    }

    /// Rename a node
    pub fn rename(&mut self, id: NodeId, name: &str) -> std::result::Result<(), TreeError> {
        let result = self.tree.rename(id, name);
        self.report(result)
    }

    /// Add an empty folder under `parent`
    pub fn add_folder(&mut self, parent: NodeId) -> std::result::Result<NodeId, TreeError> {
        let result = self.tree.add_folder(parent);
        self.report(result)
    }

    /// Add a file leaf without metadata under `parent`
    pub fn add_file_reference(
        &mut self,
        parent: NodeId,
        name: &str,
    ) -> std::result::Result<NodeId, TreeError> {
        let result = self.tree.add_file_reference(parent, name);
        self.report(result)
    }

    /// Delete a node and its subtree
    pub fn delete(&mut self, id: NodeId) -> std::result::Result<TreeNode, TreeError> {
        let result = self.tree.delete(id);
        if let Ok(removed) = &result {
            self.notices.post(Notice::NodeDeleted {
                name: removed.name().to_string(),
            });
        }
        self.report(result)
    }

    /// Move `dragged` under `target`
    pub fn move_node(&mut self, dragged: NodeId, target: NodeId) -> std::result::Result<(), TreeError> {
        let result = self.tree.move_node(dragged, target);
        if result.is_ok()
            && let (Some(node), Some(parent)) = (self.tree.get(dragged), self.tree.get(target))
        {
            self.notices.post(Notice::NodeMoved {
                name: node.name().to_string(),
                target: parent.name().to_string(),
            });
        }
        self.report(result)
    }

    /// Expand containers shallower than `level`, collapse the rest
    pub fn expand_to_level(&mut self, level: usize) {
        self.tree.expand_to_level(level);
    }

    /// Collapse every container
    pub fn collapse_all(&mut self) {
        self.tree.collapse_all();
    }

    /// Expand every container
    pub fn expand_all(&mut self) {
        self.tree.expand_all();
    }

    /// Flip one container's collapse state
    pub fn toggle(&mut self, id: NodeId) -> std::result::Result<bool, TreeError> {
        let result = self.tree.toggle(id);
        self.report(result)
    }

    /// Select a node, or clear the selection
    pub fn select(&mut self, id: Option<NodeId>) -> std::result::Result<(), TreeError> {
        let result = self.tree.select(id);
        self.report(result)
    }

    /// Search file leaves and focus the first match
    pub fn search(&mut self, keyword: &str, mode: SearchMode) -> SearchState {
        let state = self.search.run(&mut self.tree, keyword, mode);
        match &state {
            SearchState::Matches { count, .. } => {
                self.notices.post(Notice::SearchResults { count: *count })
            }
            SearchState::NoMatches => self.notices.post(Notice::NoSearchResults {
                keyword: self.search.keyword().to_string(),
            }),
            SearchState::Idle => {}
        }
        state
    }

    /// Focus the next search result, wrapping around
    pub fn next_result(&mut self) -> Option<NodeId> {
        self.search.next(&mut self.tree)
    }

    /// Discard all edits and rebuild the tree in the current layout
    pub fn restore_defaults(&mut self) {
        self.rebuild(self.layout);
        self.notices.post(Notice::Restored);
    }

    /// Rebuild the tree in `layout`, discarding edits
    pub fn set_layout(&mut self, layout: Layout) {
        if layout == self.layout {
            return;
        }
        self.rebuild(layout);
    }

    /// Freeze the tree for export
    pub fn confirm(&self) -> FrozenTree {
        self.tree.freeze()
    }

    /// Close the session without exporting
    pub fn cancel(self) {
        tracing::debug!(nodes = self.tree.len(), "editor session cancelled");
    }

    /// Freeze the tree, export it and hand the archive to `sink`
    ///
    /// Posts a success notice (mentioning placeholder count) or a failure
    /// notice. Per-file failures do not make this return an error.
    pub async fn export_and_save(
        &self,
        pipeline: &ExportPipeline,
        sink: &dyn SaveSink,
        cancel: CancellationToken,
    ) -> Result<SavedExport> {
        let frozen = self.confirm();
        let result = async {
            let outcome = pipeline.export(&frozen, cancel).await?;
            let location = sink.save(&outcome.file_name, outcome.archive).await?;
            Ok::<_, Error>(SavedExport {
                location,
                report: outcome.report,
            })
        }
        .await;

        match &result {
            Ok(saved) => self.notices.post(Notice::ExportSucceeded {
                location: saved.location.clone(),
                failed: saved.report.failures.len() + saved.report.skipped.len(),
            }),
            Err(e) => {
                tracing::warn!(error = %e, "export failed");
                self.notices.post(Notice::ExportFailed {
                    reason: e.to_string(),
                });
            }
        }
        result
    }

    fn rebuild(&mut self, layout: Layout) {
        let placeholder = Tree::new(
            self.builder.config().root_label.clone(),
            self.builder.config().new_folder_label.clone(),
        );
        let ids = std::mem::replace(&mut self.tree, placeholder).into_ids();
        self.tree = self.builder.build_with_ids(&self.sources, layout, ids);
        self.layout = layout;
        self.search.clear();
        tracing::debug!(?layout, nodes = self.tree.len(), "tree rebuilt from sources");
    }

    fn report<T>(
        &self,
        result: std::result::Result<T, TreeError>,
    ) -> std::result::Result<T, TreeError> {
        if let Err(e) = &result {
            tracing::debug!(error = %e, "tree edit rejected");
            self.notices.post(Notice::EditRejected {
                reason: e.to_string(),
            });
        }
        result
    }
}
