//! Build an attachment tree from raw feeds.
//!
//! Shape produced (row-grouped layout):
//!
//! ```text
//! Attachments
//! ├── MainForm
//! │   └── Invoice
//! │       ├── a.pdf
//! │       └── b.pdf
//! └── DetailTable
//!     ├── Row 1
//!     │   └── Photo
//!     │       └── front.jpg
//!     └── Row 2
//!         └── Photo
//!             └── back.jpg
//! ```
//!
//! The row-flattened layout drops the `Row N` level and merges every row's
//! files into shared type folders.

use std::collections::HashSet;

use crate::config::BuilderConfig;
use crate::types::{AttachmentRecord, AttachmentResponse, AttachmentSources, FileInfo, Layout, NodeKind};
use crate::utils::unique_name;

use super::{NodeIdGen, Tree, TreeNode};

/// Pure builder turning [`AttachmentSources`] into a [`Tree`]
///
/// Building never mutates the sources, so the same sources can be rebuilt at
/// any time (for "restore defaults" or a layout switch).
#[derive(Clone, Debug, Default)]
pub struct TreeBuilder {
    config: BuilderConfig,
}

impl TreeBuilder {
    /// Create a builder with the given labels
    pub fn new(config: BuilderConfig) -> Self {
        Self { config }
    }

    /// The labels this builder uses
    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build a fresh tree with a new id sequence
    pub fn build(&self, sources: &AttachmentSources, layout: Layout) -> Tree {
        self.build_with_ids(sources, layout, NodeIdGen::default())
    }

    /// Build a tree continuing `ids`, so no id of a discarded tree is handed out again
    pub fn build_with_ids(
        &self,
        sources: &AttachmentSources,
        layout: Layout,
        mut ids: NodeIdGen,
    ) -> Tree {
        let mut root = TreeNode::container(ids.next_id(), &self.config.root_label, NodeKind::Root, 0);

        if let Some(main) = &sources.main {
            warn_if_failed(main, &self.config.main_form_label);
            if let Some(folder) =
                self.source_folder(&mut ids, &self.config.main_form_label, main.records())
            {
                root.children.push(folder);
            }
        }

        for group in &sources.groups {
            warn_if_failed(&group.response, &group.name);
            if let Some(folder) = self.source_folder(&mut ids, &group.name, group.response.records())
            {
                root.children.push(folder);
            }
        }

        for detail in &sources.details {
            for (index, row) in detail.rows.iter().enumerate() {
                if !row.is_success() {
                    tracing::warn!(
                        table = %detail.name,
                        row = index + 1,
                        code = row.code,
                        "detail row attachment feed failed, skipping row"
                    );
                }
            }
            let folder = match layout {
                Layout::RowGrouped => self.grouped_detail_folder(&mut ids, &detail.name, &detail.rows),
                Layout::RowFlattened => self.source_folder(
                    &mut ids,
                    &detail.name,
                    detail.rows.iter().flat_map(AttachmentResponse::records),
                ),
            };
            if let Some(folder) = folder {
                root.children.push(folder);
            }
        }

        let mut tree = Tree {
            root,
            ids,
            selected: None,
            new_folder_label: self.config.new_folder_label.clone(),
        };
        match self.config.initial_expand_level {
            Some(level) => tree.expand_to_level(level),
            None => tree.expand_all(),
        }

        tracing::debug!(
            ?layout,
            nodes = tree.len(),
            files = tree.file_count(),
            "built attachment tree"
        );
        tree
    }

    /// Folder for one form/group/flattened table at depth 1, or `None` without records
    fn source_folder<'a>(
        &self,
        ids: &mut NodeIdGen,
        name: &str,
        records: impl IntoIterator<Item = &'a AttachmentRecord>,
    ) -> Option<TreeNode> {
        let mut folder = TreeNode::container(ids.next_id(), name, NodeKind::Folder, 1);
        folder.children = self.type_folders(ids, records, 2);
        (!folder.children.is_empty()).then_some(folder)
    }

    /// Detail table folder with one `Row N` folder per contributing row
    fn grouped_detail_folder(
        &self,
        ids: &mut NodeIdGen,
        name: &str,
        rows: &[AttachmentResponse],
    ) -> Option<TreeNode> {
        let mut table = TreeNode::container(ids.next_id(), name, NodeKind::Folder, 1);
        for (index, row) in rows.iter().enumerate() {
            if row.records().is_empty() {
                continue;
            }
            let label = format!("{} {}", self.config.row_label_prefix, index + 1);
            let mut row_folder = TreeNode::container(ids.next_id(), label, NodeKind::Folder, 2);
            row_folder.children = self.type_folders(ids, row.records(), 3);
            table.children.push(row_folder);
        }
        (!table.children.is_empty()).then_some(table)
    }

    /// Group records into type folders at `depth`, in first-seen label order
    fn type_folders<'a>(
        &self,
        ids: &mut NodeIdGen,
        records: impl IntoIterator<Item = &'a AttachmentRecord>,
        depth: usize,
    ) -> Vec<TreeNode> {
        let mut folders: Vec<(TreeNode, HashSet<String>)> = Vec::new();

        for record in records {
            let label = self.type_label(record);
            let slot = match folders.iter().position(|(f, _)| f.name == label) {
                Some(pos) => pos,
                None => {
                    let folder = TreeNode::container(ids.next_id(), label, NodeKind::Folder, depth);
                    folders.push((folder, HashSet::new()));
                    folders.len() - 1
                }
            };

            let (folder, taken) = &mut folders[slot];
            let info = FileInfo::from_record(record);
            let name = unique_name(&info.name, taken);
            if name != info.name {
                tracing::debug!(
                    folder = %folder.name,
                    original = %info.name,
                    renamed = %name,
                    "file name collision, suffixing"
                );
            }
            folder
                .children
                .push(TreeNode::file(ids.next_id(), name, depth + 1, Some(info)));
        }

        folders.into_iter().map(|(folder, _)| folder).collect()
    }

    fn type_label(&self, record: &AttachmentRecord) -> String {
        record
            .type_name
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty())
            .unwrap_or(&self.config.uncategorized_label)
            .to_string()
    }
}

fn warn_if_failed(response: &AttachmentResponse, source: &str) {
    if !response.is_success() {
        tracing::warn!(source, code = response.code, "attachment feed failed, skipping source");
    }
}
