//! Turn a frozen tree into archive directories and file jobs.

use std::collections::HashSet;

use crate::record_map::AttachmentRecordMap;
use crate::tree::TreeNode;
use crate::types::FileInfo;
use crate::utils::{sanitize_segment, unique_name};

/// One file leaf to export
#[derive(Clone, Debug)]
pub(crate) struct FileJob {
    /// Position in plan order, which is also the archive entry order
    pub index: usize,
    /// Archive path, `/`-separated
    pub path: String,
    /// Metadata from the node, else from the record map by name
    pub info: Option<FileInfo>,
}

/// Archive layout derived from a pre-order walk
#[derive(Clone, Debug, Default)]
pub(crate) struct ExportPlan {
    /// Directory paths in pre-order, each ending in `/`
    pub folders: Vec<String>,
    /// File jobs in pre-order
    pub files: Vec<FileJob>,
}

impl ExportPlan {
    /// Walk `root`; every container becomes a directory, every file a job
    pub fn from_root(root: &TreeNode, records: &AttachmentRecordMap) -> Self {
        let mut plan = Self::default();
        let top = format!("{}/", sanitize_segment(root.name()));
        plan.walk(root, &top, records);
        plan
    }

    /// Archive paths of every file job, in plan order
    pub fn file_paths(&self) -> Vec<String> {
        self.files.iter().map(|job| job.path.clone()).collect()
    }

    fn walk(&mut self, node: &TreeNode, dir: &str, records: &AttachmentRecordMap) {
        self.folders.push(dir.to_string());

        let mut taken = HashSet::new();
        for child in node.children() {
            let segment = unique_name(&sanitize_segment(child.name()), &mut taken);
            if child.is_container() {
                self.walk(child, &format!("{dir}{segment}/"), records);
            } else {
                let info = child
                    .file_info()
                    .cloned()
                    .or_else(|| records.get_by_name(child.name()).cloned());
                self.files.push(FileJob {
                    index: self.files.len(),
                    path: format!("{dir}{segment}"),
                    info,
                });
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::Tree;
    use crate::types::{AttachmentRecord, FileInfo};

    #[test]
    fn plan_is_pre_order_with_root_as_top_folder() {
        let mut tree = Tree::new("Attachments", "New Folder");
        let root = tree.root().id();
        let docs = tree.add_folder(root).unwrap();
        tree.rename(docs, "Docs").unwrap();
        let nested = tree.add_folder(docs).unwrap();
        tree.rename(nested, "Old").unwrap();
        tree.add_file_reference(nested, "a.txt").unwrap();
        tree.add_file_reference(docs, "b.txt").unwrap();

        let plan = ExportPlan::from_root(tree.freeze().root(), &AttachmentRecordMap::default());

        assert_eq!(
            plan.folders,
            vec!["Attachments/", "Attachments/Docs/", "Attachments/Docs/Old/"]
        );
        assert_eq!(
            plan.file_paths(),
            vec!["Attachments/Docs/Old/a.txt", "Attachments/Docs/b.txt"]
        );
    }

    #[test]
    fn user_renamed_sibling_collisions_are_suffixed() {
        let mut tree = Tree::new("Attachments", "New Folder");
        let root = tree.root().id();
        tree.add_file_reference(root, "x.pdf").unwrap();
        let second = tree.add_file_reference(root, "y.pdf").unwrap();
        tree.rename(second, "x.pdf").unwrap();

        let plan = ExportPlan::from_root(tree.freeze().root(), &AttachmentRecordMap::default());

        assert_eq!(
            plan.file_paths(),
            vec!["Attachments/x.pdf", "Attachments/x (1).pdf"]
        );
    }

    #[test]
    fn separators_in_names_do_not_create_directories() {
        let mut tree = Tree::new("Attachments", "New Folder");
        let root = tree.root().id();
        tree.add_file_reference(root, "../evil/name.txt").unwrap();

        let plan = ExportPlan::from_root(tree.freeze().root(), &AttachmentRecordMap::default());

        assert_eq!(plan.file_paths(), vec!["Attachments/.._evil_name.txt"]);
    }

    #[test]
    fn leaves_without_metadata_fall_back_to_record_map() {
        let mut tree = Tree::new("Attachments", "New Folder");
        let root = tree.root().id();
        tree.add_file_reference(root, "known.pdf").unwrap();
        tree.add_file_reference(root, "unknown.pdf").unwrap();

        let mut records = AttachmentRecordMap::default();
        records.insert(FileInfo::from_record(&AttachmentRecord {
            asr_fid: "fid-7".to_string(),
            asr_name: "known.pdf".to_string(),
            ..Default::default()
        }));

        let plan = ExportPlan::from_root(tree.freeze().root(), &records);

        assert_eq!(plan.files[0].info.as_ref().unwrap().file_id, "fid-7");
        assert!(plan.files[1].info.is_none());
        assert_eq!(plan.files[1].index, 1);
    }
}
