//! Name → metadata lookup over the original attachment feeds.
//!
//! The export walk prefers the metadata copied into each file node. Nodes the
//! user added by hand carry none, so the walk falls back to this map, keyed by
//! decoded file name (and by the raw encoded name when it differs).

use std::collections::HashMap;

use crate::types::{AttachmentSources, FileInfo};

/// Flattened lookup of every attachment record across main, group and detail feeds
#[derive(Clone, Debug, Default)]
pub struct AttachmentRecordMap {
    records: Vec<FileInfo>,
    by_name: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl AttachmentRecordMap {
    /// Flatten all successful feeds of `sources`
    ///
    /// When two records share a name the first one (in main, group, detail
    /// order) wins the name lookup; both stay reachable by file id.
    pub fn from_sources(sources: &AttachmentSources) -> Self {
        let mut map = Self::default();
        for record in sources.all_records() {
            map.insert(FileInfo::from_record(record));
        }
        tracing::debug!(
            records = map.records.len(),
            names = map.by_name.len(),
            "built attachment record map"
        );
        map
    }

    /// Add one record
    pub fn insert(&mut self, info: FileInfo) {
        let index = self.records.len();

        if let Some(existing) = self.by_name.get(&info.name) {
            tracing::debug!(
                name = %info.name,
                kept = %self.records[*existing].file_id,
                ignored = %info.file_id,
                "duplicate attachment name, keeping first record for name lookup"
            );
        } else {
            self.by_name.insert(info.name.clone(), index);
        }
        if info.encoded_name != info.name {
            self.by_name.entry(info.encoded_name.clone()).or_insert(index);
        }
        if info.has_file_id() {
            self.by_id.entry(info.file_id.clone()).or_insert(index);
        }

        self.records.push(info);
    }

    /// Look up metadata by decoded (or raw encoded) file name
    pub fn get_by_name(&self, name: &str) -> Option<&FileInfo> {
        self.by_name.get(name).map(|&i| &self.records[i])
    }

    /// Look up metadata by remote file id
    pub fn get_by_id(&self, file_id: &str) -> Option<&FileInfo> {
        self.by_id.get(file_id).map(|&i| &self.records[i])
    }

    /// Number of records, duplicates included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record was found in any feed
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in source order
    pub fn iter(&self) -> impl Iterator<Item = &FileInfo> {
        self.records.iter()
    }
}
