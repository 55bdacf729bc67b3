//! Core types for attachment-tree

use serde::{Deserialize, Deserializer, Serialize};

use crate::utils::decode_file_name;

/// Response code the platform uses for a successful feed
pub const SUCCESS_CODE: i64 = 200;

/// Stable identifier of a tree node, never reused within an editing session
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of a tree node
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The single top-level node
    Root,
    /// A container created from a source, type label, row, or by the user
    Folder,
    /// A leaf standing for one remote attachment
    File,
}

impl NodeKind {
    /// Whether nodes of this kind may own children
    pub fn is_container(self) -> bool {
        matches!(self, NodeKind::Root | NodeKind::Folder)
    }
}

/// How detail-table rows are laid out in the tree
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// Table → `Row N` → type → files
    #[default]
    RowGrouped,
    /// Table → type → files, rows merged
    RowFlattened,
}

/// Field matched by a tree search
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    /// Match the file node's display name
    #[default]
    Filename,
    /// Match the attachment's remark
    Remark,
}

/// One uploaded file as returned by an attachment feed
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRecord {
    /// Remote file id
    #[serde(default, deserialize_with = "string_or_number")]
    pub asr_fid: String,
    /// File name, possibly percent-encoded
    #[serde(default)]
    pub asr_name: String,
    /// Size in bytes
    #[serde(default, deserialize_with = "optional_size")]
    pub asr_size: Option<u64>,
    /// Upload timestamp as sent by the platform
    #[serde(default)]
    pub asr_filldt: Option<String>,
    /// Declared attachment type
    #[serde(default)]
    pub type_name: Option<String>,
    /// Free-text remark
    #[serde(default)]
    pub asr_remark: Option<String>,
    /// Upload session guid
    #[serde(default)]
    pub asr_session_guid: Option<String>,
    /// Business type code
    #[serde(default, rename = "bustypecode")]
    pub bus_type_code: Option<String>,
}

/// Payload of an attachment feed
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentData {
    /// Records in upload order
    #[serde(default)]
    pub attachment_record_list: Vec<AttachmentRecord>,
}

/// Response of an attachment feed (`{ code, data: { attachmentRecordList } }`)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentResponse {
    /// Platform status code, 200 on success
    pub code: i64,
    /// Payload, absent on failure
    #[serde(default)]
    pub data: Option<AttachmentData>,
}

impl AttachmentResponse {
    /// Build a successful response around the given records
    pub fn ok(records: Vec<AttachmentRecord>) -> Self {
        Self {
            code: SUCCESS_CODE,
            data: Some(AttachmentData {
                attachment_record_list: records,
            }),
        }
    }

    /// Build a failed response carrying no data
    pub fn failed(code: i64) -> Self {
        Self { code, data: None }
    }

    /// Whether the feed succeeded
    pub fn is_success(&self) -> bool {
        self.code == SUCCESS_CODE
    }

    /// Records of a successful response; empty for failed ones
    pub fn records(&self) -> &[AttachmentRecord] {
        match (&self.data, self.is_success()) {
            (Some(data), true) => &data.attachment_record_list,
            _ => &[],
        }
    }
}

/// A named group sub-form and its feed
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GroupSource {
    /// Folder name for this group
    pub name: String,
    /// The group's attachment feed
    pub response: AttachmentResponse,
}

/// A named detail table, one feed per row
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetailSource {
    /// Folder name for this table
    pub name: String,
    /// Row feeds in row order; each may fail independently
    pub rows: Vec<AttachmentResponse>,
}

/// Every raw attachment feed of one form
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttachmentSources {
    /// Main form feed
    #[serde(default)]
    pub main: Option<AttachmentResponse>,
    /// Group sub-form feeds
    #[serde(default)]
    pub groups: Vec<GroupSource>,
    /// Detail table feeds
    #[serde(default)]
    pub details: Vec<DetailSource>,
}

impl AttachmentSources {
    /// Iterate every record of every successful feed
    pub fn all_records(&self) -> impl Iterator<Item = &AttachmentRecord> {
        self.main
            .iter()
            .flat_map(|r| r.records())
            .chain(self.groups.iter().flat_map(|g| g.response.records()))
            .chain(
                self.details
                    .iter()
                    .flat_map(|d| d.rows.iter().flat_map(|r| r.records())),
            )
    }

    /// Total number of attachment records across all sources
    pub fn file_count(&self) -> usize {
        self.all_records().count()
    }
}

/// Immutable metadata snapshot copied into a file node at build time
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    /// Remote file id
    pub file_id: String,
    /// Name as received, possibly percent-encoded
    pub encoded_name: String,
    /// Decoded display name
    pub name: String,
    /// Size in bytes
    pub size: Option<u64>,
    /// Upload timestamp as sent by the platform
    pub uploaded_at: Option<String>,
    /// Declared attachment type
    pub type_name: Option<String>,
    /// Free-text remark
    pub remark: Option<String>,
    /// Upload session guid
    pub session_guid: Option<String>,
    /// Business type code
    pub bus_type_code: Option<String>,
}

impl FileInfo {
    /// Copy the fields of a raw record, decoding its name
    pub fn from_record(record: &AttachmentRecord) -> Self {
        Self {
            file_id: record.asr_fid.clone(),
            encoded_name: record.asr_name.clone(),
            name: decode_file_name(&record.asr_name),
            size: record.asr_size,
            uploaded_at: record.asr_filldt.clone(),
            type_name: record.type_name.clone(),
            remark: record.asr_remark.clone(),
            session_guid: record.asr_session_guid.clone(),
            bus_type_code: record.bus_type_code.clone(),
        }
    }

    /// Whether the metadata carries a usable remote file id
    pub fn has_file_id(&self) -> bool {
        !self.file_id.trim().is_empty()
    }

    /// The identifiers the URL-resolution service needs
    pub fn file_ref(&self) -> FileRef {
        FileRef {
            file_id: self.file_id.clone(),
            session_guid: self.session_guid.clone(),
            bus_type_code: self.bus_type_code.clone(),
        }
    }
}

/// Identifiers sent to the URL-resolution service for one file
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRef {
    /// Remote file id
    pub file_id: String,
    /// Upload session guid
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_guid: Option<String>,
    /// Business type code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bus_type_code: Option<String>,
}

/// Caller-supplied platform context for outbound requests
///
/// Replaces any lookup of ambient session state: everything the remote
/// services need is passed in explicitly.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportContext {
    /// Organisation id
    pub org_id: String,
    /// Business type of the form being exported
    #[serde(default)]
    pub bus_type_code: Option<String>,
    /// Auth token sent with every request
    #[serde(default, skip_serializing)]
    pub auth_token: Option<String>,
}

/// Why one file leaf ended up as a placeholder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    /// Neither the node nor the record map provided a file id
    MissingMetadata,
    /// The resolution service answered but had no URL for this id
    UrlUnavailable,
    /// The resolution request itself failed
    UrlResolution(String),
    /// Fetching the resolved URL failed
    FetchFailed(String),
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureReason::MissingMetadata => write!(f, "missing file metadata"),
            FailureReason::UrlUnavailable => write!(f, "no download URL returned"),
            FailureReason::UrlResolution(e) => write!(f, "URL resolution failed: {}", e),
            FailureReason::FetchFailed(e) => write!(f, "download failed: {}", e),
        }
    }
}

/// Progress events emitted by the export pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExportEvent {
    /// The walk finished planning
    Started {
        /// Number of file leaves
        files: usize,
        /// Number of archive folders
        folders: usize,
    },
    /// A file's content was written to the archive
    FileCompleted {
        /// Archive path
        path: String,
        /// Bytes written
        bytes: u64,
    },
    /// A file was replaced by a placeholder
    FileFailed {
        /// Archive path
        path: String,
        /// Failure cause
        reason: FailureReason,
    },
    /// The archive was assembled
    Finished {
        /// Files with real content
        succeeded: usize,
        /// Files replaced by placeholders because of a failure
        failed: usize,
        /// Files never attempted because the export was cancelled
        skipped: usize,
    },
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Null => Ok(String::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn optional_size<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => Ok(n.as_u64()),
        serde_json::Value::String(s) => Ok(s.trim().parse().ok()),
        _ => Ok(None),
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_platform_feed() {
        let json = r#"{
            "code": 200,
            "data": {
                "attachmentRecordList": [
                    {
                        "asrFid": "f-1",
                        "asrName": "invoice%20march.pdf",
                        "asrSize": 2048,
                        "asrFilldt": "2024-03-01 10:22:00",
                        "typeName": "Invoice",
                        "asrRemark": "paid",
                        "asrSessionGuid": "sess-9",
                        "bustypecode": "PO",
                        "someOtherField": true
                    },
                    { "asrFid": 42, "asrName": "scan.png", "asrSize": "17" }
                ]
            }
        }"#;
        let response: AttachmentResponse = serde_json::from_str(json).unwrap();

        assert!(response.is_success());
        let records = response.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].asr_fid, "f-1");
        assert_eq!(records[0].asr_size, Some(2048));
        assert_eq!(records[0].bus_type_code.as_deref(), Some("PO"));
        assert_eq!(records[1].asr_fid, "42");
        assert_eq!(records[1].asr_size, Some(17));
        assert_eq!(records[1].type_name, None);
    }

    #[test]
    fn failed_response_exposes_no_records() {
        let json = r#"{ "code": 500, "data": { "attachmentRecordList": [ { "asrFid": "x" } ] } }"#;
        let response: AttachmentResponse = serde_json::from_str(json).unwrap();

        assert!(!response.is_success());
        assert!(response.records().is_empty());
    }

    #[test]
    fn file_info_decodes_name_and_keeps_encoded_original() {
        let record = AttachmentRecord {
            asr_fid: "f-1".to_string(),
            asr_name: "r%C3%A9sum%C3%A9.pdf".to_string(),
            ..Default::default()
        };
        let info = FileInfo::from_record(&record);

        assert_eq!(info.name, "résumé.pdf");
        assert_eq!(info.encoded_name, "r%C3%A9sum%C3%A9.pdf");
        assert!(info.has_file_id());
    }

    #[test]
    fn sources_count_only_successful_feeds() {
        let record = AttachmentRecord {
            asr_fid: "a".to_string(),
            asr_name: "a.txt".to_string(),
            ..Default::default()
        };
        let sources = AttachmentSources {
            main: Some(AttachmentResponse::ok(vec![record.clone()])),
            groups: vec![],
            details: vec![DetailSource {
                name: "Lines".to_string(),
                rows: vec![
                    AttachmentResponse::ok(vec![record.clone(), record]),
                    AttachmentResponse::failed(500),
                ],
            }],
        };

        assert_eq!(sources.file_count(), 3);
    }

    #[test]
    fn auth_token_is_never_serialized() {
        let ctx = ExportContext {
            org_id: "org-1".to_string(),
            bus_type_code: None,
            auth_token: Some("secret".to_string()),
        };
        let json = serde_json::to_string(&ctx).unwrap();
        assert!(!json.contains("secret"));
    }
}
