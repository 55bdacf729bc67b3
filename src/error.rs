//! Error types for attachment-tree
//!
//! This module provides error handling for the library:
//! - [`TreeError`] for rejected edits (user-input mistakes, never corrupting the tree)
//! - [`ExportError`] for export-level failures
//! - [`Error`], the top-level type returned by fallible I/O operations
//!
//! Per-file export failures are not errors at all: they are recorded in the
//! export report (see [`crate::export::ExportReport`]) and the walk continues.

use crate::types::NodeId;
use thiserror::Error;

/// Result type alias for attachment-tree operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for attachment-tree
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "resolve_url")
        key: Option<String>,
    },

    /// No attachment source contributed a single file, the editor cannot open
    #[error("no attachments found in any source")]
    NoAttachments,

    /// A tree edit was rejected
    #[error("tree edit rejected: {0}")]
    Tree(#[from] TreeError),

    /// Export-level failure
    #[error("export error: {0}")]
    Export(#[from] ExportError),

    /// A remote service answered with a non-success code
    #[error("service error: {0}")]
    Service(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Archive writer error
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Rejected tree edits
///
/// Every variant means the tree was left exactly as it was before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// No node with this id exists in the tree
    #[error("node {0} not found")]
    NodeNotFound(NodeId),

    /// The new name was empty after trimming
    #[error("name must not be empty")]
    EmptyName,

    /// The root node cannot be deleted or moved
    #[error("the root node cannot be deleted or moved")]
    RootImmutable,

    /// Files cannot own children
    #[error("node {0} is a file and cannot contain children")]
    NotAContainer(NodeId),

    /// A node cannot be moved onto itself
    #[error("node {0} cannot be moved onto itself")]
    SameNode(NodeId),

    /// The move target lies inside the dragged subtree
    #[error("cannot move node {dragged} into its own descendant {target}")]
    CycleDetected {
        /// The node being moved
        dragged: NodeId,
        /// The requested new parent
        target: NodeId,
    },
}

/// Export-level errors (not per-file failures)
#[derive(Debug, Error)]
pub enum ExportError {
    /// Every attempted file failed and the caller asked for at least one success
    #[error("none of the {attempted} files could be downloaded")]
    NothingDownloaded {
        /// Number of file leaves the walk visited
        attempted: usize,
    },

    /// The background fetch task panicked or was aborted
    #[error("export task failed: {0}")]
    TaskFailed(String),
}

impl Error {
    /// Machine-readable error code, stable across releases
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::Config { .. } => "config_error",
            Error::NoAttachments => "no_attachments",
            Error::Tree(e) => match e {
                TreeError::NodeNotFound(_) => "node_not_found",
                TreeError::EmptyName => "empty_name",
                TreeError::RootImmutable => "root_immutable",
                TreeError::NotAContainer(_) => "not_a_container",
                TreeError::SameNode(_) => "same_node",
                TreeError::CycleDetected { .. } => "cycle_detected",
            },
            Error::Export(e) => match e {
                ExportError::NothingDownloaded { .. } => "nothing_downloaded",
                ExportError::TaskFailed(_) => "export_task_failed",
            },
            Error::Service(_) => "service_error",
            Error::Io(_) => "io_error",
            Error::Network(_) => "network_error",
            Error::Serialization(_) => "serialization_error",
            Error::Archive(_) => "archive_error",
            Error::Other(_) => "internal_error",
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tree_errors_convert_and_keep_their_code() {
        let err: Error = TreeError::CycleDetected {
            dragged: NodeId(3),
            target: NodeId(7),
        }
        .into();

        assert_eq!(err.error_code(), "cycle_detected");
        assert_eq!(
            err.to_string(),
            "tree edit rejected: cannot move node 3 into its own descendant 7"
        );
    }

    #[test]
    fn export_error_message_mentions_attempt_count() {
        let err: Error = ExportError::NothingDownloaded { attempted: 4 }.into();

        assert_eq!(err.error_code(), "nothing_downloaded");
        assert!(err.to_string().contains("4 files"));
    }

    #[test]
    fn io_errors_map_to_io_code() {
        let err: Error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone").into();
        assert_eq!(err.error_code(), "io_error");
    }

    #[test]
    fn config_error_displays_message() {
        let err = Error::Config {
            message: "resolve_url must not be empty".to_string(),
            key: Some("resolve_url".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "configuration error: resolve_url must not be empty"
        );
        assert_eq!(err.error_code(), "config_error");
    }
}
