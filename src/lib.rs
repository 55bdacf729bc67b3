//! # attachment-tree
//!
//! Hierarchical attachment editor and batch ZIP export for business forms.
//!
//! A form carries attachments in several places: the main form, group
//! sub-forms, and every row of its detail tables. This crate gathers those
//! feeds into one editable tree, lets the user reorganise it, and exports the
//! result as a single ZIP archive whose folder layout mirrors the tree.
//!
//! ## Design Philosophy
//!
//! - **Never lose the export** - a file that cannot be resolved or downloaded
//!   becomes an empty placeholder, and the archive is still produced
//! - **Rejected edits are harmless** - every tree edit validates first, so a
//!   failed edit leaves the tree exactly as it was
//! - **Explicit context** - everything the remote services need is passed in
//!   through [`ExportContext`], nothing is read from ambient state
//! - **Library-first** - no UI, consumers render [`Tree::visible_rows`] and
//!   watch the [`NoticeBoard`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use attachment_tree::{Config, DirectorySink, EditorSession, ExportContext, ExportPipeline};
//! use attachment_tree::types::{AttachmentResponse, AttachmentSources};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config: Config = serde_json::from_str(
//!         r#"{ "service": { "resolve_url": "https://files.example.com/api/urls" } }"#,
//!     )?;
//!     let main_feed: AttachmentResponse = serde_json::from_str(
//!         r#"{ "code": 200, "data": { "attachmentRecordList": [
//!             { "asrFid": "f-1", "asrName": "invoice.pdf", "typeName": "Invoice" }
//!         ] } }"#,
//!     )?;
//!     let sources = AttachmentSources {
//!         main: Some(main_feed),
//!         ..Default::default()
//!     };
//!
//!     let mut session = EditorSession::open(sources, &config)?;
//!     let root = session.tree().root().id();
//!     let folder = session.add_folder(root)?;
//!     session.rename(folder, "Extra")?;
//!
//!     let context = ExportContext {
//!         org_id: "org-1".to_string(),
//!         bus_type_code: Some("PO".to_string()),
//!         auth_token: Some("token".to_string()),
//!     };
//!     let pipeline = ExportPipeline::with_http(&config, context, session.records())?;
//!     let saved = session
//!         .export_and_save(&pipeline, &DirectorySink::new("exports"), CancellationToken::new())
//!         .await?;
//!     println!("saved to {} ({} placeholders)", saved.location, saved.report.failures.len());
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Batch export into a ZIP archive
pub mod export;
/// Transient user notices
pub mod notice;
/// Name and id lookup over the raw attachment feeds
pub mod record_map;
/// Retry logic with exponential backoff
pub mod retry;
/// Editing session facade
pub mod session;
/// Attachment tree model, builder, edits and search
pub mod tree;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use config::{BuilderConfig, Config, ExportConfig, NoticeConfig, RetryConfig, ServiceConfig};
pub use error::{Error, ExportError, Result, TreeError};
pub use export::{
    ArchiveBuilder, ContentFetcher, DirectorySink, ExportFailure, ExportOutcome, ExportPipeline,
    ExportReport, HttpContentFetcher, HttpUrlResolver, SaveSink, UrlResolver,
};
pub use notice::{Notice, NoticeBoard};
pub use record_map::AttachmentRecordMap;
pub use session::{EditorSession, SavedExport};
pub use tree::{FrozenTree, SearchState, Tree, TreeBuilder, TreeNode, TreeSearch, VisibleRow};
pub use types::{ExportContext, ExportEvent, FailureReason, Layout, NodeId, NodeKind, SearchMode};

/// Raise `token` when the process receives a termination signal.
///
/// Returns as soon as either the signal arrives or the token is cancelled by
/// someone else, so it can run alongside an export without outliving it.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use attachment_tree::cancel_on_signal;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() {
///     let cancel = CancellationToken::new();
///     tokio::spawn(cancel_on_signal(cancel.clone()));
///     // pass `cancel` to ExportPipeline::export
/// }
/// ```
pub async fn cancel_on_signal(token: tokio_util::sync::CancellationToken) {
    tokio::select! {
        _ = wait_for_signal() => {
            tracing::info!("cancelling export on shutdown signal");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Signal registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_on_signal_returns_when_token_is_cancelled_elsewhere() {
        let token = tokio_util::sync::CancellationToken::new();
        let watcher = tokio::spawn(cancel_on_signal(token.clone()));

        token.cancel();

        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .expect("watcher should stop once the token is cancelled")
            .unwrap();
    }
}
