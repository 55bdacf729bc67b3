//! Batch export of a frozen tree into one ZIP archive.
//!
//! The pipeline runs in four stages:
//! 1. plan: a pre-order walk turns containers into archive directories and
//!    file leaves into jobs
//! 2. metadata: each job takes the node's [`FileInfo`](crate::types::FileInfo),
//!    falling back to the [`AttachmentRecordMap`] by name
//! 3. resolve: file ids are turned into download URLs in batches through a
//!    [`UrlResolver`]
//! 4. fetch: contents are downloaded through a [`ContentFetcher`] with up to
//!    `max_concurrent_fetches` requests in flight
//!
//! A file that fails at any stage becomes a zero-byte placeholder and an
//! [`ExportFailure`] in the report; the walk always continues and the archive
//! is always assembled.

pub mod archive;
mod plan;
pub mod services;
pub mod sink;


use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::config::{Config, ExportConfig, RetryConfig};
use crate::error::{Error, ExportError, Result};
use crate::record_map::AttachmentRecordMap;
use crate::retry::fetch_with_retry;
use crate::tree::FrozenTree;
use crate::types::{ExportContext, ExportEvent, FailureReason, FileRef};

pub use archive::ArchiveBuilder;
pub use services::{ContentFetcher, HttpContentFetcher, HttpUrlResolver, UrlResolver};
pub use sink::{DirectorySink, SaveSink};

use plan::ExportPlan;

/// One file that ended up as a placeholder
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ExportFailure {
    /// Archive path of the placeholder
    pub path: String,
    /// What went wrong
    pub reason: FailureReason,
}

/// Per-file results of one export, in plan order
#[derive(Clone, Debug, Serialize)]
pub struct ExportReport {
    /// Number of file leaves in the frozen tree
    pub total_files: usize,
    /// Archive paths written with real content
    pub succeeded: Vec<String>,
    /// Files replaced by placeholders because something failed
    pub failures: Vec<ExportFailure>,
    /// Files never attempted because the export was cancelled
    pub skipped: Vec<String>,
    /// Whether the cancellation token was raised during the export
    pub cancelled: bool,
    /// When the walk started
    pub started_at: DateTime<Utc>,
    /// When the archive was assembled
    pub finished_at: DateTime<Utc>,
}

impl ExportReport {
    /// Every file made it into the archive with content
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }
}

/// A finished archive and its report
#[derive(Clone, Debug)]
pub struct ExportOutcome {
    /// Suggested file name, e.g. `attachments_20240301_102200.zip`
    pub file_name: String,
    /// ZIP bytes
    pub archive: Vec<u8>,
    /// Per-file results
    pub report: ExportReport,
}

#[derive(Debug)]
enum FileOutcome {
    Completed,
    Failed(FailureReason),
    Skipped,
}

#[derive(Debug)]
struct FileResult {
    index: usize,
    path: String,
    outcome: FileOutcome,
}

struct PendingFile {
    index: usize,
    path: String,
    file_ref: FileRef,
}

struct FetchJob {
    index: usize,
    path: String,
    url: String,
}

/// Export pipeline bound to one platform context and one set of collaborators
#[derive(Clone)]
pub struct ExportPipeline {
    config: ExportConfig,
    retry: RetryConfig,
    context: ExportContext,
    records: Arc<AttachmentRecordMap>,
    resolver: Arc<dyn UrlResolver>,
    fetcher: Arc<dyn ContentFetcher>,
    event_tx: broadcast::Sender<ExportEvent>,
}

impl ExportPipeline {
    /// Create a pipeline with explicit collaborators
    ///
    /// Fails with a config error when `config` does not validate.
    pub fn new(
        config: &Config,
        context: ExportContext,
        records: Arc<AttachmentRecordMap>,
        resolver: Arc<dyn UrlResolver>,
        fetcher: Arc<dyn ContentFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        let (event_tx, _rx) = broadcast::channel(config.export.event_capacity);
        Ok(Self {
            config: config.export.clone(),
            retry: config.retry.clone(),
            context,
            records,
            resolver,
            fetcher,
            event_tx,
        })
    }

    /// Create a pipeline talking HTTP to the endpoints in `config.service`
    pub fn with_http(
        config: &Config,
        context: ExportContext,
        records: Arc<AttachmentRecordMap>,
    ) -> Result<Self> {
        let resolver = HttpUrlResolver::new(&config.service)?;
        let fetcher = HttpContentFetcher::new(&config.service)?;
        Self::new(
            config,
            context,
            records,
            Arc::new(resolver),
            Arc::new(fetcher),
        )
    }

    /// Subscribe to progress events
    pub fn subscribe(&self) -> broadcast::Receiver<ExportEvent> {
        self.event_tx.subscribe()
    }

    /// Export `tree` into a ZIP archive
    ///
    /// Per-file failures never abort the export. Raising `cancel` stops new
    /// URL resolutions and fetches; files not yet attempted are written as
    /// placeholders and listed in [`ExportReport::skipped`]. The only errors
    /// are archive assembly failures and, with `require_success`, an export
    /// where no file could be downloaded.
    pub async fn export(&self, tree: &FrozenTree, cancel: CancellationToken) -> Result<ExportOutcome> {
        let started_at = Utc::now();
        let plan = ExportPlan::from_root(tree.root(), &self.records);
        let total_files = plan.files.len();
        let archive = Arc::new(ArchiveBuilder::new(
            plan.folders.clone(),
            plan.file_paths(),
            self.config.compress,
        ));

        tracing::info!(
            files = total_files,
            folders = plan.folders.len(),
            concurrency = self.config.max_concurrent_fetches,
            "export started"
        );
        self.emit(ExportEvent::Started {
            files: total_files,
            folders: plan.folders.len(),
        });

        let mut results = Vec::with_capacity(total_files);
        let mut pending = Vec::new();
        for job in plan.files {
            match job.info {
                Some(info) if info.has_file_id() => pending.push(PendingFile {
                    index: job.index,
                    path: job.path,
                    file_ref: info.file_ref(),
                }),
                _ => results.push(self.settle(
                    &archive,
                    job.index,
                    job.path,
                    FileOutcome::Failed(FailureReason::MissingMetadata),
                )),
            }
        }

        let fetch_jobs = self
            .resolve_urls(pending, &archive, &cancel, &mut results)
            .await;

        let this = self;
        let fetched: Vec<FileResult> = stream::iter(fetch_jobs)
            .map(|job| {
                let archive = Arc::clone(&archive);
                let cancel = cancel.clone();
                async move { this.fetch_one(job, &archive, &cancel).await }
            })
            .buffer_unordered(self.config.max_concurrent_fetches.max(1))
            .collect()
            .await;
        results.extend(fetched);
        results.sort_by_key(|r| r.index);

        let mut report = ExportReport {
            total_files,
            succeeded: Vec::new(),
            failures: Vec::new(),
            skipped: Vec::new(),
            cancelled: cancel.is_cancelled(),
            started_at,
            finished_at: started_at,
        };
        for result in results {
            match result.outcome {
                FileOutcome::Completed => report.succeeded.push(result.path),
                FileOutcome::Failed(reason) => report.failures.push(ExportFailure {
                    path: result.path,
                    reason,
                }),
                FileOutcome::Skipped => report.skipped.push(result.path),
            }
        }

        self.emit(ExportEvent::Finished {
            succeeded: report.succeeded.len(),
            failed: report.failures.len(),
            skipped: report.skipped.len(),
        });

        if self.config.require_success && report.succeeded.is_empty() {
            tracing::warn!(files = total_files, "export produced no downloaded file");
            return Err(ExportError::NothingDownloaded {
                attempted: total_files,
            }
            .into());
        }

        let bytes = tokio::task::spawn_blocking({
            let archive = Arc::clone(&archive);
            move || archive.finish()
        })
        .await
        .map_err(|e| Error::from(ExportError::TaskFailed(e.to_string())))??;

        report.finished_at = Utc::now();
        let file_name = format!(
            "{}_{}.zip",
            self.config.archive_name_prefix,
            tree.frozen_at().format("%Y%m%d_%H%M%S")
        );

        tracing::info!(
            file_name = %file_name,
            bytes = bytes.len(),
            succeeded = report.succeeded.len(),
            failed = report.failures.len(),
            skipped = report.skipped.len(),
            cancelled = report.cancelled,
            "export finished"
        );

        Ok(ExportOutcome {
            file_name,
            archive: bytes,
            report,
        })
    }

    /// Resolve download URLs in batches; files that cannot be fetched settle here
    async fn resolve_urls(
        &self,
        pending: Vec<PendingFile>,
        archive: &ArchiveBuilder,
        cancel: &CancellationToken,
        results: &mut Vec<FileResult>,
    ) -> Vec<FetchJob> {
        let mut jobs = Vec::with_capacity(pending.len());

        for chunk in pending.chunks(self.config.resolve_batch_size.max(1)) {
            if cancel.is_cancelled() {
                for file in chunk {
                    results.push(self.settle(archive, file.index, file.path.clone(), FileOutcome::Skipped));
                }
                continue;
            }

            let refs: Vec<FileRef> = chunk.iter().map(|f| f.file_ref.clone()).collect();
            match self.resolver.resolve(&self.context, &refs).await {
                Ok(urls) => {
                    for file in chunk {
                        match urls.get(&file.file_ref.file_id) {
                            Some(url) => jobs.push(FetchJob {
                                index: file.index,
                                path: file.path.clone(),
                                url: url.clone(),
                            }),
                            None => results.push(self.settle(
                                archive,
                                file.index,
                                file.path.clone(),
                                FileOutcome::Failed(FailureReason::UrlUnavailable),
                            )),
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!(files = chunk.len(), error = %e, "URL resolution batch failed");
                    for file in chunk {
                        results.push(self.settle(
                            archive,
                            file.index,
                            file.path.clone(),
                            FileOutcome::Failed(FailureReason::UrlResolution(e.to_string())),
                        ));
                    }
                }
            }
        }

        jobs
    }

    async fn fetch_one(
        &self,
        job: FetchJob,
        archive: &ArchiveBuilder,
        cancel: &CancellationToken,
    ) -> FileResult {
        let FetchJob { index, path, url } = job;
        if cancel.is_cancelled() {
            return self.settle(archive, index, path, FileOutcome::Skipped);
        }

        let fetcher = &*self.fetcher;
        let ctx = &self.context;
        let url = url.as_str();
        match fetch_with_retry(&self.retry, move || fetcher.fetch(ctx, url)).await {
            Ok(bytes) => {
                let len = bytes.len() as u64;
                archive.add_file(&path, bytes);
                tracing::debug!(path = %path, bytes = len, "file exported");
                self.emit(ExportEvent::FileCompleted {
                    path: path.clone(),
                    bytes: len,
                });
                FileResult {
                    index,
                    path,
                    outcome: FileOutcome::Completed,
                }
            }
            Err(e) => self.settle(
                archive,
                index,
                path,
                FileOutcome::Failed(FailureReason::FetchFailed(e.to_string())),
            ),
        }
    }

    /// Write the placeholder for a file that did not complete and report it
    fn settle(
        &self,
        archive: &ArchiveBuilder,
        index: usize,
        path: String,
        outcome: FileOutcome,
    ) -> FileResult {
        match &outcome {
            FileOutcome::Completed => {}
            FileOutcome::Failed(reason) => {
                archive.add_placeholder(&path);
                tracing::warn!(path = %path, reason = %reason, "file replaced by placeholder");
                self.emit(ExportEvent::FileFailed {
                    path: path.clone(),
                    reason: reason.clone(),
                });
            }
            FileOutcome::Skipped => {
                archive.add_placeholder(&path);
                tracing::debug!(path = %path, "export cancelled, file skipped");
            }
        }
        FileResult {
            index,
            path,
            outcome,
        }
    }

    fn emit(&self, event: ExportEvent) {
        self.event_tx.send(event).ok();
    }
}
