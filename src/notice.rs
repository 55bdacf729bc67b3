//! Transient user notices.
//!
//! One notice is visible at a time: posting replaces whatever is showing, and
//! each notice dismisses itself after the configured display duration.
//! Posting never blocks and never fails.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;

/// Something worth telling the user
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum Notice {
    /// A search matched files
    SearchResults {
        /// Number of matches
        count: usize,
    },
    /// A search matched nothing
    NoSearchResults {
        /// The searched keyword
        keyword: String,
    },
    /// A node and its subtree were deleted
    NodeDeleted {
        /// Name of the deleted node
        name: String,
    },
    /// A node was moved
    NodeMoved {
        /// Name of the moved node
        name: String,
        /// Name of the new parent
        target: String,
    },
    /// An edit was rejected and the tree left untouched
    EditRejected {
        /// Why it was rejected
        reason: String,
    },
    /// The tree was rebuilt from the sources
    Restored,
    /// The export archive was saved
    ExportSucceeded {
        /// Where the archive was saved
        location: String,
        /// Number of placeholder files
        failed: usize,
    },
    /// The export produced no archive
    ExportFailed {
        /// Why it failed
        reason: String,
    },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::SearchResults { count } => write!(f, "{} found", count),
            Notice::NoSearchResults { keyword } => write!(f, "nothing matches \"{}\"", keyword),
            Notice::NodeDeleted { name } => write!(f, "\"{}\" deleted", name),
            Notice::NodeMoved { name, target } => write!(f, "\"{}\" moved to \"{}\"", name, target),
            Notice::EditRejected { reason } => write!(f, "not allowed: {}", reason),
            Notice::Restored => write!(f, "default layout restored"),
            Notice::ExportSucceeded { location, failed: 0 } => {
                write!(f, "export succeeded, saved to {}", location)
            }
            Notice::ExportSucceeded { location, failed } => write!(
                f,
                "export succeeded with {} placeholder file(s), saved to {}",
                failed, location
            ),
            Notice::ExportFailed { reason } => write!(f, "export failed: {}", reason),
        }
    }
}

/// A notice as currently displayed
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostedNotice {
    /// Sequence number, increasing with every post
    pub seq: u64,
    /// The notice
    pub notice: Notice,
    /// When it was posted
    pub posted_at: DateTime<Utc>,
}

/// Single-slot notification surface
#[derive(Clone, Debug)]
pub struct NoticeBoard {
    tx: Arc<watch::Sender<Option<PostedNotice>>>,
    seq: Arc<AtomicU64>,
    display_duration: Duration,
}

impl NoticeBoard {
    /// Create an empty board whose notices last `display_duration`
    pub fn new(display_duration: Duration) -> Self {
        let (tx, _rx) = watch::channel(None);
        Self {
            tx: Arc::new(tx),
            seq: Arc::new(AtomicU64::new(0)),
            display_duration,
        }
    }

    /// Show `notice`, replacing the current one
    ///
    /// Inside a tokio runtime a timer dismisses the notice after the display
    /// duration, unless a newer notice replaced it first. Outside a runtime
    /// the notice stays until replaced or dismissed.
    pub fn post(&self, notice: Notice) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(seq, notice = %notice, "posting notice");
        self.tx.send_replace(Some(PostedNotice {
            seq,
            notice,
            posted_at: Utc::now(),
        }));

        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let tx = Arc::clone(&self.tx);
            let duration = self.display_duration;
            handle.spawn(async move {
                tokio::time::sleep(duration).await;
                dismiss_if_current(&tx, seq);
            });
        }
    }

    /// Hide the current notice
    pub fn dismiss(&self) {
        self.tx.send_replace(None);
    }

    /// The notice currently showing
    pub fn current(&self) -> Option<Notice> {
        self.tx.borrow().as_ref().map(|posted| posted.notice.clone())
    }

    /// Watch the board; the value is `None` while nothing is showing
    pub fn subscribe(&self) -> watch::Receiver<Option<PostedNotice>> {
        self.tx.subscribe()
    }
}

fn dismiss_if_current(tx: &watch::Sender<Option<PostedNotice>>, seq: u64) {
    tx.send_if_modified(|current| match current {
        Some(posted) if posted.seq == seq => {
            *current = None;
            true
        }
        _ => false,
    });
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newer_notice_replaces_older() {
        let board = NoticeBoard::new(Duration::from_secs(3));
        board.post(Notice::Restored);
        board.post(Notice::SearchResults { count: 4 });

        assert_eq!(board.current(), Some(Notice::SearchResults { count: 4 }));
        assert_eq!(board.current().unwrap().to_string(), "4 found");
    }

    #[tokio::test]
    async fn notice_dismisses_itself() {
        let board = NoticeBoard::new(Duration::from_millis(50));
        board.post(Notice::Restored);
        assert!(board.current().is_some());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(board.current(), None);
    }

    #[tokio::test]
    async fn stale_timer_does_not_dismiss_replacement() {
        let board = NoticeBoard::new(Duration::from_millis(200));
        board.post(Notice::Restored);
        tokio::time::sleep(Duration::from_millis(120)).await;
        board.post(Notice::NodeDeleted {
            name: "scan.pdf".to_string(),
        });

        // the first notice's timer has fired by now
        tokio::time::sleep(Duration::from_millis(120)).await;
        assert_eq!(
            board.current(),
            Some(Notice::NodeDeleted {
                name: "scan.pdf".to_string()
            })
        );

        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(board.current(), None);
    }

    #[tokio::test]
    async fn subscribers_see_posts() {
        let board = NoticeBoard::new(Duration::from_secs(60));
        let mut rx = board.subscribe();

        board.post(Notice::ExportFailed {
            reason: "disk full".to_string(),
        });
        rx.changed().await.unwrap();

        let posted = rx.borrow().clone().unwrap();
        assert_eq!(posted.seq, 1);
        assert_eq!(posted.notice.to_string(), "export failed: disk full");
    }
}
