//! # Notifications
//!
//! Every user-visible outcome leaves the sync layer as a [`Notice`]: a
//! transient success/error/info message. Nothing else surfaces failures.

use dreamos_core::{Notice, NoticeKind};
use std::sync::Mutex;
use tracing::{error, info};

/// Receiver of transient user notifications (toasts).
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}

/// Drops every notice.
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn notify(&self, _notice: Notice) {}
}

/// Writes notices to the log. Used by the headless agent.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, notice: Notice) {
        match notice.kind {
            NoticeKind::Error => error!(target: "dreamos::notice", "{}", notice.message),
            NoticeKind::Success | NoticeKind::Info => {
                info!(target: "dreamos::notice", kind = ?notice.kind, "{}", notice.message)
            }
        }
    }
}

/// Keeps every notice in memory, oldest first.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        RecordingNotifier::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().map(|n| n.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<Notice> {
        self.notices.lock().ok().and_then(|n| n.last().cloned())
    }

    pub fn count(&self, kind: NoticeKind) -> usize {
        self.notices
            .lock()
            .map(|n| n.iter().filter(|x| x.kind == kind).count())
            .unwrap_or(0)
    }

    pub fn clear(&self) {
        if let Ok(mut n) = self.notices.lock() {
            n.clear();
        }
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        if let Ok(mut n) = self.notices.lock() {
            n.push(notice);
        }
    }
}
