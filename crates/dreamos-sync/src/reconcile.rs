//! # Reconciliation Engine
//!
//! Replays the sync queue against the remote store and then refreshes every
//! cached collection.
//!
//! ## Drain Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Reconciliation Engine                            │
//! │                                                                         │
//! │  trigger: connectivity Online event  |  explicit "sync now"             │
//! │                               │                                         │
//! │                               ▼                                         │
//! │   offline? ──yes──► Skipped(Offline)                                    │
//! │   draining? ─yes──► Skipped(AlreadyDraining)                            │
//! │   queue empty? yes► Skipped(EmptyQueue)        (no remote calls)        │
//! │                               │                                         │
//! │                               ▼                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │  for m in queue (FIFO):                                         │   │
//! │  │     Insert → remote.insert(table, payload)                      │   │
//! │  │     Update → remote.update(table, payload, payload.id)          │   │
//! │  │     Delete → remote.delete(table, payload.id)                   │   │
//! │  │     failure → logged, counted, next mutation                    │   │
//! │  │     yield                                                       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                               │                                         │
//! │                               ▼                                         │
//! │   ClearAll:     clear whole queue                                       │
//! │   RetainFailed: remove confirmed mutations only                         │
//! │                               │                                         │
//! │                               ▼                                         │
//! │   refresh all collections → success notice → Completed(report)          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! With the default `ClearAll` policy a failed mutation is dropped together
//! with the rest of the batch and the notice still reports success.

use chrono::{DateTime, Utc};
use dreamos_core::{Collection, MutationAction, MutationId, Notice, QueuedMutation};
use dreamos_db::SyncQueueRepository;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::DrainPolicy;
use crate::connectivity::ConnectivityOracle;
use crate::error::SyncResult;
use crate::notify::Notifier;
use crate::refresh::CollectionRefresher;
use crate::remote::RemoteStore;

/// Notice shown when a drain pass finishes.
pub const DRAIN_SUCCESS_MESSAGE: &str = "Neural Core Berhasil Disinkronisasi";

// =============================================================================
// Outcome Types
// =============================================================================

/// Why a drain request did nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SkipReason {
    Offline,
    EmptyQueue,
    AlreadyDraining,
}

/// A queued mutation the remote store did not accept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedMutation {
    pub id: MutationId,
    pub table: Collection,
    pub action: MutationAction,
    pub error: String,
}

/// Result of one completed drain pass.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrainReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedMutation>,
    /// Mutations still queued after the pass (always 0 under `ClearAll`).
    pub retained: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl DrainReport {
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "kebab-case")]
pub enum DrainOutcome {
    Skipped { reason: SkipReason },
    Completed(DrainReport),
}

impl DrainOutcome {
    fn skipped(reason: SkipReason) -> Self {
        DrainOutcome::Skipped { reason }
    }

    pub fn report(&self) -> Option<&DrainReport> {
        match self {
            DrainOutcome::Completed(report) => Some(report),
            DrainOutcome::Skipped { .. } => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, DrainOutcome::Skipped { .. })
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Clears the draining flag when a pass ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct ReconciliationEngine {
    queue: SyncQueueRepository,
    remote: Arc<dyn RemoteStore>,
    oracle: Arc<ConnectivityOracle>,
    refresher: CollectionRefresher,
    notifier: Arc<dyn Notifier>,
    policy: DrainPolicy,
    draining: AtomicBool,
}

impl ReconciliationEngine {
    pub fn new(
        queue: SyncQueueRepository,
        remote: Arc<dyn RemoteStore>,
        oracle: Arc<ConnectivityOracle>,
        refresher: CollectionRefresher,
        notifier: Arc<dyn Notifier>,
        policy: DrainPolicy,
    ) -> Self {
        ReconciliationEngine {
            queue,
            remote,
            oracle,
            refresher,
            notifier,
            policy,
            draining: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> DrainPolicy {
        self.policy
    }

    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.len().await
    }

    /// Runs one drain pass if the device is online and mutations are
    /// pending. A pass always runs to completion.
    pub async fn drain(&self) -> DrainOutcome {
        if !self.oracle.is_online() {
            debug!("Drain skipped: offline");
            return DrainOutcome::skipped(SkipReason::Offline);
        }

        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Drain skipped: a pass is already running");
            return DrainOutcome::skipped(SkipReason::AlreadyDraining);
        }
        let _guard = DrainGuard(&self.draining);

        let pending = self.queue.peek_all().await;
        if pending.is_empty() {
            debug!("Drain skipped: queue empty");
            return DrainOutcome::skipped(SkipReason::EmptyQueue);
        }

        let started_at = Utc::now();
        info!(count = pending.len(), policy = %self.policy, "Draining sync queue");
        self.notifier
            .notify(Notice::info(format!("Menyelaraskan {} perubahan...", pending.len())));

        let mut succeeded = Vec::with_capacity(pending.len());
        let mut failed = Vec::new();

        for mutation in &pending {
            match self.dispatch(mutation).await {
                Ok(()) => {
                    debug!(
                        mutation_id = %mutation.id,
                        table = %mutation.table,
                        action = %mutation.action,
                        "Mutation replayed"
                    );
                    succeeded.push(mutation.id.clone());
                }
                Err(e) => {
                    error!(
                        mutation_id = %mutation.id,
                        table = %mutation.table,
                        action = %mutation.action,
                        error = %e,
                        "Mutation replay failed"
                    );
                    failed.push(FailedMutation {
                        id: mutation.id.clone(),
                        table: mutation.table,
                        action: mutation.action,
                        error: e.to_string(),
                    });
                }
            }
            tokio::task::yield_now().await;
        }

        let retained = self.settle_queue(&succeeded, failed.len()).await;
        self.refresher.refresh_all().await;

        let message = if retained > 0 {
            format!("{} ({} perubahan tertunda)", DRAIN_SUCCESS_MESSAGE, retained)
        } else {
            DRAIN_SUCCESS_MESSAGE.to_string()
        };
        self.notifier.notify(Notice::success(message));

        let report = DrainReport {
            attempted: pending.len(),
            succeeded: succeeded.len(),
            failed,
            retained,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed.len(),
            retained = report.retained,
            "Drain pass complete"
        );
        DrainOutcome::Completed(report)
    }

    /// Applies the drain policy. Returns how many mutations stay queued.
    async fn settle_queue(&self, succeeded: &[MutationId], failed: usize) -> usize {
        match self.policy {
            DrainPolicy::ClearAll => {
                if failed > 0 {
                    warn!(dropped = failed, "Clearing queue with failed mutations");
                }
                if let Err(e) = self.queue.clear_all().await {
                    warn!(error = %e, "Could not clear sync queue");
                }
                self.queue.len().await
            }
            DrainPolicy::RetainFailed => {
                if let Err(e) = self.queue.remove_ids(succeeded).await {
                    warn!(error = %e, "Could not remove replayed mutations");
                }
                self.queue.len().await
            }
        }
    }

    async fn dispatch(&self, mutation: &QueuedMutation) -> SyncResult<()> {
        let table = mutation.table;
        match mutation.action {
            MutationAction::Insert => {
                self.remote.insert(table, &mutation.payload).await?;
            }
            MutationAction::Update => {
                let id = mutation.require_record_id()?;
                self.remote.update(table, &mutation.payload, id).await?;
            }
            MutationAction::Delete => {
                let id = mutation.require_record_id()?;
                self.remote.delete(table, id).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ManualProbe;
    use crate::notify::RecordingNotifier;
    use crate::remote::{MemoryRemote, RemoteCall};
    use crate::state::AppState;
    use dreamos_core::{NoticeKind, TenantConfig};
    use dreamos_db::{CacheRepository, LocalStore, MemoryBackend};
    use serde_json::json;

    struct Fixture {
        queue: SyncQueueRepository,
        remote: Arc<MemoryRemote>,
        notifier: Arc<RecordingNotifier>,
        engine: ReconciliationEngine,
    }

    async fn fixture(policy: DrainPolicy, online: bool) -> Fixture {
        let store = LocalStore::new(Arc::new(MemoryBackend::new()));
        let queue = SyncQueueRepository::new(store.clone());
        let remote = Arc::new(MemoryRemote::new());
        let notifier = Arc::new(RecordingNotifier::new());
        let oracle =
            Arc::new(ConnectivityOracle::load(store.clone(), Arc::new(ManualProbe::new(online))).await);
        let state = Arc::new(AppState::new(TenantConfig {
            id: "sma-1".to_string(),
            ..TenantConfig::default()
        }));
        let refresher = CollectionRefresher::new(remote.clone(), CacheRepository::new(store), state);
        let engine = ReconciliationEngine::new(
            queue.clone(),
            remote.clone(),
            oracle,
            refresher,
            notifier.clone(),
            policy,
        );
        Fixture {
            queue,
            remote,
            notifier,
            engine,
        }
    }

    #[tokio::test]
    async fn test_offline_drain_is_skipped() {
        let f = fixture(DrainPolicy::ClearAll, false).await;
        f.queue
            .enqueue(Collection::Inventory, MutationAction::Delete, json!({ "id": "1" }))
            .await
            .unwrap();

        let outcome = f.engine.drain().await;
        assert_eq!(outcome, DrainOutcome::Skipped { reason: SkipReason::Offline });
        assert!(f.remote.calls().is_empty());
        assert_eq!(f.queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_missing_id_counts_as_failure() {
        let f = fixture(DrainPolicy::ClearAll, true).await;
        f.queue
            .enqueue(Collection::K3Reports, MutationAction::Update, json!({ "status": "Selesai" }))
            .await
            .unwrap();

        let outcome = f.engine.drain().await;
        let report = outcome.report().unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(f.remote.write_calls().is_empty());
        assert_eq!(f.notifier.count(NoticeKind::Success), 1);
        assert!(!f.engine.is_draining());
    }

    #[tokio::test]
    async fn test_retain_failed_keeps_only_failures() {
        let f = fixture(DrainPolicy::RetainFailed, true).await;
        f.remote.fail_writes_for("b");
        for id in ["a", "b", "c"] {
            f.queue
                .enqueue(Collection::Inventory, MutationAction::Delete, json!({ "id": id }))
                .await
                .unwrap();
        }

        let outcome = f.engine.drain().await;
        let report = outcome.report().unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.retained, 1);

        let left = f.queue.peek_all().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].record_id(), Some("b"));
        assert_eq!(
            f.notifier.last().unwrap().message,
            "Neural Core Berhasil Disinkronisasi (1 perubahan tertunda)"
        );
    }

    #[tokio::test]
    async fn test_update_uses_payload_id() {
        let f = fixture(DrainPolicy::ClearAll, true).await;
        let patch = json!({ "id": "r1", "status": "Proses" });
        f.queue
            .enqueue(Collection::K3Reports, MutationAction::Update, patch.clone())
            .await
            .unwrap();
        f.engine.drain().await;
        assert_eq!(
            f.remote.write_calls(),
            vec![RemoteCall::Update(Collection::K3Reports, "r1".to_string(), patch)]
        );
    }
}
