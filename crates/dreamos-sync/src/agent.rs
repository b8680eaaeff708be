//! # Sync Agent
//!
//! Main orchestrator for the offline sync layer. Wires storage, the
//! connectivity oracle, the reconciliation engine and the mutation router
//! together, and runs the background loop that drains the queue when the
//! device comes back online.
//!
//! ## Agent Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SyncAgent Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                          SyncAgent                               │  │
//! │  │  • Builds LocalStore, AppState, oracle, engine, router           │  │
//! │  │  • Diagnostics: health, export/import backup, purge              │  │
//! │  │  • start() spawns the agent loop, returns SyncAgentHandle        │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │                     agent loop (tokio::select!)                         │
//! │         ┌──────────────┬──────┴───────┬───────────────┬─────────┐      │
//! │         ▼              ▼              ▼               ▼         ▼       │
//! │  connectivity     sync_now()     badge tick      reachability  shutdown │
//! │  Online → drain   → drain        (5 s) pending   tick: remote           │
//! │  Offline → status  reply          count only     health →               │
//! │                                                  report_network         │
//! │                                                                         │
//! │  STATUS EVENTS (to the embedding UI):                                  │
//! │  ────────────────────────────────────                                  │
//! │  emit_status   - online / forced / pending / draining / last drain     │
//! │  emit_progress - pending count (badge)                                 │
//! │  emit_error    - drain failures, retryable when transient              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use dreamos_core::{bookings_csv, BackupDocument, Notice, TenantConfig};
use dreamos_db::{CacheRepository, LocalStore, StorageBackend, SyncQueueRepository};
use serde::Serialize;
use std::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::advisor::{AiAdvisor, GeminiAdvisor, NoopAdvisor};
use crate::config::SyncConfig;
use crate::connectivity::{ConnectivityEvent, ConnectivityOracle, ManualProbe, NetworkProbe};
use crate::error::{SyncError, SyncResult};
use crate::notify::{Notifier, TracingNotifier};
use crate::reconcile::{DrainOutcome, DrainReport, ReconciliationEngine};
use crate::refresh::{CollectionRefresher, RefreshSummary};
use crate::remote::{MemoryRemote, RemoteStore};
use crate::router::MutationRouter;
use crate::state::AppState;
use crate::supabase::SupabaseClient;

// =============================================================================
// Sync Status
// =============================================================================

/// Current sync status for external queries.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    /// Effective connectivity (network AND NOT forced).
    pub online: bool,

    /// Whether the forced-offline override is active.
    pub forced_offline: bool,

    /// Number of queued mutations.
    pub pending_count: usize,

    /// Whether a drain pass is running.
    pub draining: bool,

    /// Report of the last completed drain pass.
    pub last_drain: Option<DrainReport>,

    /// Last error message (if any).
    pub last_error: Option<String>,
}

/// Snapshot shown on the diagnostics screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    /// `ACTIVE` when online, `OFFLINE MODE` otherwise.
    pub remote: &'static str,
    pub forced_offline: bool,
    pub ai: &'static str,
    pub storage_bytes: u64,
    pub pending: usize,
}

// =============================================================================
// Event Emitter Trait
// =============================================================================

/// Receiver of agent status events (implemented by the embedding UI).
pub trait SyncEventEmitter: Send + Sync {
    /// Emits a sync status change event.
    fn emit_status(&self, status: &SyncStatus);

    /// Emits the pending-mutation count.
    fn emit_progress(&self, pending: usize);

    /// Emits a sync error event.
    fn emit_error(&self, message: &str, retryable: bool);
}

/// No-op event emitter for testing.
pub struct NoOpEmitter;

impl SyncEventEmitter for NoOpEmitter {
    fn emit_status(&self, _status: &SyncStatus) {}
    fn emit_progress(&self, _pending: usize) {}
    fn emit_error(&self, _message: &str, _retryable: bool) {}
}

// =============================================================================
// Sync Agent
// =============================================================================

pub struct SyncAgent {
    config: Arc<SyncConfig>,
    store: LocalStore,
    cache: CacheRepository,
    queue: SyncQueueRepository,
    state: Arc<AppState>,
    oracle: Arc<ConnectivityOracle>,
    remote: Arc<dyn RemoteStore>,
    refresher: CollectionRefresher,
    engine: Arc<ReconciliationEngine>,
    router: Arc<MutationRouter>,
    advisor: Arc<dyn AiAdvisor>,
    notifier: Arc<dyn Notifier>,
    emitter: Arc<dyn SyncEventEmitter>,
    status: Arc<RwLock<SyncStatus>>,
    shutdown_tx: Option<mpsc::Sender<()>>,
}

impl SyncAgent {
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<MutationRouter> {
        &self.router
    }

    pub fn engine(&self) -> &Arc<ReconciliationEngine> {
        &self.engine
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    pub fn oracle(&self) -> &Arc<ConnectivityOracle> {
        &self.oracle
    }

    pub fn queue(&self) -> &SyncQueueRepository {
        &self.queue
    }

    /// Returns the current sync status.
    pub async fn status(&self) -> SyncStatus {
        let mut status = self.status.read().await.clone();
        status.online = self.oracle.is_online();
        status.forced_offline = self.oracle.is_forced_offline();
        status.pending_count = self.queue.len().await;
        status.draining = self.engine.is_draining();
        status
    }

    /// Re-fetches every collection (startup load).
    pub async fn refresh(&self) -> RefreshSummary {
        self.refresher.refresh_all().await
    }

    /// Runs one drain pass in the caller's task.
    pub async fn sync_now(&self) -> DrainOutcome {
        AgentTask::from_agent(self).drain().await
    }

    pub async fn set_forced_offline(&self, flag: bool) {
        self.oracle.set_forced_offline(flag).await;
    }

    /// Stores the tenant profile and loads its data.
    pub async fn set_tenant(&self, tenant: TenantConfig) -> RefreshSummary {
        if !self.cache.save_tenant(&tenant).await {
            warn!(tenant_id = %tenant.id, "Tenant profile not persisted");
        }
        info!(tenant_id = %tenant.id, "Tenant profile set");
        self.state.set_tenant(tenant).await;
        self.notifier
            .notify(Notice::success("Neural Profile Berhasil Diinisialisasi"));
        self.refresher.refresh_all().await
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    pub async fn health_report(&self) -> HealthReport {
        let storage_bytes = match self.store.usage_bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "Storage usage unavailable");
                0
            }
        };
        HealthReport {
            remote: if self.oracle.is_online() {
                "ACTIVE"
            } else {
                "OFFLINE MODE"
            },
            forced_offline: self.oracle.is_forced_offline(),
            ai: if self.advisor.is_enabled() {
                "READY"
            } else {
                "DISABLED"
            },
            storage_bytes,
            pending: self.queue.len().await,
        }
    }

    /// Backup of the in-memory collections.
    pub async fn export_backup(&self) -> BackupDocument {
        BackupDocument::new(
            self.state.bookings().await,
            self.state.k3_reports().await,
            self.state.inventory().await,
        )
    }

    pub async fn export_bookings_csv(&self) -> String {
        bookings_csv(&self.state.bookings().await)
    }

    /// Replaces in-memory collections with those in a backup document.
    /// A malformed document changes nothing.
    pub async fn import_backup(&self, text: &str) -> SyncResult<()> {
        let document = match BackupDocument::parse(text) {
            Ok(document) => document,
            Err(e) => {
                warn!(error = %e, "Backup import rejected");
                self.notifier.notify(Notice::error("Gagal mengimpor data neural"));
                return Err(e.into());
            }
        };

        info!(version = %document.version, "Importing backup");
        self.state.import(document.data).await;
        self.notifier
            .notify(Notice::success("Data berhasil diimpor ke sistem lokal"));
        Ok(())
    }

    /// Deletes every persisted key, empties the in-memory collections and
    /// lifts the forced-offline override.
    pub async fn purge(&self) -> SyncResult<()> {
        self.store.purge().await?;
        self.state.clear().await;
        self.oracle.reset_forced_offline();
        {
            let mut s = self.status.write().await;
            *s = SyncStatus::default();
        }
        warn!("Local data purged");
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Spawns the agent loop.
    pub async fn start(&mut self) -> SyncResult<SyncAgentHandle> {
        if self.shutdown_tx.is_some() {
            return Err(SyncError::Internal("sync agent already started".into()));
        }

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let (sync_tx, sync_rx) = mpsc::channel(8);
        self.shutdown_tx = Some(shutdown_tx.clone());

        let task = AgentTask::from_agent(self);
        let events = self.oracle.subscribe();
        let badge_every = self.config.badge_poll_interval();
        let probe_every = self.config.reachability_interval();

        info!(
            online = self.oracle.is_online(),
            policy = %self.engine.policy(),
            badge_secs = badge_every.as_secs(),
            reachability_secs = probe_every.map(|d| d.as_secs()),
            "Starting sync agent"
        );

        tokio::spawn(task.run(events, sync_rx, shutdown_rx, badge_every, probe_every));

        Ok(SyncAgentHandle {
            shutdown_tx,
            sync_tx,
            status: self.status.clone(),
        })
    }

    /// Stops the agent loop.
    pub async fn shutdown(&mut self) {
        info!("Shutting down sync agent");
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(()).await;
        }
    }
}

// =============================================================================
// Agent Loop
// =============================================================================

type SyncRequest = oneshot::Sender<DrainOutcome>;

#[derive(Clone)]
struct AgentTask {
    engine: Arc<ReconciliationEngine>,
    oracle: Arc<ConnectivityOracle>,
    remote: Arc<dyn RemoteStore>,
    status: Arc<RwLock<SyncStatus>>,
    emitter: Arc<dyn SyncEventEmitter>,
}

impl AgentTask {
    fn from_agent(agent: &SyncAgent) -> Self {
        AgentTask {
            engine: agent.engine.clone(),
            oracle: agent.oracle.clone(),
            remote: agent.remote.clone(),
            status: agent.status.clone(),
            emitter: agent.emitter.clone(),
        }
    }

    async fn run(
        self,
        mut events: tokio::sync::broadcast::Receiver<ConnectivityEvent>,
        mut sync_rx: mpsc::Receiver<SyncRequest>,
        mut shutdown_rx: mpsc::Receiver<()>,
        badge_every: Duration,
        probe_every: Option<Duration>,
    ) {
        let mut badge = interval(badge_every);
        badge.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut probe = probe_every.map(|every| {
            let mut tick = interval(every);
            tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tick
        });

        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(ConnectivityEvent::Online) => {
                        info!("Connectivity restored");
                        self.drain().await;
                    }
                    Ok(ConnectivityEvent::Offline) => {
                        info!("Connectivity lost");
                        self.publish_status().await;
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Connectivity events lagged");
                    }
                    Err(RecvError::Closed) => break,
                },

                Some(reply) = sync_rx.recv() => {
                    let outcome = self.drain().await;
                    let _ = reply.send(outcome);
                }

                _ = badge.tick() => {
                    let pending = self.engine.pending_count().await;
                    self.status.write().await.pending_count = pending;
                    self.emitter.emit_progress(pending);
                }

                _ = next_tick(&mut probe) => {
                    let reachable = self.remote.health().await;
                    debug!(reachable, "Reachability probe");
                    self.oracle.report_network(reachable);
                }

                _ = shutdown_rx.recv() => {
                    info!("Agent loop received shutdown");
                    break;
                }
            }
        }

        info!("Agent loop stopped");
    }

    async fn drain(&self) -> DrainOutcome {
        {
            let mut s = self.status.write().await;
            s.draining = true;
        }

        let outcome = self.engine.drain().await;

        {
            let mut s = self.status.write().await;
            s.draining = false;
            if let DrainOutcome::Completed(report) = &outcome {
                s.last_error = report.failed.last().map(|f| f.error.clone());
                s.last_drain = Some(report.clone());
            }
        }

        if let Some(report) = outcome.report().filter(|r| r.has_failures()) {
            for failure in &report.failed {
                error!(mutation_id = %failure.id, error = %failure.error, "Queued mutation not applied");
                self.emitter.emit_error(&failure.error, false);
            }
        }

        self.publish_status().await;
        outcome
    }

    async fn publish_status(&self) {
        let pending = self.engine.pending_count().await;
        let snapshot = {
            let mut s = self.status.write().await;
            s.online = self.oracle.is_online();
            s.forced_offline = self.oracle.is_forced_offline();
            s.pending_count = pending;
            s.clone()
        };
        self.emitter.emit_status(&snapshot);
    }
}

/// Waits for the next probe tick, or forever when probing is disabled.
async fn next_tick(tick: &mut Option<Interval>) {
    match tick {
        Some(tick) => {
            tick.tick().await;
        }
        None => future::pending::<()>().await,
    }
}

// =============================================================================
// Agent Handle (for external control)
// =============================================================================

/// Handle for controlling a running SyncAgent from outside.
#[derive(Clone)]
pub struct SyncAgentHandle {
    shutdown_tx: mpsc::Sender<()>,
    sync_tx: mpsc::Sender<SyncRequest>,
    status: Arc<RwLock<SyncStatus>>,
}

impl SyncAgentHandle {
    /// Gets the last published status.
    pub async fn status(&self) -> SyncStatus {
        self.status.read().await.clone()
    }

    /// Asks the agent loop to drain now and waits for the outcome.
    pub async fn sync_now(&self) -> SyncResult<DrainOutcome> {
        let (tx, rx) = oneshot::channel();
        self.sync_tx
            .send(tx)
            .await
            .map_err(|_| SyncError::ShuttingDown)?;
        rx.await.map_err(|_| SyncError::ShuttingDown)
    }

    /// Signals the agent to shut down gracefully.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

// =============================================================================
// Builder Pattern
// =============================================================================

/// Builder for creating SyncAgent with options.
pub struct SyncAgentBuilder {
    config: SyncConfig,
    backend: Option<Arc<dyn StorageBackend>>,
    remote: Option<Arc<dyn RemoteStore>>,
    probe: Option<Arc<dyn NetworkProbe>>,
    advisor: Option<Arc<dyn AiAdvisor>>,
    notifier: Option<Arc<dyn Notifier>>,
    emitter: Option<Arc<dyn SyncEventEmitter>>,
}

impl SyncAgentBuilder {
    pub fn new(config: SyncConfig) -> Self {
        SyncAgentBuilder {
            config,
            backend: None,
            remote: None,
            probe: None,
            advisor: None,
            notifier: None,
            emitter: None,
        }
    }

    /// Sets the storage backend for cache and queue.
    pub fn with_backend(mut self, backend: Arc<dyn StorageBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Overrides the remote store chosen from the config.
    pub fn with_remote(mut self, remote: Arc<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_probe(mut self, probe: Arc<dyn NetworkProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn AiAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_emitter(mut self, emitter: Arc<dyn SyncEventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Builds the SyncAgent, hydrating state from the local cache.
    pub async fn build(self) -> SyncResult<SyncAgent> {
        self.config.validate()?;

        let backend = self
            .backend
            .ok_or_else(|| SyncError::InvalidConfig("Storage backend required".into()))?;
        let remote = match self.remote {
            Some(remote) => remote,
            None => remote_from_config(&self.config)?,
        };
        let advisor = self
            .advisor
            .unwrap_or_else(|| advisor_from_config(&self.config));
        let probe = self
            .probe
            .unwrap_or_else(|| Arc::new(ManualProbe::new(true)));
        let notifier = self.notifier.unwrap_or_else(|| Arc::new(TracingNotifier));
        let emitter = self.emitter.unwrap_or_else(|| Arc::new(NoOpEmitter));

        let store = LocalStore::new(backend);
        let cache = CacheRepository::new(store.clone());
        let queue = SyncQueueRepository::new(store.clone());

        let tenant = match cache.load_tenant().await {
            Some(tenant) => tenant,
            None => TenantConfig {
                id: self.config.tenant.id.clone(),
                name: if self.config.tenant.name.is_empty() {
                    TenantConfig::default().name
                } else {
                    self.config.tenant.name.clone()
                },
                ..TenantConfig::default()
            },
        };

        let state = Arc::new(AppState::hydrate(&cache, tenant).await);
        let oracle = Arc::new(ConnectivityOracle::load(store.clone(), probe).await);
        let refresher = CollectionRefresher::new(remote.clone(), cache.clone(), state.clone());
        let engine = Arc::new(ReconciliationEngine::new(
            queue.clone(),
            remote.clone(),
            oracle.clone(),
            refresher.clone(),
            notifier.clone(),
            self.config.sync.drain_policy,
        ));
        let router = Arc::new(MutationRouter::new(
            queue.clone(),
            remote.clone(),
            oracle.clone(),
            refresher.clone(),
            state.clone(),
            advisor.clone(),
            notifier.clone(),
        ));

        Ok(SyncAgent {
            config: Arc::new(self.config),
            store,
            cache,
            queue,
            state,
            oracle,
            remote,
            refresher,
            engine,
            router,
            advisor,
            notifier,
            emitter,
            status: Arc::new(RwLock::new(SyncStatus::default())),
            shutdown_tx: None,
        })
    }
}

fn remote_from_config(config: &SyncConfig) -> SyncResult<Arc<dyn RemoteStore>> {
    if config.uses_memory_remote() {
        info!("Using in-memory remote store");
        return Ok(Arc::new(MemoryRemote::new()));
    }
    let api_key = config.remote.api_key.clone().unwrap_or_default();
    let client = SupabaseClient::new(&config.remote.url, api_key, config.remote_timeout())?;
    info!(url = %config.remote.url, "Using Supabase remote store");
    Ok(Arc::new(client))
}

/// A misconfigured advisor degrades to [`NoopAdvisor`]; AI is never
/// required.
fn advisor_from_config(config: &SyncConfig) -> Arc<dyn AiAdvisor> {
    if !config.ai.enabled {
        return Arc::new(NoopAdvisor);
    }
    match GeminiAdvisor::new(&config.ai) {
        Ok(advisor) => Arc::new(advisor),
        Err(e) => {
            warn!(error = %e, "AI advisor disabled");
            Arc::new(NoopAdvisor)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::RecordingNotifier;
    use dreamos_core::{BookingDraft, K3ReportDraft, NoticeKind};
    use dreamos_db::MemoryBackend;

    fn tenant() -> TenantConfig {
        TenantConfig {
            id: "sma-1".to_string(),
            name: "SMA 1".to_string(),
            ..TenantConfig::default()
        }
    }

    fn draft() -> K3ReportDraft {
        K3ReportDraft {
            location: "Lab Kimia".into(),
            problem: "Wastafel bocor".into(),
            category: "Maintenance".into(),
            reporter: "Budi".into(),
            division: "Sarpras".into(),
            photo: None,
        }
    }

    async fn agent(notifier: Arc<RecordingNotifier>) -> (SyncAgent, Arc<MemoryRemote>) {
        let remote = Arc::new(MemoryRemote::new());
        let agent = SyncAgentBuilder::new(SyncConfig::default())
            .with_backend(Arc::new(MemoryBackend::new()))
            .with_remote(remote.clone())
            .with_notifier(notifier)
            .build()
            .await
            .unwrap();
        agent.set_tenant(tenant()).await;
        (agent, remote)
    }

    #[test]
    fn test_sync_status_default() {
        let status = SyncStatus::default();
        assert!(!status.online);
        assert_eq!(status.pending_count, 0);
        assert!(status.last_drain.is_none());
    }

    #[tokio::test]
    async fn test_builder_requires_backend() {
        let result = SyncAgentBuilder::new(SyncConfig::default()).build().await;
        assert!(matches!(result, Err(SyncError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_health_report_and_purge() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (agent, _remote) = agent(notifier).await;

        agent.set_forced_offline(true).await;
        agent.router().submit_k3_report(draft()).await.unwrap();

        let health = agent.health_report().await;
        assert_eq!(health.remote, "OFFLINE MODE");
        assert_eq!(health.ai, "DISABLED");
        assert_eq!(health.pending, 1);
        assert!(health.storage_bytes > 0);

        agent.purge().await.unwrap();
        assert_eq!(agent.health_report().await.storage_bytes, 0);
        assert!(!agent.oracle().is_forced_offline());
        assert_eq!(agent.queue().len().await, 0);
        assert_eq!(agent.state().counts().await.k3_reports, 0);
        assert_eq!(agent.health_report().await.remote, "ACTIVE");
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_backup() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (agent, _remote) = agent(notifier.clone()).await;
        agent.set_forced_offline(true).await;
        agent.router().submit_k3_report(draft()).await.unwrap();
        notifier.clear();

        assert!(agent.import_backup(r#"{"bookings": []}"#).await.is_err());
        assert_eq!(agent.state().counts().await.k3_reports, 1);
        assert_eq!(notifier.last(), Some(Notice::error("Gagal mengimpor data neural")));

        let backup = agent.export_backup().await.to_pretty_json().unwrap();
        agent.state().clear().await;
        agent.import_backup(&backup).await.unwrap();
        assert_eq!(agent.state().counts().await.k3_reports, 1);
        assert_eq!(notifier.count(NoticeKind::Success), 1);
    }

    #[tokio::test]
    async fn test_export_bookings_csv() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (agent, _remote) = agent(notifier).await;
        agent.set_forced_offline(true).await;
        agent
            .router()
            .submit_booking(BookingDraft {
                name: "Siti \"Ani\"".into(),
                whatsapp: "081234567890".into(),
                division: "Kurikulum".into(),
                facility: "Aula".into(),
                date: "2024-06-01".into(),
                start_time: "07:30".into(),
                end_time: "09:00".into(),
                ..BookingDraft::default()
            })
            .await
            .unwrap();

        let csv = agent.export_bookings_csv().await;
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("Nama,Divisi,WhatsApp,Sarana,Tanggal,Mulai,Selesai,Keperluan")
        );
        assert!(lines.next().unwrap().starts_with("\"Siti \"\"Ani\"\"\""));
    }

    #[tokio::test]
    async fn test_reconnect_event_drains_queue() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (mut agent, remote) = agent(notifier).await;
        agent.set_forced_offline(true).await;
        agent.router().submit_k3_report(draft()).await.unwrap();

        let handle = agent.start().await.unwrap();
        agent.set_forced_offline(false).await;

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while !agent.queue().is_empty().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(drained.is_ok());
        assert_eq!(remote.rows(dreamos_core::Collection::K3Reports).len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn test_handle_sync_now_with_empty_queue() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (mut agent, remote) = agent(notifier).await;
        remote.clear_calls();

        let handle = agent.start().await.unwrap();
        let outcome = handle.sync_now().await.unwrap();
        assert!(outcome.is_skipped());
        assert!(remote.calls().is_empty());

        agent.shutdown().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(matches!(handle.sync_now().await, Err(SyncError::ShuttingDown)));
    }
}
