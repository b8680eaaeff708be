//! End-to-end behavior of the offline write path: queueing while
//! disconnected, draining on reconnect, and cache resilience.

use async_trait::async_trait;
use dreamos_core::{
    Booking, BookingDraft, Collection, InventoryDraft, InventoryItem, K3Priority, K3ReportDraft,
    K3Status, MutationAction, Notice, NoticeKind, TenantConfig,
};
use dreamos_db::{CacheRepository, LocalStore, MemoryBackend, StoreError};
use dreamos_sync::advisor::WELCOME_FALLBACK;
use dreamos_sync::{
    AiAdvisor, AppState, ConnectivityEvent, DrainOutcome, DrainPolicy, Forecast,
    IncidentAssessment, ManualProbe, MemoryRemote, RecordingNotifier, RemoteCall, SkipReason,
    SyncAgent, SyncAgentBuilder, SyncConfig, SyncError,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct Harness {
    agent: SyncAgent,
    remote: Arc<MemoryRemote>,
    notifier: Arc<RecordingNotifier>,
    backend: Arc<MemoryBackend>,
}

async fn harness_with(backend: MemoryBackend, policy: DrainPolicy) -> Harness {
    build_harness(backend, policy, None).await
}

async fn harness_with_advisor(advisor: Arc<ScriptedAdvisor>) -> Harness {
    build_harness(MemoryBackend::new(), DrainPolicy::ClearAll, Some(advisor)).await
}

async fn build_harness(
    backend: MemoryBackend,
    policy: DrainPolicy,
    advisor: Option<Arc<ScriptedAdvisor>>,
) -> Harness {
    let backend = Arc::new(backend);
    let remote = Arc::new(MemoryRemote::new());
    let notifier = Arc::new(RecordingNotifier::new());

    let mut config = SyncConfig::default();
    config.sync.drain_policy = policy;

    let mut builder = SyncAgentBuilder::new(config)
        .with_backend(backend.clone())
        .with_remote(remote.clone())
        .with_probe(Arc::new(ManualProbe::new(true)))
        .with_notifier(notifier.clone());
    if let Some(advisor) = advisor {
        builder = builder.with_advisor(advisor);
    }
    let agent = builder.build().await.unwrap();
    agent
        .set_tenant(TenantConfig {
            id: "sif-alfikri".to_string(),
            name: "SIF Al Fikri".to_string(),
            ..TenantConfig::default()
        })
        .await;
    remote.clear_calls();
    notifier.clear();

    Harness {
        agent,
        remote,
        notifier,
        backend,
    }
}

async fn harness() -> Harness {
    harness_with(MemoryBackend::new(), DrainPolicy::ClearAll).await
}

fn k3_draft(problem: &str) -> K3ReportDraft {
    K3ReportDraft {
        location: "Gedung B".into(),
        problem: problem.into(),
        category: "Maintenance".into(),
        reporter: "Pak Ahmad".into(),
        division: "Sarpras".into(),
        photo: None,
    }
}

fn inventory_draft(name: &str) -> InventoryDraft {
    InventoryDraft {
        id: None,
        name: name.into(),
        brand_type: "Informa".into(),
        category: "Mebel".into(),
        unit: "pcs".into(),
        initial_stock: 10,
        current_stock: 8,
        location: "Gudang".into(),
        ..InventoryDraft::default()
    }
}

fn booking_draft(name: &str) -> BookingDraft {
    BookingDraft {
        name: name.into(),
        whatsapp: "081234567890".into(),
        division: "Kurikulum".into(),
        facility: "Aula".into(),
        date: "2024-06-01".into(),
        start_time: "07:30".into(),
        end_time: "09:00".into(),
        purpose: "Rapat guru".into(),
        ..BookingDraft::default()
    }
}

/// Advisor with canned answers that records what it was asked.
#[derive(Default)]
struct ScriptedAdvisor {
    assessment: Option<IncidentAssessment>,
    forecast: Option<Forecast>,
    classify_calls: AtomicUsize,
    forecast_calls: AtomicUsize,
    contexts: Mutex<Vec<Value>>,
}

#[async_trait]
impl AiAdvisor for ScriptedAdvisor {
    async fn classify_incident(&self, _problem: &str, _photo: Option<&str>) -> Option<IncidentAssessment> {
        self.classify_calls.fetch_add(1, Ordering::SeqCst);
        self.assessment.clone()
    }

    async fn ask(&self, _question: &str, context: &Value) -> String {
        self.contexts.lock().unwrap().push(context.clone());
        "Aula kosong hari ini".to_string()
    }

    async fn forecast(&self, _bookings: &[Booking], _inventory: &[InventoryItem]) -> Option<Forecast> {
        self.forecast_calls.fetch_add(1, Ordering::SeqCst);
        self.forecast.clone()
    }

    async fn welcome_message(&self, tenant_name: &str) -> String {
        format!("Selamat pagi, {}", tenant_name)
    }
}

fn written_ids(calls: &[RemoteCall]) -> Vec<String> {
    calls
        .iter()
        .filter_map(|call| match call {
            RemoteCall::Insert(_, v) => v.get("id").and_then(Value::as_str).map(String::from),
            RemoteCall::Update(_, id, _) | RemoteCall::Delete(_, id) => Some(id.clone()),
            RemoteCall::Select(_) => None,
        })
        .collect()
}

// =============================================================================
// Cache
// =============================================================================

#[tokio::test]
async fn cache_round_trip_returns_saved_value() {
    let store = LocalStore::new(Arc::new(MemoryBackend::new()));
    let value = json!([
        { "id": "bk-1", "nama": "Siti", "alat": ["Proyektor", "Mic"] },
        { "id": "bk-2", "nama": "Rahmat", "alat": [] }
    ]);

    assert!(store.save("cache:bookings", &value).await);
    assert_eq!(store.load::<Value>("cache:bookings").await, Some(value));
}

#[tokio::test]
async fn corrupt_cache_reads_as_absent_and_can_be_overwritten() {
    let backend = Arc::new(MemoryBackend::new());
    backend.insert_raw("cache:k3", "{not json").await;
    let store = LocalStore::new(backend);
    let cache = CacheRepository::new(store.clone());

    assert!(store.load::<Value>("cache:k3").await.is_none());
    let state = AppState::hydrate(&cache, TenantConfig::default()).await;
    assert_eq!(state.counts().await.k3_reports, 0);

    assert!(store.save("cache:k3", &json!([])).await);
    assert_eq!(store.load::<Value>("cache:k3").await, Some(json!([])));
}

// =============================================================================
// Queue and Drain
// =============================================================================

#[tokio::test]
async fn offline_writes_are_queued_then_drained_on_reconnect() {
    let h = harness().await;
    h.agent.oracle().report_network(false);
    assert!(!h.agent.oracle().is_online());

    let router = h.agent.router();
    router.submit_k3_report(k3_draft("Lampu mati")).await.unwrap();
    router.save_inventory_item(inventory_draft("Kursi")).await.unwrap();
    router.delete_inventory_item("inv-lama").await.unwrap();

    assert!(h.remote.calls().is_empty());
    assert_eq!(h.agent.queue().len().await, 3);
    assert_eq!(h.notifier.count(NoticeKind::Info), 3);

    h.agent.oracle().report_network(true);
    let outcome = h.agent.sync_now().await;

    let report = outcome.report().unwrap();
    assert_eq!(report.attempted, 3);
    assert_eq!(report.succeeded, 3);
    assert_eq!(h.remote.write_calls().len(), 3);
    assert!(h.agent.queue().is_empty().await);
    assert_eq!(h.remote.rows(Collection::K3Reports).len(), 1);
    assert_eq!(
        h.notifier.last().unwrap().message,
        "Neural Core Berhasil Disinkronisasi"
    );
}

#[tokio::test]
async fn drain_replays_in_enqueue_order() {
    let h = harness().await;
    h.agent.set_forced_offline(true).await;

    let router = h.agent.router();
    let first = router.submit_k3_report(k3_draft("Atap bocor")).await.unwrap();
    let second = router
        .update_k3_status(first.record_id(), K3Status::InProgress)
        .await
        .unwrap();
    let third = router.delete_inventory_item("inv-9").await.unwrap();

    let queued: Vec<_> = h.agent.queue().peek_all().await;
    assert_eq!(
        queued.iter().map(|m| m.action).collect::<Vec<_>>(),
        vec![MutationAction::Insert, MutationAction::Update, MutationAction::Delete]
    );

    h.agent.set_forced_offline(false).await;
    h.agent.sync_now().await;

    assert_eq!(
        written_ids(&h.remote.write_calls()),
        vec![
            first.record_id().to_string(),
            second.record_id().to_string(),
            third.record_id().to_string()
        ]
    );
    let stored = &h.remote.rows(Collection::K3Reports)[0];
    assert_eq!(stored["status"], "Proses");
}

#[tokio::test]
async fn failed_mutation_does_not_stop_the_drain() {
    let h = harness().await;
    h.agent.set_forced_offline(true).await;

    let router = h.agent.router();
    router.delete_inventory_item("inv-1").await.unwrap();
    router.delete_inventory_item("inv-2").await.unwrap();
    router.delete_inventory_item("inv-3").await.unwrap();
    h.remote.fail_writes_for("inv-2");

    h.agent.set_forced_offline(false).await;
    let outcome = h.agent.sync_now().await;
    let report = outcome.report().unwrap();

    assert_eq!(written_ids(&h.remote.write_calls()), vec!["inv-1", "inv-2", "inv-3"]);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].action, MutationAction::Delete);
    assert!(h.agent.queue().is_empty().await);
}

#[tokio::test]
async fn drain_with_empty_queue_touches_nothing() {
    let h = harness().await;
    let before = h.agent.state().counts().await;

    let outcome = h.agent.sync_now().await;

    assert_eq!(outcome, DrainOutcome::Skipped { reason: SkipReason::EmptyQueue });
    assert!(h.remote.calls().is_empty());
    assert!(h.notifier.notices().is_empty());
    assert_eq!(h.agent.state().counts().await, before);
}

#[tokio::test]
async fn retain_failed_policy_keeps_rejected_mutation() {
    let h = harness_with(MemoryBackend::new(), DrainPolicy::RetainFailed).await;
    h.agent.set_forced_offline(true).await;
    h.agent.router().delete_inventory_item("inv-1").await.unwrap();
    h.agent.router().delete_inventory_item("inv-2").await.unwrap();
    h.remote.fail_writes_for("inv-1");

    h.agent.set_forced_offline(false).await;
    h.agent.sync_now().await;

    let left = h.agent.queue().peek_all().await;
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].record_id(), Some("inv-1"));
}

// =============================================================================
// Connectivity
// =============================================================================

#[tokio::test]
async fn forced_offline_emits_the_same_signal_as_a_real_disconnect() {
    let h = harness().await;
    let oracle = h.agent.oracle();
    let mut rx = oracle.subscribe();

    oracle.report_network(false);
    let genuine = rx.recv().await.unwrap();
    oracle.report_network(true);
    assert_eq!(rx.recv().await.unwrap(), ConnectivityEvent::Online);

    oracle.set_forced_offline(true).await;
    assert!(!oracle.is_online());
    assert_eq!(rx.recv().await.unwrap(), genuine);

    oracle.set_forced_offline(false).await;
    assert!(oracle.is_online());
    assert_eq!(rx.recv().await.unwrap(), ConnectivityEvent::Online);
}

// =============================================================================
// Router
// =============================================================================

#[tokio::test]
async fn online_failure_is_reported_and_not_queued() {
    let h = harness().await;
    h.remote.set_unreachable(true);

    let err = h
        .agent
        .router()
        .delete_inventory_item("inv-7")
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Network(_)));
    assert!(h.agent.queue().is_empty().await);
    assert_eq!(h.notifier.count(NoticeKind::Error), 1);
}

#[tokio::test]
async fn online_write_refreshes_state_and_cache() {
    let h = harness().await;
    h.agent
        .router()
        .save_inventory_item(inventory_draft("Papan Tulis"))
        .await
        .unwrap();

    assert_eq!(h.remote.rows(Collection::Inventory).len(), 1);
    assert_eq!(h.agent.state().inventory().await[0].name, "Papan Tulis");
    assert_eq!(h.notifier.last().unwrap().message, "Data aset berhasil diperbarui");

    let cache = CacheRepository::new(LocalStore::new(h.backend.clone()));
    let cached = cache
        .load_collection::<dreamos_core::InventoryItem>()
        .await
        .unwrap();
    assert_eq!(cached.len(), 1);
}

#[tokio::test]
async fn optimistic_update_does_not_touch_cached_snapshot() {
    let h = harness().await;
    h.agent.set_forced_offline(true).await;
    h.agent
        .router()
        .save_inventory_item(inventory_draft("Lemari"))
        .await
        .unwrap();

    assert_eq!(h.agent.state().inventory().await.len(), 1);
    let cache = CacheRepository::new(LocalStore::new(h.backend.clone()));
    let cached = cache
        .load_collection::<dreamos_core::InventoryItem>()
        .await
        .unwrap_or_default();
    assert!(cached.is_empty());
}

#[tokio::test]
async fn invalid_draft_changes_nothing() {
    let h = harness().await;
    h.agent.set_forced_offline(true).await;
    h.notifier.clear();

    let err = h
        .agent
        .router()
        .submit_k3_report(k3_draft(""))
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Validation(_)));
    assert!(h.agent.queue().is_empty().await);
    assert_eq!(h.agent.state().counts().await.k3_reports, 0);
    assert_eq!(h.notifier.count(NoticeKind::Error), 1);
}

#[tokio::test]
async fn quota_exhaustion_keeps_change_in_memory() {
    let h = harness_with(MemoryBackend::with_quota(2_048), DrainPolicy::ClearAll).await;
    h.agent.set_forced_offline(true).await;
    h.notifier.clear();

    let long_problem = "x".repeat(1_990);
    let routed = h
        .agent
        .router()
        .submit_k3_report(k3_draft(&long_problem))
        .await
        .unwrap();

    assert!(routed.is_queued());
    assert!(h.agent.queue().is_empty().await);
    assert_eq!(h.agent.state().counts().await.k3_reports, 1);
    assert_eq!(h.notifier.count(NoticeKind::Error), 1);
    assert_eq!(h.notifier.count(NoticeKind::Info), 1);

    let direct = LocalStore::new(h.backend.clone())
        .try_save("sync:queue", &long_problem)
        .await;
    assert!(matches!(direct, Err(StoreError::QuotaExceeded { .. })));
}

#[tokio::test]
async fn update_without_record_id_is_rejected_before_routing() {
    let h = harness().await;
    h.agent.set_forced_offline(true).await;
    h.notifier.clear();

    let err = h
        .agent
        .router()
        .update_k3_status("  ", K3Status::Resolved)
        .await
        .unwrap_err();

    assert!(matches!(err, SyncError::Validation(_)));
    assert!(h.agent.queue().is_empty().await);
    assert_eq!(h.notifier.count(NoticeKind::Error), 1);
}

// =============================================================================
// Own bookings
// =============================================================================

#[tokio::test]
async fn bookings_made_here_are_remembered_across_restarts() {
    let h = harness().await;
    h.remote.seed(
        Collection::Bookings,
        vec![json!({
            "id": "bk-other",
            "nama": "Tamu",
            "whatsapp": "081200000000",
            "divisi": "Umum",
            "sarana": "Lab",
            "alat": null,
            "tanggal": "2024-06-02",
            "mulai": "10:00",
            "selesai": "11:00",
            "createdAt": "2024-05-01T08:00:00Z"
        })],
    );

    let online = h.agent.router().submit_booking(booking_draft("Siti")).await.unwrap();
    // Booking ids are millisecond-based.
    tokio::time::sleep(Duration::from_millis(5)).await;
    h.agent.set_forced_offline(true).await;
    let offline = h.agent.router().submit_booking(booking_draft("Rahmat")).await.unwrap();

    let own: Vec<_> = h
        .agent
        .state()
        .own_bookings()
        .await
        .into_iter()
        .filter_map(|b| b.id)
        .collect();
    assert_eq!(own.len(), 2);
    assert!(own.contains(&online.record_id().to_string()));
    assert!(own.contains(&offline.record_id().to_string()));
    assert_eq!(h.agent.state().bookings().await.len(), 3);

    let cache = CacheRepository::new(LocalStore::new(h.backend.clone()));
    let restored = AppState::hydrate(&cache, TenantConfig::default()).await;
    assert_eq!(restored.own_booking_ids().await.len(), 2);
}

// =============================================================================
// AI helpers
// =============================================================================

#[tokio::test]
async fn online_report_takes_ai_triage_before_insert() {
    let advisor = Arc::new(ScriptedAdvisor {
        assessment: Some(IncidentAssessment {
            priority: K3Priority::High,
            suggestion: "Matikan aliran listrik".to_string(),
            category: "Maintenance".to_string(),
        }),
        ..ScriptedAdvisor::default()
    });
    let h = harness_with_advisor(advisor.clone()).await;

    h.agent.router().submit_k3_report(k3_draft("Kabel terbakar")).await.unwrap();

    assert_eq!(advisor.classify_calls.load(Ordering::SeqCst), 1);
    let rows = h.remote.rows(Collection::K3Reports);
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["prioritas"], "Penting");
    assert_eq!(rows[0]["suggestion"], "Matikan aliran listrik");
}

#[tokio::test]
async fn missing_ai_answer_keeps_report_defaults() {
    let advisor = Arc::new(ScriptedAdvisor::default());
    let h = harness_with_advisor(advisor.clone()).await;

    h.agent.router().submit_k3_report(k3_draft("Keran bocor")).await.unwrap();

    assert_eq!(advisor.classify_calls.load(Ordering::SeqCst), 1);
    let report = &h.agent.state().k3_reports().await[0];
    assert_eq!(report.priority, K3Priority::Medium);
    assert!(report.suggestion.is_none());
}

#[tokio::test]
async fn offline_report_skips_ai_triage() {
    let advisor = Arc::new(ScriptedAdvisor {
        assessment: Some(IncidentAssessment {
            priority: K3Priority::High,
            suggestion: "Segera".to_string(),
            category: "Security".to_string(),
        }),
        ..ScriptedAdvisor::default()
    });
    let h = harness_with_advisor(advisor.clone()).await;
    h.agent.set_forced_offline(true).await;

    h.agent.router().submit_k3_report(k3_draft("Pintu rusak")).await.unwrap();

    assert_eq!(advisor.classify_calls.load(Ordering::SeqCst), 0);
    let queued = h.agent.queue().peek_all().await;
    assert_eq!(queued[0].payload["prioritas"], "Sedang");
}

#[tokio::test]
async fn forecast_refuses_to_run_offline() {
    let advisor = Arc::new(ScriptedAdvisor::default());
    let h = harness_with_advisor(advisor.clone()).await;
    h.agent.set_forced_offline(true).await;
    h.notifier.clear();

    let err = h.agent.router().forecast().await.unwrap_err();

    assert!(matches!(err, SyncError::Offline(_)));
    assert_eq!(advisor.forecast_calls.load(Ordering::SeqCst), 0);
    assert_eq!(
        h.notifier.last(),
        Some(Notice::error("Fitur AI Forecast membutuhkan koneksi internet"))
    );
}

#[tokio::test]
async fn assistant_context_carries_tenant_and_collections() {
    let advisor = Arc::new(ScriptedAdvisor::default());
    let h = harness_with_advisor(advisor.clone()).await;
    h.agent.set_forced_offline(true).await;
    h.agent.router().submit_booking(booking_draft("Siti")).await.unwrap();
    h.agent.router().submit_k3_report(k3_draft("Lampu mati")).await.unwrap();
    h.agent
        .router()
        .save_inventory_item(inventory_draft("Kursi"))
        .await
        .unwrap();

    let answer = h.agent.router().ask_assistant("Aula kosong?").await;

    assert_eq!(answer, "Aula kosong hari ini");
    let contexts = advisor.contexts.lock().unwrap();
    let context = &contexts[0];
    assert_eq!(context["tenant"], "SIF Al Fikri");
    assert_eq!(context["bookings"].as_array().unwrap().len(), 1);
    assert_eq!(context["k3"].as_array().unwrap().len(), 1);
    assert_eq!(context["inventory"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn welcome_message_needs_connectivity() {
    let advisor = Arc::new(ScriptedAdvisor::default());
    let h = harness_with_advisor(advisor).await;

    assert_eq!(h.agent.router().welcome_message().await, "Selamat pagi, SIF Al Fikri");
    h.agent.set_forced_offline(true).await;
    assert_eq!(h.agent.router().welcome_message().await, WELCOME_FALLBACK);
}
