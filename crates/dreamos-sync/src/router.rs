//! # Mutation Router
//!
//! Decides, per user write, whether it goes straight to the remote store or
//! into the sync queue.
//!
//! ```text
//!                      draft.validate() ──✗──► error notice, nothing changes
//!                              │
//!                   oracle.is_online()?
//!                 ┌────────────┴─────────────┐
//!              online                     offline
//!                 │                          │
//!     remote insert/update/delete     queue.enqueue(table, action, payload)
//!        ✓ refresh collection         info notice ("... offline")
//!          success notice             optimistic AppState update
//!        ✗ error notice, Err          (cache untouched until next refresh)
//!          (never queued)
//! ```

use chrono::Utc;
use dreamos_core::{
    validation, BookingDraft, Collection, InventoryDraft, K3ReportDraft, K3Status,
    MutationAction, MutationId, Notice, ValidationError,
};
use dreamos_db::SyncQueueRepository;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::advisor::{AiAdvisor, Forecast, WELCOME_FALLBACK};
use crate::connectivity::ConnectivityOracle;
use crate::error::{SyncError, SyncResult};
use crate::notify::Notifier;
use crate::refresh::CollectionRefresher;
use crate::remote::RemoteStore;
use crate::state::AppState;

/// Where a routed write ended up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "kebab-case")]
pub enum Routed {
    /// Accepted by the remote store.
    Remote { record_id: String },
    /// Deferred. `mutation_id` is `None` when the queue could not be
    /// persisted and the change lives only in memory.
    Queued {
        record_id: String,
        mutation_id: Option<MutationId>,
    },
}

impl Routed {
    pub fn is_queued(&self) -> bool {
        matches!(self, Routed::Queued { .. })
    }

    pub fn record_id(&self) -> &str {
        match self {
            Routed::Remote { record_id } | Routed::Queued { record_id, .. } => record_id,
        }
    }
}

/// One write, described for both paths.
struct WriteRequest<'a> {
    table: Collection,
    action: MutationAction,
    record_id: String,
    /// Queued payload; always carries `id` for Update and Delete.
    payload: Value,
    queued_message: &'a str,
    remote_message: String,
}

pub struct MutationRouter {
    queue: SyncQueueRepository,
    remote: Arc<dyn RemoteStore>,
    oracle: Arc<ConnectivityOracle>,
    refresher: CollectionRefresher,
    state: Arc<AppState>,
    advisor: Arc<dyn AiAdvisor>,
    notifier: Arc<dyn Notifier>,
}

impl MutationRouter {
    pub fn new(
        queue: SyncQueueRepository,
        remote: Arc<dyn RemoteStore>,
        oracle: Arc<ConnectivityOracle>,
        refresher: CollectionRefresher,
        state: Arc<AppState>,
        advisor: Arc<dyn AiAdvisor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        MutationRouter {
            queue,
            remote,
            oracle,
            refresher,
            state,
            advisor,
            notifier,
        }
    }

    // =========================================================================
    // Domain Operations
    // =========================================================================

    /// Accepted bookings, queued or sent, are remembered as made on this
    /// device.
    pub async fn submit_booking(&self, draft: BookingDraft) -> SyncResult<Routed> {
        self.validated(draft.validate())?;
        let tenant = self.state.tenant().await;
        let booking = draft.into_record(&tenant.id, Utc::now());
        let record_id = booking.id.clone().unwrap_or_default();

        let routed = self
            .route(WriteRequest {
                table: Collection::Bookings,
                action: MutationAction::Insert,
                record_id,
                payload: serde_json::to_value(&booking)?,
                queued_message: "Reservasi disimpan secara offline",
                remote_message: "Reservasi Sarana Berhasil!".to_string(),
            })
            .await?;

        if let Some(ids) = self.state.remember_booking(routed.record_id()).await {
            if !self.refresher.cache().save_own_booking_ids(&ids).await {
                warn!(record_id = routed.record_id(), "Own booking list not persisted");
            }
        }
        Ok(routed)
    }

    /// Online reports are triaged by the AI advisor before sending; its
    /// answer only adjusts priority and suggestion.
    pub async fn submit_k3_report(&self, draft: K3ReportDraft) -> SyncResult<Routed> {
        self.validated(draft.validate())?;
        let tenant = self.state.tenant().await;
        let mut report = draft.into_record(&tenant.id, Utc::now());

        if self.oracle.is_online() {
            if let Some(assessment) = self
                .advisor
                .classify_incident(&report.problem, report.photo.as_deref())
                .await
            {
                debug!(priority = ?assessment.priority, "Applying AI triage");
                report.priority = assessment.priority;
                report.suggestion = Some(assessment.suggestion);
            }
        }

        self.route(WriteRequest {
            table: Collection::K3Reports,
            action: MutationAction::Insert,
            record_id: report.id.clone(),
            payload: serde_json::to_value(&report)?,
            queued_message: "Laporan tersimpan secara offline",
            remote_message: "Laporan K3 Berhasil Dikirim".to_string(),
        })
        .await
    }

    pub async fn update_k3_status(&self, id: &str, status: K3Status) -> SyncResult<Routed> {
        self.route(WriteRequest {
            table: Collection::K3Reports,
            action: MutationAction::Update,
            record_id: id.to_string(),
            payload: json!({ "id": id, "status": status }),
            queued_message: "Perubahan status masuk antrean offline",
            remote_message: format!("Status laporan diperbarui ke {}", status.as_str()),
        })
        .await
    }

    /// Updates when the draft carries an id, inserts otherwise.
    pub async fn save_inventory_item(&self, draft: InventoryDraft) -> SyncResult<Routed> {
        self.validated(draft.validate())?;
        let action = if draft.is_edit() {
            MutationAction::Update
        } else {
            MutationAction::Insert
        };
        let tenant = self.state.tenant().await;
        let item = draft.into_record(&tenant.id, Utc::now());

        self.route(WriteRequest {
            table: Collection::Inventory,
            action,
            record_id: item.id.clone(),
            payload: serde_json::to_value(&item)?,
            queued_message: "Update aset disimpan secara offline",
            remote_message: "Data aset berhasil diperbarui".to_string(),
        })
        .await
    }

    pub async fn delete_inventory_item(&self, id: &str) -> SyncResult<Routed> {
        self.route(WriteRequest {
            table: Collection::Inventory,
            action: MutationAction::Delete,
            record_id: id.to_string(),
            payload: json!({ "id": id }),
            queued_message: "Penghapusan aset masuk antrean",
            remote_message: "Aset berhasil dihapus".to_string(),
        })
        .await
    }

    // =========================================================================
    // AI Helpers
    // =========================================================================

    /// Thirty-day forecast from the loaded bookings and inventory. Needs
    /// connectivity.
    pub async fn forecast(&self) -> SyncResult<Option<Forecast>> {
        if !self.oracle.is_online() {
            self.notifier
                .notify(Notice::error("Fitur AI Forecast membutuhkan koneksi internet"));
            return Err(SyncError::Offline("AI forecast".into()));
        }

        let forecast = self
            .advisor
            .forecast(&self.state.bookings().await, &self.state.inventory().await)
            .await;
        match &forecast {
            Some(_) => self
                .notifier
                .notify(Notice::success("Prediksi Neural Berhasil Diperbarui")),
            None => self
                .notifier
                .notify(Notice::error("Prediksi Neural belum tersedia")),
        }
        Ok(forecast)
    }

    /// Home-screen greeting for the current tenant. Offline devices get the
    /// fixed greeting without a model call.
    pub async fn welcome_message(&self) -> String {
        if !self.oracle.is_online() {
            return WELCOME_FALLBACK.to_string();
        }
        let tenant = self.state.tenant().await;
        self.advisor.welcome_message(&tenant.name).await
    }

    /// Asks the assistant about the loaded data. Always returns text.
    pub async fn ask_assistant(&self, question: &str) -> String {
        let context = json!({
            "tenant": self.state.tenant().await.name,
            "bookings": self.state.bookings().await,
            "k3": self.state.k3_reports().await,
            "inventory": self.state.inventory().await,
        });
        self.advisor.ask(question, &context).await
    }

    // =========================================================================
    // Routing
    // =========================================================================

    fn validated(&self, result: Result<(), ValidationError>) -> SyncResult<()> {
        result.map_err(|e| {
            debug!(error = %e, "Draft rejected");
            self.notifier.notify(Notice::error(e.to_string()));
            SyncError::from(e)
        })
    }

    async fn route(&self, write: WriteRequest<'_>) -> SyncResult<Routed> {
        if write.action.requires_id() {
            self.validated(validation::require("id", &write.record_id))?;
        }
        if self.oracle.is_online() {
            self.send_remote(write).await
        } else {
            Ok(self.defer(write).await)
        }
    }

    async fn defer(&self, write: WriteRequest<'_>) -> Routed {
        let mutation_id = match self
            .queue
            .enqueue(write.table, write.action, write.payload.clone())
            .await
        {
            Ok(mutation) => Some(mutation.id),
            Err(e) => {
                warn!(
                    table = %write.table,
                    action = %write.action,
                    error = %e,
                    "Could not persist queued mutation; change kept in memory only"
                );
                self.notifier.notify(Notice::error(e.to_string()));
                None
            }
        };

        self.notifier.notify(Notice::info(write.queued_message));
        self.state
            .apply_optimistic(write.table, write.action, &write.payload)
            .await;

        info!(
            table = %write.table,
            action = %write.action,
            record_id = %write.record_id,
            "Write deferred while offline"
        );
        Routed::Queued {
            record_id: write.record_id,
            mutation_id,
        }
    }

    async fn send_remote(&self, write: WriteRequest<'_>) -> SyncResult<Routed> {
        let table = write.table;
        let id = write.record_id.as_str();

        let result = match write.action {
            MutationAction::Insert => self.remote.insert(table, &write.payload).await.map(|_| ()),
            MutationAction::Update => {
                let patch = without_id(&write.payload);
                self.remote.update(table, &patch, id).await.map(|_| ())
            }
            MutationAction::Delete => self.remote.delete(table, id).await,
        };

        if let Err(e) = result {
            error!(table = %table, action = %write.action, record_id = %id, error = %e, "Remote write failed");
            self.notifier.notify(Notice::error(e.to_string()));
            return Err(e);
        }

        if let Err(e) = self.refresher.refresh(table).await {
            warn!(table = %table, error = %e, "Refresh after remote write failed");
        }
        self.notifier.notify(Notice::success(write.remote_message));
        debug!(table = %table, action = %write.action, record_id = %id, "Remote write applied");

        Ok(Routed::Remote {
            record_id: write.record_id,
        })
    }
}

/// The patch sent on the online path; the id travels in the filter.
fn without_id(payload: &Value) -> Value {
    let mut patch = payload.clone();
    if let Some(fields) = patch.as_object_mut() {
        fields.remove("id");
    }
    patch
}
