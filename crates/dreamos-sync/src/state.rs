//! # Application State
//!
//! The in-memory collections the dashboard renders from.
//!
//! ```text
//!  startup            online write / drain          offline write
//!  ───────            ────────────────────          ─────────────
//!  cache ──hydrate──► AppState ◄──replace── remote   AppState ◄──apply_optimistic
//!                        │                              (cache untouched)
//!                        ▼
//!                   what the user sees
//! ```
//!
//! Optimistic updates only touch this state; the Local Cache Store is
//! rewritten from the remote store after the next successful refresh.

use dreamos_core::{
    BackupData, Booking, Collection, InventoryItem, K3Report, MutationAction, Record,
    TenantConfig,
};
use dreamos_db::CacheRepository;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Record types with a slot in [`AppState`].
pub trait StateRecord: Record {
    fn slot(state: &AppState) -> &RwLock<Vec<Self>>;

    /// Restores the collection's display order after an insert.
    fn reorder(_records: &mut [Self]) {}
}

impl StateRecord for Booking {
    fn slot(state: &AppState) -> &RwLock<Vec<Self>> {
        &state.bookings
    }
}

impl StateRecord for K3Report {
    fn slot(state: &AppState) -> &RwLock<Vec<Self>> {
        &state.k3_reports
    }
}

impl StateRecord for InventoryItem {
    fn slot(state: &AppState) -> &RwLock<Vec<Self>> {
        &state.inventory
    }

    fn reorder(records: &mut [Self]) {
        records.sort_by(|a, b| a.name.cmp(&b.name));
    }
}

#[derive(Debug, Default)]
pub struct AppState {
    tenant: RwLock<TenantConfig>,
    bookings: RwLock<Vec<Booking>>,
    k3_reports: RwLock<Vec<K3Report>>,
    inventory: RwLock<Vec<InventoryItem>>,
    /// Ids of bookings submitted from this device.
    own_booking_ids: RwLock<Vec<String>>,
}

/// Record counts per collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateCounts {
    pub bookings: usize,
    pub k3_reports: usize,
    pub inventory: usize,
}

impl AppState {
    pub fn new(tenant: TenantConfig) -> Self {
        AppState {
            tenant: RwLock::new(tenant),
            ..Default::default()
        }
    }

    /// Builds state from the cached snapshots. Absent or corrupt snapshots
    /// start empty.
    pub async fn hydrate(cache: &CacheRepository, tenant: TenantConfig) -> Self {
        let state = AppState::new(tenant);
        state.replace(cache.load_collection::<Booking>().await.unwrap_or_default()).await;
        state.replace(cache.load_collection::<K3Report>().await.unwrap_or_default()).await;
        state
            .replace(cache.load_collection::<InventoryItem>().await.unwrap_or_default())
            .await;
        *state.own_booking_ids.write().await = cache.load_own_booking_ids().await;

        let counts = state.counts().await;
        debug!(
            bookings = counts.bookings,
            k3_reports = counts.k3_reports,
            inventory = counts.inventory,
            "State hydrated from cache"
        );
        state
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub async fn tenant(&self) -> TenantConfig {
        self.tenant.read().await.clone()
    }

    pub async fn set_tenant(&self, tenant: TenantConfig) {
        *self.tenant.write().await = tenant;
    }

    /// Clone of one collection.
    pub async fn snapshot<R: StateRecord>(&self) -> Vec<R> {
        R::slot(self).read().await.clone()
    }

    pub async fn bookings(&self) -> Vec<Booking> {
        self.snapshot().await
    }

    pub async fn k3_reports(&self) -> Vec<K3Report> {
        self.snapshot().await
    }

    pub async fn inventory(&self) -> Vec<InventoryItem> {
        self.snapshot().await
    }

    /// Loaded bookings that were submitted from this device.
    pub async fn own_bookings(&self) -> Vec<Booking> {
        let ids = self.own_booking_ids.read().await;
        self.bookings
            .read()
            .await
            .iter()
            .filter(|b| b.id.as_ref().is_some_and(|id| ids.contains(id)))
            .cloned()
            .collect()
    }

    pub async fn own_booking_ids(&self) -> Vec<String> {
        self.own_booking_ids.read().await.clone()
    }

    pub async fn counts(&self) -> StateCounts {
        StateCounts {
            bookings: self.bookings.read().await.len(),
            k3_reports: self.k3_reports.read().await.len(),
            inventory: self.inventory.read().await.len(),
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Replaces one collection wholesale.
    pub async fn replace<R: StateRecord>(&self, records: Vec<R>) {
        *R::slot(self).write().await = records;
    }

    /// Replaces the collections present in an imported backup.
    pub async fn import(&self, data: BackupData) {
        if let Some(bookings) = data.bookings {
            self.replace(bookings).await;
        }
        if let Some(k3) = data.k3 {
            self.replace(k3).await;
        }
        if let Some(inventory) = data.inventory {
            self.replace(inventory).await;
        }
    }

    /// Marks a booking as made on this device. Returns the updated id list,
    /// or `None` when the id was already known.
    pub async fn remember_booking(&self, id: &str) -> Option<Vec<String>> {
        let mut ids = self.own_booking_ids.write().await;
        if ids.iter().any(|known| known == id) {
            return None;
        }
        ids.push(id.to_string());
        Some(ids.clone())
    }

    /// Empties every collection and the own-booking list. The tenant
    /// profile is kept.
    pub async fn clear(&self) {
        self.replace(Vec::<Booking>::new()).await;
        self.replace(Vec::<K3Report>::new()).await;
        self.replace(Vec::<InventoryItem>::new()).await;
        self.own_booking_ids.write().await.clear();
    }

    /// Applies a write locally so the user sees it before the remote
    /// store does.
    ///
    /// - Insert: prepended (inventory re-sorted by name)
    /// - Update: patch fields merged into the record with the same id
    /// - Delete: record with the same id removed
    ///
    /// Payloads that don't fit the collection are logged and ignored.
    pub async fn apply_optimistic(&self, table: Collection, action: MutationAction, payload: &Value) {
        match table {
            Collection::Bookings => self.apply::<Booking>(action, payload).await,
            Collection::K3Reports => self.apply::<K3Report>(action, payload).await,
            Collection::Inventory => self.apply::<InventoryItem>(action, payload).await,
        }
    }

    async fn apply<R: StateRecord>(&self, action: MutationAction, payload: &Value) {
        let id = payload.get("id").and_then(Value::as_str);
        let mut records = R::slot(self).write().await;

        match action {
            MutationAction::Insert => match serde_json::from_value::<R>(payload.clone()) {
                Ok(record) => {
                    records.insert(0, record);
                    R::reorder(&mut records);
                }
                Err(e) => warn!(collection = %R::COLLECTION, error = %e, "Optimistic insert skipped"),
            },

            MutationAction::Update => {
                let Some(id) = id else {
                    warn!(collection = %R::COLLECTION, "Optimistic update without id skipped");
                    return;
                };
                let Some(slot) = records.iter_mut().find(|r| r.record_id() == Some(id)) else {
                    debug!(collection = %R::COLLECTION, id, "Optimistic update target not loaded");
                    return;
                };
                match merge_patch(&*slot, payload) {
                    Ok(merged) => *slot = merged,
                    Err(e) => {
                        warn!(collection = %R::COLLECTION, id, error = %e, "Optimistic update skipped")
                    }
                }
            }

            MutationAction::Delete => {
                if let Some(id) = id {
                    records.retain(|r| r.record_id() != Some(id));
                }
            }
        }
    }
}

/// Shallow merge of `patch`'s top-level fields into `record`.
fn merge_patch<R: Record>(record: &R, patch: &Value) -> Result<R, serde_json::Error> {
    let mut value = serde_json::to_value(record)?;
    if let (Some(target), Some(fields)) = (value.as_object_mut(), patch.as_object()) {
        for (k, v) in fields {
            target.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(value)
}
