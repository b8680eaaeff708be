//! Re-fetches collections from the remote store into [`AppState`] and the
//! Local Cache Store.
//!
//! A collection is written to the cache only after its rows were fetched,
//! so a failed select leaves the previous snapshot in place. Rows that do
//! not decode are logged and left out; they never block the rest of the
//! collection.

use dreamos_core::{Booking, Collection, InventoryItem, K3Report};
use dreamos_db::CacheRepository;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SyncResult;
use crate::remote::RemoteStore;
use crate::state::{AppState, StateRecord};

/// Collections refreshed and failed during one [`CollectionRefresher::refresh_all`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub refreshed: Vec<Collection>,
    pub failed: Vec<Collection>,
    /// True when nothing was fetched because the tenant is still in setup.
    pub skipped: bool,
}

#[derive(Debug, Clone)]
pub struct CollectionRefresher {
    remote: Arc<dyn RemoteStore>,
    cache: CacheRepository,
    state: Arc<AppState>,
}

impl CollectionRefresher {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: CacheRepository, state: Arc<AppState>) -> Self {
        CollectionRefresher {
            remote,
            cache,
            state,
        }
    }

    pub fn cache(&self) -> &CacheRepository {
        &self.cache
    }

    /// Refreshes every collection. Failures are logged per collection and
    /// never stop the others.
    pub async fn refresh_all(&self) -> RefreshSummary {
        let mut summary = RefreshSummary::default();
        if self.state.tenant().await.is_pending_setup() {
            debug!("Tenant pending setup; refresh skipped");
            summary.skipped = true;
            return summary;
        }

        for table in Collection::ALL {
            match self.fetch(table).await {
                Ok(_) => summary.refreshed.push(table),
                Err(e) => {
                    warn!(table = %table, error = %e, "Refresh failed; cached snapshot kept");
                    summary.failed.push(table);
                }
            }
        }

        info!(
            refreshed = summary.refreshed.len(),
            failed = summary.failed.len(),
            "Collections refreshed"
        );
        summary
    }

    /// Refreshes one collection. Returns the number of records loaded, or
    /// zero when the tenant is still in setup.
    pub async fn refresh(&self, table: Collection) -> SyncResult<usize> {
        if self.state.tenant().await.is_pending_setup() {
            debug!(table = %table, "Tenant pending setup; refresh skipped");
            return Ok(0);
        }
        self.fetch(table).await
    }

    async fn fetch(&self, table: Collection) -> SyncResult<usize> {
        match table {
            Collection::Bookings => self.fetch_typed::<Booking>().await,
            Collection::K3Reports => self.fetch_typed::<K3Report>().await,
            Collection::Inventory => self.fetch_typed::<InventoryItem>().await,
        }
    }

    async fn fetch_typed<R: StateRecord>(&self) -> SyncResult<usize> {
        let table = R::COLLECTION;
        let rows = self.remote.select(table, table.default_order()).await?;
        let records: Vec<R> = rows.into_iter().filter_map(decode_row).collect();

        let count = records.len();
        if !self.cache.save_collection(&records).await {
            warn!(table = %table, "Cache write failed; in-memory state only");
        }
        self.state.replace(records).await;

        debug!(table = %table, count, "Collection refreshed");
        Ok(count)
    }
}

fn decode_row<R: StateRecord>(row: Value) -> Option<R> {
    let id = row.get("id").and_then(Value::as_str).map(str::to_owned);
    match serde_json::from_value(row) {
        Ok(record) => Some(record),
        Err(e) => {
            warn!(table = %R::COLLECTION, id = ?id, error = %e, "Skipping undecodable row");
            None
        }
    }
}
