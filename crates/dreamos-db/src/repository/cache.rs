//! # Cache Repository
//!
//! Last-known-good snapshot of each collection, plus the tenant profile and
//! the ids of bookings made on this device.

use dreamos_core::{Record, TenantConfig};
use tracing::debug;

use crate::keys;
use crate::store::LocalStore;

#[derive(Debug, Clone)]
pub struct CacheRepository {
    store: LocalStore,
}

impl CacheRepository {
    pub fn new(store: LocalStore) -> Self {
        CacheRepository { store }
    }

    /// Overwrites the snapshot for `R`'s collection. Returns false when the
    /// write was rejected (already logged).
    pub async fn save_collection<R: Record>(&self, records: &[R]) -> bool {
        debug!(
            collection = %R::COLLECTION,
            count = records.len(),
            "Caching collection snapshot"
        );
        self.store.save(R::COLLECTION.cache_key(), records).await
    }

    /// The cached snapshot, or `None` when absent or corrupt.
    pub async fn load_collection<R: Record>(&self) -> Option<Vec<R>> {
        self.store.load(R::COLLECTION.cache_key()).await
    }

    pub async fn load_tenant(&self) -> Option<TenantConfig> {
        self.store.load(keys::TENANT_PROFILE).await
    }

    pub async fn save_tenant(&self, tenant: &TenantConfig) -> bool {
        self.store.save(keys::TENANT_PROFILE, tenant).await
    }

    pub async fn load_own_booking_ids(&self) -> Vec<String> {
        self.store.load(keys::OWN_BOOKINGS).await.unwrap_or_default()
    }

    pub async fn save_own_booking_ids(&self, ids: &[String]) -> bool {
        self.store.save(keys::OWN_BOOKINGS, ids).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use chrono::Utc;
    use dreamos_core::{InventoryItem, ItemCondition, K3Report};
    use std::sync::Arc;

    fn item(id: &str, name: &str) -> InventoryItem {
        InventoryItem {
            id: id.to_string(),
            tenant_id: None,
            name: name.to_string(),
            brand_type: String::new(),
            category: "Mebel".to_string(),
            unit: "pcs".to_string(),
            initial_stock: 5,
            current_stock: 5,
            location: "Gudang".to_string(),
            condition: ItemCondition::Good,
            last_updated: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_collection_round_trip() {
        let repo = CacheRepository::new(LocalStore::new(Arc::new(MemoryBackend::new())));
        let items = vec![item("inv-1", "Kursi"), item("inv-2", "Meja")];
        assert!(repo.save_collection(&items).await);
        assert_eq!(repo.load_collection::<InventoryItem>().await, Some(items));
    }

    #[tokio::test]
    async fn test_collections_do_not_share_keys() {
        let repo = CacheRepository::new(LocalStore::new(Arc::new(MemoryBackend::new())));
        repo.save_collection(&[item("inv-1", "Kursi")]).await;
        assert!(repo.load_collection::<K3Report>().await.is_none());
    }

    #[tokio::test]
    async fn test_tenant_profile() {
        let repo = CacheRepository::new(LocalStore::new(Arc::new(MemoryBackend::new())));
        assert!(repo.load_tenant().await.is_none());
        let tenant = TenantConfig {
            id: "smkn1".to_string(),
            name: "SMKN 1".to_string(),
            ..Default::default()
        };
        assert!(repo.save_tenant(&tenant).await);
        assert_eq!(repo.load_tenant().await, Some(tenant));
    }

    #[tokio::test]
    async fn test_own_booking_ids() {
        let repo = CacheRepository::new(LocalStore::new(Arc::new(MemoryBackend::new())));
        assert!(repo.load_own_booking_ids().await.is_empty());
        let ids = vec!["bk-1".to_string(), "bk-2".to_string()];
        assert!(repo.save_own_booking_ids(&ids).await);
        assert_eq!(repo.load_own_booking_ids().await, ids);
    }
}
