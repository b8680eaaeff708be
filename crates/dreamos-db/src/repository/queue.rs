//! # Sync Queue Repository
//!
//! Ordered, durable log of mutations made while offline.
//!
//! ## Storage
//! ```text
//! "sync:queue" = [ M1, M2, M3 ]      oldest first
//!
//! enqueue(M4):  read → [M1, M2, M3] → push → write [M1, M2, M3, M4]
//! peek_all():   read → [M1, M2, M3, M4]      (corrupt → [])
//! clear_all():  remove key
//! ```
//!
//! Appends are read-modify-write on a single key. Within one process they
//! are serialized by a lock shared between clones of the repository; two
//! processes sharing the same medium can still lose an append.

use dreamos_core::{Collection, MutationAction, MutationId, QueuedMutation};
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::StoreResult;
use crate::keys;
use crate::store::LocalStore;

/// Repository for the pending-mutation queue.
#[derive(Debug, Clone)]
pub struct SyncQueueRepository {
    store: LocalStore,
    write_lock: Arc<Mutex<()>>,
}

impl SyncQueueRepository {
    pub fn new(store: LocalStore) -> Self {
        SyncQueueRepository {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Appends a new mutation at the tail of the queue.
    ///
    /// ## Returns
    /// The stored mutation, or the persistence error (quota, medium
    /// failure). On error the queue is unchanged.
    pub async fn enqueue(
        &self,
        table: Collection,
        action: MutationAction,
        payload: Value,
    ) -> StoreResult<QueuedMutation> {
        let _guard = self.write_lock.lock().await;

        let mutation = QueuedMutation::new(table, action, payload);
        let mut queue = self.peek_all().await;
        queue.push(mutation.clone());
        self.store.try_save(keys::SYNC_QUEUE, &queue).await?;

        debug!(
            mutation_id = %mutation.id,
            table = %table,
            action = %action,
            pending = queue.len(),
            "Mutation queued"
        );
        Ok(mutation)
    }

    /// Every pending mutation in enqueue order. Empty when none are
    /// pending or the stored queue is unreadable.
    pub async fn peek_all(&self) -> Vec<QueuedMutation> {
        self.store
            .load::<Vec<QueuedMutation>>(keys::SYNC_QUEUE)
            .await
            .unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.peek_all().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Removes every pending mutation unconditionally.
    pub async fn clear_all(&self) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        self.store.remove(keys::SYNC_QUEUE).await?;
        info!("Sync queue cleared");
        Ok(())
    }

    /// Removes the given mutations, keeping the rest in order.
    ///
    /// Only used when failed mutations are retained after a drain; the
    /// default drain clears the whole queue instead.
    pub async fn remove_ids(&self, ids: &[MutationId]) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;

        let targets: HashSet<&MutationId> = ids.iter().collect();
        let queue = self.peek_all().await;
        let before = queue.len();
        let remaining: Vec<QueuedMutation> = queue
            .into_iter()
            .filter(|m| !targets.contains(&m.id))
            .collect();
        let removed = before - remaining.len();

        if remaining.is_empty() {
            self.store.remove(keys::SYNC_QUEUE).await?;
        } else {
            self.store.try_save(keys::SYNC_QUEUE, &remaining).await?;
        }

        debug!(removed, remaining = remaining.len(), "Removed confirmed mutations");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    fn repo() -> SyncQueueRepository {
        SyncQueueRepository::new(LocalStore::new(Arc::new(MemoryBackend::new())))
    }

    #[tokio::test]
    async fn test_fifo_order() {
        let q = repo();
        for i in 1..=3 {
            q.enqueue(
                Collection::Inventory,
                MutationAction::Delete,
                json!({ "id": format!("inv-{}", i) }),
            )
            .await
            .unwrap();
        }
        let ids: Vec<_> = q
            .peek_all()
            .await
            .iter()
            .map(|m| m.record_id().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["inv-1", "inv-2", "inv-3"]);
    }

    #[tokio::test]
    async fn test_clear_all() {
        let q = repo();
        q.enqueue(Collection::Bookings, MutationAction::Insert, json!({}))
            .await
            .unwrap();
        assert_eq!(q.len().await, 1);
        q.clear_all().await.unwrap();
        assert!(q.is_empty().await);
    }

    #[tokio::test]
    async fn test_corrupt_queue_reads_empty() {
        let backend = Arc::new(MemoryBackend::new());
        backend.insert_raw(keys::SYNC_QUEUE, "][").await;
        let q = SyncQueueRepository::new(LocalStore::new(backend));
        assert!(q.peek_all().await.is_empty());
    }

    #[tokio::test]
    async fn test_enqueue_quota_failure_leaves_queue_unchanged() {
        let q = SyncQueueRepository::new(LocalStore::new(Arc::new(MemoryBackend::with_quota(300))));
        q.enqueue(Collection::K3Reports, MutationAction::Update, json!({ "id": "a" }))
            .await
            .unwrap();
        let err = q
            .enqueue(
                Collection::K3Reports,
                MutationAction::Insert,
                json!({ "foto": "x".repeat(1000) }),
            )
            .await
            .unwrap_err();
        assert!(err.is_quota());
        assert_eq!(q.len().await, 1);
    }

    #[tokio::test]
    async fn test_remove_ids_keeps_order_of_rest() {
        let q = repo();
        let m1 = q
            .enqueue(Collection::Bookings, MutationAction::Insert, json!({ "id": "1" }))
            .await
            .unwrap();
        q.enqueue(Collection::Bookings, MutationAction::Insert, json!({ "id": "2" }))
            .await
            .unwrap();
        let m3 = q
            .enqueue(Collection::Bookings, MutationAction::Insert, json!({ "id": "3" }))
            .await
            .unwrap();

        let removed = q.remove_ids(&[m1.id, m3.id]).await.unwrap();
        assert_eq!(removed, 2);
        let left = q.peek_all().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].record_id(), Some("2"));
    }

    #[tokio::test]
    async fn test_concurrent_enqueues_are_not_lost() {
        let q = repo();
        let mut handles = Vec::new();
        for i in 0..20 {
            let q = q.clone();
            handles.push(tokio::spawn(async move {
                q.enqueue(Collection::Inventory, MutationAction::Delete, json!({ "id": i.to_string() }))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        assert_eq!(q.len().await, 20);
    }
}
