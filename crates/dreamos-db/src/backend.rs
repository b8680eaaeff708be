//! # Storage Backends
//!
//! The persistence medium behind [`LocalStore`](crate::LocalStore).
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                 dyn StorageBackend                           │
//! │        get · set · remove · clear · usage_bytes              │
//! └───────────────┬──────────────────────────────┬───────────────┘
//!                 │                              │
//!      ┌──────────▼──────────┐        ┌──────────▼──────────┐
//!      │   MemoryBackend     │        │  Database (SQLite)  │
//!      │   tests, ephemeral  │        │  durable, WAL       │
//!      └─────────────────────┘        └─────────────────────┘
//! ```
//!
//! Values are opaque strings. Both backends count usage as the sum of key
//! and value byte lengths and reject a write that would push the total
//! past the configured quota.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use tokio::sync::RwLock;

use crate::error::{StoreError, StoreResult};

/// A string key/value medium scoped to one device profile.
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Inserts or overwrites `key`.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn remove(&self, key: &str) -> StoreResult<()>;

    /// Removes every key.
    async fn clear(&self) -> StoreResult<()>;

    /// Bytes currently held (keys plus values).
    async fn usage_bytes(&self) -> StoreResult<u64>;
}

/// Bytes an entry occupies for quota purposes.
pub(crate) fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

/// Checks a pending write against a quota.
///
/// `current` is total usage now, `replaced` the size of the entry being
/// overwritten (zero for a new key).
pub(crate) fn check_quota(
    quota: Option<u64>,
    key: &str,
    value: &str,
    current: u64,
    replaced: u64,
) -> StoreResult<()> {
    if let Some(limit) = quota {
        let needed = current.saturating_sub(replaced) + entry_size(key, value);
        if needed > limit {
            return Err(StoreError::QuotaExceeded {
                key: key.to_string(),
                needed,
                limit,
            });
        }
    }
    Ok(())
}

// =============================================================================
// In-Memory Backend
// =============================================================================

/// Process-local backend. Lost on drop.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: RwLock<BTreeMap<String, String>>,
    quota_bytes: Option<u64>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        MemoryBackend::default()
    }

    /// A backend that rejects writes once `bytes` would be exceeded.
    pub fn with_quota(bytes: u64) -> Self {
        MemoryBackend {
            entries: RwLock::new(BTreeMap::new()),
            quota_bytes: Some(bytes),
        }
    }

    /// Writes a raw value without quota checks. Lets tests plant
    /// corrupt snapshots.
    pub async fn insert_raw(&self, key: &str, value: &str) {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        let current: u64 = entries.iter().map(|(k, v)| entry_size(k, v)).sum();
        let replaced = entries.get(key).map_or(0, |v| entry_size(key, v));
        check_quota(self.quota_bytes, key, value, current, replaced)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn clear(&self) -> StoreResult<()> {
        self.entries.write().await.clear();
        Ok(())
    }

    async fn usage_bytes(&self) -> StoreResult<u64> {
        Ok(self
            .entries
            .read()
            .await
            .iter()
            .map(|(k, v)| entry_size(k, v))
            .sum())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_remove() {
        let backend = MemoryBackend::new();
        backend.set("a", "1").await.unwrap();
        assert_eq!(backend.get("a").await.unwrap().as_deref(), Some("1"));
        backend.set("a", "2").await.unwrap();
        assert_eq!(backend.get("a").await.unwrap().as_deref(), Some("2"));
        backend.remove("a").await.unwrap();
        assert_eq!(backend.get("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quota_rejects_and_keeps_old_value() {
        let backend = MemoryBackend::with_quota(10);
        backend.set("k", "12345").await.unwrap();
        let err = backend.set("k", "1234567890").await.unwrap_err();
        assert!(err.is_quota());
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some("12345"));
        assert_eq!(backend.usage_bytes().await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_overwrite_counts_only_new_size() {
        let backend = MemoryBackend::with_quota(10);
        backend.set("k", "123456789").await.unwrap();
        backend.set("k", "987654321").await.unwrap();
        assert_eq!(backend.usage_bytes().await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_clear() {
        let backend = MemoryBackend::new();
        backend.set("a", "1").await.unwrap();
        backend.set("b", "2").await.unwrap();
        backend.clear().await.unwrap();
        assert_eq!(backend.usage_bytes().await.unwrap(), 0);
    }
}
