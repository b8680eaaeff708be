//! # Local Store
//!
//! Typed JSON access over an injected [`StorageBackend`].
//!
//! ## Failure Semantics
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  save(key, v)                                                           │
//! │    ├── ok                        → true                                 │
//! │    └── quota / medium failure    → warn!, false  (caller keeps going    │
//! │                                    on in-memory state)                  │
//! │                                                                         │
//! │  load::<T>(key)                                                         │
//! │    ├── present + parses          → Some(v)                              │
//! │    ├── absent                    → None                                 │
//! │    └── corrupt / backend error   → warn!, None                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Neither operation ever returns an error to the caller. `try_save` is the
//! fallible variant for callers that must report the failure (the sync
//! queue).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::backend::StorageBackend;
use crate::error::StoreResult;

#[derive(Debug, Clone)]
pub struct LocalStore {
    backend: Arc<dyn StorageBackend>,
}

impl LocalStore {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        LocalStore { backend }
    }

    pub fn backend(&self) -> &Arc<dyn StorageBackend> {
        &self.backend
    }

    /// Serializes and writes `value`, reporting any failure.
    pub async fn try_save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> StoreResult<()> {
        let text = serde_json::to_string(value)?;
        self.backend.set(key, &text).await
    }

    /// Serializes and writes `value`. Failures are logged and swallowed.
    ///
    /// Returns whether the write reached the medium.
    pub async fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> bool {
        match self.try_save(key, value).await {
            Ok(()) => true,
            Err(e) => {
                warn!(key = %key, error = %e, "Persisting to local store failed; keeping in-memory state only");
                false
            }
        }
    }

    /// Reads and parses the value under `key`. Absent, corrupt and
    /// unreadable values all yield `None`.
    pub async fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let text = match self.backend.get(key).await {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(e) => {
                warn!(key = %key, error = %e, "Reading local store failed");
                return None;
            }
        };

        match serde_json::from_str(&text) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "Ignoring corrupt snapshot");
                None
            }
        }
    }

    pub async fn remove(&self, key: &str) -> StoreResult<()> {
        self.backend.remove(key).await
    }

    /// Deletes every persisted key.
    pub async fn purge(&self) -> StoreResult<()> {
        debug!("Purging local store");
        self.backend.clear().await
    }

    pub async fn usage_bytes(&self) -> StoreResult<u64> {
        self.backend.usage_bytes().await
    }
}
