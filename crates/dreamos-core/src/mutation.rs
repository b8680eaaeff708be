//! # Queued Mutations
//!
//! A [`QueuedMutation`] is the durable record of one write the user made
//! while the remote store was unreachable.
//!
//! ## Lifecycle
//! ```text
//! ┌──────────────┐  offline write   ┌──────────────┐   reconnect   ┌──────────────┐
//! │  user draft  │ ───────────────► │  sync:queue  │ ────────────► │ remote table │
//! └──────────────┘   (router)       │  FIFO, JSON  │ (reconcile)   └──────────────┘
//!                                   └──────────────┘
//! ```
//!
//! ## Id Scheme
//! `"{millis}-{12 hex}"`. The millisecond part comes from a process-wide
//! monotonic clock that never repeats, so ids sort in creation order and two
//! writes in the same millisecond still get distinct ids.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::Collection;

// =============================================================================
// Mutation Action
// =============================================================================

/// The kind of write a queued mutation replays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum MutationAction {
    Insert,
    Update,
    Delete,
}

impl MutationAction {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MutationAction::Insert => "INSERT",
            MutationAction::Update => "UPDATE",
            MutationAction::Delete => "DELETE",
        }
    }

    /// Update and Delete are matched against the record's `id`.
    pub const fn requires_id(&self) -> bool {
        !matches!(self, MutationAction::Insert)
    }
}

impl fmt::Display for MutationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Mutation Id
// =============================================================================

static LAST_ID_MILLIS: AtomicI64 = AtomicI64::new(0);

/// Strictly increasing millisecond stamp, unique within this process.
fn next_unique_millis() -> i64 {
    let now = Utc::now().timestamp_millis();
    let mut last = LAST_ID_MILLIS.load(Ordering::Relaxed);
    loop {
        let candidate = now.max(last + 1);
        match LAST_ID_MILLIS.compare_exchange_weak(
            last,
            candidate,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate,
            Err(actual) => last = actual,
        }
    }
}

/// Identifier of a queued mutation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(transparent)]
pub struct MutationId(pub String);

impl MutationId {
    /// Generates a fresh, process-unique id.
    pub fn generate() -> Self {
        let millis = next_unique_millis();
        let random = uuid::Uuid::new_v4().simple().to_string();
        MutationId(format!("{}-{}", millis, &random[..12]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Queued Mutation
// =============================================================================

/// One deferred write, persisted verbatim in the sync queue.
///
/// `payload` is the record (Insert), the partial patch including `id`
/// (Update) or `{ "id": ... }` (Delete).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct QueuedMutation {
    pub id: MutationId,
    pub table: Collection,
    pub action: MutationAction,
    #[ts(type = "unknown")]
    pub payload: Value,
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
}

impl QueuedMutation {
    /// Stamps a new mutation with a fresh id and the current time.
    pub fn new(table: Collection, action: MutationAction, payload: Value) -> Self {
        QueuedMutation {
            id: MutationId::generate(),
            table,
            action,
            payload,
            timestamp: Utc::now(),
        }
    }

    /// The `id` field of the payload, if present and a string.
    pub fn record_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }

    /// Returns the record id an Update/Delete must be matched against.
    ///
    /// # Errors
    /// [`CoreError::MissingRecordId`] when the action needs an id and the
    /// payload has none.
    pub fn require_record_id(&self) -> CoreResult<&str> {
        self.record_id().ok_or_else(|| CoreError::MissingRecordId {
            table: self.table.table_name().to_string(),
            action: self.action.to_string(),
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
