//! # Remote Store Contract
//!
//! The remote relational store is treated as an opaque table-oriented CRUD
//! service. Records cross this boundary as JSON objects using the wire
//! field names.
//!
//! ```text
//! ┌─────────────────────┐            ┌──────────────────────────────┐
//! │ ReconciliationEngine│            │      dyn RemoteStore         │
//! │ MutationRouter      │──────────► │  select · insert · update ·  │
//! │ CollectionRefresher │            │  delete · health             │
//! └─────────────────────┘            └──────┬───────────────┬───────┘
//!                                           │               │
//!                                  ┌────────▼─────┐  ┌──────▼───────┐
//!                                  │SupabaseClient│  │ MemoryRemote │
//!                                  │ (PostgREST)  │  │ (tests, demo)│
//!                                  └──────────────┘  └──────────────┘
//! ```

use async_trait::async_trait;
use dreamos_core::{Collection, SortOrder};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Mutex;

use crate::error::{SyncError, SyncResult};

/// Table-oriented CRUD against the remote store.
#[async_trait]
pub trait RemoteStore: Send + Sync + Debug {
    /// Every row of `table`, ordered by `order`.
    async fn select(&self, table: Collection, order: SortOrder) -> SyncResult<Vec<Value>>;

    /// Creates a record and returns it as stored.
    async fn insert(&self, table: Collection, record: &Value) -> SyncResult<Value>;

    /// Merges `patch` into the record whose `id` equals `id`.
    async fn update(&self, table: Collection, patch: &Value, id: &str) -> SyncResult<Value>;

    /// Removes the record whose `id` equals `id`.
    async fn delete(&self, table: Collection, id: &str) -> SyncResult<()>;

    /// Cheap reachability probe.
    async fn health(&self) -> bool {
        true
    }
}

// =============================================================================
// In-Memory Remote
// =============================================================================

/// One call observed by [`MemoryRemote`].
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteCall {
    Select(Collection),
    Insert(Collection, Value),
    Update(Collection, String, Value),
    Delete(Collection, String),
}

impl RemoteCall {
    /// True for calls that change data.
    pub fn is_write(&self) -> bool {
        !matches!(self, RemoteCall::Select(_))
    }
}

#[derive(Debug, Default)]
struct MemoryTables {
    rows: HashMap<Collection, Vec<Value>>,
    calls: Vec<RemoteCall>,
    /// Record ids whose writes fail.
    failing_ids: HashSet<String>,
    /// Tables whose selects fail.
    failing_selects: HashSet<Collection>,
}

/// Remote store kept in process memory.
///
/// Backs the `memory:` remote URL and doubles as a scriptable stub: it
/// records every call, and writes or selects can be made to fail.
#[derive(Debug, Default)]
pub struct MemoryRemote {
    inner: Mutex<MemoryTables>,
    unreachable: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        MemoryRemote::default()
    }

    fn tables(&self) -> SyncResult<std::sync::MutexGuard<'_, MemoryTables>> {
        self.inner
            .lock()
            .map_err(|_| SyncError::Internal("memory remote lock poisoned".into()))
    }

    /// Replaces the rows of `table`.
    pub fn seed(&self, table: Collection, rows: Vec<Value>) {
        if let Ok(mut t) = self.tables() {
            t.rows.insert(table, rows);
        }
    }

    /// Rows currently held for `table`, in insertion order.
    pub fn rows(&self, table: Collection) -> Vec<Value> {
        self.tables()
            .map(|t| t.rows.get(&table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    /// Every call so far, oldest first.
    pub fn calls(&self) -> Vec<RemoteCall> {
        self.tables().map(|t| t.calls.clone()).unwrap_or_default()
    }

    /// Calls that changed data, oldest first.
    pub fn write_calls(&self) -> Vec<RemoteCall> {
        self.calls().into_iter().filter(RemoteCall::is_write).collect()
    }

    pub fn clear_calls(&self) {
        if let Ok(mut t) = self.tables() {
            t.calls.clear();
        }
    }

    /// Makes every write touching record `id` fail with a 500.
    pub fn fail_writes_for(&self, id: &str) {
        if let Ok(mut t) = self.tables() {
            t.failing_ids.insert(id.to_string());
        }
    }

    /// Makes selects of `table` fail with a 503.
    pub fn fail_selects_for(&self, table: Collection) {
        if let Ok(mut t) = self.tables() {
            t.failing_selects.insert(table);
        }
    }

    /// Simulates the remote being unreachable (every call fails, health
    /// reports false).
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, AtomicOrdering::SeqCst);
    }

    fn check_reachable(&self) -> SyncResult<()> {
        if self.unreachable.load(AtomicOrdering::SeqCst) {
            return Err(SyncError::Network("remote unreachable".into()));
        }
        Ok(())
    }

    fn injected_failure(table: Collection, id: &str) -> SyncError {
        SyncError::RemoteStatus {
            table: table.table_name().to_string(),
            status: 500,
            message: format!("injected failure for {}", id),
        }
    }
}

fn compare_field(a: &Value, b: &Value, field: &str) -> Ordering {
    match (a.get(field), b.get(field)) {
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn select(&self, table: Collection, order: SortOrder) -> SyncResult<Vec<Value>> {
        self.check_reachable()?;
        let mut t = self.tables()?;
        t.calls.push(RemoteCall::Select(table));
        if t.failing_selects.contains(&table) {
            return Err(SyncError::RemoteStatus {
                table: table.table_name().to_string(),
                status: 503,
                message: "injected select failure".into(),
            });
        }

        let mut rows = t.rows.get(&table).cloned().unwrap_or_default();
        rows.sort_by(|a, b| {
            let ord = compare_field(a, b, order.field);
            if order.ascending {
                ord
            } else {
                ord.reverse()
            }
        });
        Ok(rows)
    }

    async fn insert(&self, table: Collection, record: &Value) -> SyncResult<Value> {
        self.check_reachable()?;
        let mut t = self.tables()?;
        t.calls.push(RemoteCall::Insert(table, record.clone()));

        let id = row_id(record).unwrap_or_default().to_string();
        if t.failing_ids.contains(&id) {
            return Err(Self::injected_failure(table, &id));
        }

        let rows = t.rows.entry(table).or_default();
        if !id.is_empty() && rows.iter().any(|r| row_id(r) == Some(id.as_str())) {
            return Err(SyncError::RemoteStatus {
                table: table.table_name().to_string(),
                status: 409,
                message: format!("duplicate key value: {}", id),
            });
        }
        rows.push(record.clone());
        Ok(record.clone())
    }

    async fn update(&self, table: Collection, patch: &Value, id: &str) -> SyncResult<Value> {
        self.check_reachable()?;
        let mut t = self.tables()?;
        t.calls
            .push(RemoteCall::Update(table, id.to_string(), patch.clone()));
        if t.failing_ids.contains(id) {
            return Err(Self::injected_failure(table, id));
        }

        // PostgREST semantics: no matching row is not an error.
        let rows = t.rows.entry(table).or_default();
        let mut updated = Value::Null;
        if let Some(row) = rows.iter_mut().find(|r| row_id(r) == Some(id)) {
            if let (Some(target), Some(fields)) = (row.as_object_mut(), patch.as_object()) {
                for (k, v) in fields {
                    target.insert(k.clone(), v.clone());
                }
            }
            updated = row.clone();
        }
        Ok(updated)
    }

    async fn delete(&self, table: Collection, id: &str) -> SyncResult<()> {
        self.check_reachable()?;
        let mut t = self.tables()?;
        t.calls.push(RemoteCall::Delete(table, id.to_string()));
        if t.failing_ids.contains(id) {
            return Err(Self::injected_failure(table, id));
        }

        if let Some(rows) = t.rows.get_mut(&table) {
            rows.retain(|r| row_id(r) != Some(id));
        }
        Ok(())
    }

    async fn health(&self) -> bool {
        !self.unreachable.load(AtomicOrdering::SeqCst)
    }
}
