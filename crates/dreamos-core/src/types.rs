//! # Domain Types
//!
//! The three synchronized collections and their records.
//!
//! ## Type Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Booking      │   │    K3Report     │   │  InventoryItem  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id  bk-<ms>    │   │  id (random)    │   │  id  inv-<ms>   │       │
//! │  │  sarana         │   │  lokasi         │   │  nama           │       │
//! │  │  tanggal        │   │  prioritas      │   │  stokSekarang   │       │
//! │  │  mulai/selesai  │   │  status         │   │  kondisi        │       │
//! │  └────────┬────────┘   └────────┬────────┘   └────────┬────────┘       │
//! │           │                     │                     │                │
//! │           ▼                     ▼                     ▼                │
//! │     "bookings"            "k3_reports"           "inventory"           │
//! │     cache:bookings        cache:k3               cache:inventory       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Names
//! Rust fields use English names; serde renames map them onto the remote
//! table columns (`nama`, `createdAt`, `stokSekarang`, ...), so cached
//! snapshots and remote rows share one JSON shape.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::CoreError;

// =============================================================================
// Collection
// =============================================================================

/// A named set of entity records kept in sync with the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum Collection {
    #[serde(rename = "bookings")]
    Bookings,
    #[serde(rename = "k3_reports")]
    K3Reports,
    #[serde(rename = "inventory")]
    Inventory,
}

/// Ordering applied when a collection is fetched from the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    /// Wire field name to order by.
    pub field: &'static str,
    /// Ascending when true, descending otherwise.
    pub ascending: bool,
}

impl Collection {
    /// Every synchronized collection, in refresh order.
    pub const ALL: [Collection; 3] = [
        Collection::K3Reports,
        Collection::Bookings,
        Collection::Inventory,
    ];

    /// Remote table name.
    pub const fn table_name(&self) -> &'static str {
        match self {
            Collection::Bookings => "bookings",
            Collection::K3Reports => "k3_reports",
            Collection::Inventory => "inventory",
        }
    }

    /// Local cache key holding the last-known-good snapshot.
    pub const fn cache_key(&self) -> &'static str {
        match self {
            Collection::Bookings => "cache:bookings",
            Collection::K3Reports => "cache:k3",
            Collection::Inventory => "cache:inventory",
        }
    }

    /// Order used for remote fetches and for local inserts.
    pub const fn default_order(&self) -> SortOrder {
        match self {
            Collection::Bookings | Collection::K3Reports => SortOrder {
                field: "createdAt",
                ascending: false,
            },
            Collection::Inventory => SortOrder {
                field: "nama",
                ascending: true,
            },
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

impl FromStr for Collection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bookings" => Ok(Collection::Bookings),
            "k3_reports" | "k3" => Ok(Collection::K3Reports),
            "inventory" => Ok(Collection::Inventory),
            other => Err(CoreError::UnknownCollection(other.to_string())),
        }
    }
}

// =============================================================================
// Record Trait
// =============================================================================

/// A record that belongs to exactly one synchronized collection.
///
/// Lets the cache, the optimistic in-memory state and the refresher work
/// generically over bookings, incident reports and inventory.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// The collection this record type lives in.
    const COLLECTION: Collection;

    /// The record's identifier, if it has been assigned one.
    fn record_id(&self) -> Option<&str>;
}

/// Optional remote columns may come back as `null`; treat that like a
/// missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// Booking
// =============================================================================

/// A facility reservation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Booking {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Name of the person booking.
    #[serde(rename = "nama")]
    pub name: String,

    /// WhatsApp contact number.
    pub whatsapp: String,

    /// Department of the requester.
    #[serde(rename = "divisi")]
    pub division: String,

    /// Facility being reserved.
    #[serde(rename = "sarana")]
    pub facility: String,

    /// Extra equipment requested alongside the facility.
    #[serde(rename = "alat", default, deserialize_with = "null_as_default")]
    pub equipment: Vec<String>,

    /// Reservation date, `YYYY-MM-DD`.
    #[serde(rename = "tanggal")]
    pub date: String,

    /// Start time, `HH:MM`.
    #[serde(rename = "mulai")]
    pub start_time: String,

    /// End time, `HH:MM`.
    #[serde(rename = "selesai")]
    pub end_time: String,

    /// Purpose of the reservation.
    #[serde(rename = "keperluan", default, deserialize_with = "null_as_default")]
    pub purpose: String,

    #[serde(rename = "createdAt", default, skip_serializing_if = "Option::is_none")]
    #[ts(as = "Option<String>")]
    pub created_at: Option<DateTime<Utc>>,
}

impl Record for Booking {
    const COLLECTION: Collection = Collection::Bookings;

    fn record_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

// =============================================================================
// K3 (Occupational Safety) Report
// =============================================================================

/// Priority assigned to a safety incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum K3Priority {
    #[serde(rename = "Penting")]
    High,
    #[serde(rename = "Sedang")]
    #[default]
    Medium,
    #[serde(rename = "Biasa")]
    Low,
}

impl FromStr for K3Priority {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Penting" => Ok(K3Priority::High),
            "Sedang" => Ok(K3Priority::Medium),
            "Biasa" => Ok(K3Priority::Low),
            other => Err(CoreError::InvalidPayload(format!(
                "unknown priority '{}'",
                other
            ))),
        }
    }
}

/// Resolution status of a safety incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum K3Status {
    #[serde(rename = "Belum Selesai")]
    #[default]
    Open,
    #[serde(rename = "Proses")]
    InProgress,
    #[serde(rename = "Selesai")]
    Resolved,
}

impl K3Status {
    /// Wire value as stored in the remote table.
    pub const fn as_str(&self) -> &'static str {
        match self {
            K3Status::Open => "Belum Selesai",
            K3Status::InProgress => "Proses",
            K3Status::Resolved => "Selesai",
        }
    }
}

impl FromStr for K3Status {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "belum selesai" | "open" => Ok(K3Status::Open),
            "proses" | "in-progress" | "in_progress" => Ok(K3Status::InProgress),
            "selesai" | "resolved" | "done" => Ok(K3Status::Resolved),
            other => Err(CoreError::InvalidPayload(format!(
                "unknown status '{}'",
                other
            ))),
        }
    }
}

/// A safety (K3) incident report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct K3Report {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    /// Where the incident was observed.
    #[serde(rename = "lokasi")]
    pub location: String,

    /// Description of the problem.
    #[serde(rename = "masalah")]
    pub problem: String,

    #[serde(rename = "prioritas", default, deserialize_with = "null_as_default")]
    pub priority: K3Priority,

    #[serde(rename = "kategori")]
    pub category: String,

    /// Compressed photo as a data URL.
    #[serde(rename = "foto", default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub status: K3Status,

    /// Reporter name.
    #[serde(rename = "pelapor")]
    pub reporter: String,

    #[serde(rename = "divisi")]
    pub division: String,

    /// Advisory follow-up produced by the AI classifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,

    #[serde(rename = "createdAt")]
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Record for K3Report {
    const COLLECTION: Collection = Collection::K3Reports;

    fn record_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Physical condition of an inventory asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum ItemCondition {
    #[serde(rename = "Baik")]
    #[default]
    Good,
    #[serde(rename = "Rusak Ringan")]
    MinorDamage,
    #[serde(rename = "Rusak Berat")]
    MajorDamage,
}

/// An inventory asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryItem {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(rename = "nama")]
    pub name: String,

    /// Brand / model designation.
    #[serde(rename = "merkType", default, deserialize_with = "null_as_default")]
    pub brand_type: String,

    #[serde(rename = "kategori")]
    pub category: String,

    /// Unit of measure (pcs, unit, set, ...).
    #[serde(rename = "satuan")]
    pub unit: String,

    #[serde(rename = "stokAwal", default, deserialize_with = "null_as_default")]
    pub initial_stock: i64,

    #[serde(rename = "stokSekarang", default, deserialize_with = "null_as_default")]
    pub current_stock: i64,

    #[serde(rename = "lokasi")]
    pub location: String,

    #[serde(rename = "kondisi", default, deserialize_with = "null_as_default")]
    pub condition: ItemCondition,

    #[serde(rename = "lastUpdated")]
    #[ts(as = "String")]
    pub last_updated: DateTime<Utc>,
}

impl Record for InventoryItem {
    const COLLECTION: Collection = Collection::Inventory;

    fn record_id(&self) -> Option<&str> {
        Some(&self.id)
    }
}

// =============================================================================
// Tenant
// =============================================================================

/// Institution profile configured during first-run setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TenantConfig {
    pub id: String,
    pub name: String,
    pub slogan: String,
    /// Facilities that can be booked.
    pub facilities: Vec<String>,
    pub departments: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

impl TenantConfig {
    /// Returns true until the setup flow has assigned a real tenant id.
    pub fn is_pending_setup(&self) -> bool {
        self.id == crate::PENDING_SETUP_TENANT_ID
    }
}

impl Default for TenantConfig {
    fn default() -> Self {
        TenantConfig {
            id: crate::PENDING_SETUP_TENANT_ID.to_string(),
            name: "Instansi Baru".to_string(),
            slogan: "Advanced Management System".to_string(),
            facilities: Vec::new(),
            departments: Vec::new(),
            logo_url: None,
        }
    }
}

// =============================================================================
// Notices
// =============================================================================

/// Severity of a transient user-facing notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
}

/// A transient notification ("toast"). Failures never surface any other way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Notice {
            kind: NoticeKind::Info,
            message: message.into(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_collection_names_and_keys() {
        assert_eq!(Collection::Bookings.table_name(), "bookings");
        assert_eq!(Collection::K3Reports.cache_key(), "cache:k3");
        assert_eq!(Collection::Inventory.cache_key(), "cache:inventory");
        assert_eq!("k3_reports".parse::<Collection>().unwrap(), Collection::K3Reports);
        assert!("users".parse::<Collection>().is_err());
    }

    #[test]
    fn test_collection_serializes_as_table_name() {
        let v = serde_json::to_value(Collection::K3Reports).unwrap();
        assert_eq!(v, json!("k3_reports"));
    }

    #[test]
    fn test_inventory_order_is_by_name() {
        let order = Collection::Inventory.default_order();
        assert_eq!(order.field, "nama");
        assert!(order.ascending);
        assert!(!Collection::Bookings.default_order().ascending);
    }

    #[test]
    fn test_k3_report_wire_names() {
        let raw = json!({
            "id": "abc123",
            "lokasi": "Gedung A",
            "masalah": "Kabel terkelupas",
            "prioritas": "Penting",
            "kategori": "Maintenance",
            "status": "Belum Selesai",
            "pelapor": "Budi",
            "divisi": "Umum",
            "createdAt": "2024-05-01T08:00:00Z"
        });
        let report: K3Report = serde_json::from_value(raw).unwrap();
        assert_eq!(report.priority, K3Priority::High);
        assert_eq!(report.status, K3Status::Open);
        assert_eq!(report.location, "Gedung A");

        let back = serde_json::to_value(&report).unwrap();
        assert_eq!(back["masalah"], "Kabel terkelupas");
        assert!(back.get("foto").is_none());
    }

    #[test]
    fn test_booking_tolerates_missing_optional_fields() {
        let raw = json!({
            "nama": "Siti",
            "whatsapp": "08123456789",
            "divisi": "Kurikulum",
            "sarana": "Aula",
            "tanggal": "2024-06-01",
            "mulai": "07:30",
            "selesai": "09:00"
        });
        let booking: Booking = serde_json::from_value(raw).unwrap();
        assert!(booking.id.is_none());
        assert!(booking.equipment.is_empty());
        assert_eq!(booking.record_id(), None);
    }

    #[test]
    fn test_null_optional_columns_use_defaults() {
        let raw = json!({
            "id": "bk-1",
            "nama": "Siti",
            "whatsapp": "08123456789",
            "divisi": "Kurikulum",
            "sarana": "Aula",
            "alat": null,
            "tanggal": "2024-06-01",
            "mulai": "07:30",
            "selesai": "09:00",
            "keperluan": null
        });
        let booking: Booking = serde_json::from_value(raw).unwrap();
        assert!(booking.equipment.is_empty());
        assert_eq!(booking.purpose, "");

        let raw = json!({
            "id": "inv-1",
            "nama": "Proyektor",
            "merkType": null,
            "kategori": "Elektronik",
            "satuan": "unit",
            "stokAwal": null,
            "stokSekarang": null,
            "lokasi": "Lab",
            "kondisi": null,
            "lastUpdated": "2024-05-01T08:00:00Z"
        });
        let item: InventoryItem = serde_json::from_value(raw).unwrap();
        assert_eq!(item.current_stock, 0);
        assert_eq!(item.condition, ItemCondition::default());

        let raw = json!({
            "id": "abc123",
            "lokasi": "Gedung A",
            "masalah": "Lampu mati",
            "prioritas": null,
            "kategori": "Maintenance",
            "status": null,
            "pelapor": "Budi",
            "divisi": "Umum",
            "createdAt": "2024-05-01T08:00:00Z"
        });
        let report: K3Report = serde_json::from_value(raw).unwrap();
        assert_eq!(report.priority, K3Priority::Medium);
        assert_eq!(report.status, K3Status::Open);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("Selesai".parse::<K3Status>().unwrap(), K3Status::Resolved);
        assert_eq!("in-progress".parse::<K3Status>().unwrap(), K3Status::InProgress);
        assert!("closed?".parse::<K3Status>().is_err());
        assert_eq!(K3Status::Open.as_str(), "Belum Selesai");
    }

    #[test]
    fn test_default_tenant_is_pending_setup() {
        assert!(TenantConfig::default().is_pending_setup());
    }
}
