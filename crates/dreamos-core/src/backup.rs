//! # Backup Documents
//!
//! Full-state export/import and the bookings CSV report.
//!
//! ```text
//! {
//!   "timestamp": "2024-06-01T08:00:00Z",
//!   "version":   "7.5-PLATINUM",
//!   "data": { "bookings": [...], "k3": [...], "inventory": [...] }
//! }
//! ```
//!
//! Import is all-or-nothing: the document is checked for `data` and
//! `version` and fully parsed before the caller touches any state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::types::{Booking, InventoryItem, K3Report};

/// Version tag written into every exported backup.
pub const BACKUP_VERSION: &str = "7.5-PLATINUM";

/// Header row of the bookings CSV report.
pub const BOOKINGS_CSV_HEADER: [&str; 8] = [
    "Nama",
    "Divisi",
    "WhatsApp",
    "Sarana",
    "Tanggal",
    "Mulai",
    "Selesai",
    "Keperluan",
];

/// Collections carried by a backup. A missing collection is left untouched
/// on import.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BackupData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bookings: Option<Vec<Booking>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k3: Option<Vec<K3Report>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inventory: Option<Vec<InventoryItem>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BackupDocument {
    #[serde(default = "Utc::now")]
    #[ts(as = "String")]
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub data: BackupData,
}

impl BackupDocument {
    /// Snapshot of the three collections, stamped now.
    pub fn new(bookings: Vec<Booking>, k3: Vec<K3Report>, inventory: Vec<InventoryItem>) -> Self {
        BackupDocument {
            timestamp: Utc::now(),
            version: BACKUP_VERSION.to_string(),
            data: BackupData {
                bookings: Some(bookings),
                k3: Some(k3),
                inventory: Some(inventory),
            },
        }
    }

    /// Parses an imported document.
    ///
    /// # Errors
    /// [`CoreError::MalformedBackup`] when the text is not JSON, when
    /// `data` or `version` is missing, or when a record does not parse.
    pub fn parse(text: &str) -> CoreResult<Self> {
        let raw: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::MalformedBackup(format!("not valid JSON: {}", e)))?;

        let object = raw
            .as_object()
            .ok_or_else(|| CoreError::MalformedBackup("expected a JSON object".to_string()))?;
        for field in ["data", "version"] {
            if object.get(field).map_or(true, Value::is_null) {
                return Err(CoreError::MalformedBackup(format!(
                    "missing '{}' field",
                    field
                )));
            }
        }

        serde_json::from_value(raw).map_err(|e| CoreError::MalformedBackup(e.to_string()))
    }

    pub fn to_pretty_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

/// Renders bookings as CSV, one quoted row per booking.
pub fn bookings_csv(bookings: &[Booking]) -> String {
    let mut out = BOOKINGS_CSV_HEADER.join(",");
    out.push('\n');
    for b in bookings {
        let row = [
            b.name.as_str(),
            b.division.as_str(),
            b.whatsapp.as_str(),
            b.facility.as_str(),
            b.date.as_str(),
            b.start_time.as_str(),
            b.end_time.as_str(),
            b.purpose.as_str(),
        ]
        .iter()
        .map(|v| csv_field(v))
        .collect::<Vec<_>>()
        .join(",");
        out.push_str(&row);
        out.push('\n');
    }
    out
}
