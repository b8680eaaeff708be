//! # User Drafts
//!
//! What a form submits, before an id, tenant and timestamps are attached.
//! Each draft validates itself and then turns into the record that is
//! either sent to the remote store or queued.
//!
//! | Draft            | Record          | Id format          |
//! |------------------|-----------------|--------------------|
//! | `BookingDraft`   | `Booking`       | `bk-<millis>`      |
//! | `K3ReportDraft`  | `K3Report`      | 9 random chars     |
//! | `InventoryDraft` | `InventoryItem` | `inv-<millis>`     |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::types::{Booking, InventoryItem, ItemCondition, K3Priority, K3Report, K3Status};
use crate::validation;

// =============================================================================
// Booking
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BookingDraft {
    pub name: String,
    pub whatsapp: String,
    pub division: String,
    pub facility: String,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    #[serde(default)]
    pub purpose: String,
}

impl BookingDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::short_text("nama", &self.name)?;
        validation::whatsapp("whatsapp", &self.whatsapp)?;
        validation::short_text("divisi", &self.division)?;
        validation::short_text("sarana", &self.facility)?;
        validation::date("tanggal", &self.date)?;
        validation::time_range("mulai", &self.start_time, "selesai", &self.end_time)?;
        validation::max_len("keperluan", &self.purpose, validation::MAX_LONG_TEXT)?;
        Ok(())
    }

    pub fn into_record(self, tenant_id: &str, now: DateTime<Utc>) -> Booking {
        Booking {
            id: Some(format!("bk-{}", now.timestamp_millis())),
            tenant_id: Some(tenant_id.to_string()),
            name: self.name.trim().to_string(),
            whatsapp: self.whatsapp.trim().to_string(),
            division: self.division,
            facility: self.facility,
            equipment: self.equipment,
            date: self.date.trim().to_string(),
            start_time: self.start_time.trim().to_string(),
            end_time: self.end_time.trim().to_string(),
            purpose: self.purpose,
            created_at: Some(now),
        }
    }
}

// =============================================================================
// K3 Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct K3ReportDraft {
    pub location: String,
    pub problem: String,
    pub category: String,
    pub reporter: String,
    pub division: String,
    #[serde(default)]
    pub photo: Option<String>,
}

impl K3ReportDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::short_text("lokasi", &self.location)?;
        validation::require("masalah", &self.problem)?;
        validation::max_len("masalah", &self.problem, validation::MAX_LONG_TEXT)?;
        validation::short_text("kategori", &self.category)?;
        validation::short_text("pelapor", &self.reporter)?;
        validation::short_text("divisi", &self.division)?;
        Ok(())
    }

    /// New reports start open at medium priority; the AI classifier may
    /// raise or lower the priority before the report is sent.
    pub fn into_record(self, tenant_id: &str, now: DateTime<Utc>) -> K3Report {
        let random = uuid::Uuid::new_v4().simple().to_string();
        K3Report {
            id: random[..9].to_string(),
            tenant_id: Some(tenant_id.to_string()),
            location: self.location.trim().to_string(),
            problem: self.problem.trim().to_string(),
            priority: K3Priority::Medium,
            category: self.category,
            photo: self.photo,
            status: K3Status::Open,
            reporter: self.reporter.trim().to_string(),
            division: self.division,
            suggestion: None,
            created_at: now,
        }
    }
}

// =============================================================================
// Inventory
// =============================================================================

/// Inventory form input. `id` is set when editing an existing item.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InventoryDraft {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub brand_type: String,
    pub category: String,
    pub unit: String,
    pub initial_stock: i64,
    pub current_stock: i64,
    pub location: String,
    #[serde(default)]
    pub condition: ItemCondition,
}

impl InventoryDraft {
    pub fn is_edit(&self) -> bool {
        self.id.as_deref().is_some_and(|id| !id.is_empty())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validation::short_text("nama", &self.name)?;
        validation::max_len("merkType", &self.brand_type, validation::MAX_SHORT_TEXT)?;
        validation::short_text("kategori", &self.category)?;
        validation::short_text("satuan", &self.unit)?;
        validation::stock("stokAwal", self.initial_stock)?;
        validation::stock("stokSekarang", self.current_stock)?;
        validation::short_text("lokasi", &self.location)?;
        Ok(())
    }

    /// Keeps the existing id on edit, mints `inv-<millis>` otherwise.
    /// `lastUpdated` is always stamped with `now`.
    pub fn into_record(self, tenant_id: &str, now: DateTime<Utc>) -> InventoryItem {
        let id = match self.id {
            Some(id) if !id.is_empty() => id,
            _ => format!("inv-{}", now.timestamp_millis()),
        };
        InventoryItem {
            id,
            tenant_id: Some(tenant_id.to_string()),
            name: self.name.trim().to_string(),
            brand_type: self.brand_type,
            category: self.category,
            unit: self.unit,
            initial_stock: self.initial_stock,
            current_stock: self.current_stock,
            location: self.location.trim().to_string(),
            condition: self.condition,
            last_updated: now,
        }
    }
}
