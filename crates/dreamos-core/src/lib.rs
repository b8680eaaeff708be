//! # dreamos-core: Pure Domain Types for Dream OS
//!
//! This crate holds everything about the dashboard's data that can be
//! expressed without I/O: the three synchronized collections, the queued
//! mutation that records an offline write, input validation and the backup
//! document format.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dream OS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Browser dashboard (out of scope)                │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │        dreamos-sync (router, reconciliation, connectivity)      │   │
//! │  └──────────────┬──────────────────────────────┬───────────────────┘   │
//! │                 │                              │                        │
//! │  ┌──────────────▼──────────────┐  ┌────────────▼───────────────────┐   │
//! │  │ dreamos-db (cache + queue)  │  │ Remote store / AI (HTTP)       │   │
//! │  └──────────────┬──────────────┘  └────────────────────────────────┘   │
//! │                 │                                                       │
//! │  ┌──────────────▼──────────────────────────────────────────────────┐   │
//! │  │               ★ dreamos-core (THIS CRATE) ★                     │   │
//! │  │   types · mutation · validation · backup                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Collections and entity records (Booking, K3Report, InventoryItem)
//! - [`mutation`] - QueuedMutation, MutationAction and process-unique ids
//! - [`draft`] - Form input that becomes a record
//! - [`validation`] - Field rules applied to drafts
//! - [`backup`] - Backup document import/export and CSV rendering
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use dreamos_core::{Collection, MutationAction, QueuedMutation};
//! use serde_json::json;
//!
//! let m = QueuedMutation::new(
//!     Collection::Inventory,
//!     MutationAction::Delete,
//!     json!({ "id": "inv-1" }),
//! );
//! assert_eq!(m.record_id(), Some("inv-1"));
//! assert_eq!(m.table.table_name(), "inventory");
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backup;
pub mod draft;
pub mod error;
pub mod mutation;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use backup::{bookings_csv, BackupData, BackupDocument, BACKUP_VERSION};
pub use draft::{BookingDraft, InventoryDraft, K3ReportDraft};
pub use error::{CoreError, CoreResult, ValidationError};
pub use mutation::{MutationAction, MutationId, QueuedMutation};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Tenant id used before the institution profile has been set up.
///
/// Remote fetches are skipped while the tenant still carries this id.
pub const PENDING_SETUP_TENANT_ID: &str = "pending-setup";
