//! # Error Types
//!
//! Domain-specific error types for dreamos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  dreamos-core errors (this file)                                       │
//! │  ├── CoreError        - Record, mutation and backup failures           │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  dreamos-db errors (separate crate)                                    │
//! │  └── StoreError       - Local persistence failures                     │
//! │                                                                         │
//! │  dreamos-sync errors (separate crate)                                  │
//! │  └── SyncError        - Remote, AI, config failures                    │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → SyncError → Notice (toast)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core domain errors.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A queued Update/Delete carries no record id to match against.
    ///
    /// ## When This Occurs
    /// - A queue entry was written by hand or by an older client
    /// - The payload was a partial record without `id`
    #[error("{action} on {table} requires an 'id' field in the payload")]
    MissingRecordId { table: String, action: String },

    /// The collection/table name is not one of the synchronized collections.
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// A record could not be (de)serialized.
    #[error("Invalid record payload: {0}")]
    InvalidPayload(String),

    /// An imported backup document is missing required top-level fields
    /// or is not valid JSON.
    #[error("Malformed backup: {0}")]
    MalformedBackup(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::InvalidPayload(err.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when a user draft doesn't meet requirements.
/// Used for early validation before anything is queued or sent.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid date, invalid phone number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// End of a time range is not after its start.
    #[error("{end_field} must be after {start_field}")]
    InvalidRange {
        start_field: String,
        end_field: String,
    },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
