//! # Sync Error Types
//!
//! Error types for routing, reconciliation and the external collaborators.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sync Error Categories                             │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │  Remote store   │  │     Local                │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  Network        │  │  Store (quota, medium)  │ │
//! │  │  InvalidUrl     │  │  RemoteStatus   │  │  Core (payload, backup) │ │
//! │  │  ConfigLoad/Save│  │  Decode         │  │  Validation             │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │       AI        │  │    Internal     │                              │
//! │  │  AiUnavailable  │  │  Offline        │                              │
//! │  │  AiFailed       │  │  ShuttingDown   │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every variant ends up as an error [`Notice`](dreamos_core::Notice) at the
//! boundary where it is caught; none reach the caller's UI as a fault.

use thiserror::Error;

/// Result type alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid sync configuration.
    #[error("Invalid sync configuration: {0}")]
    InvalidConfig(String),

    /// Invalid remote URL.
    #[error("Invalid remote URL: {0}")]
    InvalidUrl(String),

    /// Failed to load config file.
    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    /// Failed to save config file.
    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Remote Store Errors
    // =========================================================================
    /// The request never got a response.
    ///
    /// ## When This Occurs
    /// - No route to the remote store
    /// - DNS failure
    /// - Request timed out
    #[error("Network error: {0}")]
    Network(String),

    /// The remote store answered with a non-success status.
    #[error("Remote store returned {status} for {table}: {message}")]
    RemoteStatus {
        table: String,
        status: u16,
        message: String,
    },

    /// The remote store answered with a body we could not read.
    #[error("Could not decode remote response: {0}")]
    Decode(String),

    // =========================================================================
    // AI Errors
    // =========================================================================
    /// AI calls are disabled or unconfigured.
    #[error("AI service unavailable: {0}")]
    AiUnavailable(String),

    /// The AI service failed or returned something unusable.
    #[error("AI request failed: {0}")]
    AiFailed(String),

    // =========================================================================
    // Local Errors
    // =========================================================================
    /// Local persistence failed.
    #[error("Local storage error: {0}")]
    Store(#[from] dreamos_db::StoreError),

    /// Record, mutation or backup error.
    #[error(transparent)]
    Core(#[from] dreamos_core::CoreError),

    /// A draft failed validation before anything was sent or queued.
    #[error("Invalid input: {0}")]
    Validation(#[from] dreamos_core::ValidationError),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    /// The operation needs connectivity and the device is offline.
    #[error("{0} requires an online connection")]
    Offline(String),

    /// Agent is shutting down.
    #[error("Sync agent is shutting down")]
    ShuttingDown,

    /// Internal sync agent error.
    #[error("Internal error: {0}")]
    Internal(String),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<reqwest::Error> for SyncError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SyncError::Decode(err.to_string())
        } else {
            SyncError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        SyncError::Decode(err.to_string())
    }
}

impl From<url::ParseError> for SyncError {
    fn from(err: url::ParseError) -> Self {
        SyncError::InvalidUrl(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        SyncError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for SyncError {
    fn from(err: toml::ser::Error) -> Self {
        SyncError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl SyncError {
    /// Returns true if retrying the same call later might succeed.
    ///
    /// ## Transient
    /// - Network failures and timeouts
    /// - 5xx, 408 and 429 from the remote store
    ///
    /// ## Permanent
    /// - Other 4xx (bad payload, missing table, RLS rejection)
    /// - Configuration, validation, decode errors
    pub fn is_transient(&self) -> bool {
        match self {
            SyncError::Network(_) => true,
            SyncError::RemoteStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// Returns true if this error indicates a configuration problem.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            SyncError::InvalidConfig(_)
                | SyncError::InvalidUrl(_)
                | SyncError::ConfigLoadFailed(_)
                | SyncError::ConfigSaveFailed(_)
        )
    }
}
