//! # dreamos-sync: Offline Sync Engine for Dream OS
//!
//! Offline-first write path for the Dream OS dashboard: every user write is
//! either sent to the remote store or queued, and the queue is replayed once
//! connectivity returns.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Sync Layer Architecture                          │
//! │                                                                         │
//! │   UI action                                                             │
//! │      │                                                                  │
//! │      ▼                                                                  │
//! │  ┌────────────────┐  is_online?  ┌─────────────────────┐               │
//! │  │ MutationRouter │─────────────►│ ConnectivityOracle  │               │
//! │  └───────┬────────┘              │ network AND !forced │               │
//! │          │                       └──────────┬──────────┘               │
//! │   online │ offline                          │ Online event              │
//! │          │    └──► SyncQueueRepository      ▼                           │
//! │          │         (sync:queue)   ┌──────────────────────┐             │
//! │          │              └────────►│ ReconciliationEngine │             │
//! │          ▼                        │ FIFO drain + clear   │             │
//! │  ┌────────────────┐               └──────────┬───────────┘             │
//! │  │  RemoteStore   │◄─────────────────────────┘                          │
//! │  │ Supabase/Memory│                                                     │
//! │  └───────┬────────┘                                                     │
//! │          ▼                                                              │
//! │  CollectionRefresher ──► AppState + CacheRepository (cache:*)           │
//! │                                                                         │
//! │  SyncAgent: builds all of the above, runs the select! loop              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`agent`] - `SyncAgent` orchestrator, handle and builder
//! - [`config`] - Sync configuration (tenant, remote, drain policy, storage, AI)
//! - [`connectivity`] - Connectivity oracle and network probes
//! - [`reconcile`] - Queue drain
//! - [`router`] - Online/offline write routing
//! - [`refresh`] - Remote → state + cache refresh
//! - [`state`] - In-memory collections and optimistic updates
//! - [`remote`] / [`supabase`] - Remote store contract and clients
//! - [`advisor`] - Generative-AI helpers
//! - [`notify`] - Transient user notifications
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dreamos_sync::{SyncAgentBuilder, SyncConfig};
//! use dreamos_db::MemoryBackend;
//!
//! let config = SyncConfig::load_or_default(None);
//! let mut agent = SyncAgentBuilder::new(config)
//!     .with_backend(Arc::new(MemoryBackend::new()))
//!     .build()
//!     .await?;
//!
//! let handle = agent.start().await?;
//! agent.router().delete_inventory_item("inv-1").await?;
//! let outcome = handle.sync_now().await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod advisor;
pub mod agent;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod notify;
pub mod reconcile;
pub mod refresh;
pub mod remote;
pub mod router;
pub mod state;
pub mod supabase;

// =============================================================================
// Re-exports
// =============================================================================

pub use advisor::{AiAdvisor, Forecast, GeminiAdvisor, IncidentAssessment, NoopAdvisor};
pub use agent::{
    HealthReport, NoOpEmitter, SyncAgent, SyncAgentBuilder, SyncAgentHandle, SyncEventEmitter,
    SyncStatus,
};
pub use config::{DrainPolicy, SyncConfig};
pub use connectivity::{
    ConnectivityEvent, ConnectivityOracle, ManualProbe, NetworkProbe, SubscriptionId,
    UnsupportedProbe,
};
pub use error::{SyncError, SyncResult};
pub use notify::{NoOpNotifier, Notifier, RecordingNotifier, TracingNotifier};
pub use reconcile::{DrainOutcome, DrainReport, FailedMutation, ReconciliationEngine, SkipReason};
pub use refresh::{CollectionRefresher, RefreshSummary};
pub use remote::{MemoryRemote, RemoteCall, RemoteStore};
pub use router::{MutationRouter, Routed};
pub use state::{AppState, StateCounts};
pub use supabase::SupabaseClient;
