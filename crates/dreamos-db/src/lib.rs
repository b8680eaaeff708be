//! # dreamos-db: Local Persistence for Dream OS
//!
//! The Local Cache Store and the Sync Queue, behind an injected storage
//! backend.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Dream OS Data Flow                               │
//! │                                                                         │
//! │  MutationRouter / ReconciliationEngine (dreamos-sync)                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   dreamos-db (THIS CRATE)                       │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │ Repositories  │    │  LocalStore   │    │  Backends    │  │   │
//! │  │   │               │    │               │    │              │  │   │
//! │  │   │ CacheRepo     │───►│ save / load   │───►│ MemoryBackend│  │   │
//! │  │   │ SyncQueueRepo │    │ purge / usage │    │ Database     │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  │                                                                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │   SQLite local_store table (or process memory in tests)         │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`backend`] - `StorageBackend` trait and the in-memory backend
//! - [`pool`] - SQLite backend, connection pool and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`store`] - `LocalStore`: typed JSON save/load with swallow-and-log writes
//! - [`keys`] - Storage key layout
//! - [`repository`] - Cache and sync queue repositories
//! - [`error`] - Storage error types
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dreamos_db::{Database, DbConfig, LocalStore, SyncQueueRepository};
//! use std::sync::Arc;
//!
//! let db = Database::new(DbConfig::new("dreamos.db")).await?;
//! let store = LocalStore::new(Arc::new(db));
//! let queue = SyncQueueRepository::new(store.clone());
//! let pending = queue.peek_all().await;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod backend;
pub mod error;
pub mod keys;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod store;

// =============================================================================
// Re-exports
// =============================================================================

pub use backend::{MemoryBackend, StorageBackend};
pub use error::{StoreError, StoreResult};
pub use pool::{Database, DbConfig};
pub use store::LocalStore;

pub use repository::cache::CacheRepository;
pub use repository::queue::SyncQueueRepository;
