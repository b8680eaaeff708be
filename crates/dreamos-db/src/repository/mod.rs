//! # Repository Module
//!
//! Typed views over the [`LocalStore`](crate::LocalStore).
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Reconciliation / Router                                                │
//! │       │                                                                 │
//! │       ├── cache().save_collection(&bookings)                            │
//! │       │        └── "cache:bookings" ← JSON array                        │
//! │       │                                                                 │
//! │       └── queue().enqueue(Collection::Inventory, Delete, {id})          │
//! │                └── "sync:queue" ← read, append, write back              │
//! │                                                                         │
//! │  Both go through LocalStore, which owns the backend and the             │
//! │  swallow-and-log failure policy.                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod cache;
pub mod queue;
