//! Allocation Core
//!
//! Two-class (VIP / Regular) ticket admission and allocation engine with
//! per-holder caps, FIFO request queues and an append-only audit trail.
//!
//! # Architecture
//!
//! - **Two-phase allocation**: `submit` only enqueues, `drain` commits
//! - **Single Writer**: One actor owns the engine, callers hold a handle
//! - **Write-through persistence**: Every committed change reaches the [`Store`]
//! - **Pluggable credentials**: Hashing behind [`CredentialHasher`]

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    rust_2018_idioms,
    missing_debug_implementations,
    clippy::all
)]
//!
//! # Invariants
//!
//! - No negative counts: availability and holdings never drop below zero
//! - Per-holder cap: committed holdings never exceed the configured cap
//! - Conservation: capacity == available + Σ holdings, per class
//! - VIP priority: VIP requests are admitted and drained before Regular
//! - Append-only: audit records are never rewritten or deleted

pub mod types;
pub mod error;
pub mod config;
pub mod crypto;
pub mod validation;
pub mod inventory;
pub mod queue;
pub mod registry;
pub mod storage;
pub mod engine;
pub mod actor;
pub mod metrics;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    ClassCounts, ClassTag, DrainReport, Holder, HolderId, Outcome, PendingRequest,
    ResourceClass, SalesSummary, SubmitReceipt, TransactionRecord,
};
pub use config::{Config, DrainScope, ReleasePolicy};
pub use crypto::{CredentialHasher, Sha256Hasher};
pub use storage::{MemoryStore, RocksStore, Store};
pub use engine::AllocationEngine;
pub use actor::{spawn_allocation_actor, AllocationHandle, SubmitOutcome};
