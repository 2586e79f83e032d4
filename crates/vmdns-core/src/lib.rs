// # vmdns-core
//
// Core library for publishing vSphere inventory presence into a
// key-value store.
//
// ## Architecture Overview
//
// One reconciliation pass reads the full inventory and rewrites the store
// to match it:
// - **InventorySource**: Trait for reading VMs and hosts with their IPs
// - **record::derive**: Pure mapping from an inventory entry to a put or delete
// - **StoreConnector**: Trait for sessions against the destination store
// - **sync_entries**: Applies a batch of records through one store session
// - **Reconciler**: Orchestrates the connect → fetch → sync sequence
//
// ## Design Principles
//
// 1. **Stateless**: Every run re-derives everything from the inventory
// 2. **Fail-Fast**: Errors are values propagated to a single top-level handler
// 3. **Explicit Configuration**: Components never read the process environment
// 4. **Library-First**: The binary is a thin wrapper around `Reconciler`

pub mod traits;
pub mod engine;
pub mod record;
pub mod sync;
pub mod config;
pub mod error;
pub mod state;

// Re-export core types for convenience
pub use traits::{InventorySession, InventorySource, StoreConnector, StoreSession};
pub use engine::{Reconciler, RunSummary};
pub use record::{derive, InventoryEntry, KeyLayout, PresenceRecord, RecordAction};
pub use sync::{sync_entries, PassSummary};
pub use config::{FailurePolicy, InventoryConfig, StoreConfig, SyncConfig};
pub use error::{Error, Result};
pub use state::MemoryRecordStore;
