// # Record Store Traits
//
// Defines the interface for the key-value store that receives presence
// records.
//
// ## Implementations
//
// - etcd v3: `vmdns-store-etcd` crate
// - In-memory: [`crate::MemoryRecordStore`]
//
// ## Session Discipline
//
// Every synchronization pass opens its own session through
// [`StoreConnector::connect`] and closes it before returning, whether the
// pass succeeded or not. See [`crate::sync::sync_entries`].

use async_trait::async_trait;

/// Factory for store sessions
#[async_trait]
pub trait StoreConnector: Send + Sync {
    /// Dial the store
    ///
    /// Implementations must bound the dial with a timeout and fail with
    /// `Error::StoreConnect` rather than hang.
    async fn connect(&self) -> Result<Box<dyn StoreSession>, crate::Error>;

    /// Store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// An open store session
///
/// # Trust Level: Untrusted
///
/// Sessions execute exactly one request per call. They never retry,
/// never batch, and never decide whether a write is needed.
#[async_trait]
pub trait StoreSession: Send + Sync {
    /// Write `value` under `key` unconditionally (last write wins)
    ///
    /// Fails with `Error::Write`.
    async fn put(&self, key: &str, value: &str) -> Result<(), crate::Error>;

    /// Remove `key`
    ///
    /// Deleting an absent key is a success. Fails with `Error::Write`.
    async fn delete(&self, key: &str) -> Result<(), crate::Error>;

    /// Release the session
    async fn close(&self) -> Result<(), crate::Error>;
}
