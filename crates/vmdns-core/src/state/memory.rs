// # Memory Record Store
//
// In-memory implementation of StoreConnector.
//
// ## Purpose
//
// Provides a simple store with the same put/delete semantics as the etcd
// backend but no persistence. Useful for library users embedding the
// reconciler, for dry runs against a scratch store, and for testing.
//
// ## Session Accounting
//
// The store counts sessions it hands out and sessions that were closed,
// so callers can check that every pass released its session.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;
use async_trait::async_trait;

use crate::traits::{StoreConnector, StoreSession};
use crate::Error;

/// In-memory record store implementation
///
/// All sessions share one ordered map protected by a RwLock.
///
/// # Example
///
/// ```rust,no_run
/// use vmdns_core::state::MemoryRecordStore;
/// use vmdns_core::traits::{StoreConnector, StoreSession};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = MemoryRecordStore::new();
///
///     let session = store.connect().await?;
///     session.put("/skydns/corp/app1", r#"{"host":"10.0.0.5","ttl":60}"#).await?;
///     session.close().await?;
///
///     assert!(store.get("/skydns/corp/app1").await.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
    opened: Arc<AtomicUsize>,
    open: Arc<AtomicUsize>,
}

impl MemoryRecordStore {
    /// Create a new empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of keys in the store
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    /// Check if the store is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    /// Get the value stored under a key
    pub async fn get(&self, key: &str) -> Option<String> {
        self.inner.read().await.get(key).cloned()
    }

    /// Seed a key outside of any session
    pub async fn insert(&self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.write().await.insert(key.into(), value.into());
    }

    /// Copy of the full contents, ordered by key
    pub async fn snapshot(&self) -> BTreeMap<String, String> {
        self.inner.read().await.clone()
    }

    /// Number of sessions handed out so far
    pub fn sessions_opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    /// Number of sessions handed out and not yet closed
    pub fn open_sessions(&self) -> usize {
        self.open.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StoreConnector for MemoryRecordStore {
    async fn connect(&self) -> Result<Box<dyn StoreSession>, Error> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.open.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(MemorySession {
            inner: Arc::clone(&self.inner),
            open: Arc::clone(&self.open),
            closed: AtomicBool::new(false),
        }))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Session over a [`MemoryRecordStore`]
struct MemorySession {
    inner: Arc<RwLock<BTreeMap<String, String>>>,
    open: Arc<AtomicUsize>,
    closed: AtomicBool,
}

impl MemorySession {
    fn ensure_open(&self, key: &str) -> Result<(), Error> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(Error::write(key, "session is closed"));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreSession for MemorySession {
    async fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        self.ensure_open(key)?;
        let mut guard = self.inner.write().await;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.ensure_open(key)?;
        let mut guard = self.inner.write().await;
        guard.remove(key);
        Ok(())
    }

    async fn close(&self) -> Result<(), Error> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.open.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}
