//! Test doubles and common utilities for contract tests
//!
//! The doubles share one event log so tests can assert the exact order
//! of inventory and store operations across a run.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use vmdns_core::config::{FailurePolicy, InventoryConfig, StoreConfig, SyncConfig};
use vmdns_core::error::{Error, Result};
use vmdns_core::traits::{InventorySession, InventorySource, StoreConnector, StoreSession};
use vmdns_core::{InventoryEntry, MemoryRecordStore};

/// Shared, ordered log of operations
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn events(log: &EventLog) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn record(log: &EventLog, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

/// Where a scripted inventory should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailAt {
    Connect,
    ListVms,
    ListHosts,
}

/// Inventory source that serves fixed VM and host lists
#[derive(Clone)]
pub struct ScriptedInventory {
    vms: Vec<InventoryEntry>,
    hosts: Vec<InventoryEntry>,
    fail_at: Option<FailAt>,
    log: EventLog,
}

impl ScriptedInventory {
    pub fn new(vms: Vec<InventoryEntry>, hosts: Vec<InventoryEntry>, log: EventLog) -> Self {
        Self {
            vms,
            hosts,
            fail_at: None,
            log,
        }
    }

    pub fn failing_at(mut self, fail_at: FailAt) -> Self {
        self.fail_at = Some(fail_at);
        self
    }
}

#[async_trait::async_trait]
impl InventorySource for ScriptedInventory {
    async fn connect(&self) -> Result<Box<dyn InventorySession>> {
        record(&self.log, "inventory.connect");
        if self.fail_at == Some(FailAt::Connect) {
            return Err(Error::network("simulated: connection refused"));
        }

        Ok(Box::new(ScriptedSession {
            inventory: self.clone(),
        }))
    }

    fn source_name(&self) -> &'static str {
        "scripted"
    }
}

struct ScriptedSession {
    inventory: ScriptedInventory,
}

#[async_trait::async_trait]
impl InventorySession for ScriptedSession {
    fn datacenter(&self) -> &str {
        "dc-test"
    }

    async fn list_vms(&self) -> Result<Vec<InventoryEntry>> {
        record(&self.inventory.log, "inventory.list_vms");
        if self.inventory.fail_at == Some(FailAt::ListVms) {
            return Err(Error::query("simulated: network error while listing VMs"));
        }
        Ok(self.inventory.vms.clone())
    }

    async fn list_hosts(&self) -> Result<Vec<InventoryEntry>> {
        record(&self.inventory.log, "inventory.list_hosts");
        if self.inventory.fail_at == Some(FailAt::ListHosts) {
            return Err(Error::query("simulated: network error while listing hosts"));
        }
        Ok(self.inventory.hosts.clone())
    }

    async fn close(&self) -> Result<()> {
        record(&self.inventory.log, "inventory.close");
        Ok(())
    }
}

/// Store connector that logs every operation and writes through to memory
#[derive(Clone)]
pub struct RecordingStore {
    backend: MemoryRecordStore,
    log: EventLog,
    fail_on_keys: Vec<String>,
    fail_connect: bool,
}

impl RecordingStore {
    pub fn new(backend: MemoryRecordStore, log: EventLog) -> Self {
        Self {
            backend,
            log,
            fail_on_keys: Vec::new(),
            fail_connect: false,
        }
    }

    /// Fail every write to `key` (may be called more than once)
    pub fn failing_on(mut self, key: impl Into<String>) -> Self {
        self.fail_on_keys.push(key.into());
        self
    }

    /// Fail every dial
    pub fn unreachable(mut self) -> Self {
        self.fail_connect = true;
        self
    }
}

#[async_trait::async_trait]
impl StoreConnector for RecordingStore {
    async fn connect(&self) -> Result<Box<dyn StoreSession>> {
        record(&self.log, "store.connect");
        if self.fail_connect {
            return Err(Error::store_connect("simulated: dial timeout"));
        }

        let inner = self.backend.connect().await?;
        Ok(Box::new(RecordingSession {
            inner,
            log: self.log.clone(),
            fail_on_keys: self.fail_on_keys.clone(),
        }))
    }

    fn store_name(&self) -> &'static str {
        "recording"
    }
}

struct RecordingSession {
    inner: Box<dyn StoreSession>,
    log: EventLog,
    fail_on_keys: Vec<String>,
}

impl RecordingSession {
    fn check(&self, op: &str, key: &str) -> Result<()> {
        if self.fail_on_keys.iter().any(|k| k == key) {
            record(&self.log, format!("{}! {}", op, key));
            return Err(Error::write(key, "simulated write failure"));
        }
        record(&self.log, format!("{} {}", op, key));
        Ok(())
    }
}

#[async_trait::async_trait]
impl StoreSession for RecordingSession {
    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.check("put", key)?;
        self.inner.put(key, value).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check("delete", key)?;
        self.inner.delete(key).await
    }

    async fn close(&self) -> Result<()> {
        record(&self.log, "store.close");
        self.inner.close().await
    }
}

/// Configuration with root `/skydns/` and domain `corp`
pub fn test_config(failure_policy: FailurePolicy) -> SyncConfig {
    SyncConfig {
        inventory: InventoryConfig {
            endpoint: "https://vcsa.test".to_string(),
            username: "administrator@vsphere.local".to_string(),
            password: "test-password".to_string(),
            insecure_tls: false,
        },
        store: StoreConfig {
            endpoint: "127.0.0.1:2379".to_string(),
            root_path: "/skydns/".to_string(),
            domain_name: "corp".to_string(),
            dial_timeout_secs: 5,
            dry_run: false,
        },
        failure_policy,
        log_level: "info".to_string(),
    }
}

/// Events that mutate the store (puts and deletes, failed or not)
pub fn writes(log: &EventLog) -> Vec<String> {
    events(log)
        .into_iter()
        .filter(|e| e.starts_with("put") || e.starts_with("delete"))
        .collect()
}
