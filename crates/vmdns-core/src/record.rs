//! Inventory entries and the presence records derived from them
//!
//! [`derive`] is the whole decision: an entry with an IP becomes a put of
//! `{"host": ip, "ttl": 60}`, an entry without one becomes a delete.

use serde::{Deserialize, Serialize};
use std::fmt;

/// TTL embedded in every published value (seconds)
///
/// This system never renews it; expiry is the consumer's business.
pub const RECORD_TTL: u32 = 60;

/// Kind of inventory object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Virtual machine
    Vm,
    /// Hypervisor host
    Host,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Vm => f.write_str("vm"),
            EntryKind::Host => f.write_str("host"),
        }
    }
}

/// A discovered inventory object
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InventoryEntry {
    /// Virtual machine with its guest IP (empty when unknown)
    Vm {
        /// Configured name, possibly with a domain suffix
        name: String,
        /// Guest IP address reported by the tools, or empty
        guest_ip: String,
    },
    /// Host with its management IP (empty when unknown)
    Host {
        /// Configured name, possibly with a domain suffix
        name: String,
        /// Management IP address, or empty
        management_ip: String,
    },
}

impl InventoryEntry {
    /// Create a VM entry
    pub fn vm(name: impl Into<String>, guest_ip: impl Into<String>) -> Self {
        Self::Vm {
            name: name.into(),
            guest_ip: guest_ip.into(),
        }
    }

    /// Create a host entry
    pub fn host(name: impl Into<String>, management_ip: impl Into<String>) -> Self {
        Self::Host {
            name: name.into(),
            management_ip: management_ip.into(),
        }
    }

    /// Object kind
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Vm { .. } => EntryKind::Vm,
            Self::Host { .. } => EntryKind::Host,
        }
    }

    /// Configured name as reported by the inventory
    pub fn name(&self) -> &str {
        match self {
            Self::Vm { name, .. } | Self::Host { name, .. } => name,
        }
    }

    /// The IP field relevant to this kind of object
    pub fn ip(&self) -> &str {
        match self {
            Self::Vm { guest_ip, .. } => guest_ip,
            Self::Host { management_ip, .. } => management_ip,
        }
    }

    /// Name truncated at the first `.`
    pub fn short_name(&self) -> &str {
        short_name(self.name())
    }
}

/// Truncate a name at its first `.` character
///
/// `"web01.corp.example.com"` becomes `"web01"`, a name without a dot is
/// returned unchanged.
pub fn short_name(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}

/// Deterministic key layout: `<root_path><domain_name>/<short_name>`
///
/// The segments are concatenated verbatim, so `root_path` must carry its
/// own trailing separator (e.g. `/skydns/`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyLayout {
    root_path: String,
    domain_name: String,
}

impl KeyLayout {
    /// Create a key layout
    pub fn new(root_path: impl Into<String>, domain_name: impl Into<String>) -> Self {
        Self {
            root_path: root_path.into(),
            domain_name: domain_name.into(),
        }
    }

    /// Key for a short name
    pub fn key_for(&self, short_name: &str) -> String {
        format!("{}{}/{}", self.root_path, self.domain_name, short_name)
    }
}

/// Value published for a live entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceValue {
    /// Current IP address
    pub host: String,
    /// Time-to-live in seconds
    pub ttl: u32,
}

impl PresenceValue {
    /// Encode as the compact JSON object stored under the key
    pub fn to_json(&self) -> String {
        serde_json::json!({ "host": self.host, "ttl": self.ttl }).to_string()
    }
}

/// What to do with a key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordAction {
    /// Write the value unconditionally
    Put {
        /// JSON-encoded [`PresenceValue`]
        value: String,
    },
    /// Remove the key (absent keys are fine)
    Delete,
}

/// Publish intent for a single inventory entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceRecord {
    /// Full store key
    pub key: String,
    /// Action to apply to the key
    pub action: RecordAction,
}

impl PresenceRecord {
    /// True for put actions
    pub fn is_put(&self) -> bool {
        matches!(self.action, RecordAction::Put { .. })
    }
}

/// Derive the presence record for an entry
///
/// VMs and hosts follow the same rule and differ only in which IP field
/// is read.
pub fn derive(layout: &KeyLayout, entry: &InventoryEntry) -> PresenceRecord {
    let key = layout.key_for(entry.short_name());
    let ip = entry.ip();

    let action = if ip.is_empty() {
        RecordAction::Delete
    } else {
        RecordAction::Put {
            value: PresenceValue {
                host: ip.to_string(),
                ttl: RECORD_TTL,
            }
            .to_json(),
        }
    };

    PresenceRecord { key, action }
}
