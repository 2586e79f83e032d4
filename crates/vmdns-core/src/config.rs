//! Configuration types for the vmdns system
//!
//! The whole run is parameterised by one [`SyncConfig`], built once at
//! startup and handed to every component. Only the binary touches the
//! process environment; it does so through [`SyncConfig::from_lookup`].

use crate::record::KeyLayout;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Inventory endpoint URL (scheme + host)
pub const ENV_INVENTORY_ENDPOINT: &str = "vCSAHostname";
/// Inventory user name
pub const ENV_INVENTORY_USERNAME: &str = "vCSAUserName";
/// Inventory password
pub const ENV_INVENTORY_PASSWORD: &str = "vCSAPassword";
/// Skip TLS verification toward the inventory endpoint
pub const ENV_INVENTORY_INSECURE: &str = "vCSAInsecure";
/// Key-value store address
pub const ENV_STORE_ENDPOINT: &str = "etcdEndpoint";
/// Prefix prepended to every key
pub const ENV_STORE_ROOT_PATH: &str = "etcdPluginRootPath";
/// Domain segment of every key
pub const ENV_STORE_DOMAIN_NAME: &str = "etcdDomainName";
/// Store dial timeout in seconds
pub const ENV_STORE_DIAL_TIMEOUT: &str = "etcdDialTimeoutSecs";
/// Failure policy (`abort` or `continue`)
pub const ENV_FAILURE_POLICY: &str = "VMDNS_FAILURE_POLICY";
/// Run mode (`dry-run` disables store writes)
pub const ENV_MODE: &str = "VMDNS_MODE";
/// Log level
pub const ENV_LOG_LEVEL: &str = "VMDNS_LOG_LEVEL";

/// Main configuration for one reconciliation pass
#[derive(Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Inventory (vCenter) connection settings
    pub inventory: InventoryConfig,

    /// Key-value store settings
    pub store: StoreConfig,

    /// What to do when a store write fails
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Log level name (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl SyncConfig {
    /// Build a configuration from named variables
    ///
    /// `lookup` returns the value of a variable, or `None` when unset.
    /// Missing required values are left empty and reported by
    /// [`SyncConfig::validate`].
    pub fn from_lookup<F>(lookup: F) -> crate::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).unwrap_or_default().trim().to_string();

        let insecure_tls = match lookup(ENV_INVENTORY_INSECURE) {
            Some(value) => parse_bool(ENV_INVENTORY_INSECURE, &value)?,
            None => false,
        };

        let dial_timeout_secs = match lookup(ENV_STORE_DIAL_TIMEOUT) {
            Some(value) => value.trim().parse().map_err(|_| {
                crate::Error::config(format!(
                    "{} must be a number of seconds. Got: {}",
                    ENV_STORE_DIAL_TIMEOUT, value
                ))
            })?,
            None => default_dial_timeout_secs(),
        };

        let failure_policy = match lookup(ENV_FAILURE_POLICY) {
            Some(value) => value.parse()?,
            None => FailurePolicy::default(),
        };

        let dry_run = lookup(ENV_MODE)
            .unwrap_or_default()
            .trim()
            .eq_ignore_ascii_case("dry-run");

        Ok(Self {
            inventory: InventoryConfig {
                endpoint: var(ENV_INVENTORY_ENDPOINT),
                username: var(ENV_INVENTORY_USERNAME),
                // Passwords are taken verbatim, surrounding spaces included.
                password: lookup(ENV_INVENTORY_PASSWORD).unwrap_or_default(),
                insecure_tls,
            },
            store: StoreConfig {
                endpoint: var(ENV_STORE_ENDPOINT),
                root_path: lookup(ENV_STORE_ROOT_PATH).unwrap_or_default(),
                domain_name: var(ENV_STORE_DOMAIN_NAME),
                dial_timeout_secs,
                dry_run,
            },
            failure_policy,
            log_level: lookup(ENV_LOG_LEVEL).unwrap_or_else(default_log_level),
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        self.inventory.validate()?;
        self.store.validate()?;

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
            _ => Err(crate::Error::config(format!(
                "{} '{}' is not valid. Valid levels: trace, debug, info, warn, error",
                ENV_LOG_LEVEL, self.log_level
            ))),
        }
    }
}

// Custom Debug implementation that hides the password
impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("inventory", &self.inventory)
            .field("store", &self.store)
            .field("failure_policy", &self.failure_policy)
            .field("log_level", &self.log_level)
            .finish()
    }
}

/// Inventory endpoint configuration
#[derive(Clone, Serialize, Deserialize)]
pub struct InventoryConfig {
    /// Endpoint URL, e.g. `https://vcsa.corp.local`
    pub endpoint: String,

    /// User name for the inventory session
    pub username: String,

    /// Password for the inventory session
    /// ⚠️ NEVER log this value
    pub password: String,

    /// Accept any TLS certificate from the endpoint
    #[serde(default)]
    pub insecure_tls: bool,
}

impl InventoryConfig {
    /// Validate the inventory configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.endpoint.is_empty() {
            return Err(crate::Error::config(format!(
                "{} is required. Set it via: export {}=https://vcsa.example.com",
                ENV_INVENTORY_ENDPOINT, ENV_INVENTORY_ENDPOINT
            )));
        }

        if !self.endpoint.starts_with("https://") && !self.endpoint.starts_with("http://") {
            return Err(crate::Error::config(format!(
                "{} must use HTTP or HTTPS scheme. Got: {}",
                ENV_INVENTORY_ENDPOINT, self.endpoint
            )));
        }

        if self.username.is_empty() {
            return Err(crate::Error::config(format!(
                "{} is required",
                ENV_INVENTORY_USERNAME
            )));
        }

        if self.password.is_empty() {
            return Err(crate::Error::config(format!(
                "{} is required",
                ENV_INVENTORY_PASSWORD
            )));
        }

        Ok(())
    }
}

impl std::fmt::Debug for InventoryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InventoryConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<REDACTED>")
            .field("insecure_tls", &self.insecure_tls)
            .finish()
    }
}

/// Key-value store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Store address, e.g. `http://etcd.corp.local:2379` or `etcd:2379`
    pub endpoint: String,

    /// Prefix prepended to every key, e.g. `/skydns/`
    pub root_path: String,

    /// Domain segment grouping the records, e.g. `corp.local`
    pub domain_name: String,

    /// Upper bound on dialing the store (in seconds)
    #[serde(default = "default_dial_timeout_secs")]
    pub dial_timeout_secs: u64,

    /// Log intended writes instead of performing them
    #[serde(default)]
    pub dry_run: bool,
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> crate::Result<()> {
        if self.endpoint.is_empty() {
            return Err(crate::Error::config(format!(
                "{} is required. Set it via: export {}=http://127.0.0.1:2379",
                ENV_STORE_ENDPOINT, ENV_STORE_ENDPOINT
            )));
        }

        if self.domain_name.is_empty() {
            return Err(crate::Error::config(format!(
                "{} is required",
                ENV_STORE_DOMAIN_NAME
            )));
        }

        if !(1..=60).contains(&self.dial_timeout_secs) {
            return Err(crate::Error::config(format!(
                "{} must be between 1 and 60 seconds. Got: {}",
                ENV_STORE_DIAL_TIMEOUT, self.dial_timeout_secs
            )));
        }

        Ok(())
    }

    /// Dial timeout as a [`Duration`]
    pub fn dial_timeout(&self) -> Duration {
        Duration::from_secs(self.dial_timeout_secs)
    }

    /// Key layout derived from the root path and domain name
    pub fn layout(&self) -> KeyLayout {
        KeyLayout::new(self.root_path.clone(), self.domain_name.clone())
    }
}

/// Behaviour when a store write fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop at the first failed write
    #[default]
    Abort,
    /// Log failed writes, finish the batch, then report the failure count
    Continue,
}

impl FromStr for FailurePolicy {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "continue" => Ok(Self::Continue),
            other => Err(crate::Error::config(format!(
                "{} '{}' is not supported. Supported policies: abort, continue",
                ENV_FAILURE_POLICY, other
            ))),
        }
    }
}

fn parse_bool(name: &str, value: &str) -> crate::Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(crate::Error::config(format!(
            "{} must be a boolean. Got: {}",
            name, value
        ))),
    }
}

fn default_dial_timeout_secs() -> u64 {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}
