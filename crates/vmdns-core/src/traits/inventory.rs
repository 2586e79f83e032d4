// # Inventory Traits
//
// Defines the interface for reading VMs and hosts from a virtualization
// management endpoint.
//
// ## Implementations
//
// - vSphere (vim25 SOAP): `vmdns-inventory-vsphere` crate
//
// ## Usage
//
// ```rust,ignore
// use vmdns_core::InventorySource;
//
// let session = source.connect().await?;
// let vms = session.list_vms().await?;
// let hosts = session.list_hosts().await?;
// session.close().await?;
// ```

use async_trait::async_trait;

use crate::record::InventoryEntry;

/// Factory for inventory sessions
///
/// # Failure Modes
///
/// - `Error::Config`: malformed endpoint URL
/// - `Error::Authentication` / `Error::Network`: session establishment failed
/// - `Error::NoDatacenter`: no single default datacenter
#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Authenticate and resolve the default datacenter
    async fn connect(&self) -> Result<Box<dyn InventorySession>, crate::Error>;

    /// Source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// An authenticated, read-only inventory session scoped to one datacenter
///
/// Listing calls are independent of each other; none of them caches
/// results between calls.
#[async_trait]
pub trait InventorySession: Send + Sync {
    /// Name of the resolved datacenter
    fn datacenter(&self) -> &str;

    /// List every VM under the datacenter with its guest IP
    ///
    /// Fails with `Error::Query`.
    async fn list_vms(&self) -> Result<Vec<InventoryEntry>, crate::Error>;

    /// List every host under the datacenter with its management IP
    ///
    /// Fails with `Error::Query`.
    async fn list_hosts(&self) -> Result<Vec<InventoryEntry>, crate::Error>;

    /// End the session
    async fn close(&self) -> Result<(), crate::Error>;
}
