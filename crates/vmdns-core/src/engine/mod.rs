//! Reconciliation driver
//!
//! The Reconciler runs one full reconciliation pass and returns:
//!
//! ```text
//! ┌──────────────────┐    VMs     ┌────────────┐  put/delete  ┌──────────────┐
//! │ InventorySession │ ─────────▶ │ derive()   │ ───────────▶ │ StoreSession │ #1
//! │  (one datacenter)│    hosts   │            │              │              │ #2
//! └──────────────────┘ ─────────▶ └────────────┘ ───────────▶ └──────────────┘
//! ```
//!
//! ## Sequence
//!
//! 1. Connect to the inventory
//! 2. List VMs
//! 3. Synchronize VM records (own store session)
//! 4. List hosts
//! 5. Synchronize host records (own store session)
//! 6. Close the inventory session
//!
//! There are no retries and no loops. The first error ends the run; the
//! inventory session is closed regardless. Under the continue policy a
//! pass with failed writes does not stop the host pass, and the run ends
//! with one `PartialSync` covering both. Resilience is delegated to
//! whatever scheduler invokes the process again.

use crate::config::{FailurePolicy, SyncConfig};
use crate::error::{Error, Result};
use crate::record::KeyLayout;
use crate::sync::{sync_entries, PassSummary};
use crate::traits::{InventorySession, InventorySource, StoreConnector};
use tracing::{info, warn};

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Datacenter the inventory was read from
    pub datacenter: String,
    /// VM pass counters
    pub vms: PassSummary,
    /// Host pass counters
    pub hosts: PassSummary,
}

/// One-shot reconciliation driver
///
/// ## Lifecycle
///
/// 1. Create with [`Reconciler::new()`]
/// 2. Call [`Reconciler::run()`]
/// 3. Drop
///
/// A reconciler holds no state between runs; calling `run` again re-reads
/// the whole inventory and rewrites every record.
pub struct Reconciler {
    /// Inventory source (vCenter)
    source: Box<dyn InventorySource>,

    /// Store connector (etcd)
    store: Box<dyn StoreConnector>,

    /// Key layout for every record
    layout: KeyLayout,

    /// Write failure handling
    failure_policy: FailurePolicy,
}

impl Reconciler {
    /// Create a new reconciler
    ///
    /// The configuration is validated here so a bad config never reaches
    /// the network.
    pub fn new(
        source: Box<dyn InventorySource>,
        store: Box<dyn StoreConnector>,
        config: SyncConfig,
    ) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            source,
            store,
            layout: config.store.layout(),
            failure_policy: config.failure_policy,
        })
    }

    /// Run one reconciliation pass
    ///
    /// # Returns
    ///
    /// - `Ok(RunSummary)`: both passes completed
    /// - `Err(Error)`: the first fatal error
    pub async fn run(&self) -> Result<RunSummary> {
        info!(
            "Starting reconciliation: {} -> {}",
            self.source.source_name(),
            self.store.store_name()
        );

        let session = self.source.connect().await?;
        info!("Inventory session open, datacenter: {}", session.datacenter());

        let result = self.run_passes(session.as_ref()).await;

        if let Err(e) = session.close().await {
            warn!("Failed to close inventory session: {}", e);
        }

        let summary = result?;
        info!(
            "Reconciliation complete: {} VM record(s), {} host record(s)",
            summary.vms.total(),
            summary.hosts.total()
        );
        Ok(summary)
    }

    async fn run_passes(&self, session: &dyn InventorySession) -> Result<RunSummary> {
        let mut partial = PartialTally::default();

        let vms = session.list_vms().await?;
        info!("Fetched {} VM(s)", vms.len());
        let vm_pass =
            sync_entries(self.store.as_ref(), &self.layout, &vms, self.failure_policy).await;
        let vm_summary = self.tolerate(vm_pass, &mut partial)?;

        let hosts = session.list_hosts().await?;
        info!("Fetched {} host(s)", hosts.len());
        let host_pass =
            sync_entries(self.store.as_ref(), &self.layout, &hosts, self.failure_policy).await;
        let host_summary = self.tolerate(host_pass, &mut partial)?;

        if partial.failed > 0 {
            return Err(Error::PartialSync {
                failed: partial.failed,
                total: partial.total,
            });
        }

        Ok(RunSummary {
            datacenter: session.datacenter().to_string(),
            vms: vm_summary,
            hosts: host_summary,
        })
    }

    /// Fold a pass result into the run tally
    ///
    /// Under [`FailurePolicy::Continue`] a partially failed pass does not
    /// stop the next one; its counts are carried into the final
    /// `PartialSync`. Every other error is returned as is.
    fn tolerate(
        &self,
        pass: Result<PassSummary>,
        partial: &mut PartialTally,
    ) -> Result<PassSummary> {
        match pass {
            Ok(summary) => {
                partial.total += summary.total();
                Ok(summary)
            }
            Err(Error::PartialSync { failed, total })
                if self.failure_policy == FailurePolicy::Continue =>
            {
                warn!("{} of {} write(s) failed, continuing with next pass", failed, total);
                partial.failed += failed;
                partial.total += total;
                Ok(PassSummary {
                    failed,
                    ..PassSummary::default()
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Write counts accumulated across passes
#[derive(Debug, Default)]
struct PartialTally {
    failed: usize,
    total: usize,
}
