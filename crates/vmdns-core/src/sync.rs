//! Store synchronizer
//!
//! Applies derived presence records to a store session. One pass = one
//! session: [`sync_entries`] connects, applies every record in inventory
//! order and closes the session before returning, on success and on
//! failure alike.
//!
//! ## Collisions
//!
//! Entries whose names truncate to the same short name share a key. The
//! last entry in inventory order wins; the collision is logged, never
//! suppressed.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::FailurePolicy;
use crate::error::{Error, Result};
use crate::record::{derive, InventoryEntry, KeyLayout, PresenceRecord, RecordAction};
use crate::traits::{StoreConnector, StoreSession};

/// Counters for one synchronization pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Put actions applied
    pub puts: usize,
    /// Delete actions applied
    pub deletes: usize,
    /// Writes that failed (only non-zero under [`FailurePolicy::Continue`])
    pub failed: usize,
}

impl PassSummary {
    /// Total number of records handled
    pub fn total(&self) -> usize {
        self.puts + self.deletes + self.failed
    }
}

/// Apply a single presence record
pub async fn apply(session: &dyn StoreSession, record: &PresenceRecord) -> Result<()> {
    match &record.action {
        RecordAction::Put { value } => {
            debug!("put {} = {}", record.key, value);
            session.put(&record.key, value).await
        }
        RecordAction::Delete => {
            debug!("delete {}", record.key);
            session.delete(&record.key).await
        }
    }
}

/// Synchronize a batch of entries through a fresh store session
///
/// # Failure Policy
///
/// - [`FailurePolicy::Abort`]: the first failed write ends the pass and is returned
/// - [`FailurePolicy::Continue`]: every record is attempted; if any failed,
///   [`Error::PartialSync`] is returned after the batch
///
/// The session is closed in both cases.
pub async fn sync_entries(
    connector: &dyn StoreConnector,
    layout: &KeyLayout,
    entries: &[InventoryEntry],
    policy: FailurePolicy,
) -> Result<PassSummary> {
    let session = connector.connect().await?;

    let result = apply_all(session.as_ref(), layout, entries, policy).await;

    if let Err(e) = session.close().await {
        warn!("Failed to close {} session: {}", connector.store_name(), e);
    }

    result
}

async fn apply_all(
    session: &dyn StoreSession,
    layout: &KeyLayout,
    entries: &[InventoryEntry],
    policy: FailurePolicy,
) -> Result<PassSummary> {
    let mut summary = PassSummary::default();
    let mut owners: HashMap<String, &str> = HashMap::with_capacity(entries.len());

    for entry in entries {
        if entry.short_name().is_empty() {
            warn!(
                "{} '{}' has an empty short name; its key ends in the domain separator",
                entry.kind(),
                entry.name()
            );
        }

        let record = derive(layout, entry);

        if let Some(previous) = owners.insert(record.key.clone(), entry.name()) {
            warn!(
                "Short name collision on {}: '{}' overrides '{}' (last write wins)",
                record.key,
                entry.name(),
                previous
            );
        }

        match apply(session, &record).await {
            Ok(()) if record.is_put() => summary.puts += 1,
            Ok(()) => summary.deletes += 1,
            Err(e) => match policy {
                FailurePolicy::Abort => return Err(e),
                FailurePolicy::Continue => {
                    warn!("{}", e);
                    summary.failed += 1;
                }
            },
        }
    }

    info!(
        "Applied {} record(s): {} put, {} delete, {} failed",
        summary.total(),
        summary.puts,
        summary.deletes,
        summary.failed
    );

    if summary.failed > 0 {
        return Err(Error::PartialSync {
            failed: summary.failed,
            total: summary.total(),
        });
    }

    Ok(summary)
}
