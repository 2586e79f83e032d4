//! Core traits for the vmdns system
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`InventorySource`] / [`InventorySession`]: Read VMs and hosts
//! - [`StoreConnector`] / [`StoreSession`]: Write presence records

pub mod inventory;
pub mod record_store;

pub use inventory::{InventorySession, InventorySource};
pub use record_store::{StoreConnector, StoreSession};
