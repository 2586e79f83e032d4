// # Record Store Implementations
//
// This module provides the in-process implementation of the store traits.
// Network-backed stores live in their own crates.

pub mod memory;

pub use memory::MemoryRecordStore;
