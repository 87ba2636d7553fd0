//! In-memory adapters for tests and embedded use.

mod in_memory_store;

pub use in_memory_store::InMemoryEntitlementStore;
