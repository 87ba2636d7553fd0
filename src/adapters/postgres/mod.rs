//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! This module provides adapters for PostgreSQL-backed persistence:
//! - `PostgresEntitlementStore` - Users, payments, invites and history
//!
//! The schema lives in `migrations/` at the crate root.

mod entitlement_store;

pub use entitlement_store::PostgresEntitlementStore;
