//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, money, timestamps, errors)
//! - `subscription` - Users, payments, invites and the entitlement lifecycle

pub mod foundation;
pub mod subscription;
