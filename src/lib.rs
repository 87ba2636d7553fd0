//! Channel Gate - Paid access to a private Telegram channel
//!
//! This crate turns YooKassa payment events into time-bounded channel
//! entitlements: it creates payments, reconciles webhook and polling
//! observations exactly once per payment, extends or suspends access, and
//! expires lapsed subscribers in the background.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
pub mod telemetry;
