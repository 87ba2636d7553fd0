//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the domain to external systems:
//! - `postgres` - Durable entitlement store
//! - `memory` - In-memory entitlement store
//! - `yookassa` - Payment gateway, notification parsing and signatures
//! - `telegram` - Channel membership and bot notifications
//! - `notifications` - Recording notifier

pub mod memory;
pub mod notifications;
pub mod postgres;
pub mod telegram;
pub mod yookassa;

pub use memory::InMemoryEntitlementStore;
pub use notifications::RecordingNotifier;
pub use postgres::PostgresEntitlementStore;
pub use telegram::{StubChannelProvider, TelegramChannel, TelegramNotifier};
pub use yookassa::{MockPaymentGateway, WebhookVerifier, YooKassaConfig, YooKassaGateway};
