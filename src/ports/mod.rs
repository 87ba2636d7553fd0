//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! - `EntitlementStore` - Durable users, payments, invites and history
//! - `PaymentGateway` - External payment processor
//! - `ChannelProvider` - Channel membership administration
//! - `Notifier` - Subscriber notifications and operator alerts

mod channel_provider;
mod entitlement_store;
mod notifier;
mod payment_gateway;

pub use channel_provider::{AccessError, ChannelProvider, InviteRequest, MemberPresence};
pub use entitlement_store::EntitlementStore;
pub use notifier::{Notifier, NotifyError};
pub use payment_gateway::{
    CreatePaymentRequest, GatewayError, GatewayErrorCode, GatewayMetadata, GatewayPayment,
    GatewayPaymentStatus, PaymentGateway,
};
