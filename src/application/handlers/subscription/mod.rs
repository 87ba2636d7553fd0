//! Subscription handlers.
//!
//! Command and query handlers for the paid-channel lifecycle:
//!
//! ## Commands
//! - Registering users
//! - Creating, checking and cancelling payments
//! - Processing provider notifications
//! - Recording channel joins
//! - Extending and suspending entitlements (admin)
//!
//! ## Queries
//! - Get subscription status
//! - Get statistics (admin)

mod cancel_payment;
mod check_payment;
mod create_payment;
mod extend_entitlement;
mod get_statistics;
mod get_subscription_status;
mod process_notification;
mod record_join;
mod register_user;
mod suspend_entitlement;

// Commands
pub use cancel_payment::{CancelPaymentCommand, CancelPaymentHandler};
pub use check_payment::{CheckPaymentCommand, CheckPaymentHandler};
pub use create_payment::{CreatePaymentCommand, CreatePaymentHandler, CreatePaymentResult};
pub use extend_entitlement::{ExtendEntitlementCommand, ExtendEntitlementHandler};
pub use process_notification::{
    ProcessNotificationHandler, ProcessNotificationResult, WebhookMetadata, WebhookPayload,
};
pub use record_join::{RecordJoinCommand, RecordJoinHandler};
pub use register_user::{RegisterUserCommand, RegisterUserHandler};
pub use suspend_entitlement::{SuspendEntitlementCommand, SuspendEntitlementHandler};

// Queries
pub use get_statistics::{GetStatisticsHandler, GetStatisticsQuery, StatisticsView};
pub use get_subscription_status::{
    GetSubscriptionStatusHandler, GetSubscriptionStatusQuery, SubscriptionStatusView,
};
