//! Application layer - Commands, Queries, Handlers and background jobs.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Every read-modify-write of a user's entitlement or payments funnels
//! through the `ReconciliationEngine`, serialised per user by `UserLocks`.

pub mod access_controller;
pub mod context;
pub mod expiry_sweeper;
pub mod handlers;
pub mod reconciliation;
pub mod reminder_scheduler;
pub mod stats_reporter;
pub mod user_locks;

pub use access_controller::{AccessController, MembershipStatus};
pub use context::{ReconcileContext, ReconcileSettings};
pub use expiry_sweeper::{ExpirySweeper, ExpirySweeperConfig, SweepReport};
pub use handlers::subscription::{
    CancelPaymentCommand, CancelPaymentHandler, CheckPaymentCommand, CheckPaymentHandler,
    CreatePaymentCommand, CreatePaymentHandler, CreatePaymentResult, ExtendEntitlementCommand,
    ExtendEntitlementHandler, GetStatisticsHandler, GetStatisticsQuery,
    GetSubscriptionStatusHandler, GetSubscriptionStatusQuery, ProcessNotificationHandler,
    ProcessNotificationResult, RecordJoinCommand, RecordJoinHandler, RegisterUserCommand,
    RegisterUserHandler, StatisticsView, SubscriptionStatusView, SuspendEntitlementCommand,
    SuspendEntitlementHandler, WebhookMetadata, WebhookPayload,
};
pub use reconciliation::{
    ActivationReport, ExpiryOutcome, ObserveOutcome, PaymentRef, ReconciliationEngine,
    Registration, RetryPolicy,
};
pub use reminder_scheduler::{ReminderConfig, ReminderReport, ReminderScheduler};
pub use stats_reporter::{StatsConfig, StatsReporter};
pub use user_locks::{UserLockGuard, UserLocks};
