//! Subscription module - Users, payments and channel entitlement.
//!
//! # Module Structure
//!
//! - `status` - Entitlement and payment state machines
//! - `user` - User aggregate and the renewal rule
//! - `payment` - Payment entity
//! - `invite` - Single-use invite tokens
//! - `observation` - Gateway status observations
//! - `history` - Entitlement change records
//! - `notification` - Subscriber notifications and operator alerts
//! - `stats` - Counts for the operator statistics report
//! - `errors` - Reconciliation errors

mod errors;
mod history;
mod invite;
mod notification;
mod observation;
mod payment;
mod stats;
mod status;
mod user;

pub use errors::ReconcileError;
pub use history::{EntitlementAction, EntitlementChange};
pub use invite::InviteToken;
pub use notification::{AlertKind, NotificationContext, NotificationKind, OperatorAlert};
pub use observation::{Observation, ObservedStatus};
pub use payment::Payment;
pub use stats::{PaymentStats, UserCounts};
pub use status::{EntitlementStatus, PaymentStatus};
pub use user::{renewed_end, User};
