//! State machine trait for status enums.
//!
//! Gives payment and entitlement statuses one way to validate and
//! perform transitions, so every writer goes through the same table.

use super::ValidationError;

/// Trait for status enums that represent state machines.
///
/// Implementors list their legal moves; `transition_to` and
/// `is_terminal` come for free.
///
/// # Example
///
/// ```ignore
/// impl StateMachine for PaymentStatus {
///     fn can_transition_to(&self, target: &Self) -> bool {
///         matches!((self, target), (Pending, Succeeded) | (Pending, Canceled) | (Pending, Failed))
///     }
///
///     fn valid_transitions(&self) -> Vec<Self> {
///         match self {
///             Pending => vec![Succeeded, Canceled, Failed],
///             Succeeded | Canceled | Failed => vec![],
///         }
///     }
/// }
///
/// let settled = PaymentStatus::Pending.transition_to(PaymentStatus::Succeeded)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("Cannot transition from {:?} to {:?}", self, target),
            ))
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
