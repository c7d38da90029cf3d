//! Domain errors.

use thiserror::Error;

/// Domain-level errors raised by value objects and state transitions.
///
/// These errors are independent of infrastructure concerns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// Invalid value for a field.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        /// Field name (dotted path for nested fields, e.g. `orders[0].qty`).
        field: String,
        /// Error message.
        message: String,
    },

    /// Invalid state transition attempted.
    #[error("Invalid state transition for {entity}: {from} -> {to}")]
    InvalidStateTransition {
        /// Entity type (e.g., "LedgerEntry").
        entity: String,
        /// Current state.
        from: String,
        /// Attempted state.
        to: String,
    },
}

impl DomainError {
    /// Shorthand for [`DomainError::InvalidValue`].
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Name of the offending field, if any.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::InvalidValue { field, .. } => Some(field),
            Self::InvalidStateTransition { .. } => None,
        }
    }
}
