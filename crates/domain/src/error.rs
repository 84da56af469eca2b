//! Unified error types for the domain layer
//!
//! Provides a common error type for decision-scope validation and the
//! proposition/offer model, so callers never have to match on strings.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Decision scope cannot be requested
    #[error("Invalid decision scope '{name}': {reason}")]
    InvalidScope { name: String, reason: String },

    /// An offer was paired with a proposition it does not belong to
    #[error("Offer {offer_id} does not belong to proposition {proposition_id}")]
    OfferNotInProposition {
        offer_id: String,
        proposition_id: String,
    },
}

impl DomainError {
    /// Creates a validation error for required fields that are empty or missing.
    ///
    /// # Example
    /// ```ignore
    /// if id.is_empty() {
    ///     return Err(DomainError::validation("Offer id cannot be empty"));
    /// }
    /// ```
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid scope error
    pub fn invalid_scope(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidScope {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create an offer/proposition mismatch error
    pub fn offer_not_in_proposition(
        offer_id: impl Into<String>,
        proposition_id: impl Into<String>,
    ) -> Self {
        Self::OfferNotInProposition {
            offer_id: offer_id.into(),
            proposition_id: proposition_id.into(),
        }
    }
}
