use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ConnectionState;

/// Fixed diagnostic shown when an operation is issued against an unready backend.
pub const MSG_NOT_CONNECTED: &str = "Billing service not connected";
/// Fixed diagnostic for a product id outside the configured catalog.
pub const MSG_INVALID_PRODUCT_ID: &str = "Invalid product ID";
/// Fixed diagnostic when a product lookup fails or returns nothing.
pub const MSG_PRODUCT_NOT_FOUND: &str = "Product not found";
/// Fixed diagnostic when a product carries no subscription offer.
pub const MSG_NO_OFFER: &str = "No offer available";

/// Broad error category used for logging and propagation decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum BillingErrorCategory {
    /// Backend connection is not in the `Ready` state.
    NotReady,
    /// Invalid consumer input or missing catalog data.
    Config,
    /// Backend returned a non-OK response to a request.
    Backend,
    /// Inbound out-of-process request body failed to parse.
    Payload,
    /// Internal bug or invariant break.
    Internal,
}

/// Stable billing error value carried across the session boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct BillingError {
    /// High-level error category.
    pub category: BillingErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable diagnostic delivered to the consumer.
    pub message: String,
}

impl BillingError {
    /// Construct a new billing error.
    pub fn new(
        category: BillingErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Error surfaced when the backend connection is not ready.
    pub fn not_connected() -> Self {
        Self::new(
            BillingErrorCategory::NotReady,
            "not_connected",
            MSG_NOT_CONNECTED,
        )
    }

    /// Error for a product id outside the configured catalog.
    pub fn invalid_product_id() -> Self {
        Self::new(
            BillingErrorCategory::Config,
            "invalid_product_id",
            MSG_INVALID_PRODUCT_ID,
        )
    }

    /// Error for a product lookup that failed or returned nothing.
    pub fn product_not_found() -> Self {
        Self::new(
            BillingErrorCategory::Backend,
            "product_not_found",
            MSG_PRODUCT_NOT_FOUND,
        )
    }

    /// Error for a product without any subscription offer.
    pub fn no_offer_available() -> Self {
        Self::new(BillingErrorCategory::Config, "no_offer", MSG_NO_OFFER)
    }

    /// Wrap a backend rejection with its diagnostic text.
    pub fn backend(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(BillingErrorCategory::Backend, code, message)
    }

    /// Error for an inbound request body that failed to parse.
    pub fn malformed_payload(message: impl Into<String>) -> Self {
        Self::new(BillingErrorCategory::Payload, "malformed_payload", message)
    }

    /// Build a standard invalid-lifecycle-transition error.
    pub fn invalid_transition(current: ConnectionState, action: impl Into<String>) -> Self {
        let action = action.into();
        Self::new(
            BillingErrorCategory::Internal,
            "invalid_state_transition",
            format!("cannot run '{action}' while connection is in state {current:?}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_consumer_facing_diagnostics_stable() {
        assert_eq!(
            BillingError::not_connected().message,
            "Billing service not connected"
        );
        assert_eq!(
            BillingError::invalid_product_id().message,
            "Invalid product ID"
        );
        assert_eq!(
            BillingError::product_not_found().message,
            "Product not found"
        );
        assert_eq!(
            BillingError::no_offer_available().message,
            "No offer available"
        );
    }

    #[test]
    fn keeps_invalid_transition_code_stable() {
        let err = BillingError::invalid_transition(ConnectionState::Ready, "begin_connect");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(err.category, BillingErrorCategory::Internal);
    }

    #[test]
    fn carries_backend_diagnostic_through() {
        let err = BillingError::backend("billing_unavailable", "Service unavailable (code 2)");
        assert_eq!(err.category, BillingErrorCategory::Backend);
        assert_eq!(err.message, "Service unavailable (code 2)");
    }
}
