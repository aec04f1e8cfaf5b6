//! Core billing contract shared between the session runtime and consumers.
//!
//! This crate defines the billing data model, the consumer-facing event
//! protocol and its wire encoding, the connection lifecycle state machine,
//! and the common error type.

/// Stable billing error type and diagnostic helpers.
pub mod error;
/// Wire encoding for consumer events (callback names + JSON payloads).
pub mod event;
/// Backend connection lifecycle state machine.
pub mod state_machine;
/// Billing data model (products, purchases, events).
pub mod types;

pub use error::{BillingError, BillingErrorCategory};
pub use event::{CONSUMER_EVENT_NAMES, product_record, purchase_record};
pub use state_machine::ConnectionStateMachine;
pub use types::{
    BillingEvent, ConnectionState, PricingPhase, ProductDetails, ProductKind, Purchase,
    PurchaseState, SubscriptionOffer,
};
