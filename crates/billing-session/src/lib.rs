//! Billing session runtime: mediates in-app purchases between an
//! asynchronous billing backend and a consumer reachable either in-process
//! or through an external URL scheme.
//!
//! The session owns connection lifecycle, request serialization against an
//! unready backend, purchase acknowledgment idempotency, and dual-channel
//! event delivery.

/// Purchase acknowledgment housekeeping.
pub mod acknowledger;
/// The opaque billing backend boundary.
pub mod backend;
/// Backend connection lifecycle ownership.
pub mod connection;
/// Inbound out-of-process request parsing.
pub mod inbound;
/// In-memory backend used by tests and the smoke binary.
pub mod memory;
/// Dual-channel consumer event delivery.
pub mod router;
/// The session runtime and its handle.
pub mod session;

pub use acknowledger::PurchaseAcknowledger;
pub use backend::{BackendNotice, BillingBackend, UpdateStatus};
pub use connection::BackendConnection;
pub use inbound::{InboundRequest, parse_billing_url, parse_launch_request};
pub use memory::MemoryBackend;
pub use router::{CallbackRouter, EventHandler, ExternalDispatch, InProcessHandlers};
pub use session::{
    BillingCommand, BillingSessionHandle, SessionChannelError, SessionConfig, spawn_session,
};
