use serde::{Deserialize, Serialize};

/// Lifecycle state of the connection to the billing backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection; initial state and the state after service loss.
    Disconnected,
    /// An asynchronous connect is in flight.
    Connecting,
    /// Backend reported a successful setup; requests may be issued.
    Ready,
    /// Backend reported a connect failure; a new `start` may retry.
    Failed,
}

/// Product category understood by the billing backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProductKind {
    /// Recurring subscription product.
    Subscription,
    /// One-time (in-app) product.
    OneTime,
}

impl ProductKind {
    /// Wire string used in query parameters and batch payloads.
    pub fn as_wire_str(self) -> &'static str {
        match self {
            ProductKind::Subscription => "subs",
            ProductKind::OneTime => "inapp",
        }
    }
}

/// One pricing phase of a subscription offer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PricingPhase {
    /// Locale-formatted display price, passed through unmodified.
    pub formatted_price: String,
    /// Price in micro-units of the billing currency.
    pub price_micros: i64,
}

/// A purchasable subscription offer attached to a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubscriptionOffer {
    /// Opaque token required to launch a purchase flow for this offer.
    pub offer_token: String,
    /// Pricing phases in backend order; may be empty.
    pub pricing_phases: Vec<PricingPhase>,
}

/// Catalog entry as returned by the billing backend.
///
/// Sourced fresh from the backend per query; never cached across queries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductDetails {
    /// Backend product identifier.
    pub product_id: String,
    /// Display title.
    pub title: String,
    /// Display description.
    pub description: String,
    /// Subscription offers; absence is tolerated, not an error.
    pub offers: Vec<SubscriptionOffer>,
}

/// Settlement state of a purchase as reported by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PurchaseState {
    /// Payment not yet completed.
    Pending,
    /// Payment completed; must be acknowledged within the backend's window.
    Purchased,
    /// Backend did not report a recognized state.
    Unspecified,
}

/// A purchase record observed via query or unsolicited update.
///
/// `purchase_token` is the identity key for deduplication: two records with
/// the same token refer to the same real-world transaction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Purchase {
    /// Backend order identifier.
    pub order_id: String,
    /// Opaque per-transaction token; unique identity for acknowledgment.
    pub purchase_token: String,
    /// Product identifiers covered by this purchase, in backend order.
    pub product_ids: Vec<String>,
    /// Purchase timestamp in milliseconds since Unix epoch.
    pub purchase_time_millis: i64,
    /// Settlement state.
    pub state: PurchaseState,
    /// Whether the backend already recorded an acknowledgment.
    pub acknowledged: bool,
}

/// Outcome delivered to the consumer; the only thing the router transports.
///
/// Events are immutable once constructed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum BillingEvent {
    /// Backend connection completed setup successfully.
    Ready,
    /// Backend connection setup failed.
    ConnectionError {
        /// Backend-supplied diagnostic text.
        message: String,
    },
    /// Catalog query completed.
    ProductsLoaded {
        /// Product details in backend order.
        products: Vec<ProductDetails>,
    },
    /// Catalog query failed.
    ProductsError {
        /// Diagnostic text.
        message: String,
    },
    /// One purchase reported by an unsolicited backend update.
    PurchaseSuccess {
        /// The observed purchase.
        purchase: Purchase,
    },
    /// The user abandoned the purchase flow.
    PurchaseCanceled,
    /// Purchase flow failed or was rejected.
    PurchaseError {
        /// Diagnostic text.
        message: String,
    },
    /// Purchase query completed.
    PurchasesLoaded {
        /// Purchases as observed, acknowledgment state untouched.
        purchases: Vec<Purchase>,
        /// Product kind of the queried batch.
        kind: ProductKind,
    },
    /// Purchase query failed.
    PurchasesError {
        /// Diagnostic text.
        message: String,
    },
}
