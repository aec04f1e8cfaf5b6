use async_trait::async_trait;

use billing_core::{BillingError, ProductDetails, ProductKind, Purchase};

/// The opaque billing backend boundary.
///
/// Every request is asynchronous and resolves exactly once. The backend's
/// acknowledge endpoint is assumed idempotent per purchase token.
#[async_trait]
pub trait BillingBackend: Send + Sync + 'static {
    /// Establish the service connection; resolves when setup finishes.
    async fn connect(&self) -> Result<(), BillingError>;

    /// Look up catalog details for the given product ids of one kind.
    async fn query_product_details(
        &self,
        product_ids: &[String],
        kind: ProductKind,
    ) -> Result<Vec<ProductDetails>, BillingError>;

    /// Query all current purchases of the given kind.
    async fn query_purchases(&self, kind: ProductKind) -> Result<Vec<Purchase>, BillingError>;

    /// Hand off to the backend's purchase UI for one offer.
    ///
    /// An `Err` is a synchronous rejection; the real purchase outcome
    /// arrives later as an unsolicited update.
    async fn launch_billing_flow(
        &self,
        product_id: &str,
        offer_token: &str,
    ) -> Result<(), BillingError>;

    /// Acknowledge a purchase by token.
    async fn acknowledge(&self, purchase_token: &str) -> Result<(), BillingError>;
}

/// Result status attached to an unsolicited purchases update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// Purchases in the batch completed successfully.
    Ok,
    /// The user abandoned the purchase flow.
    UserCanceled,
    /// The backend reported a failure with diagnostic text.
    Failed {
        /// Backend-supplied diagnostic.
        message: String,
    },
}

/// Backend-initiated notification entering the session runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendNotice {
    /// An unsolicited purchases update batch.
    PurchasesUpdated {
        /// Batch outcome status.
        status: UpdateStatus,
        /// Purchases in the batch; ignored unless `status` is `Ok`.
        purchases: Vec<Purchase>,
    },
    /// The service connection was lost; no consumer event is emitted.
    ServiceLost,
}
