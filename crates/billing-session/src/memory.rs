use std::sync::Mutex;

use async_trait::async_trait;

use billing_core::{BillingError, ProductDetails, ProductKind, Purchase};

use crate::backend::BillingBackend;

#[derive(Default)]
struct Inner {
    catalog: Vec<ProductDetails>,
    purchases: Vec<Purchase>,
    connect_error: Option<BillingError>,
    products_error: Option<BillingError>,
    purchases_error: Option<BillingError>,
    launch_error: Option<BillingError>,
    acknowledge_error: Option<BillingError>,
    product_queries: Vec<Vec<String>>,
    launched: Vec<(String, String)>,
    acknowledged: Vec<String>,
}

/// In-memory billing backend with failure injection and call recording.
///
/// Used by the integration tests and the smoke binary; every call resolves
/// immediately.
#[derive(Default)]
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, details: ProductDetails) {
        self.lock().catalog.push(details);
    }

    pub fn add_purchase(&self, purchase: Purchase) {
        self.lock().purchases.push(purchase);
    }

    /// Make the next connect fail with the given diagnostic.
    pub fn fail_connect(&self, message: impl Into<String>) {
        self.lock().connect_error = Some(BillingError::backend("connect_failed", message));
    }

    /// Make every product query fail with the given diagnostic.
    pub fn fail_products(&self, message: impl Into<String>) {
        self.lock().products_error = Some(BillingError::backend("products_failed", message));
    }

    /// Make every purchases query fail with the given diagnostic.
    pub fn fail_purchases(&self, message: impl Into<String>) {
        self.lock().purchases_error = Some(BillingError::backend("purchases_failed", message));
    }

    /// Reject every billing-flow launch with the given diagnostic.
    pub fn reject_launch(&self, message: impl Into<String>) {
        self.lock().launch_error = Some(BillingError::backend("launch_rejected", message));
    }

    /// Make every acknowledge call fail with the given diagnostic.
    pub fn fail_acknowledge(&self, message: impl Into<String>) {
        self.lock().acknowledge_error = Some(BillingError::backend("acknowledge_failed", message));
    }

    /// Tokens passed to `acknowledge`, in call order (including failed calls).
    pub fn acknowledged_tokens(&self) -> Vec<String> {
        self.lock().acknowledged.clone()
    }

    /// `(product_id, offer_token)` pairs passed to `launch_billing_flow`.
    pub fn launched_flows(&self) -> Vec<(String, String)> {
        self.lock().launched.clone()
    }

    /// Number of product-details queries issued so far.
    pub fn product_query_count(&self) -> usize {
        self.lock().product_queries.len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("memory backend lock poisoned")
    }
}

#[async_trait]
impl BillingBackend for MemoryBackend {
    async fn connect(&self) -> Result<(), BillingError> {
        // One-shot: a later retry connects successfully.
        match self.lock().connect_error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn query_product_details(
        &self,
        product_ids: &[String],
        _kind: ProductKind,
    ) -> Result<Vec<ProductDetails>, BillingError> {
        let mut inner = self.lock();
        inner.product_queries.push(product_ids.to_vec());

        if let Some(err) = inner.products_error.clone() {
            return Err(err);
        }

        Ok(inner
            .catalog
            .iter()
            .filter(|details| product_ids.contains(&details.product_id))
            .cloned()
            .collect())
    }

    async fn query_purchases(&self, _kind: ProductKind) -> Result<Vec<Purchase>, BillingError> {
        let inner = self.lock();
        if let Some(err) = inner.purchases_error.clone() {
            return Err(err);
        }
        Ok(inner.purchases.clone())
    }

    async fn launch_billing_flow(
        &self,
        product_id: &str,
        offer_token: &str,
    ) -> Result<(), BillingError> {
        let mut inner = self.lock();
        if let Some(err) = inner.launch_error.clone() {
            return Err(err);
        }
        inner
            .launched
            .push((product_id.to_owned(), offer_token.to_owned()));
        Ok(())
    }

    async fn acknowledge(&self, purchase_token: &str) -> Result<(), BillingError> {
        let mut inner = self.lock();
        inner.acknowledged.push(purchase_token.to_owned());
        match inner.acknowledge_error.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use billing_core::{PricingPhase, SubscriptionOffer};

    fn product(id: &str) -> ProductDetails {
        ProductDetails {
            product_id: id.to_owned(),
            title: id.to_owned(),
            description: String::new(),
            offers: vec![SubscriptionOffer {
                offer_token: format!("offer-{id}"),
                pricing_phases: vec![PricingPhase {
                    formatted_price: "$1.00".to_owned(),
                    price_micros: 1_000_000,
                }],
            }],
        }
    }

    #[tokio::test]
    async fn filters_catalog_by_requested_ids() {
        let backend = MemoryBackend::new();
        backend.add_product(product("premium_monthly"));
        backend.add_product(product("premium_yearly"));

        let details = backend
            .query_product_details(&["premium_yearly".to_owned()], ProductKind::Subscription)
            .await
            .expect("query should work");
        assert_eq!(details.len(), 1);
        assert_eq!(details[0].product_id, "premium_yearly");
        assert_eq!(backend.product_query_count(), 1);
    }

    #[tokio::test]
    async fn connect_failure_is_one_shot() {
        let backend = MemoryBackend::new();
        backend.fail_connect("Service unavailable (code 2)");

        let err = backend.connect().await.expect_err("first connect fails");
        assert_eq!(err.message, "Service unavailable (code 2)");
        backend.connect().await.expect("retry connects");
    }
}
