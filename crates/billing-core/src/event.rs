use serde_json::{Value, json};

use crate::types::{BillingEvent, ProductDetails, Purchase};

/// All consumer callback names, in protocol-table order.
pub const CONSUMER_EVENT_NAMES: [&str; 9] = [
    "onBillingReady",
    "onBillingError",
    "onProductsLoaded",
    "onProductsError",
    "onPurchaseSuccess",
    "onPurchaseCanceled",
    "onPurchaseError",
    "onPurchasesLoaded",
    "onPurchasesError",
];

impl BillingEvent {
    /// Consumer callback name for this event.
    pub fn name(&self) -> &'static str {
        match self {
            BillingEvent::Ready => "onBillingReady",
            BillingEvent::ConnectionError { .. } => "onBillingError",
            BillingEvent::ProductsLoaded { .. } => "onProductsLoaded",
            BillingEvent::ProductsError { .. } => "onProductsError",
            BillingEvent::PurchaseSuccess { .. } => "onPurchaseSuccess",
            BillingEvent::PurchaseCanceled => "onPurchaseCanceled",
            BillingEvent::PurchaseError { .. } => "onPurchaseError",
            BillingEvent::PurchasesLoaded { .. } => "onPurchasesLoaded",
            BillingEvent::PurchasesError { .. } => "onPurchasesError",
        }
    }

    /// JSON payload handed to the consumer callback.
    pub fn payload(&self) -> Value {
        match self {
            BillingEvent::Ready | BillingEvent::PurchaseCanceled => json!({}),
            BillingEvent::ConnectionError { message }
            | BillingEvent::ProductsError { message }
            | BillingEvent::PurchaseError { message }
            | BillingEvent::PurchasesError { message } => json!({ "error": message }),
            BillingEvent::ProductsLoaded { products } => json!({
                "products": products.iter().map(product_record).collect::<Vec<_>>(),
            }),
            BillingEvent::PurchaseSuccess { purchase } => purchase_record(purchase),
            BillingEvent::PurchasesLoaded { purchases, kind } => json!({
                "purchases": purchases.iter().map(purchase_record).collect::<Vec<_>>(),
                "type": kind.as_wire_str(),
            }),
        }
    }
}

/// Wire record for one catalog entry.
///
/// The price fields come from the first offer's first pricing phase and are
/// omitted entirely when no offer or phase is present.
pub fn product_record(details: &ProductDetails) -> Value {
    let mut record = json!({
        "productId": details.product_id,
        "title": details.title,
        "description": details.description,
    });

    if let Some(phase) = details
        .offers
        .first()
        .and_then(|offer| offer.pricing_phases.first())
    {
        record["price"] = Value::from(phase.formatted_price.clone());
        record["priceAmountMicros"] = Value::from(phase.price_micros);
    }

    record
}

/// Wire record for one purchase.
///
/// Identical for query responses and unsolicited updates; only the
/// batch-level wrapper differs between the two paths.
pub fn purchase_record(purchase: &Purchase) -> Value {
    json!({
        "orderId": purchase.order_id,
        "purchaseToken": purchase.purchase_token,
        "productIds": purchase.product_ids,
        "purchaseTime": purchase.purchase_time_millis,
        "isAcknowledged": purchase.acknowledged,
    })
}
