use serde::Deserialize;
use url::Url;

use billing_core::BillingError;

use crate::router::BILLING_HOST;

/// Inbound action name for a catalog query.
pub const ACTION_QUERY_PRODUCTS: &str = "queryProducts";
/// Inbound action name for launching a purchase flow.
pub const ACTION_LAUNCH_PURCHASE_FLOW: &str = "launchPurchaseFlow";
/// Inbound action name for a purchases query.
pub const ACTION_QUERY_PURCHASES: &str = "queryPurchases";

/// One decoded out-of-process request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundRequest {
    /// Requested action name.
    pub action: String,
    /// JSON request body; `{}` when the address carried no data.
    pub data: String,
}

/// Recognize a `scheme://billing?action=<name>&data=<json>` address.
///
/// Returns `None` for URLs outside the scheme/host or without an action;
/// a missing `data` parameter is treated as an empty JSON object.
pub fn parse_billing_url(url: &Url, scheme: &str) -> Option<InboundRequest> {
    if url.scheme() != scheme || url.host_str() != Some(BILLING_HOST) {
        return None;
    }

    let mut action = None;
    let mut data = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "action" => action = Some(value.into_owned()),
            "data" => data = Some(value.into_owned()),
            _ => {}
        }
    }

    Some(InboundRequest {
        action: action?,
        data: data.unwrap_or_else(|| "{}".to_owned()),
    })
}

#[derive(Debug, Deserialize)]
struct LaunchRequest {
    #[serde(rename = "productId")]
    product_id: String,
}

/// Extract the product id from a `launchPurchaseFlow` request body.
///
/// Malformed bodies are an error for the caller to log and drop; they are
/// never surfaced to the consumer as a billing error.
pub fn parse_launch_request(data: &str) -> Result<String, BillingError> {
    serde_json::from_str::<LaunchRequest>(data)
        .map(|request| request.product_id)
        .map_err(|err| BillingError::malformed_payload(err.to_string()))
}
