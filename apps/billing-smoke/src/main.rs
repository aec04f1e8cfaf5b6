//! Drives a billing session against the in-memory backend and prints every
//! delivered consumer event.

mod logging;

use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::info;

use billing_core::{
    CONSUMER_EVENT_NAMES, PricingPhase, ProductDetails, Purchase, PurchaseState, SubscriptionOffer,
};
use billing_session::{
    BackendNotice, BillingCommand, CallbackRouter, InProcessHandlers, MemoryBackend,
    SessionChannelError, SessionConfig, UpdateStatus, parse_billing_url, spawn_session,
};

fn demo_backend() -> MemoryBackend {
    let backend = MemoryBackend::new();
    backend.add_product(ProductDetails {
        product_id: "premium_monthly".to_owned(),
        title: "Premium (monthly)".to_owned(),
        description: "Monthly premium subscription".to_owned(),
        offers: vec![SubscriptionOffer {
            offer_token: "offer-monthly".to_owned(),
            pricing_phases: vec![PricingPhase {
                formatted_price: "$4.99".to_owned(),
                price_micros: 4_990_000,
            }],
        }],
    });
    backend.add_product(ProductDetails {
        product_id: "premium_yearly".to_owned(),
        title: "Premium (yearly)".to_owned(),
        description: "Yearly premium subscription".to_owned(),
        offers: vec![SubscriptionOffer {
            offer_token: "offer-yearly".to_owned(),
            pricing_phases: vec![PricingPhase {
                formatted_price: "$39.99".to_owned(),
                price_micros: 39_990_000,
            }],
        }],
    });
    backend.add_purchase(Purchase {
        order_id: "order-1".to_owned(),
        purchase_token: "token-1".to_owned(),
        product_ids: vec!["premium_monthly".to_owned()],
        purchase_time_millis: 1_700_000_000_000,
        state: PurchaseState::Purchased,
        acknowledged: false,
    });
    backend
}

fn printing_router() -> CallbackRouter {
    let mut handlers = InProcessHandlers::new();
    for name in CONSUMER_EVENT_NAMES {
        handlers = handlers.on(name, move |payload| {
            println!("{name}: {payload}");
        });
    }
    CallbackRouter::in_process(handlers)
}

async fn run() -> Result<(), SessionChannelError> {
    let backend = Arc::new(demo_backend());
    let config = SessionConfig::default();
    let scheme = config.scheme.clone();
    let handle = spawn_session(Arc::clone(&backend), printing_router(), config);

    handle.send(BillingCommand::Start).await?;
    handle.send(BillingCommand::QueryProducts).await?;
    handle.send(BillingCommand::QueryPurchases).await?;

    // Out-of-process mirror of the same operations.
    let url = url_for_launch(&scheme);
    if let Some(request) = parse_billing_url(&url, &scheme) {
        handle.handle_inbound(request.action, request.data).await?;
    }

    // A purchase completing out-of-band.
    handle
        .notify(BackendNotice::PurchasesUpdated {
            status: UpdateStatus::Ok,
            purchases: vec![Purchase {
                order_id: "order-2".to_owned(),
                purchase_token: "token-2".to_owned(),
                product_ids: vec!["premium_yearly".to_owned()],
                purchase_time_millis: 1_700_000_100_000,
                state: PurchaseState::Purchased,
                acknowledged: false,
            }],
        })
        .await?;

    sleep(Duration::from_millis(200)).await;
    info!(
        acknowledged = ?backend.acknowledged_tokens(),
        launched = ?backend.launched_flows(),
        "smoke run finished"
    );
    Ok(())
}

fn url_for_launch(scheme: &str) -> url::Url {
    let mut url = url::Url::parse(&format!("{scheme}://billing")).expect("static scheme parses");
    url.query_pairs_mut()
        .append_pair("action", "launchPurchaseFlow")
        .append_pair("data", r#"{"productId":"premium_monthly"}"#);
    url
}

#[tokio::main]
async fn main() {
    logging::init();

    if let Err(err) = run().await {
        eprintln!("smoke run failed: {err}");
        std::process::exit(1);
    }
}
