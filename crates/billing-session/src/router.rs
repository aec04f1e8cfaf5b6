use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use tracing::{debug, trace, warn};
use url::Url;

use billing_core::{BillingError, BillingErrorCategory, BillingEvent};

/// Host part of every out-of-process billing address.
pub const BILLING_HOST: &str = "billing";

/// Consumer callback invoked with a delivered event payload.
pub type EventHandler = Arc<dyn Fn(Value) + Send + Sync + 'static>;

/// External dispatch mechanism for out-of-process delivery.
///
/// The closure owns any thread marshaling the host boundary requires;
/// delivery is fire-and-forget.
pub type ExternalDispatch = Arc<dyn Fn(Url) + Send + Sync + 'static>;

/// Named handler table for an in-process consumer.
#[derive(Default)]
pub struct InProcessHandlers {
    handlers: HashMap<String, EventHandler>,
}

impl InProcessHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one consumer callback name.
    pub fn on(mut self, name: impl Into<String>, handler: impl Fn(Value) + Send + Sync + 'static) -> Self {
        self.handlers.insert(name.into(), Arc::new(handler));
        self
    }

    fn get(&self, name: &str) -> Option<&EventHandler> {
        self.handlers.get(name)
    }
}

/// Delivers billing events to exactly one consumer.
///
/// The channel is chosen at construction; callers never know which mode is
/// active. Delivery happens on whatever task calls `deliver` — the session
/// runtime is the single outgoing serialization point.
pub enum CallbackRouter {
    /// Consumer reachable by direct invocation.
    InProcess(InProcessHandlers),
    /// Consumer reachable only via an addressed external message.
    OutOfProcess {
        /// URL scheme of the address, for example `app`.
        scheme: String,
        /// Host dispatch mechanism receiving the built address.
        dispatch: ExternalDispatch,
    },
}

impl CallbackRouter {
    pub fn in_process(handlers: InProcessHandlers) -> Self {
        CallbackRouter::InProcess(handlers)
    }

    pub fn out_of_process(scheme: impl Into<String>, dispatch: ExternalDispatch) -> Self {
        CallbackRouter::OutOfProcess {
            scheme: scheme.into(),
            dispatch,
        }
    }

    /// Deliver one event to the configured consumer.
    ///
    /// A missing in-process handler is a no-op, not an error; out-of-process
    /// delivery expects no acknowledgment of receipt.
    pub fn deliver(&self, event: &BillingEvent) {
        let name = event.name();
        let payload = event.payload();
        trace!(event = name, "delivering billing event");

        match self {
            CallbackRouter::InProcess(handlers) => match handlers.get(name) {
                Some(handler) => handler(payload),
                None => debug!(event = name, "no consumer handler registered; dropping"),
            },
            CallbackRouter::OutOfProcess { scheme, dispatch } => {
                match billing_url(scheme, name, &payload) {
                    Ok(url) => dispatch(url),
                    Err(err) => warn!(event = name, error = %err, "failed to build billing address"),
                }
            }
        }
    }
}

/// Build the out-of-process address for one event or request.
///
/// Shape: `scheme://billing?action=<name>&data=<percent-encoded JSON>`.
pub fn billing_url(scheme: &str, action: &str, payload: &Value) -> Result<Url, BillingError> {
    let mut url = Url::parse(&format!("{scheme}://{BILLING_HOST}")).map_err(|err| {
        BillingError::new(
            BillingErrorCategory::Internal,
            "invalid_scheme",
            format!("cannot build billing address for scheme '{scheme}': {err}"),
        )
    })?;

    url.query_pairs_mut()
        .append_pair("action", action)
        .append_pair("data", &payload.to_string());
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[test]
    fn in_process_invokes_registered_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_for_handler = Arc::clone(&seen);
        let handlers = InProcessHandlers::new().on("onBillingReady", move |payload| {
            seen_for_handler
                .lock()
                .expect("handler log lock poisoned")
                .push(payload);
        });

        let router = CallbackRouter::in_process(handlers);
        router.deliver(&BillingEvent::Ready);

        let seen = seen.lock().expect("handler log lock poisoned");
        assert_eq!(seen.as_slice(), [json!({})]);
    }

    #[test]
    fn in_process_tolerates_missing_handler() {
        let router = CallbackRouter::in_process(InProcessHandlers::new());
        // Must not panic or error.
        router.deliver(&BillingEvent::PurchaseCanceled);
    }

    #[test]
    fn out_of_process_builds_addressed_message() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_for_dispatch = Arc::clone(&seen);
        let dispatch: ExternalDispatch = Arc::new(move |url| {
            seen_for_dispatch
                .lock()
                .expect("dispatch log lock poisoned")
                .push(url);
        });

        let router = CallbackRouter::out_of_process("app", dispatch);
        router.deliver(&BillingEvent::ProductsError {
            message: "Billing service not connected".to_owned(),
        });

        let seen = seen.lock().expect("dispatch log lock poisoned");
        assert_eq!(seen.len(), 1);
        let url = &seen[0];
        assert_eq!(url.scheme(), "app");
        assert_eq!(url.host_str(), Some(BILLING_HOST));

        let pairs: Vec<_> = url.query_pairs().collect();
        assert_eq!(pairs[0].0, "action");
        assert_eq!(pairs[0].1, "onProductsError");
        assert_eq!(pairs[1].0, "data");
        assert_eq!(
            pairs[1].1,
            json!({ "error": "Billing service not connected" }).to_string()
        );
    }

    #[test]
    fn billing_url_percent_encodes_payload() {
        let url = billing_url("app", "onPurchaseError", &json!({ "error": "a b&c" }))
            .expect("url builds");
        assert!(url.as_str().starts_with("app://billing?action=onPurchaseError&data="));
        assert!(!url.query().expect("query present").contains(' '));
    }
}
