use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use billing_core::{
    BillingError, BillingEvent, ProductDetails, ProductKind, Purchase, error::MSG_NOT_CONNECTED,
};

use crate::{
    acknowledger::PurchaseAcknowledger,
    backend::{BackendNotice, BillingBackend, UpdateStatus},
    connection::BackendConnection,
    inbound::{
        ACTION_LAUNCH_PURCHASE_FLOW, ACTION_QUERY_PRODUCTS, ACTION_QUERY_PURCHASES,
        parse_launch_request,
    },
    router::CallbackRouter,
};

/// Session construction parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// URL scheme of the out-of-process address space.
    pub scheme: String,
    /// Monthly subscription product id.
    pub monthly_product_id: String,
    /// Yearly subscription product id.
    pub yearly_product_id: String,
    /// Consumer command channel capacity.
    pub command_buffer: usize,
    /// Backend notice channel capacity.
    pub update_buffer: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            scheme: "app".to_owned(),
            monthly_product_id: "premium_monthly".to_owned(),
            yearly_product_id: "premium_yearly".to_owned(),
            command_buffer: 32,
            update_buffer: 32,
        }
    }
}

impl SessionConfig {
    /// The fixed two-product subscription catalog.
    pub fn catalog(&self) -> [String; 2] {
        [
            self.monthly_product_id.clone(),
            self.yearly_product_id.clone(),
        ]
    }

    /// Whether a product id belongs to the configured catalog.
    pub fn is_known_product(&self, product_id: &str) -> bool {
        product_id == self.monthly_product_id || product_id == self.yearly_product_id
    }
}

/// Consumer-facing session operation.
///
/// Every command is non-blocking to the caller; results arrive through the
/// configured [`CallbackRouter`]. No command is cancellable once issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingCommand {
    /// Begin the backend connection; idempotent while connecting or ready.
    Start,
    /// Query the fixed subscription catalog.
    QueryProducts,
    /// Launch the purchase flow for one catalog product.
    LaunchPurchaseFlow {
        /// Catalog product id.
        product_id: String,
    },
    /// Query all current subscription purchases.
    QueryPurchases,
    /// An inbound out-of-process request.
    Inbound {
        /// Requested action name.
        action: String,
        /// JSON request body.
        data: String,
    },
}

/// Backend request completion flowing back into the runtime task.
///
/// Each spawned backend request resolves into exactly one completion, so
/// event delivery stays on the runtime task in completion-arrival order.
pub(crate) enum Completion {
    ConnectFinished(Result<(), BillingError>),
    ProductsFinished(Result<Vec<ProductDetails>, BillingError>),
    PurchaseFlowRejected(BillingError),
    PurchasesFinished(Result<Vec<Purchase>, BillingError>),
}

/// Error returned when the session runtime has shut down.
#[derive(Debug, Error)]
#[error("billing session channel is closed")]
pub struct SessionChannelError;

/// Cloneable handle to a running billing session.
#[derive(Clone)]
pub struct BillingSessionHandle {
    command_tx: mpsc::Sender<BillingCommand>,
    update_tx: mpsc::Sender<BackendNotice>,
}

impl BillingSessionHandle {
    /// Send one consumer command to the session.
    pub async fn send(&self, command: BillingCommand) -> Result<(), SessionChannelError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| SessionChannelError)
    }

    /// Feed a backend-initiated notice into the session.
    pub async fn notify(&self, notice: BackendNotice) -> Result<(), SessionChannelError> {
        self.update_tx
            .send(notice)
            .await
            .map_err(|_| SessionChannelError)
    }

    /// Dispatch one inbound out-of-process request.
    pub async fn handle_inbound(
        &self,
        action: impl Into<String>,
        data: impl Into<String>,
    ) -> Result<(), SessionChannelError> {
        self.send(BillingCommand::Inbound {
            action: action.into(),
            data: data.into(),
        })
        .await
    }
}

/// Spawn a session runtime and return its handle.
///
/// The runtime stops when every handle clone has been dropped.
pub fn spawn_session<B: BillingBackend>(
    backend: Arc<B>,
    router: CallbackRouter,
    config: SessionConfig,
) -> BillingSessionHandle {
    let (command_tx, command_rx) = mpsc::channel(config.command_buffer.max(1));
    let (update_tx, update_rx) = mpsc::channel(config.update_buffer.max(1));

    let session = BillingSession::new(backend, router, config, command_rx, update_rx);
    tokio::spawn(session.run());

    BillingSessionHandle {
        command_tx,
        update_tx,
    }
}

/// The billing session runtime.
///
/// A single task per session: commands, backend notices, and request
/// completions are multiplexed onto this task, which is the only place
/// events are delivered. Backend requests themselves run as spawned tasks,
/// so concurrently outstanding operations may complete in either order.
struct BillingSession<B> {
    backend: Arc<B>,
    connection: BackendConnection<B>,
    acknowledger: PurchaseAcknowledger<B>,
    router: CallbackRouter,
    config: SessionConfig,
    command_rx: mpsc::Receiver<BillingCommand>,
    update_rx: mpsc::Receiver<BackendNotice>,
    completion_tx: mpsc::Sender<Completion>,
    completion_rx: mpsc::Receiver<Completion>,
}

impl<B: BillingBackend> BillingSession<B> {
    fn new(
        backend: Arc<B>,
        router: CallbackRouter,
        config: SessionConfig,
        command_rx: mpsc::Receiver<BillingCommand>,
        update_rx: mpsc::Receiver<BackendNotice>,
    ) -> Self {
        let (completion_tx, completion_rx) = mpsc::channel(64);
        Self {
            connection: BackendConnection::new(Arc::clone(&backend)),
            acknowledger: PurchaseAcknowledger::new(Arc::clone(&backend)),
            backend,
            router,
            config,
            command_rx,
            update_rx,
            completion_tx,
            completion_rx,
        }
    }

    async fn run(mut self) {
        debug!("billing session started");
        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                notice = self.update_rx.recv() => match notice {
                    Some(notice) => self.handle_notice(notice),
                    None => break,
                },
                completion = self.completion_rx.recv() => {
                    // The session holds its own completion sender, so this
                    // arm never observes a closed channel.
                    if let Some(completion) = completion {
                        self.handle_completion(completion);
                    }
                }
            }
        }
        debug!("billing session stopped");
    }

    fn handle_command(&mut self, command: BillingCommand) {
        debug!(command = command_kind(&command), "handling billing command");
        match command {
            BillingCommand::Start => self.connection.start(self.completion_tx.clone()),
            BillingCommand::QueryProducts => self.query_products(),
            BillingCommand::LaunchPurchaseFlow { product_id } => {
                self.launch_purchase_flow(product_id)
            }
            BillingCommand::QueryPurchases => self.query_purchases(),
            BillingCommand::Inbound { action, data } => self.handle_inbound(&action, &data),
        }
    }

    fn query_products(&mut self) {
        if !self.connection.is_ready() {
            self.router.deliver(&BillingEvent::ProductsError {
                message: MSG_NOT_CONNECTED.to_owned(),
            });
            return;
        }

        let backend = Arc::clone(&self.backend);
        let catalog = self.config.catalog();
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = backend
                .query_product_details(&catalog, ProductKind::Subscription)
                .await;
            let _ = completion_tx
                .send(Completion::ProductsFinished(result))
                .await;
        });
    }

    fn launch_purchase_flow(&mut self, product_id: String) {
        if !self.connection.is_ready() {
            self.router.deliver(&BillingEvent::PurchaseError {
                message: MSG_NOT_CONNECTED.to_owned(),
            });
            return;
        }
        if !self.config.is_known_product(&product_id) {
            self.router.deliver(&BillingEvent::PurchaseError {
                message: BillingError::invalid_product_id().message,
            });
            return;
        }

        let backend = Arc::clone(&self.backend);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            match run_purchase_flow(backend, &product_id).await {
                Ok(()) => debug!(product_id = %product_id, "purchase flow launched"),
                Err(err) => {
                    let _ = completion_tx
                        .send(Completion::PurchaseFlowRejected(err))
                        .await;
                }
            }
        });
    }

    fn query_purchases(&mut self) {
        if !self.connection.is_ready() {
            self.router.deliver(&BillingEvent::PurchasesError {
                message: MSG_NOT_CONNECTED.to_owned(),
            });
            return;
        }

        let backend = Arc::clone(&self.backend);
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = backend.query_purchases(ProductKind::Subscription).await;
            let _ = completion_tx
                .send(Completion::PurchasesFinished(result))
                .await;
        });
    }

    fn handle_inbound(&mut self, action: &str, data: &str) {
        match action {
            ACTION_QUERY_PRODUCTS => self.query_products(),
            ACTION_QUERY_PURCHASES => self.query_purchases(),
            ACTION_LAUNCH_PURCHASE_FLOW => match parse_launch_request(data) {
                Ok(product_id) => self.launch_purchase_flow(product_id),
                // Untrusted external trigger surface: log and drop, never a
                // consumer-visible billing error.
                Err(err) => warn!(error = %err, "dropping malformed purchase request"),
            },
            other => trace!(action = other, "ignoring unrecognized inbound action"),
        }
    }

    fn handle_notice(&mut self, notice: BackendNotice) {
        match notice {
            BackendNotice::ServiceLost => self.connection.service_lost(),
            BackendNotice::PurchasesUpdated { status, purchases } => {
                self.handle_purchases_updated(status, purchases)
            }
        }
    }

    /// Unsolicited-update intake: exactly one outcome kind per batch, with
    /// one `PurchaseSuccess` per purchase when the batch is OK.
    fn handle_purchases_updated(&mut self, status: UpdateStatus, purchases: Vec<Purchase>) {
        match status {
            UpdateStatus::Ok => {
                for purchase in purchases {
                    self.router.deliver(&BillingEvent::PurchaseSuccess {
                        purchase: purchase.clone(),
                    });
                    self.acknowledger.process(&purchase);
                }
            }
            UpdateStatus::UserCanceled => {
                self.router.deliver(&BillingEvent::PurchaseCanceled);
            }
            UpdateStatus::Failed { message } => {
                self.router.deliver(&BillingEvent::PurchaseError { message });
            }
        }
    }

    fn handle_completion(&mut self, completion: Completion) {
        match completion {
            Completion::ConnectFinished(result) => {
                if let Some(event) = self.connection.finish(result) {
                    self.router.deliver(&event);
                }
            }
            Completion::ProductsFinished(result) => {
                let event = match result {
                    Ok(products) => BillingEvent::ProductsLoaded { products },
                    Err(err) => BillingEvent::ProductsError {
                        message: err.message,
                    },
                };
                self.router.deliver(&event);
            }
            Completion::PurchaseFlowRejected(err) => {
                self.router.deliver(&BillingEvent::PurchaseError {
                    message: err.message,
                });
            }
            Completion::PurchasesFinished(result) => match result {
                Ok(purchases) => {
                    // Records reflect acknowledgment state as observed;
                    // acknowledgment runs after delivery and never mutates
                    // the delivered batch.
                    self.router.deliver(&BillingEvent::PurchasesLoaded {
                        purchases: purchases.clone(),
                        kind: ProductKind::Subscription,
                    });
                    for purchase in &purchases {
                        self.acknowledger.process(purchase);
                    }
                }
                Err(err) => {
                    self.router.deliver(&BillingEvent::PurchasesError {
                        message: err.message,
                    });
                }
            },
        }
    }
}

/// Fresh single-product lookup followed by the backend UI hand-off.
///
/// A successful launch produces no event; the outcome arrives later as an
/// unsolicited update.
async fn run_purchase_flow<B: BillingBackend>(
    backend: Arc<B>,
    product_id: &str,
) -> Result<(), BillingError> {
    let lookup = [product_id.to_owned()];
    let details = backend
        .query_product_details(&lookup, ProductKind::Subscription)
        .await
        .map_err(|err| {
            debug!(error = %err, "product lookup failed before purchase");
            BillingError::product_not_found()
        })?;

    let Some(details) = details.into_iter().next() else {
        return Err(BillingError::product_not_found());
    };
    let Some(offer) = details.offers.first() else {
        return Err(BillingError::no_offer_available());
    };

    backend
        .launch_billing_flow(product_id, &offer.offer_token)
        .await
}

fn command_kind(command: &BillingCommand) -> &'static str {
    match command {
        BillingCommand::Start => "Start",
        BillingCommand::QueryProducts => "QueryProducts",
        BillingCommand::LaunchPurchaseFlow { .. } => "LaunchPurchaseFlow",
        BillingCommand::QueryPurchases => "QueryPurchases",
        BillingCommand::Inbound { .. } => "Inbound",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_two_known_subscription_products() {
        let config = SessionConfig::default();
        let [monthly, yearly] = config.catalog();
        assert!(config.is_known_product(&monthly));
        assert!(config.is_known_product(&yearly));
        assert!(!config.is_known_product("premium_lifetime"));
    }

    #[test]
    fn command_kinds_are_stable_for_logging() {
        assert_eq!(command_kind(&BillingCommand::Start), "Start");
        assert_eq!(
            command_kind(&BillingCommand::LaunchPurchaseFlow {
                product_id: "premium_monthly".to_owned()
            }),
            "LaunchPurchaseFlow"
        );
    }
}
