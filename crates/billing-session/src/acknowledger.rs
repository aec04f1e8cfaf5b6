use std::{
    collections::HashSet,
    sync::{Arc, Mutex},
};

use tracing::{debug, warn};

use billing_core::{Purchase, PurchaseState};

use crate::backend::BillingBackend;

/// Ensures every observed `Purchased` record is acknowledged at most once
/// per token, no matter which code path discovered it.
///
/// Acknowledgment is housekeeping: success and failure are logged only and
/// never affect the consumer event already delivered for the purchase.
pub struct PurchaseAcknowledger<B> {
    backend: Arc<B>,
    // Tokens with an acknowledge outstanding or already succeeded this
    // process lifetime. A failed acknowledge releases its token so a later
    // observation may try again.
    submitted: Arc<Mutex<HashSet<String>>>,
}

impl<B> Clone for PurchaseAcknowledger<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            submitted: Arc::clone(&self.submitted),
        }
    }
}

impl<B: BillingBackend> PurchaseAcknowledger<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            submitted: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Submit one observed purchase for acknowledgment.
    ///
    /// No-op unless the purchase is `Purchased` and not yet acknowledged.
    /// Safe to invoke concurrently for the same token; the backend call is
    /// issued once while it is outstanding.
    pub fn process(&self, purchase: &Purchase) {
        if purchase.state != PurchaseState::Purchased {
            return;
        }
        if purchase.acknowledged {
            return;
        }

        let token = purchase.purchase_token.clone();
        {
            let mut submitted = self
                .submitted
                .lock()
                .expect("acknowledge ledger lock poisoned");
            if !submitted.insert(token.clone()) {
                debug!(token = %token, "acknowledge already submitted for token");
                return;
            }
        }

        let backend = Arc::clone(&self.backend);
        let submitted = Arc::clone(&self.submitted);
        let order_id = purchase.order_id.clone();
        tokio::spawn(async move {
            match backend.acknowledge(&token).await {
                Ok(()) => {
                    debug!(order_id = %order_id, "purchase acknowledged");
                }
                Err(err) => {
                    warn!(order_id = %order_id, error = %err, "failed to acknowledge purchase");
                    submitted
                        .lock()
                        .expect("acknowledge ledger lock poisoned")
                        .remove(&token);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use std::time::Duration;
    use tokio::time::sleep;

    fn purchased(token: &str) -> Purchase {
        Purchase {
            order_id: format!("order-{token}"),
            purchase_token: token.to_owned(),
            product_ids: vec!["premium_monthly".to_owned()],
            purchase_time_millis: 1_700_000_000_000,
            state: PurchaseState::Purchased,
            acknowledged: false,
        }
    }

    async fn settle() {
        // Let spawned acknowledge tasks run on the test runtime.
        sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn acknowledges_unacknowledged_purchase_once() {
        let backend = Arc::new(MemoryBackend::new());
        let acknowledger = PurchaseAcknowledger::new(Arc::clone(&backend));

        let purchase = purchased("token-1");
        acknowledger.process(&purchase);
        acknowledger.process(&purchase);
        settle().await;

        assert_eq!(backend.acknowledged_tokens(), ["token-1"]);
    }

    #[tokio::test]
    async fn skips_pending_and_already_acknowledged_records() {
        let backend = Arc::new(MemoryBackend::new());
        let acknowledger = PurchaseAcknowledger::new(Arc::clone(&backend));

        let mut pending = purchased("token-pending");
        pending.state = PurchaseState::Pending;
        acknowledger.process(&pending);

        let mut acked = purchased("token-acked");
        acked.acknowledged = true;
        acknowledger.process(&acked);

        settle().await;
        assert!(backend.acknowledged_tokens().is_empty());
    }

    #[tokio::test]
    async fn failed_acknowledge_releases_token_for_later_observation() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_acknowledge("Service call failed");
        let acknowledger = PurchaseAcknowledger::new(Arc::clone(&backend));

        let purchase = purchased("token-2");
        acknowledger.process(&purchase);
        settle().await;
        assert_eq!(backend.acknowledged_tokens(), ["token-2"]);

        // A later observation may retry after the failure.
        acknowledger.process(&purchase);
        settle().await;
        assert_eq!(backend.acknowledged_tokens(), ["token-2", "token-2"]);
    }

    #[tokio::test]
    async fn deduplicates_across_observation_paths() {
        let backend = Arc::new(MemoryBackend::new());
        let acknowledger = PurchaseAcknowledger::new(Arc::clone(&backend));
        let cloned = acknowledger.clone();

        // Same token observed via a query response and an unsolicited update.
        let purchase = purchased("token-3");
        acknowledger.process(&purchase);
        cloned.process(&purchase);
        settle().await;

        assert_eq!(backend.acknowledged_tokens(), ["token-3"]);
    }
}
