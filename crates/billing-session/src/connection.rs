use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use billing_core::{BillingError, BillingEvent, ConnectionState, ConnectionStateMachine};

use crate::{backend::BillingBackend, session::Completion};

/// Owns the lifecycle of the connection to the billing backend.
///
/// This is the single point through which the session checks readiness
/// before issuing any backend request.
pub struct BackendConnection<B> {
    backend: Arc<B>,
    machine: ConnectionStateMachine,
}

impl<B: BillingBackend> BackendConnection<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self {
            backend,
            machine: ConnectionStateMachine::default(),
        }
    }

    /// Non-blocking readiness check; true iff the connection is `Ready`.
    pub fn is_ready(&self) -> bool {
        self.machine.is_ready()
    }

    pub fn state(&self) -> ConnectionState {
        self.machine.state()
    }

    /// Begin an asynchronous connect; idempotent while connecting or ready.
    ///
    /// The connect completion lands on `completion_tx` and must be handed
    /// back to [`BackendConnection::finish`].
    pub fn start(&mut self, completion_tx: mpsc::Sender<Completion>) {
        if !self.machine.begin_connect() {
            debug!(state = ?self.machine.state(), "connect already in flight or ready");
            return;
        }

        let backend = Arc::clone(&self.backend);
        tokio::spawn(async move {
            let result = backend.connect().await;
            let _ = completion_tx.send(Completion::ConnectFinished(result)).await;
        });
    }

    /// Record a connect completion and produce the consumer event for it.
    ///
    /// Connect failures are reported once and never retried automatically;
    /// the consumer decides whether to issue a new `start`.
    pub fn finish(&mut self, result: Result<(), BillingError>) -> Option<BillingEvent> {
        match self.machine.finish_connect(result.is_ok()) {
            Ok(ConnectionState::Ready) => {
                debug!("billing service connected");
                Some(BillingEvent::Ready)
            }
            Ok(state) => {
                let message = result
                    .err()
                    .map(|err| err.message)
                    .unwrap_or_else(|| "connection failed".to_owned());
                warn!(state = ?state, error = %message, "billing service connection failed");
                Some(BillingEvent::ConnectionError { message })
            }
            Err(err) => {
                // A service-lost notice can race a late connect completion.
                warn!(error = %err, "dropping stale connect completion");
                None
            }
        }
    }

    /// Record an asynchronous service-lost notification.
    pub fn service_lost(&mut self) {
        debug!("billing service disconnected");
        self.machine.service_lost();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryBackend;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn start_and_finish_reach_ready() {
        let backend = Arc::new(MemoryBackend::new());
        let mut connection = BackendConnection::new(backend);
        let (tx, mut rx) = mpsc::channel(4);

        assert!(!connection.is_ready());
        connection.start(tx);

        let completion = timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("completion timeout")
            .expect("completion receive");
        let Completion::ConnectFinished(result) = completion else {
            panic!("unexpected completion");
        };

        let event = connection.finish(result).expect("finish yields an event");
        assert_eq!(event, BillingEvent::Ready);
        assert!(connection.is_ready());
    }

    #[tokio::test]
    async fn failed_connect_reports_diagnostic_once() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_connect("Service unavailable (code 2)");
        let mut connection = BackendConnection::new(backend);
        let (tx, mut rx) = mpsc::channel(4);

        connection.start(tx);
        let Completion::ConnectFinished(result) = rx.recv().await.expect("completion") else {
            panic!("unexpected completion");
        };

        let event = connection.finish(result).expect("finish yields an event");
        assert_eq!(
            event,
            BillingEvent::ConnectionError {
                message: "Service unavailable (code 2)".to_owned()
            }
        );
        assert!(!connection.is_ready());
        assert_eq!(connection.state(), ConnectionState::Failed);
    }

    #[tokio::test]
    async fn start_is_a_noop_while_connect_is_in_flight() {
        let backend = Arc::new(MemoryBackend::new());
        let mut connection = BackendConnection::new(backend);
        let (tx, mut rx) = mpsc::channel(4);

        connection.start(tx.clone());
        connection.start(tx.clone());

        let _ = rx.recv().await.expect("first completion");
        let second = timeout(Duration::from_millis(100), rx.recv()).await;
        assert!(second.is_err(), "second start must not spawn a connect");
        drop(tx);
    }

    #[tokio::test]
    async fn service_lost_drops_readiness_without_event() {
        let backend = Arc::new(MemoryBackend::new());
        let mut connection = BackendConnection::new(backend);
        let (tx, mut rx) = mpsc::channel(4);

        connection.start(tx);
        let Completion::ConnectFinished(result) = rx.recv().await.expect("completion") else {
            panic!("unexpected completion");
        };
        connection.finish(result);
        assert!(connection.is_ready());

        connection.service_lost();
        assert!(!connection.is_ready());
        assert_eq!(connection.state(), ConnectionState::Disconnected);
    }
}
