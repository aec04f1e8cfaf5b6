use crate::{error::BillingError, types::ConnectionState};

/// Tracks the backend connection lifecycle.
///
/// The machine is written only by connect/disconnect completions and read
/// (never written) before each backend request.
#[derive(Debug, Clone)]
pub struct ConnectionStateMachine {
    state: ConnectionState,
}

impl Default for ConnectionStateMachine {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
        }
    }
}

impl ConnectionStateMachine {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// Begin an asynchronous connect.
    ///
    /// Returns `true` when a connect should actually be issued. While a
    /// connect is in flight or the connection is ready this is a no-op and
    /// returns `false`; a failed or disconnected connection may retry.
    pub fn begin_connect(&mut self) -> bool {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Ready => false,
            ConnectionState::Disconnected | ConnectionState::Failed => {
                self.state = ConnectionState::Connecting;
                true
            }
        }
    }

    /// Record the completion of an in-flight connect.
    ///
    /// Connect failures are reported once and never retried automatically;
    /// the caller decides whether to begin a new connect.
    pub fn finish_connect(&mut self, success: bool) -> Result<ConnectionState, BillingError> {
        if self.state != ConnectionState::Connecting {
            return Err(BillingError::invalid_transition(self.state, "finish_connect"));
        }

        self.state = if success {
            ConnectionState::Ready
        } else {
            ConnectionState::Failed
        };
        Ok(self.state)
    }

    /// Record an asynchronous service-lost notification from the backend.
    ///
    /// Does not emit a consumer event; callers discover the loss via
    /// `is_ready` on their next operation.
    pub fn service_lost(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_happy_path_transitions() {
        let mut machine = ConnectionStateMachine::default();
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(!machine.is_ready());

        assert!(machine.begin_connect());
        assert_eq!(machine.state(), ConnectionState::Connecting);

        let state = machine.finish_connect(true).expect("finish should apply");
        assert_eq!(state, ConnectionState::Ready);
        assert!(machine.is_ready());

        machine.service_lost();
        assert_eq!(machine.state(), ConnectionState::Disconnected);
        assert!(!machine.is_ready());
    }

    #[test]
    fn begin_connect_is_idempotent_while_connecting_or_ready() {
        let mut machine = ConnectionStateMachine::default();
        assert!(machine.begin_connect());
        assert!(!machine.begin_connect());
        assert_eq!(machine.state(), ConnectionState::Connecting);

        machine.finish_connect(true).expect("finish should apply");
        assert!(!machine.begin_connect());
        assert_eq!(machine.state(), ConnectionState::Ready);
    }

    #[test]
    fn failed_connect_allows_caller_driven_retry() {
        let mut machine = ConnectionStateMachine::default();
        assert!(machine.begin_connect());
        let state = machine.finish_connect(false).expect("finish should apply");
        assert_eq!(state, ConnectionState::Failed);

        assert!(machine.begin_connect());
        assert_eq!(machine.state(), ConnectionState::Connecting);
    }

    #[test]
    fn rejects_finish_without_in_flight_connect() {
        let mut machine = ConnectionStateMachine::default();
        let err = machine
            .finish_connect(true)
            .expect_err("finish without connect must fail");
        assert_eq!(err.code, "invalid_state_transition");
        assert_eq!(machine.state(), ConnectionState::Disconnected);
    }
}
