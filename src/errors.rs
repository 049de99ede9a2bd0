//! Typed error hierarchy for the live session client.
//!
//! Three enums cover the channel boundary:
//! - `SessionIdError` — invalid session identifiers
//! - `OpenError` — precondition failures when opening a channel
//! - `TransportError` — connection failures, delivered as data to subscribers
//!
//! Application-level failures reported by the backend are not errors here;
//! they arrive as `ErrorEvent` / `CompletionEvent { success: false }`.

use std::time::Duration;

use thiserror::Error;

/// Rejected session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIdError {
    #[error("Session id must not be empty")]
    Empty,
}

/// Errors returned synchronously by `LiveChannel::open`.
#[derive(Debug, Error)]
pub enum OpenError {
    #[error("Cannot open a channel without a session id")]
    EmptySessionId,

    #[error("Invalid endpoint for session {session}: {message}")]
    InvalidEndpoint { session: String, message: String },
}

impl From<SessionIdError> for OpenError {
    fn from(err: SessionIdError) -> Self {
        match err {
            SessionIdError::Empty => OpenError::EmptySessionId,
        }
    }
}

/// Transport failures. These never mutate the session view model and are
/// never returned across the channel API; they reach consumers through
/// `SessionSubscriber::on_transport_error`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Failed to connect to {endpoint}: {message}")]
    Connect { endpoint: String, message: String },

    #[error("No connection to {endpoint} within {timeout:?}")]
    ConnectTimeout { endpoint: String, timeout: Duration },

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("No traffic from backend for {0:?}")]
    IdleTimeout(Duration),

    #[error("Gave up after {attempts} failed connection attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Invalid endpoint {endpoint}: {message}")]
    InvalidEndpoint { endpoint: String, message: String },
}

impl TransportError {
    /// Whether the driver has stopped trying after this error.
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            TransportError::RetriesExhausted { .. } | TransportError::InvalidEndpoint { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_error_converts_to_open_error() {
        let err: OpenError = SessionIdError::Empty.into();
        assert!(matches!(err, OpenError::EmptySessionId));
    }

    #[test]
    fn connect_timeout_carries_endpoint_and_bound() {
        let err = TransportError::ConnectTimeout {
            endpoint: "ws://localhost:8000/ws/proj-42".to_string(),
            timeout: Duration::from_secs(10),
        };
        match &err {
            TransportError::ConnectTimeout { endpoint, timeout } => {
                assert!(endpoint.ends_with("proj-42"));
                assert_eq!(*timeout, Duration::from_secs(10));
            }
            _ => panic!("Expected ConnectTimeout"),
        }
        assert!(err.to_string().contains("ws://localhost:8000"));
    }

    #[test]
    fn retries_exhausted_is_final_but_connect_is_not() {
        assert!(TransportError::RetriesExhausted { attempts: 5 }.is_final());
        assert!(
            TransportError::InvalidEndpoint {
                endpoint: "nope".into(),
                message: "bad scheme".into()
            }
            .is_final()
        );
        assert!(
            !TransportError::Connect {
                endpoint: "ws://x".into(),
                message: "refused".into()
            }
            .is_final()
        );
        assert!(!TransportError::ConnectionLost("reset".into()).is_final());
    }

    #[test]
    fn retries_exhausted_mentions_attempts() {
        let err = TransportError::RetriesExhausted { attempts: 7 };
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&SessionIdError::Empty);
        assert_std_error(&OpenError::EmptySessionId);
        assert_std_error(&TransportError::IdleTimeout(Duration::from_secs(1)));
    }
}
