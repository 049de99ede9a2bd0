//! Connection lifecycle state machine.
//!
//! ```text
//! disconnected ──► connecting ──► connected ◄──► reconnecting
//!                      │              │               │
//!                      └──────────────┴──► disconnected
//!                      └─────────────────► reconnecting
//! any ──► closed   (absorbing)
//! ```

use serde::{Deserialize, Serialize};

/// Connectivity of one live channel. Owned by the transport; consumers only
/// read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        match (self, next) {
            (Closed, _) => false,
            (_, Closed) => true,
            (Disconnected, Connecting) => true,
            (Connecting, Connected | Reconnecting | Disconnected) => true,
            (Connected, Reconnecting | Disconnected) => true,
            (Reconnecting, Connected | Disconnected) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
            ConnectionState::Reconnecting => write!(f, "reconnecting"),
            ConnectionState::Closed => write!(f, "closed"),
        }
    }
}
