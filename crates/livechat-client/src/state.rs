//! Connection state machine.
//!
//! ```text
//! Idle ──Dial──▶ Connecting ──Opened──▶ Verifying ──Verified──▶ Connected
//!                    │                      │                      │
//!                    └────────Lost──────────┴─────────Lost─────────┘
//!                                           ▼
//!          Connecting ◀──Dial── Reconnecting ──Exhausted──▶ Failed
//!
//! any live state ──CloseRequested──▶ Closed
//! ```

use std::fmt;

use crate::config::HostAddr;

/// Where the connection manager currently is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// Nothing attempted yet.
    #[default]
    Idle,
    /// Opening a socket to the host.
    Connecting(HostAddr),
    /// Socket open, verify request sent.
    Verifying(HostAddr),
    /// Verified and receiving.
    Connected(HostAddr),
    /// Previous host lost, about to try the next one.
    Reconnecting,
    /// Every host failed.
    Failed,
    /// Closed on request.
    Closed,
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Start an attempt against a host.
    Dial(HostAddr),
    /// Socket opened.
    Opened,
    /// Verify reply with code 0.
    Verified,
    /// Connect failure, verify failure or abnormal close.
    Lost,
    /// Graceful close requested.
    CloseRequested,
    /// No hosts left.
    Exhausted,
}

impl ConnectionState {
    /// Returns the next state, or `None` if `transition` is not allowed here.
    pub fn apply(&self, transition: Transition) -> Option<Self> {
        use ConnectionState::*;

        match (self, transition) {
            (Failed | Closed, _) => None,
            (_, Transition::CloseRequested) => Some(Closed),
            (Idle | Reconnecting, Transition::Dial(host)) => Some(Connecting(host)),
            (Connecting(host), Transition::Opened) => Some(Verifying(host.clone())),
            (Verifying(host), Transition::Verified) => Some(Connected(host.clone())),
            (Connecting(_) | Verifying(_) | Connected(_), Transition::Lost) => Some(Reconnecting),
            (Idle | Reconnecting, Transition::Exhausted) => Some(Failed),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Connecting(h) => write!(f, "connecting({})", h),
            Self::Verifying(h) => write!(f, "verifying({})", h),
            Self::Connected(h) => write!(f, "connected({})", h),
            Self::Reconnecting => write!(f, "reconnecting"),
            Self::Failed => write!(f, "failed"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
