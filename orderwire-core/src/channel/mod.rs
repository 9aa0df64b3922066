//! The duplex transport: named endpoints over Unix domain sockets.
//!
//! The display side listens on a per-session socket; the protocol
//! service connects to it. Both ends then exchange envelopes over the
//! same bidirectional stream.

pub mod connection;
pub mod endpoint;

use std::time::Instant;

// ── Re-exports ───────────────────────────────────────────────────

pub use connection::ChannelConnection;
pub use endpoint::{
    connect, connect_at, default_base_dir, ChannelId, ChannelListener, CONNECT_RETRY_INTERVAL,
};

/// Connection state of a channel session.
///
/// ```text
///   (listener bound)
///    Listening ──accept/connect──▶ Connected ──I/O error or close──▶ Disconnected
///                                                      │
///                                   server side may re-listen and accept again
/// ```
///
/// Listening is a property of the [`ChannelListener`] itself; session
/// objects only track the last two states. On the transition to
/// `Disconnected` all per-connection state (batch buffer, attachment
/// flag) is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// A peer is present and traffic may flow.
    Connected { since: Instant },
    /// No peer. Producer-side drawing calls are discarded.
    #[default]
    Disconnected,
}

impl LinkState {
    /// A fresh `Connected` state stamped with the current time.
    pub fn connected_now() -> Self {
        LinkState::Connected {
            since: Instant::now(),
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::Connected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_disconnected() {
        assert_eq!(LinkState::default(), LinkState::Disconnected);
        assert!(!LinkState::default().is_connected());
    }

    #[test]
    fn connected_now_is_connected() {
        assert!(LinkState::connected_now().is_connected());
    }
}
