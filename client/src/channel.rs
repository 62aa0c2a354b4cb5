//! # Peer Channel
//!
//! Transport seam between the session and whatever actually carries
//! messages to the identity provider (an embedded frame, a WebView
//! bridge, a test harness). The session needs exactly two capabilities:
//!
//! 1. **Outbound**: fire-and-forget [`MessageSender::send`]. Best effort,
//!    at most once — the protocol tolerates lost requests by leaving the
//!    corresponding operation pending.
//! 2. **Inbound**: a stream of [`ChannelEvent`]s delivered in arrival
//!    order on a `tokio::sync::mpsc` channel. The session consumes them
//!    one at a time; handlers never block the transport because the
//!    transport only ever touches the channel's sending half.
//!
//! ## Origin Filtering
//!
//! Only messages from the expected provider origin may reach the session.
//! Transport adapters enforce this by routing every raw payload through
//! [`decode_inbound`], which silently discards foreign origins and
//! unparseable payloads. Discarding is not an error — embedded transports
//! are shared buses and unrelated traffic is normal.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::wire::{InboundMessage, OutboundMessage};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors surfaced by the transport seam.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// The transport could not hand the message to the peer.
    #[error("failed to send message to peer: {0}")]
    SendFailed(String),

    /// The inbound event stream ended; the session can no longer make
    /// progress on operations that need peer replies.
    #[error("peer channel closed")]
    Closed,
}

// ---------------------------------------------------------------------------
// Events & Sender
// ---------------------------------------------------------------------------

/// An event delivered to the session from the transport.
#[derive(Clone, Debug)]
pub enum ChannelEvent {
    /// The transport finished connecting to the provider frame. Fired at
    /// most once; public session operations wait for it.
    Connected,

    /// A decoded, origin-checked message from the provider.
    Message(InboundMessage),
}

/// Outbound half of the peer link, implemented by the host transport.
#[async_trait]
pub trait MessageSender: Send + Sync {
    /// Serializes and delivers `message` to the provider. No delivery
    /// guarantee beyond best effort, at most once.
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError>;
}

/// Decodes a raw transport payload into an [`InboundMessage`].
///
/// Returns `None` — with a debug log, never an error — when the payload
/// originates from anywhere but `expected_origin`, or when it is not a
/// recognizable protocol envelope. Transport adapters call this for every
/// raw message before forwarding to the session.
pub fn decode_inbound(expected_origin: &str, origin: &str, payload: &str) -> Option<InboundMessage> {
    if origin != expected_origin {
        debug!(origin, "discarding message from unexpected origin");
        return None;
    }
    match serde_json::from_str(payload) {
        Ok(message) => Some(message),
        Err(err) => {
            debug!(%err, "discarding unparseable peer payload");
            None
        }
    }
}
