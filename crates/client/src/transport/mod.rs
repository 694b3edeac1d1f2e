//! Transport capability for talking to the remote peer
//!
//! The rest of the crate only ever sees these two traits: a [`Transport`]
//! moves one structured message at a time in each direction, and a
//! [`Connector`] opens a fresh transport on demand. The concrete
//! tokio-tungstenite implementation lives in the `ws` submodule; tests
//! substitute channel-backed fakes or mocks at the same seam.
//!
//! Note: the async methods use `async_trait` instead of returning
//! `Pin<Box<dyn Future>>` for better mockall compatibility.

use std::sync::Arc;

use async_trait::async_trait;

use wiremux_protocol::Message;

use crate::error::TransportError;

mod ws;

pub use ws::{WsConnector, WsTransport};

/// A bidirectional, one-message-at-a-time channel to the peer.
///
/// Framing concerns (text vs. binary, compression, per-message size
/// ceilings) are entirely the implementation's business; the core only
/// relies on the two operations below.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one structured message. Failures are reported synchronously
    /// to the caller; nothing is retried.
    async fn send(&self, message: Message) -> Result<(), TransportError>;

    /// Receive the next structured message, waiting until one is
    /// available or the connection closes.
    async fn recv(&self) -> Result<Message, TransportError>;

    /// Close the channel. Safe to call on an already-closed transport.
    async fn close(&self) -> Result<(), TransportError>;
}

/// Opens transports for the connection manager.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a fresh transport to the peer.
    async fn connect(&self) -> Result<Arc<dyn Transport>, TransportError>;
}
