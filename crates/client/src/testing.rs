//! Test doubles for the transport seam
//!
//! Channel-backed fakes for driving the client from the "far end" of the
//! wire, available to unit tests and, via the `testing` feature, to
//! downstream test harnesses.
//!
//! # Usage
//!
//! Add to your Cargo.toml:
//! ```toml
//! [dev-dependencies]
//! wiremux-client = { workspace = true, features = ["testing"] }
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use wiremux_protocol::Message;

use crate::error::TransportError;
use crate::transport::{Connector, Transport};

/// In-memory transport wired to a [`TestPeer`].
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Message>,
    inbound: Mutex<mpsc::UnboundedReceiver<Message>>,
    closed: AtomicBool,
}

/// Far-end handle for a [`ChannelTransport`]: observe what the client
/// wrote and push inbound traffic at it.
pub struct TestPeer {
    sent_rx: mpsc::UnboundedReceiver<Message>,
    push_tx: mpsc::UnboundedSender<Message>,
}

/// Build a connected transport/peer pair.
pub fn duplex() -> (Arc<ChannelTransport>, TestPeer) {
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let (push_tx, push_rx) = mpsc::unbounded_channel();
    let transport = Arc::new(ChannelTransport {
        outbound: sent_tx,
        inbound: Mutex::new(push_rx),
        closed: AtomicBool::new(false),
    });
    let peer = TestPeer { sent_rx, push_tx };
    (transport, peer)
}

impl TestPeer {
    /// Next message the client wrote, in write order.
    pub async fn sent(&mut self) -> Option<Message> {
        self.sent_rx.recv().await
    }

    /// Deliver an inbound message to the client.
    ///
    /// Returns false once the transport is gone.
    pub fn push(&self, message: Message) -> bool {
        self.push_tx.send(message).is_ok()
    }

    /// Drop the inbound side, which the client observes as a closed
    /// connection on its next read.
    pub fn hang_up(self) {}
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, message: Message) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Closed);
        }
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Send("peer receiver dropped".to_string()))
    }

    async fn recv(&self) -> Result<Message, TransportError> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or(TransportError::Closed)
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Transport whose writes always fail; reads park forever.
#[derive(Default)]
pub struct FailingTransport;

#[async_trait]
impl Transport for FailingTransport {
    async fn send(&self, _message: Message) -> Result<(), TransportError> {
        Err(TransportError::Send("wire down".to_string()))
    }

    async fn recv(&self) -> Result<Message, TransportError> {
        std::future::pending().await
    }

    async fn close(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

/// Connector handing out a fixed, pre-built transport.
pub struct StaticConnector {
    transport: Arc<dyn Transport>,
}

impl StaticConnector {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self) -> Result<Arc<dyn Transport>, TransportError> {
        Ok(Arc::clone(&self.transport))
    }
}

/// Connector that refuses every attempt.
#[derive(Default)]
pub struct FailingConnector;

#[async_trait]
impl Connector for FailingConnector {
    async fn connect(&self) -> Result<Arc<dyn Transport>, TransportError> {
        Err(TransportError::Connect("nothing listening".to_string()))
    }
}
