//! Connection lifecycle management.
//!
//! A [`Connection`] wraps at most one live transport at a time. Connecting
//! while connected is a no-op; disconnecting with nothing connected is
//! reported, not silently ignored. Lifecycle mutations serialize through
//! one lock guarding the transport slot, so nothing ever observes a
//! half-initialized transport, while `is_connected()` stays a lock-free
//! snapshot for callers that only want the current state.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::sync::{oneshot, Mutex};

use crate::error::TransportError;
use crate::transport::{Connector, Transport};

/// Connection state as seen by observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected to the peer
    Disconnected,
    /// Attempting to establish connection
    Connecting,
    /// Successfully connected
    Connected,
    /// The last connection attempt failed
    Failed,
}

impl ConnectionState {
    /// Convert to u8 for atomic storage.
    pub fn to_u8(self) -> u8 {
        match self {
            ConnectionState::Disconnected => 0,
            ConnectionState::Connecting => 1,
            ConnectionState::Connected => 2,
            ConnectionState::Failed => 3,
        }
    }

    /// Convert from u8 (atomic storage).
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Failed,
            _ => ConnectionState::Disconnected,
        }
    }
}

/// Observable connection state without owning the [`Connection`].
#[derive(Clone)]
pub struct ConnectionStateObserver {
    state: Arc<AtomicU8>,
}

impl ConnectionStateObserver {
    fn new(state: Arc<AtomicU8>) -> Self {
        Self { state }
    }

    /// Get the current connection state.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Check if currently connected.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

/// The watcher acknowledges a disconnect by reporting the close outcome
/// back through this channel.
type DisconnectAck = oneshot::Sender<Result<(), TransportError>>;

struct ConnectionSlot {
    transport: Option<Arc<dyn Transport>>,
    disconnect_tx: Option<oneshot::Sender<DisconnectAck>>,
}

/// Owns the lifecycle of one transport: lazy connect, idempotent connect,
/// graceful disconnect with acknowledgement.
pub struct Connection {
    connector: Box<dyn Connector>,
    slot: Mutex<ConnectionSlot>,
    state: Arc<AtomicU8>,
}

impl Connection {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            slot: Mutex::new(ConnectionSlot {
                transport: None,
                disconnect_tx: None,
            }),
            state: Arc::new(AtomicU8::new(ConnectionState::Disconnected.to_u8())),
        }
    }

    fn set_state(&self, new_state: ConnectionState) {
        self.state.store(new_state.to_u8(), Ordering::SeqCst);
    }

    /// Open the transport if none is open yet.
    ///
    /// Connecting while connected returns success immediately. A failed
    /// attempt leaves the slot empty and surfaces the connector's error.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let mut slot = self.slot.lock().await;
        if slot.transport.is_some() {
            tracing::debug!("connect called while already connected");
            return Ok(());
        }

        self.set_state(ConnectionState::Connecting);
        let transport = match self.connector.connect().await {
            Ok(transport) => transport,
            Err(e) => {
                tracing::error!("failed to connect: {}", e);
                self.set_state(ConnectionState::Failed);
                return Err(e);
            }
        };

        let (disconnect_tx, disconnect_rx) = oneshot::channel();
        tokio::spawn(watch_for_disconnect(Arc::clone(&transport), disconnect_rx));
        slot.transport = Some(transport);
        slot.disconnect_tx = Some(disconnect_tx);
        self.set_state(ConnectionState::Connected);
        tracing::info!("connection established");
        Ok(())
    }

    /// Signal the watcher to close the transport and wait for its report.
    ///
    /// Fails with [`TransportError::NotConnected`] when nothing is
    /// connected.
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        let mut slot = self.slot.lock().await;
        let disconnect_tx = slot
            .disconnect_tx
            .take()
            .ok_or(TransportError::NotConnected)?;
        slot.transport = None;

        let (ack_tx, ack_rx) = oneshot::channel();
        let result = if disconnect_tx.send(ack_tx).is_ok() {
            // The watcher died without closing only if its task was torn
            // down; report that as a closed connection.
            ack_rx.await.unwrap_or(Err(TransportError::Closed))
        } else {
            tracing::warn!("connection watcher already gone");
            Err(TransportError::Closed)
        };
        self.set_state(ConnectionState::Disconnected);
        tracing::info!("disconnected");
        result
    }

    /// Non-blocking snapshot of the connection state.
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current state, readable without taking the lifecycle lock.
    pub fn state(&self) -> ConnectionState {
        ConnectionState::from_u8(self.state.load(Ordering::SeqCst))
    }

    /// Shareable observer over this connection's state.
    pub fn observer(&self) -> ConnectionStateObserver {
        ConnectionStateObserver::new(Arc::clone(&self.state))
    }

    /// Handle to the live transport, if any.
    pub async fn transport(&self) -> Result<Arc<dyn Transport>, TransportError> {
        self.slot
            .lock()
            .await
            .transport
            .clone()
            .ok_or(TransportError::NotConnected)
    }
}

/// Background watcher: waits for the disconnect signal, closes the
/// transport, and reports the outcome.
async fn watch_for_disconnect(
    transport: Arc<dyn Transport>,
    disconnect_rx: oneshot::Receiver<DisconnectAck>,
) {
    match disconnect_rx.await {
        Ok(ack) => {
            tracing::debug!("disconnect requested, closing transport");
            let result = transport.close().await;
            if let Err(ref e) = result {
                tracing::error!("transport close failed: {}", e);
            }
            let _ = ack.send(result);
        }
        Err(_) => {
            // The connection was dropped while still connected; close the
            // transport anyway so the socket does not leak.
            if let Err(e) = transport.close().await {
                tracing::debug!("close on dropped connection failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{duplex, FailingConnector, StaticConnector};

    #[test]
    fn test_connection_state_roundtrip() {
        let states = [
            ConnectionState::Disconnected,
            ConnectionState::Connecting,
            ConnectionState::Connected,
            ConnectionState::Failed,
        ];

        for state in states {
            assert_eq!(state, ConnectionState::from_u8(state.to_u8()));
        }
    }

    #[tokio::test]
    async fn test_connect_is_idempotent() {
        let (transport, _peer) = duplex();
        let connection = Connection::new(Box::new(StaticConnector::new(transport)));

        connection.connect().await.unwrap();
        assert!(connection.is_connected());
        connection.connect().await.unwrap();
        assert!(connection.is_connected());
    }

    #[tokio::test]
    async fn test_failed_connect_leaves_slot_empty() {
        let connection = Connection::new(Box::new(FailingConnector));

        assert!(matches!(
            connection.connect().await,
            Err(TransportError::Connect(_))
        ));
        assert!(!connection.is_connected());
        assert_eq!(connection.state(), ConnectionState::Failed);
        assert!(matches!(
            connection.transport().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_without_connection_is_reported() {
        let (transport, _peer) = duplex();
        let connection = Connection::new(Box::new(StaticConnector::new(transport)));

        assert!(matches!(
            connection.disconnect().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_disconnect_waits_for_watcher_ack() {
        let (transport, _peer) = duplex();
        let connection = Connection::new(Box::new(StaticConnector::new(transport)));

        connection.connect().await.unwrap();
        connection.disconnect().await.unwrap();
        assert!(!connection.is_connected());
        assert_eq!(connection.state(), ConnectionState::Disconnected);

        // The slot is empty again, so a second disconnect is an error.
        assert!(matches!(
            connection.disconnect().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_observer_tracks_lifecycle() {
        let (transport, _peer) = duplex();
        let connection = Connection::new(Box::new(StaticConnector::new(transport)));
        let observer = connection.observer();

        assert_eq!(observer.state(), ConnectionState::Disconnected);
        connection.connect().await.unwrap();
        assert!(observer.is_connected());
        connection.disconnect().await.unwrap();
        assert!(!observer.is_connected());
    }
}
