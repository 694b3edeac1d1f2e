//! Client facade over one multiplexed connection.
//!
//! A [`Client`] owns exactly one [`Connection`] plus that connection's
//! private [`ConnectionContext`] (identifier counter, command registry,
//! event handler registry). Nothing here is process-wide: two clients
//! never share correlation state, so identifiers and registries cannot
//! leak across connections.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use wiremux_protocol::{codes, ErrorDescriptor, Message, UNSET_ID};

use crate::commands::{CommandRegistry, PendingCommand, ReplyHandle};
use crate::config::ClientConfig;
use crate::connection::{Connection, ConnectionState, ConnectionStateObserver};
use crate::dispatch::{Dispatcher, StopSignal};
use crate::error::{CommandError, HandlerError, TransportError};
use crate::events::{CallbackHandler, EventHandler, EventHandlerRegistry};
use crate::transport::{Connector, WsConnector};

/// Per-connection mutable state: the identifier counter and both
/// registries, constructed once per [`Client`] and shared only with its
/// dispatcher.
pub struct ConnectionContext {
    next_id: AtomicU64,
    pub(crate) commands: CommandRegistry,
    pub(crate) events: EventHandlerRegistry,
}

impl ConnectionContext {
    pub(crate) fn new() -> Self {
        Self {
            // 0 is the implicit default slot; real commands start at 1.
            next_id: AtomicU64::new(1),
            commands: CommandRegistry::new(),
            events: EventHandlerRegistry::new(),
        }
    }

    /// Allocate the next command identifier.
    ///
    /// Strictly increasing and never reused while outstanding, safe under
    /// concurrent callers.
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// One running read loop and its stop control.
struct LoopHandle {
    stop: Arc<StopSignal>,
    task: JoinHandle<()>,
}

/// Multiplexing client for a command/event protocol over one persistent
/// connection.
pub struct Client {
    connection: Arc<Connection>,
    context: Arc<ConnectionContext>,
    read_loop: Mutex<Option<LoopHandle>>,
}

impl Client {
    /// Build a client for the configured WebSocket endpoint.
    pub fn new(config: &ClientConfig) -> Result<Self, TransportError> {
        let connector = WsConnector::new(config)?;
        Ok(Self::with_connector(Box::new(connector)))
    }

    /// Build a client over a caller-supplied connector.
    pub fn with_connector(connector: Box<dyn Connector>) -> Self {
        Self {
            connection: Arc::new(Connection::new(connector)),
            context: Arc::new(ConnectionContext::new()),
            read_loop: Mutex::new(None),
        }
    }

    /// Connect lazily and start the read loop.
    ///
    /// Calling this while connected with a live loop is a no-op.
    pub async fn connect(&self) -> Result<(), TransportError> {
        let mut read_loop = self.read_loop.lock().await;
        if let Some(active) = read_loop.take() {
            if !active.task.is_finished() && !active.stop.is_requested() {
                let result = self.connection.connect().await;
                *read_loop = Some(active);
                return result;
            }
            // A loop that is stopping owns the clean disconnect; let it
            // finish before a fresh connect proceeds.
            if let Err(e) = active.task.await {
                tracing::error!("dispatcher task failed: {}", e);
            }
        }

        self.connection.connect().await?;
        let transport = self.connection.transport().await?;
        let stop = Arc::new(StopSignal::default());
        let dispatcher = Dispatcher::new(
            transport,
            Arc::clone(&self.connection),
            Arc::clone(&self.context),
            Arc::clone(&stop),
        );
        let task = tokio::spawn(dispatcher.run());
        *read_loop = Some(LoopHandle { stop, task });
        Ok(())
    }

    /// Stop the read loop and wait for it to disconnect cleanly.
    ///
    /// Fails with [`TransportError::NotConnected`] when nothing is
    /// connected (including after the loop already stopped on its own).
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        let handle = self.read_loop.lock().await.take();
        match handle {
            Some(active) if !active.task.is_finished() => {
                active.stop.request();
                if let Err(e) = active.task.await {
                    tracing::error!("dispatcher task failed: {}", e);
                }
                Ok(())
            }
            _ => self.connection.disconnect().await,
        }
    }

    /// Request the read loop stop without waiting for the disconnect.
    pub async fn stop(&self) {
        if let Some(active) = self.read_loop.lock().await.as_ref() {
            active.stop.request();
        }
    }

    /// Non-blocking snapshot of the connection state.
    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Shareable observer over the connection state.
    pub fn state_observer(&self) -> ConnectionStateObserver {
        self.connection.observer()
    }

    /// Send a named command and return the handle its reply resolves.
    ///
    /// On a transport write failure the handle resolves immediately with
    /// a synthesized transport-failure reply and nothing is registered,
    /// so a stopped loop can never strand such a caller. On success the
    /// pending entry is registered before this method returns, so the
    /// reply cannot arrive ahead of its registration.
    pub async fn send_command(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> ReplyHandle {
        let method = method.into();
        let id = self.context.next_id();
        let (pending, handle) = PendingCommand::new(id, method.clone(), params.clone());
        let message = Message::command(id, method, params);

        let transport = self.connection.transport().await;
        // The command table stays locked across the write so the read
        // loop cannot correlate a racing reply before the entry exists.
        let mut table = self.context.commands.lock().await;
        let written = match transport {
            Ok(transport) => transport.send(message).await,
            Err(e) => Err(e),
        };
        match written {
            Ok(()) => {
                table.set(pending);
                handle
            }
            Err(e) => {
                drop(table);
                tracing::error!(id, "command write failed: {}", e);
                let reply = Message::error_reply(
                    id,
                    ErrorDescriptor::new(codes::TRANSPORT_FAILURE, e.to_string()),
                );
                pending.resolve(reply);
                handle
            }
        }
    }

    /// Send a command and wait for its reply.
    ///
    /// The reply is returned verbatim, error descriptor included; check
    /// [`Message::is_error`] before trusting the result payload.
    pub async fn execute(
        &self,
        method: impl Into<String>,
        params: Option<Value>,
    ) -> Result<Message, CommandError> {
        self.send_command(method, params).await.recv().await
    }

    /// Register a handler under its own event name.
    pub async fn add_event_handler(
        &self,
        handler: Arc<dyn EventHandler>,
    ) -> Result<(), HandlerError> {
        self.context.events.add(handler).await
    }

    /// Remove a previously registered handler by identity.
    pub async fn remove_event_handler(
        &self,
        handler: &Arc<dyn EventHandler>,
    ) -> Result<(), HandlerError> {
        self.context.events.remove(handler).await
    }

    /// Register a closure for `name`; the returned handle is the identity
    /// to pass to [`Client::remove_event_handler`] later.
    pub async fn on_event<F>(
        &self,
        name: impl Into<String>,
        callback: F,
    ) -> Result<Arc<dyn EventHandler>, HandlerError>
    where
        F: Fn(Message) + Send + Sync + 'static,
    {
        let handler: Arc<dyn EventHandler> = CallbackHandler::new(name, callback);
        self.context.events.add(Arc::clone(&handler)).await?;
        Ok(handler)
    }

    /// Arm the catch-all slot for the next unclassifiable inbound message.
    ///
    /// At most one message resolves the returned handle; arm again to
    /// keep watching. Unclassifiable traffic arriving with no slot armed
    /// is logged and dropped.
    pub async fn recv_unclassified(&self) -> ReplyHandle {
        let (slot, handle) = PendingCommand::new(UNSET_ID, "", None);
        self.context.commands.insert(slot).await;
        handle
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{duplex, FailingTransport, StaticConnector, TestPeer};
    use serde_json::json;

    async fn connected_client() -> (Client, TestPeer) {
        let (transport, peer) = duplex();
        let client = Client::with_connector(Box::new(StaticConnector::new(transport)));
        client.connect().await.unwrap();
        (client, peer)
    }

    #[tokio::test]
    async fn test_happy_path_command_reply() {
        let (client, mut peer) = connected_client().await;

        let handle = client
            .send_command("Foo.bar", Some(json!({"x": 1})))
            .await;

        let sent = peer.sent().await.unwrap();
        assert_eq!(sent, Message::command(1, "Foo.bar", Some(json!({"x": 1}))));

        peer.push(Message::reply(1, json!({"y": 2})));
        let reply = handle.recv().await.unwrap();
        assert_eq!(reply.result, Some(json!({"y": 2})));
        assert!(!reply.is_error());
    }

    #[tokio::test]
    async fn test_identifiers_increase_monotonically() {
        let (client, mut peer) = connected_client().await;

        let _first = client.send_command("Foo.one", None).await;
        let _second = client.send_command("Foo.two", None).await;

        assert_eq!(peer.sent().await.unwrap().id, 1);
        assert_eq!(peer.sent().await.unwrap().id, 2);
    }

    #[tokio::test]
    async fn test_concurrent_callers_get_their_own_replies() {
        let (client, mut peer) = connected_client().await;

        let mut handles = Vec::new();
        for i in 0..4 {
            handles.push(client.send_command(format!("Foo.cmd{i}"), None).await);
        }

        // Answer in reverse arrival order, result carrying the id.
        let mut sent_ids = Vec::new();
        for _ in 0..4 {
            sent_ids.push(peer.sent().await.unwrap().id);
        }
        for id in sent_ids.into_iter().rev() {
            peer.push(Message::reply(id, json!({"id": id})));
        }

        for (i, handle) in handles.into_iter().enumerate() {
            let id = (i + 1) as u64;
            let reply = handle.recv().await.unwrap();
            assert_eq!(reply.id, id);
            assert_eq!(reply.result, Some(json!({"id": id})));
        }
    }

    #[tokio::test]
    async fn test_send_failure_short_circuits() {
        let client = Client::with_connector(Box::new(StaticConnector::new(Arc::new(
            FailingTransport,
        ))));
        client.connect().await.unwrap();

        let handle = client.send_command("Foo.bar", None).await;
        let reply = handle.recv().await.unwrap();
        assert!(reply.is_error());
        let error = reply.error.unwrap();
        assert_eq!(error.code, codes::TRANSPORT_FAILURE);

        // Nothing was registered for the failed write.
        assert_eq!(client.context.commands.outstanding().await, 0);
    }

    #[tokio::test]
    async fn test_send_without_connection_short_circuits() {
        let (transport, _peer) = duplex();
        let client = Client::with_connector(Box::new(StaticConnector::new(transport)));

        let reply = client.execute("Foo.bar", None).await.unwrap();
        assert!(reply.is_error());
        assert_eq!(client.context.commands.outstanding().await, 0);
    }

    #[tokio::test]
    async fn test_protocol_error_propagates_verbatim() {
        let (client, mut peer) = connected_client().await;

        let handle = client.send_command("Foo.bar", None).await;
        let _ = peer.sent().await.unwrap();

        let descriptor = ErrorDescriptor::new(-32601, "method not found")
            .with_data(json!({"method": "Foo.bar"}));
        peer.push(Message::error_reply(1, descriptor.clone()));

        let reply = handle.recv().await.unwrap();
        assert!(reply.is_error());
        assert_eq!(reply.error, Some(descriptor));
    }

    #[tokio::test]
    async fn test_duplicate_handler_rejected_through_facade() {
        let (client, _peer) = connected_client().await;

        let handler = client
            .on_event("Page.loadEventFired", |_event| {})
            .await
            .unwrap();
        let second = client.add_event_handler(handler).await;
        assert!(matches!(second, Err(HandlerError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_disconnect_lifecycle() {
        let (client, _peer) = connected_client().await;
        assert!(client.is_connected());

        client.disconnect().await.unwrap();
        assert!(!client.is_connected());
        assert_eq!(client.state(), ConnectionState::Disconnected);

        assert!(matches!(
            client.disconnect().await,
            Err(TransportError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_connect_is_idempotent_with_live_loop() {
        let (client, mut peer) = connected_client().await;
        client.connect().await.unwrap();

        // The loop survives and the counter keeps going.
        let _handle = client.send_command("Foo.bar", None).await;
        assert_eq!(peer.sent().await.unwrap().id, 1);
    }

    #[tokio::test]
    async fn test_unclassified_slot_via_facade() {
        let (client, peer) = connected_client().await;

        let handle = client.recv_unclassified().await;
        peer.push(Message::default());

        let caught = handle.recv().await.unwrap();
        assert_eq!(caught.error.unwrap().code, codes::UNCLASSIFIABLE);
    }
}
