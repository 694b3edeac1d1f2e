//! The demultiplexing read loop.
//!
//! One sequential task per connection drains the transport and routes each
//! inbound message: replies correlate against the command registry inside
//! a single critical section, events fan out to their registered handlers
//! on independent tasks, and everything else goes to the catch-all path,
//! which behaves like correlation against identifier 0.
//!
//! Only transport read failures can end the loop; stray replies and
//! handler-less events are logged and dropped. The terminal transition
//! always performs a clean disconnect of the owning connection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use wiremux_protocol::{codes, ErrorDescriptor, Message, MessageKind, UNSET_ID};

use crate::client::ConnectionContext;
use crate::connection::Connection;
use crate::error::TransportError;
use crate::transport::Transport;

/// Where the read loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Draining the transport.
    Running,
    /// A stop was requested; the current pass finishes routing first.
    StopRequested,
    /// The loop has disconnected and exited.
    Stopped,
}

/// Stop control shared between the read loop and its owner.
///
/// Requesting a stop interrupts the loop's blocked read, but a message
/// that was already received is still routed before the loop exits. The
/// wait is level-triggered, so a request made between loop passes is
/// never lost.
#[derive(Default)]
pub struct StopSignal {
    token: CancellationToken,
}

impl StopSignal {
    /// Ask the loop to stop after its current pass.
    pub fn request(&self) {
        self.token.cancel();
    }

    pub fn is_requested(&self) -> bool {
        self.token.is_cancelled()
    }

    async fn wait(&self) {
        self.token.cancelled().await;
    }
}

pub(crate) struct Dispatcher {
    transport: Arc<dyn Transport>,
    connection: Arc<Connection>,
    context: Arc<ConnectionContext>,
    stop: Arc<StopSignal>,
    state: LoopState,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport>,
        connection: Arc<Connection>,
        context: Arc<ConnectionContext>,
        stop: Arc<StopSignal>,
    ) -> Self {
        Self {
            transport,
            connection,
            context,
            stop,
            state: LoopState::Running,
        }
    }

    /// Run until a stop is requested or the transport read fails.
    pub async fn run(mut self) {
        tracing::debug!("dispatcher running");
        while self.state == LoopState::Running {
            tokio::select! {
                _ = self.stop.wait() => {}
                received = self.transport.recv() => match received {
                    Ok(message) => self.route(message).await,
                    Err(e) => {
                        match e {
                            TransportError::Closed => {
                                tracing::info!("transport closed, stopping dispatcher")
                            }
                            e => tracing::error!("transport read failed: {}", e),
                        }
                        self.stop.request();
                    }
                },
            }

            if self.stop.is_requested() {
                self.state = LoopState::StopRequested;
                self.shutdown().await;
                self.state = LoopState::Stopped;
            }
        }
    }

    async fn route(&self, message: Message) {
        match message.kind() {
            MessageKind::Reply => self.correlate(message).await,
            MessageKind::Event => self.fan_out(message).await,
            MessageKind::Unknown => self.route_unknown(message).await,
        }
    }

    /// Resolve the matching pending command, or log and drop.
    ///
    /// Lookup, resolution, and removal happen in one critical section, so
    /// a reply is delivered at most once even if the peer repeats it.
    async fn correlate(&self, reply: Message) {
        let id = reply.id;
        let mut table = self.context.commands.lock().await;
        if table.resolve(id, reply).is_err() {
            tracing::warn!(id, "dropping reply with no matching pending command");
        }
    }

    /// Invoke every handler registered for this event, each on its own
    /// task. Handlers do not block the loop or each other, and a
    /// panicking handler dies with its task instead of propagating here.
    async fn fan_out(&self, event: Message) {
        let handlers = match self.context.events.get(&event.method).await {
            Ok(handlers) => handlers,
            Err(_) => {
                tracing::debug!(method = %event.method, "dropping event with no handlers");
                return;
            }
        };
        for handler in handlers {
            let event = event.clone();
            tokio::spawn(async move { handler.handle(event) });
        }
    }

    /// Catch-all for unclassifiable traffic: make sure an error descriptor
    /// is present, then correlate against the implicit default slot.
    async fn route_unknown(&self, mut message: Message) {
        if message.error.is_none() {
            message.error = Some(ErrorDescriptor::new(
                codes::UNCLASSIFIABLE,
                "unclassifiable message",
            ));
        }
        let mut table = self.context.commands.lock().await;
        if table.resolve(UNSET_ID, message).is_err() {
            tracing::debug!("dropping unclassifiable message; no default slot armed");
        }
    }

    async fn shutdown(&self) {
        tracing::info!("dispatcher stopping");
        if let Err(e) = self.connection.disconnect().await {
            tracing::debug!("disconnect during dispatcher shutdown: {}", e);
        }
    }
}
