//! Client-side multiplexer for a command/event protocol over one
//! persistent connection.
//!
//! Many independent callers send named commands through a single
//! [`Client`] and each awaits exactly its own reply, while registered
//! handlers receive the peer's unsolicited events. One read loop per
//! connection demultiplexes the inbound stream: replies correlate by
//! identifier, events fan out by name, anything else lands on the
//! catch-all path.
//!
//! The per-method command catalog is out of scope here; generated
//! wrappers call [`Client::send_command`] / [`Client::on_event`] with
//! opaque `serde_json::Value` payloads and do their own typed decoding.

pub mod client;
pub mod commands;
pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod transport;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used entrypoints
pub use client::Client;
pub use commands::ReplyHandle;
pub use config::ClientConfig;
pub use connection::{ConnectionState, ConnectionStateObserver};
pub use error::{CommandError, HandlerError, TransportError};
pub use events::{CallbackHandler, EventHandler};
pub use wiremux_protocol::{codes, ErrorDescriptor, Message};
