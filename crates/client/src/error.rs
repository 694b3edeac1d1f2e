//! Error types for the client core.
//!
//! The taxonomy mirrors how failures actually travel through the system:
//! transport errors surface synchronously to the operation that hit them
//! (and a read failure additionally stops the dispatcher), registration
//! errors return to the caller performing the registration, and correlation
//! misses are logged and dropped because there is no caller left to notify.
//! Protocol-level errors are not Rust errors at all; they ride inside the
//! reply as an `ErrorDescriptor` and are propagated verbatim.

use thiserror::Error;

/// Failures at the transport boundary.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Opening the connection failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// An operation needed a live connection and none exists.
    #[error("no active connection")]
    NotConnected,

    /// The peer closed the connection.
    #[error("connection closed")]
    Closed,

    /// Writing a message failed.
    #[error("send failed: {0}")]
    Send(String),

    /// Reading the next message failed.
    #[error("receive failed: {0}")]
    Receive(String),

    /// Outbound payload exceeded the configured ceiling; rejected before
    /// the write is attempted.
    #[error("outbound payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Wire encode/decode failure.
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Underlying websocket failure.
    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),
}

/// Failures on the command/reply path.
#[derive(Debug, Error)]
pub enum CommandError {
    /// No pending command is registered under this identifier.
    #[error("no pending command with identifier {0}")]
    UnknownId(u64),

    /// The pending entry was discarded before a reply arrived, so the
    /// handle will never resolve.
    #[error("command was abandoned before a reply arrived")]
    Cancelled,
}

/// Failures registering or removing event handlers.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// This exact handler instance is already registered under this name.
    #[error("handler already registered for event {0:?}")]
    Duplicate(String),

    /// The handler instance is not registered under this name.
    #[error("handler not registered for event {0:?}")]
    NotFound(String),

    /// No handlers at all are registered under this name.
    #[error("no handlers registered for event {0:?}")]
    NoneRegistered(String),
}
