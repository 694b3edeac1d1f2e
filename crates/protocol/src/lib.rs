//! Wire types for the wiremux multiplexer.
//!
//! This crate defines the single wire unit ([`Message`]) exchanged with the
//! remote peer, its classification into replies / events / unclassifiable
//! traffic, and the error descriptor embedded in failed replies. It is a
//! shared kernel: the client core and every transport implementation speak
//! exactly these shapes, so this crate stays free of runtime dependencies
//! (serde only).
//!
//! The protocol's per-method command and event catalog is deliberately not
//! here. Callers pass method names as strings and payloads as opaque
//! `serde_json::Value`s; decoding typed results is the business of the
//! generated wrapper layer sitting on top of the client core.

pub mod error;
pub mod message;

pub use error::{codes, ErrorDescriptor};
pub use message::{Message, MessageKind, UNSET_ID};
