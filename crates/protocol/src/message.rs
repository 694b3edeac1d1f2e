//! The wire message unit and its classification.
//!
//! Every frame exchanged with the peer deserializes into a [`Message`].
//! Exactly three shapes are meaningful:
//!
//! - a **reply** carries a positive `id` and no `method`;
//! - an **event** carries a non-empty `method` and no positive `id`;
//! - anything else is **unknown** and is routed to the catch-all path.
//!
//! Payloads stay opaque (`serde_json::Value`); typed decoding belongs to
//! the wrapper layer above the core.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ErrorDescriptor;

/// Identifier value meaning "no identifier assigned".
///
/// Zero doubles as the implicit default correlation slot for unsolicited
/// or malformed traffic, so command identifiers always start at 1.
pub const UNSET_ID: u64 = 0;

fn id_is_unset(id: &u64) -> bool {
    *id == UNSET_ID
}

/// One wire message, in either direction.
///
/// Unset fields are omitted on the wire, matching the DevTools-style JSON
/// framing: `{"id":1,"method":"Page.navigate","params":{...}}` outbound,
/// `{"id":1,"result":{...}}` or `{"method":"Page.loadEventFired",
/// "params":{...}}` inbound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Command identifier; 0 means "not set".
    #[serde(default, skip_serializing_if = "id_is_unset")]
    pub id: u64,
    /// Command or event name; empty means "not set".
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub method: String,
    /// Outbound command parameters or inbound event payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
    /// Reply result payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Reply error descriptor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDescriptor>,
}

/// What a received message turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A reply to a previously sent command.
    Reply,
    /// An unsolicited named event.
    Event,
    /// Neither a reply nor an event; handled by the catch-all path.
    Unknown,
}

impl Message {
    /// Build an outbound command message.
    pub fn command(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            id,
            method: method.into(),
            params,
            ..Self::default()
        }
    }

    /// Build an event message (used by tests and mock peers).
    pub fn event(method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            method: method.into(),
            params,
            ..Self::default()
        }
    }

    /// Build a successful reply message.
    pub fn reply(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            ..Self::default()
        }
    }

    /// Build a failed reply carrying an error descriptor.
    pub fn error_reply(id: u64, error: ErrorDescriptor) -> Self {
        Self {
            id,
            error: Some(error),
            ..Self::default()
        }
    }

    /// Classify this message per the wire invariant.
    ///
    /// A positive identifier with no method name is a reply; a non-empty
    /// method name with no positive identifier is an event; any other
    /// shape (both set, neither set) is unclassifiable.
    pub fn kind(&self) -> MessageKind {
        match (self.id > UNSET_ID, !self.method.is_empty()) {
            (true, false) => MessageKind::Reply,
            (false, true) => MessageKind::Event,
            _ => MessageKind::Unknown,
        }
    }

    /// Whether this reply carries a live error.
    ///
    /// A descriptor with code 0 counts as "no error" even when present.
    pub fn is_error(&self) -> bool {
        self.error.as_ref().is_some_and(ErrorDescriptor::is_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::codes;
    use serde_json::json;

    #[test]
    fn test_classify_reply() {
        let msg = Message::reply(7, json!({"y": 2}));
        assert_eq!(msg.kind(), MessageKind::Reply);
    }

    #[test]
    fn test_classify_event() {
        let msg = Message::event("Network.requestWillBeSent", Some(json!({})));
        assert_eq!(msg.kind(), MessageKind::Event);
    }

    #[test]
    fn test_classify_unknown_shapes() {
        // Neither id nor method.
        assert_eq!(Message::default().kind(), MessageKind::Unknown);
        // Both id and method set.
        let msg = Message::command(3, "Page.navigate", None);
        assert_eq!(msg.kind(), MessageKind::Unknown);
    }

    #[test]
    fn test_wire_shape_omits_unset_fields() {
        let cmd = Message::command(1, "Foo.bar", Some(json!({"x": 1})));
        let text = serde_json::to_string(&cmd).unwrap();
        assert_eq!(text, r#"{"id":1,"method":"Foo.bar","params":{"x":1}}"#);

        let event = Message::event("Foo.fired", None);
        assert_eq!(serde_json::to_string(&event).unwrap(), r#"{"method":"Foo.fired"}"#);
    }

    #[test]
    fn test_wire_parse_defaults_missing_fields() {
        let msg: Message = serde_json::from_str(r#"{"id":4,"result":{}}"#).unwrap();
        assert_eq!(msg.id, 4);
        assert!(msg.method.is_empty());
        assert_eq!(msg.kind(), MessageKind::Reply);
    }

    #[test]
    fn test_zero_code_descriptor_is_not_an_error() {
        let mut msg = Message::reply(1, json!({}));
        msg.error = Some(ErrorDescriptor::default());
        assert!(!msg.is_error());

        let failed = Message::error_reply(
            1,
            ErrorDescriptor::new(codes::TRANSPORT_FAILURE, "write failed"),
        );
        assert!(failed.is_error());
    }
}
