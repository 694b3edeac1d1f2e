//! Error descriptors embedded in failed replies.
//!
//! These are wire data, not Rust errors: the core propagates them verbatim
//! to the awaiting caller as part of the reply, and callers must check the
//! descriptor before trusting the result payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Well-known error codes used in synthesized replies.
///
/// Negative JSON-RPC-shaped values, matching what DevTools-style servers
/// put on the wire. Server-originated codes pass through untouched; the
/// codes below are the ones the client core itself stamps onto replies it
/// fabricates.
pub mod codes {
    /// The command never reached the peer (transport write failed or no
    /// connection was available).
    pub const TRANSPORT_FAILURE: i64 = -32000;
    /// The inbound message matched neither the reply nor the event shape.
    pub const UNCLASSIFIABLE: i64 = -32700;
}

/// A numeric code, a human-readable message, and an optional opaque blob.
///
/// A code of 0 denotes "no error" even when the descriptor itself is
/// present but empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    /// Numeric error code; 0 means "no error".
    #[serde(default)]
    pub code: i64,
    /// Human-readable description.
    #[serde(default)]
    pub message: String,
    /// Opaque server-provided detail.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ErrorDescriptor {
    /// Build a descriptor from a code and message.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Attach an opaque data blob.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Whether this descriptor denotes an actual error.
    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

impl std::fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zero_code_means_no_error() {
        assert!(!ErrorDescriptor::default().is_error());
        assert!(!ErrorDescriptor::new(0, "present but empty").is_error());
        assert!(ErrorDescriptor::new(codes::TRANSPORT_FAILURE, "boom").is_error());
    }

    #[test]
    fn test_descriptor_round_trip_keeps_data() {
        let desc = ErrorDescriptor::new(-32601, "method not found")
            .with_data(json!({"method": "Foo.bar"}));
        let text = serde_json::to_string(&desc).unwrap();
        let back: ErrorDescriptor = serde_json::from_str(&text).unwrap();
        assert_eq!(desc, back);
    }

    #[test]
    fn test_display_includes_code_and_message() {
        let desc = ErrorDescriptor::new(-32000, "write failed");
        assert_eq!(desc.to_string(), "[-32000] write failed");
    }
}
