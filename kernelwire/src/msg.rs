//! The protocol message model.
//!
//! A [`Message`] is the unit of exchange on every channel: routing idents
//! (receive side only), a header, the causally-prior parent header, metadata
//! and content mappings, and optional opaque binary buffers. Decoded
//! messages are returned as owned values; the codec keeps no reference to
//! them after return, and consumers must treat them as read-only.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Message header per the wire protocol.
///
/// All fields are optional on the wire; an absent header serializes as
/// `{}`. Unknown keys (e.g. `subshell_id`) ride along in `extra` so a
/// decode→encode pass is lossless.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Header {
    /// True when every field is absent (serializes as `{}`).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.msg_id.is_none()
            && self.msg_type.is_none()
            && self.username.is_none()
            && self.session.is_none()
            && self.date.is_none()
            && self.version.is_none()
            && self.extra.is_empty()
    }
}

/// One protocol message.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Message {
    /// Routing-identity frames; populated only on receive, used by the
    /// kernel for reply routing, never by this client
    pub idents: Vec<Bytes>,
    pub header: Header,
    /// Copy of a causally-prior message's header, or empty
    pub parent_header: Header,
    pub metadata: Map<String, Value>,
    /// Shape depends on `header.msg_type`
    pub content: Map<String, Value>,
    /// Opaque binary buffers trailing the envelope
    pub buffers: Vec<Bytes>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_header_serializes_as_empty_object() {
        let header = Header::default();
        assert!(header.is_empty());
        assert_eq!(serde_json::to_string(&header).unwrap(), "{}");
    }

    #[test]
    fn test_header_roundtrip_keeps_unknown_keys() {
        let raw = json!({
            "msg_id": "XYZ",
            "msg_type": "execute_request",
            "username": "kitty",
            "session": "spinning",
            "date": "2024-01-01T00:00:00Z",
            "version": "5.3",
            "subshell_id": null
        });
        let header: Header = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(header.msg_id.as_deref(), Some("XYZ"));
        assert_eq!(header.extra.get("subshell_id"), Some(&Value::Null));

        let back = serde_json::to_value(&header).unwrap();
        assert_eq!(back, raw);
    }

    #[test]
    fn test_default_message_sections_are_empty() {
        let message = Message::default();
        assert!(message.idents.is_empty());
        assert!(message.header.is_empty());
        assert!(message.parent_header.is_empty());
        assert!(message.metadata.is_empty());
        assert!(message.content.is_empty());
        assert!(message.buffers.is_empty());
    }
}
