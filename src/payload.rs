//! Fixed-shape JSON control frames exchanged over the transport.
//!
//! Only the frames whose shape the server contract pins down get typed
//! structs ([`HelloPayload`], [`EndOfStream`]); everything else the client
//! receives is decoded loosely via [`ServerMessage`].

use serde::{Deserialize, Serialize};

/// The client identifier sent in every `hello` frame.
pub const CLIENT_ID: &str = "whisperdoc.client.rust";

/// Outbound `hello` control frame — the first frame sent after the socket
/// opens, gating every subsequent audio frame behind authentication.
#[derive(Debug, Clone, Serialize)]
pub struct HelloPayload {
    pub event: &'static str,
    pub client: &'static str,
    pub version: String,
    pub auth_type: &'static str,
    pub token: String,
    pub incognito: bool,
}

impl HelloPayload {
    pub fn new(token: String, version: impl Into<String>, incognito: bool) -> Self {
        Self {
            event: "hello",
            client: CLIENT_ID,
            version: version.into(),
            auth_type: "api_key",
            token,
            incognito,
        }
    }
}

/// Outbound `end-of-stream` control frame, sent once recording stops.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EndOfStream {
    pub event: &'static str,
}

impl Default for EndOfStream {
    fn default() -> Self {
        Self {
            event: "end-of-stream",
        }
    }
}

/// Inbound JSON text frames from the server, dispatched by `event`
/// (or by the presence of `text` for a transcription result).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ServerMessage {
    /// `{"text": …, …}` — a transcription result.
    Transcript { text: String },
    /// Any `{"event": …, …}` frame — greeting, authentication, status, or
    /// error. Extra fields are preserved via `serde_json::Value` so callers
    /// can read `code`, `cid`, `message`, etc. without a dedicated struct
    /// per event.
    Event {
        event: String,
        #[serde(flatten)]
        fields: serde_json::Map<String, serde_json::Value>,
    },
}

impl ServerMessage {
    /// Parse a raw JSON text frame.
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// The `event` name, if this is an `Event` variant.
    pub fn event_name(&self) -> Option<&str> {
        match self {
            ServerMessage::Event { event, .. } => Some(event.as_str()),
            ServerMessage::Transcript { .. } => None,
        }
    }

    /// The numeric `code` field, if present (used for error frames).
    pub fn code(&self) -> Option<i64> {
        match self {
            ServerMessage::Event { fields, .. } => fields.get("code").and_then(|v| v.as_i64()),
            ServerMessage::Transcript { .. } => None,
        }
    }

    /// The `message` field, if present.
    pub fn message(&self) -> Option<&str> {
        match self {
            ServerMessage::Event { fields, .. } => fields.get("message").and_then(|v| v.as_str()),
            ServerMessage::Transcript { .. } => None,
        }
    }

    /// The connection id (`cid`) field, if present.
    pub fn cid(&self) -> Option<&str> {
        match self {
            ServerMessage::Event { fields, .. } => fields.get("cid").and_then(|v| v.as_str()),
            ServerMessage::Transcript { .. } => None,
        }
    }

    /// The transcript text, if this is a `Transcript` variant.
    pub fn text(&self) -> Option<&str> {
        match self {
            ServerMessage::Transcript { text } => Some(text.as_str()),
            ServerMessage::Event { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_payload_has_exact_shape() {
        let hello = HelloPayload::new("secret".into(), "1.0.0", false);
        let json = serde_json::to_value(&hello).unwrap();
        assert_eq!(json["event"], "hello");
        assert_eq!(json["client"], CLIENT_ID);
        assert_eq!(json["version"], "1.0.0");
        assert_eq!(json["auth_type"], "api_key");
        assert_eq!(json["token"], "secret");
        assert_eq!(json["incognito"], false);
    }

    #[test]
    fn end_of_stream_has_exact_shape() {
        let eos = EndOfStream::default();
        let json = serde_json::to_value(eos).unwrap();
        assert_eq!(json, serde_json::json!({"event": "end-of-stream"}));
    }

    #[test]
    fn parses_authenticated_event() {
        let msg = ServerMessage::parse(r#"{"event":"authenticated","cid":"abc123"}"#).unwrap();
        assert_eq!(msg.event_name(), Some("authenticated"));
        assert_eq!(msg.cid(), Some("abc123"));
    }

    #[test]
    fn parses_error_event_with_code() {
        let msg = ServerMessage::parse(r#"{"event":"error","code":401,"message":"bad key"}"#)
            .unwrap();
        assert_eq!(msg.event_name(), Some("error"));
        assert_eq!(msg.code(), Some(401));
        assert_eq!(msg.message(), Some("bad key"));
    }

    #[test]
    fn parses_transcript_result() {
        let msg = ServerMessage::parse(r#"{"text":"hello world"}"#).unwrap();
        match msg {
            ServerMessage::Transcript { text } => assert_eq!(text, "hello world"),
            ServerMessage::Event { .. } => panic!("expected Transcript variant"),
        }
    }

    #[test]
    fn parses_status_event() {
        let msg = ServerMessage::parse(r#"{"event":"status","message":"warming up"}"#).unwrap();
        assert_eq!(msg.event_name(), Some("status"));
        assert_eq!(msg.message(), Some("warming up"));
    }
}
