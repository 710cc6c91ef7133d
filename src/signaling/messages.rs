//! Wire envelope of the signaling channel.
//!
//! Every frame is a JSON object discriminated by `type`. Fields use the
//! camelCase names of the deployed clients (`sessionId`, `clientId`).

use log::trace;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::session_management::connection::Role;

/// Target of a `signal` frame meaning "the session's candidate".
pub const CANDIDATE_TARGET: &str = "candidate";

/// Frames sent by clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    Join {
        session_id: String,
        role: Role,
    },
    /// Sent by a viewer once it can receive media.
    Ready {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        role: Option<Role>,
    },
    /// Opaque SDP/ICE payload. A missing `to` or `"candidate"` targets the
    /// candidate; anything else is a viewer id.
    Signal {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<String>,
        signal: Value,
    },
    Event {
        #[serde(default)]
        event: Value,
    },
}

/// Frames sent by the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome { client_id: String },
    ViewerReady { from: String },
    ReadyAck,
    CandidateLeft { from: String },
    ViewerDisconnected { from: String },
    Signal { from: String, signal: Value },
    Event { from: String, event: Value },
}

impl ClientMessage {
    /// Parses one text frame, `None` for anything malformed or unknown.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(msg) => Some(msg),
            Err(e) => {
                trace!("unparseable client frame: {}", e);
                None
            }
        }
    }

    pub fn to_json(&self) -> String {
        // Serializing these variants cannot fail: all keys are strings.
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl ServerMessage {
    pub fn parse(text: &str) -> Option<Self> {
        serde_json::from_str(text).ok()
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_client_frames() {
        assert_eq!(
            ClientMessage::parse(r#"{"type":"join","sessionId":"S","role":"candidate"}"#),
            Some(ClientMessage::Join {
                session_id: String::from("S"),
                role: Role::Candidate,
            })
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"join","sessionId":"S","role":"interviewer"}"#),
            Some(ClientMessage::Join {
                session_id: String::from("S"),
                role: Role::Viewer,
            })
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"ready"}"#),
            Some(ClientMessage::Ready {
                session_id: None,
                role: None,
            })
        );
        assert_eq!(
            ClientMessage::parse(r#"{"type":"signal","signal":{"answer":{"sdp":"x"}}}"#),
            Some(ClientMessage::Signal {
                to: None,
                signal: json!({"answer": {"sdp": "x"}}),
            })
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        for frame in [
            "not json",
            r#"{"type":"teleport"}"#,
            r#"{"type":"join","sessionId":"S"}"#,
            r#"{"type":"join","sessionId":"S","role":"admin"}"#,
            r#"{"sessionId":"S"}"#,
        ] {
            assert_eq!(ClientMessage::parse(frame), None, "{frame}");
        }
    }

    #[test]
    fn server_frames_use_wire_names() {
        let welcome = serde_json::to_value(ServerMessage::Welcome {
            client_id: String::from("c1"),
        })
        .unwrap();
        assert_eq!(welcome, json!({"type": "welcome", "clientId": "c1"}));

        let ack = serde_json::to_value(ServerMessage::ReadyAck).unwrap();
        assert_eq!(ack, json!({"type": "ready-ack"}));

        let ready = ServerMessage::ViewerReady {
            from: String::from("v1"),
        };
        assert_eq!(
            ServerMessage::parse(&ready.to_json()),
            Some(ready.clone())
        );
        assert_eq!(
            serde_json::to_value(&ready).unwrap(),
            json!({"type": "viewer-ready", "from": "v1"})
        );
    }
}
