//! Wire message types for session synchronization
//!
//! Messages travel as JSON with a two-key envelope: `t` carries the
//! message tag and `p` the payload object. The envelope keys are part
//! of the server contract; payload fields use full, unambiguous names.

use serde::{Deserialize, Serialize};

use crate::error::{ProtocolError, ProtocolResult};
use crate::listeners::Listener;

// =============================================================================
// Client -> Server Messages
// =============================================================================

/// Messages sent from client to server
///
/// Every variant is self-contained: once constructed it holds no
/// references into mutable state, so it is safe to retry or re-queue
/// verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", content = "p", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join (or rejoin) the session for a track
    JoinSession { music_id: u64, position: f64 },

    /// Leave the current session
    LeaveSession {},

    /// Playback (re)started for the track already joined
    Play { music_id: u64, timestamp: i64 },

    /// Playback paused
    Pause {},

    /// Playback resumed
    Resume {},

    /// Seeked to a new position
    Seek { position: f64 },

    /// Periodic position report (threshold-filtered by the sender)
    Progress { position: f64 },

    /// Request the current listener list
    GetListeners {},

    /// Chat message to the session
    ChatMessage { text: String },
}

impl ClientMessage {
    /// The wire tag of this message, for logging
    pub fn tag(&self) -> &'static str {
        match self {
            Self::JoinSession { .. } => "join_session",
            Self::LeaveSession {} => "leave_session",
            Self::Play { .. } => "play",
            Self::Pause {} => "pause",
            Self::Resume {} => "resume",
            Self::Seek { .. } => "seek",
            Self::Progress { .. } => "progress",
            Self::GetListeners {} => "get_listeners",
            Self::ChatMessage { .. } => "chat_message",
        }
    }
}

// =============================================================================
// Server -> Client Messages
// =============================================================================

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "t", content = "p", rename_all = "snake_case")]
pub enum ServerMessage {
    /// A participant joined the session
    UserJoined {
        username: String,
        #[serde(default)]
        position: f64,
    },

    /// A participant left the session
    UserLeft { username: String },

    /// A participant reported playback progress
    Progress { username: String, position: f64 },

    /// A participant seeked to a new position
    Seek { username: String, position: f64 },

    /// A participant paused
    Pause { username: String },

    /// A participant resumed
    Resume { username: String },

    /// Full listener list, replacing any prior state
    CurrentListeners { listeners: Vec<Listener> },

    /// Server-reported error
    Error { message: String },
}

/// Encode an outbound message to its JSON wire form
pub fn encode(message: &ClientMessage) -> ProtocolResult<String> {
    serde_json::to_string(message).map_err(ProtocolError::Parse)
}

/// Decode an inbound frame
///
/// Unrecognized tags and malformed payloads both surface as
/// [`ProtocolError::Parse`]; the caller drops the frame and emits a
/// notification.
pub fn decode(text: &str) -> ProtocolResult<ServerMessage> {
    serde_json::from_str(text).map_err(ProtocolError::Parse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::PlaybackStatus;
    use assert_matches::assert_matches;

    #[test]
    fn test_outbound_envelope_shape() {
        let json = encode(&ClientMessage::JoinSession {
            music_id: 42,
            position: 3.5,
        })
        .unwrap();

        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["t"], "join_session");
        assert_eq!(value["p"]["music_id"], 42);
        assert_eq!(value["p"]["position"], 3.5);
    }

    #[test]
    fn test_empty_payload_messages_carry_payload_object() {
        for (message, tag) in [
            (ClientMessage::LeaveSession {}, "leave_session"),
            (ClientMessage::Pause {}, "pause"),
            (ClientMessage::Resume {}, "resume"),
            (ClientMessage::GetListeners {}, "get_listeners"),
        ] {
            let value: serde_json::Value =
                serde_json::from_str(&encode(&message).unwrap()).unwrap();
            assert_eq!(value["t"], tag);
            assert!(value["p"].is_object());
        }
    }

    #[test]
    fn test_chat_message_roundtrip() {
        let message = ClientMessage::ChatMessage {
            text: "nice track".into(),
        };
        let json = encode(&message).unwrap();
        assert!(json.contains("chat_message"));

        let parsed: ClientMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, message);
    }

    #[test]
    fn test_decode_user_joined() {
        let message = decode(r#"{"t":"user_joined","p":{"username":"alice","position":12.0}}"#)
            .unwrap();
        assert_matches!(
            message,
            ServerMessage::UserJoined { ref username, position } if username == "alice" && position == 12.0
        );
    }

    #[test]
    fn test_decode_user_joined_without_position_defaults_to_zero() {
        let message = decode(r#"{"t":"user_joined","p":{"username":"bob"}}"#).unwrap();
        assert_matches!(
            message,
            ServerMessage::UserJoined { position, .. } if position == 0.0
        );
    }

    #[test]
    fn test_decode_current_listeners() {
        let message = decode(
            r#"{"t":"current_listeners","p":{"listeners":[
                {"username":"alice","position":10.0,"state":"playing"},
                {"username":"bob","position":5.0,"state":"paused"}
            ]}}"#,
        )
        .unwrap();

        let ServerMessage::CurrentListeners { listeners } = message else {
            panic!("expected current_listeners");
        };
        assert_eq!(listeners.len(), 2);
        assert_eq!(listeners[1].state, PlaybackStatus::Paused);
    }

    #[test]
    fn test_decode_unknown_tag_is_parse_error() {
        let result = decode(r#"{"t":"mystery","p":{}}"#);
        assert_matches!(result, Err(ProtocolError::Parse(_)));
    }

    #[test]
    fn test_decode_malformed_json_is_parse_error() {
        assert_matches!(decode("not json"), Err(ProtocolError::Parse(_)));
    }

    #[test]
    fn test_tags_match_wire_names() {
        assert_eq!(
            ClientMessage::Play {
                music_id: 1,
                timestamp: 0
            }
            .tag(),
            "play"
        );
        assert_eq!(ClientMessage::Seek { position: 1.0 }.tag(), "seek");
        assert_eq!(ClientMessage::Progress { position: 1.0 }.tag(), "progress");
    }
}
