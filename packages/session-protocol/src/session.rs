//! Session protocol state machine
//!
//! Deterministic translation of local player events into ordered wire
//! messages. Message order is observable by the server, so every
//! transition produces its messages in a fixed sequence:
//!
//! - First play while inactive: `join_session`, then `get_listeners`
//! - Play on a different track: `leave_session`, `join_session`,
//!   `get_listeners`
//! - Play on the same track: a single `play`
//! - After a close, every event except a fresh `Play` is dropped

use crate::error::{ProtocolError, ProtocolResult};
use crate::events::PlayerEvent;
use crate::messages::ClientMessage;

/// Minimum position delta (in position units) before a progress report
/// goes out on the wire
pub const DEFAULT_PROGRESS_THRESHOLD: f64 = 1.0;

/// Logical session state: which track and session the client is in
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub session_id: Option<String>,
    pub music_id: Option<u64>,
    pub is_active: bool,
    pub is_closed: bool,
    pub username: Option<String>,
    /// Last position sent to the server (not the player's live position)
    pub position: Option<f64>,
}

impl SessionState {
    /// Guard for operations that require an active session
    ///
    /// Callers issuing `pause`, `resume`, `seek`, or `progress` directly
    /// must check this first; failing it is a contract violation, not a
    /// transient fault.
    pub fn ensure_active(&self) -> ProtocolResult<()> {
        if self.is_active {
            Ok(())
        } else {
            Err(ProtocolError::NotInSession)
        }
    }
}

/// The protocol state machine
///
/// `handle_event` is a pure function of the current state and the
/// incoming event; it mutates the state and returns the wire messages
/// to send, in order.
#[derive(Debug, Clone)]
pub struct SessionManager {
    state: SessionState,
    progress_threshold: f64,
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_THRESHOLD)
    }
}

impl SessionManager {
    pub fn new(progress_threshold: f64) -> Self {
        Self {
            state: SessionState::default(),
            progress_threshold,
        }
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn set_username(&mut self, username: impl Into<String>) {
        self.state.username = Some(username.into());
    }

    fn join(&mut self, music_id: u64, position: f64) {
        self.state.session_id = Some("default".to_string());
        self.state.music_id = Some(music_id);
        self.state.is_active = true;
        self.state.is_closed = false;
        self.state.position = Some(position);
        tracing::debug!(music_id, position, "joined session");
    }

    fn leave(&mut self) {
        self.state.session_id = None;
        self.state.music_id = None;
        self.state.is_active = false;
        self.state.is_closed = true;
        self.state.position = None;
        tracing::debug!("left session");
    }

    /// Translate a local player event into outbound wire messages
    ///
    /// `now_ms` is the current Unix timestamp in milliseconds; it is
    /// passed in rather than read from the clock so the transition is
    /// deterministic.
    pub fn handle_event(&mut self, event: &PlayerEvent, now_ms: i64) -> Vec<ClientMessage> {
        // While closed, only a fresh play may re-enter the machine.
        if self.state.is_closed && !matches!(event, PlayerEvent::Play { .. }) {
            tracing::debug!(?event, "session closed, dropping event");
            return Vec::new();
        }

        match *event {
            PlayerEvent::Play { music_id, position } => {
                self.handle_play(music_id, position, now_ms)
            }

            PlayerEvent::Pause => {
                if !self.state.is_active {
                    return Vec::new();
                }
                vec![ClientMessage::Pause {}]
            }

            PlayerEvent::Resume => {
                if !self.state.is_active {
                    return Vec::new();
                }
                vec![ClientMessage::Resume {}]
            }

            PlayerEvent::Seek { position } => {
                if !self.state.is_active {
                    return Vec::new();
                }
                self.state.position = Some(position);
                vec![ClientMessage::Seek { position }]
            }

            PlayerEvent::Progress { position } => {
                if !self.state.is_active {
                    return Vec::new();
                }
                let last = self.state.position.unwrap_or(0.0);
                if (position - last).abs() <= self.progress_threshold {
                    // Bandwidth guard: timeupdate callbacks fire
                    // continuously; only meaningful movement goes out.
                    return Vec::new();
                }
                self.state.position = Some(position);
                vec![ClientMessage::Progress { position }]
            }

            PlayerEvent::Close => {
                if !self.state.is_active {
                    return Vec::new();
                }
                self.leave();
                vec![ClientMessage::LeaveSession {}]
            }
        }
    }

    fn handle_play(&mut self, music_id: u64, position: f64, now_ms: i64) -> Vec<ClientMessage> {
        match self.state.music_id {
            // Same track: playback restarted, announce it.
            Some(current) if current == music_id => {
                self.state.position = Some(position);
                vec![ClientMessage::Play {
                    music_id,
                    timestamp: now_ms,
                }]
            }

            // Track switch: leave the old session before joining the new
            // one so the server never sees the client in two at once.
            Some(_) => {
                self.leave();
                self.join(music_id, position);
                vec![
                    ClientMessage::LeaveSession {},
                    ClientMessage::JoinSession { music_id, position },
                    ClientMessage::GetListeners {},
                ]
            }

            // Fresh join (first play, or a play after a close).
            None => {
                self.join(music_id, position);
                vec![
                    ClientMessage::JoinSession { music_id, position },
                    ClientMessage::GetListeners {},
                ]
            }
        }
    }
}
