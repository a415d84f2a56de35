//! Local player events and collaborator notifications
//!
//! `PlayerEvent` is what the local audio player feeds into the session
//! state machine. `SessionEvent` is what the engine publishes back out
//! to collaborators (UI, player) through the event publisher boundary.

use crate::listeners::Listener;

/// A transport event emitted by the local player
///
/// Consumed exactly once by the session state machine, which translates
/// it into zero or more wire messages.
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// Playback started (or restarted) for a track
    Play { music_id: u64, position: f64 },

    /// Playback paused
    Pause,

    /// Playback resumed after a pause
    Resume,

    /// The user scrubbed to a new position
    Seek { position: f64 },

    /// Periodic playback position report
    Progress { position: f64 },

    /// The player was closed; the session should be left
    Close,
}

/// Notification published to collaborators
///
/// Transient network faults are recovered internally and surfaced only
/// as advisory `Error` notifications; no dropped frame or exhausted
/// retry disappears silently.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The transport is open and authenticated
    Connected,

    /// The transport closed; `clean` is false for abnormal closures
    Disconnected { clean: bool },

    /// A remote participant joined the session
    UserJoined { username: String, position: f64 },

    /// A remote participant left the session
    UserLeft { username: String },

    /// A remote participant reported playback progress
    ProgressUpdate { username: String, position: f64 },

    /// A remote participant seeked to a new position
    SeekUpdate { username: String, position: f64 },

    /// A remote participant paused
    PauseUpdate { username: String },

    /// A remote participant resumed
    ResumeUpdate { username: String },

    /// The server replaced the full listener list
    ListenersSnapshot { listeners: Vec<Listener> },

    /// Advisory error notification (parse failure, exhausted retries,
    /// server-reported error, connection trouble)
    Error { message: String },
}
