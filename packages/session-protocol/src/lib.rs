//! Protocol layer for listen-along session synchronization
//!
//! This crate contains the pure, transport-agnostic pieces of the
//! session protocol:
//!
//! - The wire message types and JSON codec
//! - The session state machine (local player event -> wire messages)
//! - The remote listener registry
//! - The bounded outbound event queue
//!
//! Nothing in here performs I/O; the connection lifecycle lives in
//! `listenalong-session-client`.

mod error;
mod events;
mod listeners;
mod messages;
mod queue;
mod session;

pub use error::{ProtocolError, ProtocolResult};
pub use events::{PlayerEvent, SessionEvent};
pub use listeners::{Listener, ListenerRegistry, PlaybackStatus};
pub use messages::{decode, encode, ClientMessage, ServerMessage};
pub use queue::{EventQueue, QueuedEvent, DEFAULT_QUEUE_CAPACITY};
pub use session::{SessionManager, SessionState, DEFAULT_PROGRESS_THRESHOLD};
