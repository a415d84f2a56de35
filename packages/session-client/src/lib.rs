//! Real-time session synchronization client
//!
//! Keeps a local player loosely in sync with other participants
//! listening to the same track. The engine:
//!
//! - Owns one transport connection and its health (connect timeout,
//!   inactivity reaping, reconnect backoff)
//! - Translates local player events into ordered wire messages via the
//!   session state machine
//! - Buffers outbound events while the transport is down and flushes
//!   them in order on reconnect
//! - Tracks remote listeners' positions and play state
//! - Publishes notifications to collaborators through an injected
//!   event publisher
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use listenalong_session_client::{
//!     BroadcastPublisher, StaticTokenProvider, SyncClient, SyncConfig, WsConnector,
//! };
//!
//! let config = SyncConfig::new("https://music.example.com".parse()?);
//! let publisher = Arc::new(BroadcastPublisher::default());
//! let mut events = publisher.subscribe();
//!
//! let client = SyncClient::spawn(
//!     config,
//!     Arc::new(WsConnector),
//!     Arc::new(StaticTokenProvider::new(token)),
//!     publisher,
//! );
//!
//! client.play(track_id, 0.0)?;
//! ```

mod auth;
mod config;
mod connection;
mod error;
mod publisher;
mod transport;

pub use auth::{SharedTokenProvider, StaticTokenProvider, TokenProvider};
pub use config::SyncConfig;
pub use connection::{ConnectionState, SyncClient};
pub use error::{ClientError, ClientResult};
pub use publisher::{BroadcastPublisher, EventPublisher};
pub use transport::{
    CloseReason, Connector, Frame, TransportError, TransportPair, TransportSink, TransportStream,
    WsConnector,
};

pub use listenalong_session_protocol as protocol;
