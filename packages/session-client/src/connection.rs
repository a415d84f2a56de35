//! Connection lifecycle management
//!
//! A single actor task owns the transport handle, the outbound event
//! queue, the session state machine, and the listener registry. All
//! mutation happens inside the actor's select loop, so the protocol's
//! ordering guarantees hold without locks: messages for one local event
//! are never interleaved with another event's, and concurrent reconnect
//! triggers collapse into the single scheduled reconnect slot.
//!
//! [`SyncClient`] is the cheap, clone-able handle the rest of the
//! application talks to.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{interval, sleep_until, timeout, Instant, MissedTickBehavior};

use listenalong_session_protocol::{
    decode, encode, ClientMessage, EventQueue, Listener, ListenerRegistry, PlayerEvent,
    ServerMessage, SessionEvent, SessionManager, SessionState,
};

use crate::auth::TokenProvider;
use crate::config::SyncConfig;
use crate::error::{ClientError, ClientResult};
use crate::publisher::EventPublisher;
use crate::transport::{CloseReason, Connector, Frame, TransportError, TransportSink,
    TransportStream};

/// Transport lifecycle state
///
/// Only one transport handle is ever live; entering `Connecting` while
/// already `Connecting`/`Connected` is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Commands from the handle to the actor
enum Command {
    Player(PlayerEvent),
    Connect(oneshot::Sender<ClientResult<()>>),
    Chat {
        text: String,
        reply: oneshot::Sender<ClientResult<()>>,
    },
    Listeners(oneshot::Sender<Vec<Listener>>),
    SetUsername(String),
    Disconnect,
}

/// Messages from the transport read loop to the actor
///
/// Each live transport carries a generation number; frames from a
/// superseded transport are discarded.
enum Inbound {
    Frame { generation: u64, text: String },
    Failed { generation: u64, error: TransportError },
    Closed { generation: u64, clean: bool },
}

/// Handle to a running session synchronization client
#[derive(Clone)]
pub struct SyncClient {
    commands: mpsc::UnboundedSender<Command>,
    session: watch::Receiver<SessionState>,
    connection: watch::Receiver<ConnectionState>,
}

impl SyncClient {
    /// Spawn the client actor and return its handle
    pub fn spawn(
        config: SyncConfig,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenProvider>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = watch::channel(SessionState::default());
        let (connection_tx, connection_rx) = watch::channel(ConnectionState::default());

        let (connection, inbound_rx) =
            Connection::new(config, connector, tokens, publisher, session_tx, connection_tx);
        tokio::spawn(connection.run(command_rx, inbound_rx));

        Self {
            commands: command_tx,
            session: session_rx,
            connection: connection_rx,
        }
    }

    /// Report that playback started (or restarted) for a track
    pub fn play(&self, music_id: u64, position: f64) -> ClientResult<()> {
        self.command(Command::Player(PlayerEvent::Play { music_id, position }))
    }

    /// Report a pause; requires an active session
    pub fn pause(&self) -> ClientResult<()> {
        self.guard()?;
        self.command(Command::Player(PlayerEvent::Pause))
    }

    /// Report a resume; requires an active session
    pub fn resume(&self) -> ClientResult<()> {
        self.guard()?;
        self.command(Command::Player(PlayerEvent::Resume))
    }

    /// Report a seek; requires an active session
    pub fn seek(&self, position: f64) -> ClientResult<()> {
        self.guard()?;
        self.command(Command::Player(PlayerEvent::Seek { position }))
    }

    /// Report playback progress; requires an active session
    pub fn progress(&self, position: f64) -> ClientResult<()> {
        self.guard()?;
        self.command(Command::Player(PlayerEvent::Progress { position }))
    }

    /// Leave the current session
    pub fn close_session(&self) -> ClientResult<()> {
        self.command(Command::Player(PlayerEvent::Close))
    }

    /// Open the transport; idempotent while connecting or connected
    pub async fn connect(&self) -> ClientResult<()> {
        let (reply, result) = oneshot::channel();
        self.command(Command::Connect(reply))?;
        result.await.map_err(|_| ClientError::Closed)?
    }

    /// Send a chat message; requires an open connection and an active
    /// session
    pub async fn chat(&self, text: impl Into<String>) -> ClientResult<()> {
        let (reply, result) = oneshot::channel();
        self.command(Command::Chat {
            text: text.into(),
            reply,
        })?;
        result.await.map_err(|_| ClientError::Closed)?
    }

    /// Snapshot of the remote listeners, sorted by username
    pub async fn listeners(&self) -> ClientResult<Vec<Listener>> {
        let (reply, result) = oneshot::channel();
        self.command(Command::Listeners(reply))?;
        result.await.map_err(|_| ClientError::Closed)
    }

    /// Record the local username on the session state
    pub fn set_username(&self, username: impl Into<String>) -> ClientResult<()> {
        self.command(Command::SetUsername(username.into()))
    }

    /// Tear down the transport and cancel all pending timers; safe to
    /// call repeatedly
    pub fn disconnect(&self) -> ClientResult<()> {
        self.command(Command::Disconnect)
    }

    /// Current logical session state
    pub fn session_state(&self) -> SessionState {
        self.session.borrow().clone()
    }

    /// Current transport lifecycle state
    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    fn guard(&self) -> ClientResult<()> {
        self.session.borrow().ensure_active()?;
        Ok(())
    }

    fn command(&self, command: Command) -> ClientResult<()> {
        self.commands.send(command).map_err(|_| ClientError::Closed)
    }
}

struct Connection {
    config: SyncConfig,
    connector: Arc<dyn Connector>,
    tokens: Arc<dyn TokenProvider>,
    publisher: Arc<dyn EventPublisher>,

    state: ConnectionState,
    sink: Option<Box<dyn TransportSink>>,
    /// Incremented whenever the live transport changes; stale readers
    /// are ignored by generation mismatch
    generation: u64,
    inbound_tx: mpsc::UnboundedSender<Inbound>,

    session: SessionManager,
    listeners: ListenerRegistry,
    queue: EventQueue,

    last_activity: Instant,
    /// Single scheduled-reconnect slot; `None` means no reconnect is
    /// pending, and `disconnect()` clears it
    reconnect_at: Option<Instant>,
    draining: bool,

    session_watch: watch::Sender<SessionState>,
    connection_watch: watch::Sender<ConnectionState>,
}

impl Connection {
    fn new(
        config: SyncConfig,
        connector: Arc<dyn Connector>,
        tokens: Arc<dyn TokenProvider>,
        publisher: Arc<dyn EventPublisher>,
        session_watch: watch::Sender<SessionState>,
        connection_watch: watch::Sender<ConnectionState>,
    ) -> (Self, mpsc::UnboundedReceiver<Inbound>) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let connection = Self {
            session: SessionManager::new(config.progress_threshold),
            queue: EventQueue::new(config.queue_capacity),
            config,
            connector,
            tokens,
            publisher,
            state: ConnectionState::Disconnected,
            sink: None,
            generation: 0,
            inbound_tx,
            listeners: ListenerRegistry::new(),
            last_activity: Instant::now(),
            reconnect_at: None,
            draining: false,
            session_watch,
            connection_watch,
        };
        (connection, inbound_rx)
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut inbound: mpsc::UnboundedReceiver<Inbound>,
    ) {
        let mut inactivity = interval(self.config.inactivity_check_interval);
        inactivity.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let reconnect_at = self.reconnect_at;
            tokio::select! {
                command = commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        // All handles dropped: deterministic teardown.
                        None => {
                            self.teardown().await;
                            return;
                        }
                    }
                }

                Some(message) = inbound.recv() => {
                    self.handle_inbound(message);
                }

                _ = inactivity.tick() => {
                    self.check_inactivity().await;
                }

                _ = async {
                    match reconnect_at {
                        Some(at) => sleep_until(at).await,
                        None => std::future::pending().await,
                    }
                } => {
                    self.reconnect_at = None;
                    tracing::info!("reconnect backoff elapsed");
                    let _ = self.connect().await;
                }
            }
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Player(event) => self.handle_player_event(event).await,
            Command::Connect(reply) => {
                let _ = reply.send(self.connect().await);
            }
            Command::Chat { text, reply } => {
                let _ = reply.send(self.send_chat(text).await);
            }
            Command::Listeners(reply) => {
                let _ = reply.send(self.listeners.snapshot());
            }
            Command::SetUsername(username) => {
                self.session.set_username(username);
                self.publish_session_state();
            }
            Command::Disconnect => self.teardown().await,
        }
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    /// Open the transport; no-op while `Connecting` or `Connected`
    async fn connect(&mut self) -> ClientResult<()> {
        if matches!(
            self.state,
            ConnectionState::Connecting | ConnectionState::Connected
        ) {
            tracing::debug!(state = ?self.state, "connect skipped");
            return Ok(());
        }
        self.set_state(ConnectionState::Connecting);

        let Some(token) = self.tokens.bearer_token() else {
            // Not a transient fault: no reconnect until the caller
            // fixes credentials.
            self.set_state(ConnectionState::Disconnected);
            self.notify_error("no authentication token available");
            return Err(ClientError::NoCredentials);
        };

        let url = match self.config.listen_url(&token) {
            Ok(url) => url,
            Err(error) => {
                self.set_state(ConnectionState::Disconnected);
                self.notify_error(&format!("invalid listen endpoint: {error}"));
                return Err(error);
            }
        };

        match timeout(self.config.connect_timeout, self.connector.connect(&url)).await {
            Ok(Ok((sink, stream))) => {
                self.generation = self.generation.wrapping_add(1);
                tokio::spawn(read_loop(stream, self.inbound_tx.clone(), self.generation));
                self.sink = Some(sink);
                self.set_state(ConnectionState::Connected);
                self.touch();
                tracing::info!("connected");
                self.publisher.publish(SessionEvent::Connected);
                self.drain_queue().await;
                Ok(())
            }
            Ok(Err(error)) => {
                tracing::warn!(%error, "connection failed");
                self.set_state(ConnectionState::Error);
                self.notify_error(&format!("connection failed: {error}"));
                self.schedule_reconnect();
                Err(error.into())
            }
            Err(_elapsed) => {
                tracing::warn!(
                    timeout_ms = self.config.connect_timeout.as_millis() as u64,
                    "connection attempt timed out"
                );
                self.set_state(ConnectionState::Error);
                self.notify_error("connection attempt timed out");
                self.schedule_reconnect();
                Err(ClientError::ConnectTimeout)
            }
        }
    }

    /// Deterministic teardown: cancel pending reconnects and timers,
    /// close the transport with a normal code
    async fn teardown(&mut self) {
        self.reconnect_at = None;
        let had_transport = self.sink.is_some();
        self.close_transport(CloseReason::Normal).await;
        self.set_state(ConnectionState::Disconnected);
        if had_transport {
            tracing::info!("disconnected");
            self.publisher.publish(SessionEvent::Disconnected { clean: true });
        }
    }

    /// Close and invalidate the live transport, if any
    async fn close_transport(&mut self, reason: CloseReason) {
        if let Some(mut sink) = self.sink.take() {
            if let Err(error) = sink.close(reason).await {
                tracing::debug!(%error, "error closing transport");
            }
        }
        // Invalidate the old read loop.
        self.generation = self.generation.wrapping_add(1);
    }

    async fn check_inactivity(&mut self) {
        if self.state != ConnectionState::Connected {
            return;
        }
        if self.last_activity.elapsed() >= self.config.inactivity_timeout {
            tracing::info!(
                idle_ms = self.last_activity.elapsed().as_millis() as u64,
                "closing idle connection"
            );
            self.close_transport(CloseReason::Inactivity).await;
            self.set_state(ConnectionState::Disconnected);
            self.publisher.publish(SessionEvent::Disconnected { clean: true });
        }
    }

    fn schedule_reconnect(&mut self) {
        // Concurrent triggers collapse into the one pending slot.
        if self.reconnect_at.is_none() {
            self.reconnect_at = Some(Instant::now() + self.config.reconnect_backoff);
            tracing::debug!(
                backoff_ms = self.config.reconnect_backoff.as_millis() as u64,
                "reconnect scheduled"
            );
        }
    }

    /// A send failure is a transport failure: drop the handle and let
    /// the backoff timer drive reconnection
    fn transport_failure(&mut self) {
        self.sink = None;
        self.generation = self.generation.wrapping_add(1);
        self.set_state(ConnectionState::Error);
        self.schedule_reconnect();
    }

    // =========================================================================
    // Outbound path
    // =========================================================================

    async fn handle_player_event(&mut self, event: PlayerEvent) {
        if self.state == ConnectionState::Connected {
            self.dispatch_event(event).await;
        } else {
            tracing::debug!(?event, "transport not ready, queueing event");
            self.queue.enqueue(event);
            // Queue first, then (idempotently) kick off a connect;
            // errors were already published as notifications.
            let _ = self.connect().await;
        }
    }

    /// Translate one event and transmit its messages in table order
    ///
    /// Returns false when delivery failed; the event has then been
    /// re-queued and reconnection is underway.
    async fn dispatch_event(&mut self, event: PlayerEvent) -> bool {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let messages = self.session.handle_event(&event, now_ms);
        self.publish_session_state();

        for message in &messages {
            if let Err(error) = self.send_with_retry(message).await {
                self.notify_error(&format!(
                    "failed to deliver {} message: {error}",
                    message.tag()
                ));
                self.queue.enqueue(event);
                self.transport_failure();
                return false;
            }
        }
        true
    }

    /// Send one wire message with bounded exponential-backoff retries
    async fn send_with_retry(&mut self, message: &ClientMessage) -> ClientResult<()> {
        let text = encode(message)?;
        let mut attempts = 0;
        loop {
            let Some(sink) = self.sink.as_mut() else {
                return Err(ClientError::NotConnected);
            };
            match sink.send(text.clone()).await {
                Ok(()) => {
                    self.touch();
                    return Ok(());
                }
                Err(error) => {
                    attempts += 1;
                    if attempts >= self.config.send_retry_max {
                        tracing::warn!(%error, attempts, tag = message.tag(), "giving up on delivery");
                        return Err(ClientError::SendFailure { attempts });
                    }
                    let delay = self.config.send_retry_base_delay * 2u32.pow(attempts - 1);
                    tracing::warn!(
                        %error,
                        attempts,
                        delay_ms = delay.as_millis() as u64,
                        "send failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Flush queued events in FIFO order while the transport holds
    async fn drain_queue(&mut self) {
        if self.draining {
            return;
        }
        self.draining = true;
        while self.state == ConnectionState::Connected {
            let Some(item) = self.queue.dequeue() else {
                break;
            };
            if !self.dispatch_event(item.event).await {
                // Remaining items stay queued, in order.
                break;
            }
        }
        self.draining = false;
    }

    async fn send_chat(&mut self, text: String) -> ClientResult<()> {
        if self.state != ConnectionState::Connected {
            return Err(ClientError::NotConnected);
        }
        self.session.state().ensure_active()?;

        let result = self
            .send_with_retry(&ClientMessage::ChatMessage { text })
            .await;
        if matches!(result, Err(ClientError::SendFailure { .. })) {
            self.transport_failure();
        }
        result
    }

    // =========================================================================
    // Inbound path
    // =========================================================================

    fn handle_inbound(&mut self, message: Inbound) {
        match message {
            Inbound::Frame { generation, text } if generation == self.generation => {
                self.touch();
                self.handle_frame(&text);
            }

            Inbound::Failed { generation, error } if generation == self.generation => {
                tracing::warn!(%error, "transport error");
                self.set_state(ConnectionState::Error);
                self.notify_error(&format!("transport error: {error}"));
                // The read loop reports the close next; that drives
                // reconnection.
            }

            Inbound::Closed { generation, clean } if generation == self.generation => {
                self.sink = None;
                self.generation = self.generation.wrapping_add(1);
                self.set_state(ConnectionState::Disconnected);
                self.publisher.publish(SessionEvent::Disconnected { clean });
                if !clean {
                    tracing::warn!("connection closed abnormally");
                    self.schedule_reconnect();
                }
            }

            // Frames from a superseded transport.
            _ => {}
        }
    }

    fn handle_frame(&mut self, text: &str) {
        match decode(text) {
            Ok(message) => self.handle_server_message(message),
            Err(error) => {
                tracing::warn!(%error, "dropping unparseable frame");
                self.notify_error(&format!("unparseable frame: {error}"));
            }
        }
    }

    fn handle_server_message(&mut self, message: ServerMessage) {
        use listenalong_session_protocol::PlaybackStatus;

        match message {
            ServerMessage::UserJoined { username, position } => {
                self.listeners.upsert(&username, position);
                self.publisher
                    .publish(SessionEvent::UserJoined { username, position });
            }
            ServerMessage::UserLeft { username } => {
                self.listeners.remove(&username);
                self.publisher.publish(SessionEvent::UserLeft { username });
            }
            ServerMessage::Progress { username, position } => {
                self.listeners.update_position(&username, position);
                self.publisher
                    .publish(SessionEvent::ProgressUpdate { username, position });
            }
            ServerMessage::Seek { username, position } => {
                self.listeners.update_position(&username, position);
                self.publisher
                    .publish(SessionEvent::SeekUpdate { username, position });
            }
            ServerMessage::Pause { username } => {
                self.listeners.update_state(&username, PlaybackStatus::Paused);
                self.publisher.publish(SessionEvent::PauseUpdate { username });
            }
            ServerMessage::Resume { username } => {
                self.listeners
                    .update_state(&username, PlaybackStatus::Playing);
                self.publisher.publish(SessionEvent::ResumeUpdate { username });
            }
            ServerMessage::CurrentListeners { listeners } => {
                self.listeners.replace(listeners.clone());
                self.publisher
                    .publish(SessionEvent::ListenersSnapshot { listeners });
            }
            ServerMessage::Error { message } => {
                tracing::warn!(message, "server reported an error");
                self.notify_error(&message);
            }
        }
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::debug!(from = ?self.state, to = ?state, "connection state change");
            self.state = state;
            self.connection_watch.send_replace(state);
        }
    }

    fn publish_session_state(&mut self) {
        self.session_watch.send_replace(self.session.state().clone());
    }

    fn notify_error(&self, message: &str) {
        self.publisher.publish(SessionEvent::Error {
            message: message.to_string(),
        });
    }
}

/// Forward frames from one transport's read half to the actor
///
/// Ends when the transport closes or the actor goes away; a trailing
/// `Closed` message lets the actor decide on reconnection.
async fn read_loop(
    mut stream: Box<dyn TransportStream>,
    inbound: mpsc::UnboundedSender<Inbound>,
    generation: u64,
) {
    loop {
        match stream.next_frame().await {
            Some(Ok(Frame::Text(text))) => {
                if inbound.send(Inbound::Frame { generation, text }).is_err() {
                    return;
                }
            }
            Some(Ok(Frame::Close { clean })) => {
                let _ = inbound.send(Inbound::Closed { generation, clean });
                return;
            }
            Some(Err(error)) => {
                let _ = inbound.send(Inbound::Failed { generation, error });
                let _ = inbound.send(Inbound::Closed {
                    generation,
                    clean: false,
                });
                return;
            }
            None => {
                let _ = inbound.send(Inbound::Closed {
                    generation,
                    clean: false,
                });
                return;
            }
        }
    }
}
