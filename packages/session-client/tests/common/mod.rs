//! In-memory transport for exercising the client without a network

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use url::Url;

use listenalong_session_client::{
    CloseReason, Connector, Frame, TransportError, TransportPair, TransportSink, TransportStream,
};

/// How the next connection attempts behave
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectMode {
    /// Hand out a working in-memory transport
    Accept,
    /// Fail immediately
    Refuse,
    /// Never complete (exercises the connect timeout)
    Hang,
}

/// Scriptable fake network shared between the test and the connector
#[derive(Clone)]
pub struct MockNetwork {
    connect_calls: Arc<AtomicUsize>,
    mode: Arc<Mutex<ConnectMode>>,
    fail_sends: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<Vec<CloseReason>>>,
    server_tx: Arc<Mutex<Option<mpsc::UnboundedSender<Frame>>>>,
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            connect_calls: Arc::new(AtomicUsize::new(0)),
            mode: Arc::new(Mutex::new(ConnectMode::Accept)),
            fail_sends: Arc::new(AtomicUsize::new(0)),
            sent: Arc::new(Mutex::new(Vec::new())),
            closes: Arc::new(Mutex::new(Vec::new())),
            server_tx: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_mode(&self, mode: ConnectMode) {
        *self.mode.lock().unwrap() = mode;
    }

    /// Make the next `n` sends fail
    pub fn fail_next_sends(&self, n: usize) {
        self.fail_sends.store(n, Ordering::SeqCst);
    }

    pub fn connect_calls(&self) -> usize {
        self.connect_calls.load(Ordering::SeqCst)
    }

    /// Wire tags of every frame the client has sent, in order
    pub fn sent_tags(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| {
                let value: serde_json::Value = serde_json::from_str(text).unwrap();
                value["t"].as_str().unwrap().to_string()
            })
            .collect()
    }

    /// Every frame the client has sent, parsed
    pub fn sent_frames(&self) -> Vec<serde_json::Value> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|text| serde_json::from_str(text).unwrap())
            .collect()
    }

    pub fn close_reasons(&self) -> Vec<CloseReason> {
        self.closes.lock().unwrap().clone()
    }

    /// Deliver a raw frame to the client, as if the server sent it
    pub fn push_text(&self, text: &str) {
        let guard = self.server_tx.lock().unwrap();
        let tx = guard.as_ref().expect("no live connection");
        tx.send(Frame::Text(text.to_string())).unwrap();
    }

    /// Close the current connection from the server side
    pub fn server_close(&self, clean: bool) {
        let guard = self.server_tx.lock().unwrap();
        let tx = guard.as_ref().expect("no live connection");
        tx.send(Frame::Close { clean }).unwrap();
    }
}

#[async_trait]
impl Connector for MockNetwork {
    async fn connect(&self, _url: &Url) -> Result<TransportPair, TransportError> {
        self.connect_calls.fetch_add(1, Ordering::SeqCst);
        let mode = *self.mode.lock().unwrap();
        match mode {
            ConnectMode::Refuse => Err(TransportError::Other("connection refused".into())),
            ConnectMode::Hang => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            ConnectMode::Accept => {
                let (tx, rx) = mpsc::unbounded_channel();
                *self.server_tx.lock().unwrap() = Some(tx.clone());
                let sink = MockSink {
                    fail_sends: Arc::clone(&self.fail_sends),
                    sent: Arc::clone(&self.sent),
                    closes: Arc::clone(&self.closes),
                    echo: tx,
                };
                let stream = MockStream { frames: rx };
                Ok((Box::new(sink), Box::new(stream)))
            }
        }
    }
}

struct MockSink {
    fail_sends: Arc<AtomicUsize>,
    sent: Arc<Mutex<Vec<String>>>,
    closes: Arc<Mutex<Vec<CloseReason>>>,
    /// Used to echo the close back to the read half, like a server ack
    echo: mpsc::UnboundedSender<Frame>,
}

#[async_trait]
impl TransportSink for MockSink {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        let remaining = self.fail_sends.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_sends.store(remaining - 1, Ordering::SeqCst);
            return Err(TransportError::Other("send failed".into()));
        }
        self.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError> {
        self.closes.lock().unwrap().push(reason);
        let _ = self.echo.send(Frame::Close { clean: true });
        Ok(())
    }
}

struct MockStream {
    frames: mpsc::UnboundedReceiver<Frame>,
}

#[async_trait]
impl TransportStream for MockStream {
    async fn next_frame(&mut self) -> Option<Result<Frame, TransportError>> {
        self.frames.recv().await.map(Ok)
    }
}
