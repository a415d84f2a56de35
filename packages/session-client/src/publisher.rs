//! Event publisher boundary
//!
//! Collaborators (UI, player) observe the engine through an injected
//! publish capability rather than a process-wide event bus, keeping
//! lifecycle and testability under the caller's control.

use tokio::sync::broadcast;

use listenalong_session_protocol::SessionEvent;

/// Outbound notification capability injected into the client
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: SessionEvent);
}

/// Default publisher backed by a tokio broadcast channel
///
/// Publishing never blocks; events are dropped when no subscriber is
/// listening or a subscriber lags past the channel capacity.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<SessionEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to session notifications
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastPublisher {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventPublisher for BroadcastPublisher {
    fn publish(&self, event: SessionEvent) {
        // A send error only means nobody is subscribed right now.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let publisher = BroadcastPublisher::default();
        let mut events = publisher.subscribe();

        publisher.publish(SessionEvent::Connected);

        assert_eq!(events.recv().await.unwrap(), SessionEvent::Connected);
    }

    #[test]
    fn test_publish_without_subscribers_is_noop() {
        let publisher = BroadcastPublisher::default();
        publisher.publish(SessionEvent::Disconnected { clean: true });
    }
}
