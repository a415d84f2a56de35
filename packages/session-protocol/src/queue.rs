//! Bounded FIFO queue of outbound player events
//!
//! Decouples event production from transport availability: while the
//! transport is down, events pile up here and are drained in order once
//! the connection comes back.

use std::collections::VecDeque;

use crate::events::PlayerEvent;

/// Default maximum number of queued events
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// A player event awaiting transmission
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedEvent {
    pub event: PlayerEvent,
    /// Unix timestamp (ms) when the event was enqueued
    pub enqueued_at: i64,
}

/// Bounded FIFO buffer with drop-oldest overflow
///
/// When full, the earliest entry is evicted; the newest event is never
/// dropped.
#[derive(Debug, Clone)]
pub struct EventQueue {
    items: VecDeque<QueuedEvent>,
    capacity: usize,
}

impl EventQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append an event, evicting the oldest entry if at capacity
    pub fn enqueue(&mut self, event: PlayerEvent) {
        if self.items.len() >= self.capacity {
            if let Some(evicted) = self.items.pop_front() {
                tracing::warn!(?evicted.event, "event queue full, dropping oldest entry");
            }
        }
        self.items.push_back(QueuedEvent {
            event,
            enqueued_at: chrono::Utc::now().timestamp_millis(),
        });
    }

    /// Pop the head of the queue
    pub fn dequeue(&mut self) -> Option<QueuedEvent> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&QueuedEvent> {
        self.items.front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_CAPACITY)
    }
}
