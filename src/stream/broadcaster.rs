//! Fan-out of events to subscribers
//!
//! Each subscriber owns a bounded channel. Delivery never waits: a full
//! channel drops the event for that subscriber and a closed one is removed.

use super::event::StreamEvent;
use std::sync::{Mutex, MutexGuard};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::warn;

/// Default per-subscriber queue size
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

pub struct EventBroadcaster {
    subscribers: Mutex<Vec<mpsc::Sender<StreamEvent>>>,
    capacity: usize,
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroadcaster {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_SUBSCRIBER_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<mpsc::Sender<StreamEvent>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Registers a subscriber; its first event is `connected`
    pub fn subscribe(&self) -> mpsc::Receiver<StreamEvent> {
        let (tx, rx) = mpsc::channel(self.capacity);
        let _ = tx.try_send(StreamEvent::connected());
        self.lock().push(tx);
        rx
    }

    /// Delivers an event to every live subscriber, returning how many got it
    pub fn broadcast(&self, event: &StreamEvent) -> usize {
        let mut subscribers = self.lock();
        let mut delivered = 0;
        subscribers.retain(|tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                warn!("Subscriber queue full, dropping {} event", event.event_type());
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribe_receives_connected() {
        let broadcaster = EventBroadcaster::new();
        let mut rx = broadcaster.subscribe();
        let event = rx.recv().await.unwrap();
        assert_eq!(event.event_type(), "connected");
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_subscribers() {
        let broadcaster = EventBroadcaster::new();
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();
        assert_eq!(broadcaster.broadcast(&StreamEvent::poll_start(3)), 2);
        for rx in [&mut a, &mut b] {
            assert_eq!(rx.recv().await.unwrap().event_type(), "connected");
            assert_eq!(rx.recv().await.unwrap().event_type(), "poll_start");
        }
    }

    #[test]
    fn test_full_queue_drops_event_but_keeps_subscriber() {
        let broadcaster = EventBroadcaster::with_capacity(2);
        let mut rx = broadcaster.subscribe();
        assert_eq!(broadcaster.broadcast(&StreamEvent::poll_start(1)), 1);
        assert_eq!(broadcaster.broadcast(&StreamEvent::poll_start(2)), 0);
        assert_eq!(broadcaster.subscriber_count(), 1);

        assert_eq!(rx.try_recv().unwrap().event_type(), "connected");
        assert_eq!(rx.try_recv().unwrap().event_type(), "poll_start");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_closed_subscriber_is_removed() {
        let broadcaster = EventBroadcaster::new();
        let rx = broadcaster.subscribe();
        let _keep = broadcaster.subscribe();
        drop(rx);
        assert_eq!(broadcaster.broadcast(&StreamEvent::poll_start(1)), 1);
        assert_eq!(broadcaster.subscriber_count(), 1);
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let broadcaster = EventBroadcaster::new();
        assert_eq!(broadcaster.broadcast(&StreamEvent::poll_start(0)), 0);
    }
}
