//! In-memory event bus with one active subscription per channel name.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use crate::{Event, EventTransport, Subscription};

/// Named channels backed by unbounded mpsc queues.
///
/// Subscribing to a name that already has a subscriber replaces it: the old
/// sender is dropped, so the old [`Subscription`] drains what it already
/// holds and then ends.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

#[derive(Default)]
struct BusInner {
    channels: DashMap<String, mpsc::UnboundedSender<Event>>,
    next_generation: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `name` currently has a live subscriber.
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.inner
            .channels
            .get(name)
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Number of channels with a registered subscriber.
    pub fn channel_count(&self) -> usize {
        self.inner.channels.len()
    }

    /// Total events handed to a subscriber.
    pub fn events_published(&self) -> u64 {
        self.inner.published.load(Ordering::Relaxed)
    }

    /// Total events published to a channel nobody was listening on.
    pub fn events_dropped(&self) -> u64 {
        self.inner.dropped.load(Ordering::Relaxed)
    }
}

impl EventTransport for EventBus {
    fn subscribe(&self, name: &str) -> Subscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed) + 1;
        let replaced = self
            .inner
            .channels
            .insert(name.to_string(), tx)
            .is_some();
        if replaced {
            debug!("Replaced subscription on {name} (generation {generation})");
        } else {
            debug!("Subscribed to {name} (generation {generation})");
        }
        Subscription::new(name.to_string(), generation, rx)
    }

    fn unsubscribe(&self, name: &str) {
        if self.inner.channels.remove(name).is_some() {
            debug!("Unsubscribed from {name}");
        }
    }

    fn publish(&self, name: &str, data: Value) -> bool {
        let delivered = match self.inner.channels.get(name) {
            Some(tx) => tx.send(Event { name: name.to_string(), data }).is_ok(),
            None => false,
        };
        if delivered {
            self.inner.published.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("Event dropped (no subscriber): {name}");
        }
        delivered
    }
}
