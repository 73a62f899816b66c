//! HTTP Event Bridge - Event Transport
//!
//! Publish/subscribe by channel name with at most one active subscription
//! per name. The bridge is decoupled from any concrete transport via the
//! `EventTransport` trait; `EventBus` is the in-process implementation and
//! the host link in `bridge-host` forwards to an external process.

pub mod bus;

use serde_json::Value;
use tokio::sync::mpsc;

pub use bus::EventBus;

/// A named event as delivered to a subscriber.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub name: String,
    pub data: Value,
}

/// Trait implemented by every event transport the bridge can run over.
pub trait EventTransport: Send + Sync + 'static {
    /// Subscribe to `name`, replacing any existing subscription on it.
    fn subscribe(&self, name: &str) -> Subscription;

    /// Drop the subscription on `name`. No-op when there is none.
    fn unsubscribe(&self, name: &str);

    /// Publish `data` on `name`. Returns whether anything accepted it.
    fn publish(&self, name: &str, data: Value) -> bool;
}

/// Receiving end of one channel subscription.
///
/// The stream ends once the subscription is removed or replaced.
#[derive(Debug)]
pub struct Subscription {
    name: String,
    generation: u64,
    rx: mpsc::UnboundedReceiver<Event>,
}

impl Subscription {
    pub fn new(name: String, generation: u64, rx: mpsc::UnboundedReceiver<Event>) -> Self {
        Self { name, generation, rx }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifies this subscription among successive ones on the same name.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Next event, or `None` once unsubscribed or replaced.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }
}
