//! Event-bus capability port. Delivery is at-least-once; handlers run off
//! the publisher's call path whenever a runtime is available.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use qinfinity_types::EventEnvelope;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PortError, PortResult};

pub type EventHandler = Arc<dyn Fn(EventEnvelope) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

/// Coherence counters reported by the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusStats {
    pub events_published: u64,
    pub active_subscriptions: u64,
}

pub trait EventBusPort: Send + Sync {
    fn publish(&self, envelope: EventEnvelope) -> PortResult<()>;

    /// Subscribe to a topic pattern: an exact topic, a `prefix.*` wildcard,
    /// or `*` for everything.
    fn subscribe(&self, pattern: &str, handler: EventHandler) -> SubscriptionId;

    fn unsubscribe(&self, id: SubscriptionId);

    fn stats(&self) -> BusStats;
}

struct Subscription {
    id: SubscriptionId,
    pattern: String,
    handler: EventHandler,
}

/// In-process bus. Handlers are dispatched on spawned tasks when called
/// inside a tokio runtime, inline otherwise (deterministic for sync tests).
pub struct MemoryEventBus {
    subscriptions: RwLock<Vec<Subscription>>,
    next_id: AtomicU64,
    published: AtomicU64,
}

impl MemoryEventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
            published: AtomicU64::new(0),
        }
    }

    fn matches(pattern: &str, topic: &str) -> bool {
        if pattern == "*" || pattern == topic {
            return true;
        }
        pattern
            .strip_suffix(".*")
            .map(|prefix| {
                topic
                    .strip_prefix(prefix)
                    .is_some_and(|rest| rest.starts_with('.'))
            })
            .unwrap_or(false)
    }
}

impl Default for MemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBusPort for MemoryEventBus {
    fn publish(&self, envelope: EventEnvelope) -> PortResult<()> {
        self.published.fetch_add(1, Ordering::SeqCst);

        let subscriptions = self
            .subscriptions
            .read()
            .map_err(|_| PortError::Internal("event bus subscriptions poisoned".into()))?;

        for subscription in subscriptions.iter() {
            if !Self::matches(&subscription.pattern, &envelope.topic) {
                continue;
            }
            let handler = subscription.handler.clone();
            let event = envelope.clone();
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(async move { handler(event) });
                }
                Err(_) => handler(event),
            }
        }

        debug!(topic = %envelope.topic, event_id = %envelope.event_id, "event published");
        Ok(())
    }

    fn subscribe(&self, pattern: &str, handler: EventHandler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut subscriptions) = self.subscriptions.write() {
            subscriptions.push(Subscription {
                id,
                pattern: pattern.to_string(),
                handler,
            });
        }
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        if let Ok(mut subscriptions) = self.subscriptions.write() {
            subscriptions.retain(|s| s.id != id);
        }
    }

    fn stats(&self) -> BusStats {
        BusStats {
            events_published: self.published.load(Ordering::SeqCst),
            active_subscriptions: self
                .subscriptions
                .read()
                .map(|s| s.len() as u64)
                .unwrap_or(0),
        }
    }
}
