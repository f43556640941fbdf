use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;
use tracing::warn;

use crate::protocol::SceneSnapshot;

pub type SubscriptionId = u64;

type Callback = Arc<dyn Fn(&SceneSnapshot) + Send + Sync>;

#[derive(Clone)]
enum Subscriber {
    Callback(Callback),
    Channel(mpsc::UnboundedSender<Arc<SceneSnapshot>>),
}

#[derive(Default)]
struct BusInner {
    next_id: SubscriptionId,
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

/// Fan-out of read-only scene snapshots to observers.
///
/// Subscribing and unsubscribing are O(1) and may happen from inside a
/// callback: `publish` works on a copy of the subscriber list and never holds
/// the lock while calling out. A panicking callback is logged and skipped.
#[derive(Clone, Default)]
pub struct NotificationBus {
    inner: Arc<Mutex<BusInner>>,
}

impl NotificationBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BusInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn insert(&self, subscriber: Subscriber) -> SubscriptionId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.subscribers.insert(id, subscriber);
        id
    }

    /// Register a callback invoked synchronously on every publish.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SceneSnapshot) + Send + Sync + 'static,
    {
        self.insert(Subscriber::Callback(Arc::new(callback)))
    }

    /// Register an unbounded channel; publishing never waits on the receiver.
    /// The subscription is dropped once the receiver is closed.
    pub fn subscribe_channel(&self) -> (SubscriptionId, mpsc::UnboundedReceiver<Arc<SceneSnapshot>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (self.insert(Subscriber::Channel(tx)), rx)
    }

    /// Returns whether the id was subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.lock().subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    pub fn publish(&self, snapshot: Arc<SceneSnapshot>) {
        let targets: Vec<(SubscriptionId, Subscriber)> = self
            .lock()
            .subscribers
            .iter()
            .map(|(id, s)| (*id, s.clone()))
            .collect();

        let mut closed = Vec::new();
        for (id, subscriber) in targets {
            match subscriber {
                Subscriber::Callback(callback) => {
                    let delivered = catch_unwind(AssertUnwindSafe(|| callback(&snapshot)));
                    if delivered.is_err() {
                        warn!("Snapshot subscriber {} panicked; continuing delivery", id);
                    }
                }
                Subscriber::Channel(tx) => {
                    if tx.send(Arc::clone(&snapshot)).is_err() {
                        closed.push(id);
                    }
                }
            }
        }

        if !closed.is_empty() {
            let mut inner = self.lock();
            for id in closed {
                inner.subscribers.remove(&id);
            }
        }
    }
}
