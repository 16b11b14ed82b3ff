//! Fan-out of store updates to live subscribers.
//!
//! Each subscriber owns a small bounded channel. Broadcasting never waits:
//! a subscriber whose buffer is full simply misses that notification, so a
//! stalled viewer can never hold up the refresh loop. Subscribers should read
//! the store on (re)connect instead of relying on every notification arriving.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Identifies one registered subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

/// Notification that new data landed in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    /// Source whose merge triggered this update.
    pub source: String,
    pub total_items: usize,
    pub visible_items: usize,
    pub at: DateTime<Utc>,
}

/// Outcome of one [`Broadcaster::broadcast`] call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    pub delivered: usize,
    /// Subscribers whose buffer was full.
    pub skipped: usize,
    /// Subscribers found closed and removed.
    pub pruned: usize,
}

struct Registry {
    subscribers: Mutex<HashMap<SubscriberId, mpsc::Sender<Update>>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Registry {
    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, mpsc::Sender<Update>>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn remove(&self, id: SubscriberId) -> bool {
        self.lock().remove(&id).is_some()
    }
}

/// Registry of live subscribers. Cloning shares the registry.
#[derive(Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
}

impl Broadcaster {
    pub const DEFAULT_BUFFER: usize = 1;

    /// Creates a broadcaster whose subscribers buffer up to `buffer`
    /// notifications (at least one).
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(Registry {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(0),
                buffer: buffer.max(1),
            }),
        }
    }

    /// Registers a new subscriber.
    ///
    /// The returned [`Subscription`] unregisters itself when dropped.
    pub fn subscribe(&self) -> Subscription {
        let id = SubscriberId(self.registry.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.registry.buffer);
        self.registry.lock().insert(id, tx);
        tracing::debug!(subscriber = id.0, "Subscriber registered");

        Subscription {
            id,
            rx,
            registry: Arc::downgrade(&self.registry),
        }
    }

    /// Removes a subscriber and closes its channel.
    ///
    /// Returns `false` if it was already gone.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            tracing::debug!(subscriber = id.0, "Subscriber removed");
        }
        removed
    }

    /// Offers `update` to every subscriber without waiting.
    ///
    /// Full buffers are skipped for this update; closed subscribers are
    /// pruned from the registry.
    pub fn broadcast(&self, update: &Update) -> BroadcastReport {
        let mut report = BroadcastReport::default();
        let mut subscribers = self.registry.lock();

        subscribers.retain(|id, tx| match tx.try_send(update.clone()) {
            Ok(()) => {
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                report.skipped += 1;
                tracing::debug!(subscriber = id.0, "Subscriber buffer full, skipping update");
                true
            }
            Err(TrySendError::Closed(_)) => {
                report.pruned += 1;
                false
            }
        });

        report
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().len()
    }
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(Self::DEFAULT_BUFFER)
    }
}

/// Receiving end of one subscriber.
pub struct Subscription {
    id: SubscriberId,
    rx: mpsc::Receiver<Update>,
    registry: Weak<Registry>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Waits for the next update; `None` once unsubscribed.
    pub async fn recv(&mut self) -> Option<Update> {
        self.rx.recv().await
    }

    /// Next buffered update, if any.
    pub fn try_recv(&mut self) -> Option<Update> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.remove(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn update(source: &str) -> Update {
        Update {
            source: source.to_owned(),
            total_items: 1,
            visible_items: 1,
            at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscribers_receive_updates() {
        let broadcaster = Broadcaster::new(4);
        let mut a = broadcaster.subscribe();
        let mut b = broadcaster.subscribe();

        let report = broadcaster.broadcast(&update("https://a.example/feed"));
        assert_eq!(report.delivered, 2);

        assert_eq!(a.recv().await.unwrap().source, "https://a.example/feed");
        assert_eq!(b.recv().await.unwrap().source, "https://a.example/feed");
    }

    #[tokio::test]
    async fn test_full_subscriber_is_skipped_without_blocking() {
        let broadcaster = Broadcaster::new(1);
        let mut stalled = broadcaster.subscribe();
        let mut healthy = broadcaster.subscribe();

        broadcaster.broadcast(&update("first"));
        assert_eq!(healthy.recv().await.unwrap().source, "first");

        // `stalled` still holds "first" in its single-slot buffer
        let report = tokio::time::timeout(Duration::from_millis(100), async {
            broadcaster.broadcast(&update("second"))
        })
        .await
        .expect("broadcast must not block");

        assert_eq!(report.delivered, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(healthy.recv().await.unwrap().source, "second");
        assert_eq!(stalled.recv().await.unwrap().source, "first");
        assert!(stalled.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_drop_unsubscribes() {
        let broadcaster = Broadcaster::default();
        let sub = broadcaster.subscribe();
        assert_eq!(broadcaster.subscriber_count(), 1);
        drop(sub);
        assert_eq!(broadcaster.subscriber_count(), 0);
        assert_eq!(broadcaster.broadcast(&update("x")).delivered, 0);
    }

    #[tokio::test]
    async fn test_unsubscribe_closes_channel() {
        let broadcaster = Broadcaster::default();
        let mut sub = broadcaster.subscribe();
        assert!(broadcaster.unsubscribe(sub.id()));
        assert!(!broadcaster.unsubscribe(sub.id()));
        assert_eq!(sub.recv().await, None);
    }

    #[test]
    fn test_zero_buffer_is_clamped() {
        let broadcaster = Broadcaster::new(0);
        let mut sub = broadcaster.subscribe();
        assert_eq!(broadcaster.broadcast(&update("x")).delivered, 1);
        assert!(sub.try_recv().is_some());
    }

    #[test]
    fn test_subscription_outliving_broadcaster() {
        let broadcaster = Broadcaster::default();
        let sub = broadcaster.subscribe();
        drop(broadcaster);
        drop(sub);
    }
}
