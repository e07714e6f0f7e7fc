//! Fan-out of change notifications to live-update clients.
//!
//! Every client owns a bounded channel. Publishing never waits: a full
//! channel loses the event for that client only, and the client resyncs with
//! a full refresh on its next read. Closing the broadcaster ends every open
//! stream so the server can drain its connections on shutdown.

use crate::models::ChangeEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};

pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Default)]
struct Registry {
    senders: Mutex<HashMap<u64, mpsc::Sender<ChangeEvent>>>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl Registry {
    // Publishing only does try_send under the lock, so a panic there cannot
    // leave the map half-updated; keep serving after poisoning.
    fn senders(&self) -> MutexGuard<'_, HashMap<u64, mpsc::Sender<ChangeEvent>>> {
        self.senders.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn remove(&self, id: u64) -> bool {
        self.senders().remove(&id).is_some()
    }
}

#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<Registry>,
    capacity: usize,
}

impl Default for Broadcaster {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

impl Broadcaster {
    pub fn new(capacity: usize) -> Self {
        Self {
            registry: Arc::new(Registry::default()),
            capacity: capacity.max(1),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn subscribe(&self) -> Subscription {
        let (sender, receiver) = mpsc::channel(self.capacity);
        let id = self.registry.next_id.fetch_add(1, Ordering::Relaxed);
        let subscribers = {
            let mut senders = self.registry.senders();
            // Checked under the lock so a concurrent close cannot miss this sender.
            if self.registry.closed.load(Ordering::Acquire) {
                None
            } else {
                senders.insert(id, sender);
                Some(senders.len())
            }
        };
        match subscribers {
            Some(subscribers) => {
                tracing::debug!(subscriber = id, subscribers, "live-update client subscribed");
            }
            None => tracing::debug!(subscriber = id, "broadcaster closed, subscription ends immediately"),
        }

        Subscription {
            id,
            receiver,
            registry: Arc::clone(&self.registry),
        }
    }

    /// Offers `event` to every subscriber and returns how many accepted it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let mut delivered = 0usize;
        let mut senders = self.registry.senders();
        senders.retain(|id, sender| match sender.try_send(event) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::trace!(subscriber = *id, "subscriber channel full, event dropped");
                true
            }
            Err(TrySendError::Closed(_)) => false,
        });
        tracing::debug!(
            kind = ?event.kind,
            list_id = ?event.list_id,
            delivered,
            subscribers = senders.len(),
            "change published"
        );
        delivered
    }

    /// Removes a subscription's channel. Safe to call more than once.
    pub fn unsubscribe(&self, subscription: &Subscription) {
        self.unsubscribe_id(subscription.id);
    }

    pub fn unsubscribe_id(&self, id: u64) {
        if self.registry.remove(id) {
            tracing::debug!(subscriber = id, "live-update client unsubscribed");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.senders().len()
    }

    /// Drops every registered sender so each open `recv()` returns `None`.
    /// Later subscriptions end immediately.
    pub fn close(&self) {
        let dropped = {
            let mut senders = self.registry.senders();
            self.registry.closed.store(true, Ordering::Release);
            let dropped = senders.len();
            senders.clear();
            dropped
        };
        tracing::info!(subscribers = dropped, "live-update streams closed");
    }
}

/// One client's end of the broadcaster. Unregisters itself when dropped.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    receiver: mpsc::Receiver<ChangeEvent>,
    registry: Arc<Registry>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Waits for the next event. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<ChangeEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.registry.remove(self.id) {
            tracing::debug!(subscriber = self.id, "live-update client disconnected");
        }
    }
}
