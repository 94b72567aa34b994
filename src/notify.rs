use futures::stream::{self, Stream};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use uuid::Uuid;

use crate::model::event::Event;

// ---------------------------------------------------------------------------
// StoreChange: what the store tells listeners after each write
// ---------------------------------------------------------------------------

/// A single committed store write.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreChange {
    /// Monotonic per-hub sequence number, used as the EventSource id.
    pub id: u64,
    #[serde(flatten)]
    pub target: ChangeTarget,
    /// Name of the written field (e.g. `summary`, `location_name`).
    pub field: &'static str,
    pub author: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChangeTarget {
    Incident { event_id: Event, incident_number: u32 },
    IncidentReport { incident_report_number: u32 },
    Event { event_id: Event },
    IncidentTypes,
}

impl ChangeTarget {
    /// EventSource event name for this kind of change.
    pub fn kind(&self) -> &'static str {
        match self {
            ChangeTarget::Incident { .. } => "Incident",
            ChangeTarget::IncidentReport { .. } => "IncidentReport",
            ChangeTarget::Event { .. } => "Event",
            ChangeTarget::IncidentTypes => "IncidentTypes",
        }
    }
}

// ---------------------------------------------------------------------------
// NotificationHub
// ---------------------------------------------------------------------------

struct HubInner {
    sender: broadcast::Sender<StoreChange>,
    next_id: AtomicU64,
    listeners: AtomicUsize,
}

/// Fan-out of store changes to any number of live listeners.
#[derive(Clone)]
pub struct NotificationHub {
    inner: Arc<HubInner>,
}

impl NotificationHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(HubInner {
                sender,
                next_id: AtomicU64::new(1),
                listeners: AtomicUsize::new(0),
            }),
        }
    }

    /// Publish a change to every current subscriber. Returns the change id.
    pub fn publish(&self, target: ChangeTarget, field: &'static str, author: Option<&str>) -> u64 {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let change = StoreChange {
            id,
            target,
            field,
            author: author.map(str::to_string),
        };
        // No receivers is not an error: nobody is listening right now.
        let _ = self.inner.sender.send(change);
        id
    }

    pub fn subscribe(&self) -> Subscription {
        let receiver = self.inner.sender.subscribe();
        let count = self.inner.listeners.fetch_add(1, Ordering::SeqCst) + 1;
        let id = Uuid::new_v4();
        tracing::debug!(listener = %id, listeners = count, "store listener subscribed");
        Subscription {
            id,
            receiver,
            hub: Arc::clone(&self.inner),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.load(Ordering::SeqCst)
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new(1024)
    }
}

// ---------------------------------------------------------------------------
// Subscription: unsubscribes on drop
// ---------------------------------------------------------------------------

pub struct Subscription {
    id: Uuid,
    receiver: broadcast::Receiver<StoreChange>,
    hub: Arc<HubInner>,
}

impl Subscription {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Wait for the next change. `None` once the hub is gone.
    pub async fn recv(&mut self) -> Option<StoreChange> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => return Some(change),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(listener = %self.id, skipped, "store listener lagged");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Next already-published change, if any.
    pub fn try_recv(&mut self) -> Option<StoreChange> {
        loop {
            match self.receiver.try_recv() {
                Ok(change) => return Some(change),
                Err(TryRecvError::Lagged(skipped)) => {
                    tracing::warn!(listener = %self.id, skipped, "store listener lagged");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    /// Drain every change published so far.
    pub fn drain(&mut self) -> Vec<StoreChange> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Turn the subscription into a stream that owns it; dropping the
    /// stream unsubscribes.
    pub fn into_stream(self) -> impl Stream<Item = StoreChange> + Send + 'static {
        stream::unfold(self, |mut subscription| async move {
            subscription
                .recv()
                .await
                .map(|change| (change, subscription))
        })
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let remaining = self.hub.listeners.fetch_sub(1, Ordering::SeqCst) - 1;
        tracing::debug!(listener = %self.id, listeners = remaining, "store listener unsubscribed");
    }
}
