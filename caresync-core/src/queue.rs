//! Durable FIFO queue of user actions waiting to be sent.
//!
//! The queue is write-through: every operation that changes it persists the
//! whole list before touching the in-memory copy, so a failed write leaves
//! both sides exactly as they were.
//!
//! Records that can't be read (an unknown type written by a newer client, a
//! damaged field) are held aside and written back untouched after the
//! readable items. They are never dispatched and only [`PendingQueue::clear`]
//! discards them.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::models::{MutationType, PendingMutation};
use crate::store::{DurableStore, Namespace, StorageError, QUEUE_KEY};

const EVENT_CAPACITY: usize = 64;

/// Change notifications emitted by [`PendingQueue`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueueEvent {
    Enqueued { id: String, pending: usize },
    SyncedRemoved { removed: usize, pending: usize },
    Cleared,
}

/// Ordered, persisted list of [`PendingMutation`]s.
pub struct PendingQueue {
    store: Arc<dyn DurableStore>,
    key: String,
    items: Vec<PendingMutation>,
    unreadable: Vec<Value>,
    events: broadcast::Sender<QueueEvent>,
}

impl PendingQueue {
    /// Opens the queue, loading any persisted items.
    pub fn open(store: Arc<dyn DurableStore>, namespace: &Namespace) -> Result<Self, StorageError> {
        let key = namespace.key(QUEUE_KEY);
        let (items, unreadable) = match store.get(&key)? {
            Some(raw) => parse_records(&key, &raw),
            None => (Vec::new(), Vec::new()),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            store,
            key,
            items,
            unreadable,
            events,
        })
    }

    /// Records a new action and persists the queue before returning it.
    pub fn enqueue(
        &mut self,
        mutation_type: MutationType,
        title: impl Into<String>,
        payload: Value,
    ) -> Result<PendingMutation, StorageError> {
        let mutation = PendingMutation::new(mutation_type, title, payload);

        let mut next = self.items.clone();
        next.push(mutation.clone());
        self.commit(next)?;

        tracing::debug!(id = %mutation.id, "Queued {} action", mutation.mutation_type);
        self.notify(QueueEvent::Enqueued {
            id: mutation.id.clone(),
            pending: self.items.len(),
        });
        Ok(mutation)
    }

    /// Items in enqueue order.
    pub fn list(&self) -> &[PendingMutation] {
        &self.items
    }

    pub fn get(&self, id: &str) -> Option<&PendingMutation> {
        self.items.iter().find(|m| m.id == id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Stored records that could not be read as actions.
    pub fn unreadable(&self) -> &[Value] {
        &self.unreadable
    }

    /// Marks an item as confirmed by the server. In-memory only; the next
    /// [`remove_synced`](Self::remove_synced) persists the result.
    pub fn mark_synced(&mut self, id: &str) -> bool {
        match self.items.iter_mut().find(|m| m.id == id) {
            Some(item) => {
                item.synced = true;
                true
            }
            None => false,
        }
    }

    /// Records a failed dispatch attempt. In-memory only.
    pub fn record_failure(&mut self, id: &str, error: impl Into<String>) -> bool {
        match self.items.iter_mut().find(|m| m.id == id) {
            Some(item) => {
                item.attempts += 1;
                item.last_error = Some(error.into());
                true
            }
            None => false,
        }
    }

    /// Drops every synced item and persists what remains.
    pub fn remove_synced(&mut self) -> Result<usize, StorageError> {
        let next: Vec<PendingMutation> =
            self.items.iter().filter(|m| !m.synced).cloned().collect();
        let removed = self.items.len() - next.len();
        self.commit(next)?;

        self.notify(QueueEvent::SyncedRemoved {
            removed,
            pending: self.items.len(),
        });
        Ok(removed)
    }

    /// Empties the queue, unreadable records included.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.store.set(&self.key, "[]")?;
        self.items.clear();
        self.unreadable.clear();
        self.notify(QueueEvent::Cleared);
        Ok(())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.events.subscribe()
    }

    /// Calls `handler` for every queue change until the queue is dropped.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn on_change<F>(&self, handler: F) -> JoinHandle<()>
    where
        F: Fn(QueueEvent) + Send + 'static,
    {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => handler(event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Queue handler lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }

    fn commit(&mut self, next: Vec<PendingMutation>) -> Result<(), StorageError> {
        let mut records = Vec::with_capacity(next.len() + self.unreadable.len());
        for item in &next {
            records.push(serde_json::to_value(item)?);
        }
        records.extend(self.unreadable.iter().cloned());

        let raw = serde_json::to_string(&records)?;
        self.store.set(&self.key, &raw)?;
        self.items = next;
        Ok(())
    }

    fn notify(&self, event: QueueEvent) {
        let _ = self.events.send(event);
    }
}

/// Splits a stored queue into readable actions and everything else.
fn parse_records(key: &str, raw: &str) -> (Vec<PendingMutation>, Vec<Value>) {
    let records = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(records)) => records,
        Ok(other) => vec![other],
        Err(e) => {
            tracing::warn!("Stored value for '{}' is not JSON: {}", key, e);
            vec![Value::String(raw.to_string())]
        }
    };

    let mut items = Vec::with_capacity(records.len());
    let mut unreadable = Vec::new();
    for record in records {
        match serde_json::from_value::<PendingMutation>(record.clone()) {
            Ok(item) => items.push(item),
            Err(e) => {
                tracing::warn!("Keeping unreadable queued action aside: {}", e);
                unreadable.push(record);
            }
        }
    }
    (items, unreadable)
}

impl std::fmt::Debug for PendingQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingQueue")
            .field("key", &self.key)
            .field("items", &self.items)
            .field("unreadable", &self.unreadable.len())
            .finish()
    }
}
