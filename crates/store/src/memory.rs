//! Process-local store with the same notification semantics as the remote
//! database. Used by tests and by the tracker's `--memory` mode.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use shared::{error::StoreError, path::StorePath, snapshot::Snapshot};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

use crate::{
    next_subscription_id, tree, RemoteStateStore, StoreNotification, StoreSubscription,
    SubscriptionId,
};

struct Subscriber {
    path: StorePath,
    tx: mpsc::UnboundedSender<StoreNotification>,
}

#[derive(Default)]
struct MemoryState {
    root: Value,
    subscribers: HashMap<SubscriptionId, Subscriber>,
    write_failure: Option<StoreError>,
    write_log: Vec<(StorePath, Value)>,
}

impl MemoryState {
    fn snapshot(&self, path: &StorePath) -> Snapshot {
        match tree::value_at(&self.root, path.segments()) {
            Some(value) => Snapshot::new(path.clone(), value.clone()),
            None => Snapshot::empty(path.clone()),
        }
    }

    fn notify(&mut self, written: &StorePath) {
        let root = &self.root;
        self.subscribers.retain(|id, sub| {
            if !sub.path.overlaps(written) {
                return true;
            }
            let snapshot = match tree::value_at(root, sub.path.segments()) {
                Some(value) => Snapshot::new(sub.path.clone(), value.clone()),
                None => Snapshot::empty(sub.path.clone()),
            };
            let delivered = sub.tx.send(StoreNotification::Changed(snapshot)).is_ok();
            if !delivered {
                debug!(subscription = id.0, path = %sub.path, "dropping closed subscription");
            }
            delivered
        });
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(root: Value) -> Self {
        let mut state = MemoryState::default();
        tree::set_at(&mut state.root, &[], root);
        Self {
            inner: Mutex::new(state),
        }
    }

    /// Every subsequent write fails with `error` until cleared with `None`.
    pub async fn set_write_failure(&self, error: Option<StoreError>) {
        self.inner.lock().await.write_failure = error;
    }

    /// End every subscription overlapping `path` with `error`, as a
    /// permission change on the server would.
    pub async fn revoke(&self, path: &StorePath, error: StoreError) {
        let mut state = self.inner.lock().await;
        state.subscribers.retain(|_, sub| {
            if sub.path.overlaps(path) {
                let _ = sub.tx.send(StoreNotification::Cancelled(error.clone()));
                false
            } else {
                true
            }
        });
    }

    /// Successful writes in the order they were applied.
    pub async fn writes(&self) -> Vec<(StorePath, Value)> {
        self.inner.lock().await.write_log.clone()
    }

    pub async fn subscriber_count(&self) -> usize {
        let state = self.inner.lock().await;
        state
            .subscribers
            .values()
            .filter(|sub| !sub.tx.is_closed())
            .count()
    }

    pub async fn root(&self) -> Value {
        self.inner.lock().await.root.clone()
    }
}

#[async_trait]
impl RemoteStateStore for MemoryStore {
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        Ok(self.inner.lock().await.snapshot(path))
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let mut state = self.inner.lock().await;
        if let Some(err) = state.write_failure.clone() {
            return Err(err);
        }
        tree::set_at(&mut state.root, path.segments(), value.clone());
        state.write_log.push((path.clone(), value));
        state.notify(path);
        Ok(())
    }

    async fn subscribe(&self, path: &StorePath) -> Result<StoreSubscription, StoreError> {
        let mut state = self.inner.lock().await;
        let (tx, notifications) = mpsc::unbounded_channel();
        let id = next_subscription_id();
        let _ = tx.send(StoreNotification::Changed(state.snapshot(path)));
        state.subscribers.insert(
            id,
            Subscriber {
                path: path.clone(),
                tx,
            },
        );
        Ok(StoreSubscription {
            id,
            path: path.clone(),
            notifications,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().await.subscribers.remove(&id);
    }
}
