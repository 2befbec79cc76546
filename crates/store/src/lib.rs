use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use shared::{error::StoreError, path::StorePath, snapshot::Snapshot};
use tokio::sync::mpsc;

pub mod firebase;
pub mod memory;
mod sse;
mod tree;

pub use firebase::FirebaseStore;
pub use memory::MemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

pub(crate) fn next_subscription_id() -> SubscriptionId {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    SubscriptionId(COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Change notification for one subscribed path. Notifications of a single
/// subscription arrive in the order the store applied them.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreNotification {
    Changed(Snapshot),
    /// The store ended the subscription; nothing follows.
    Cancelled(StoreError),
}

/// Live subscription handed out by a store. Dropping the receiver tears the
/// subscription down on the store side as well.
#[derive(Debug)]
pub struct StoreSubscription {
    pub id: SubscriptionId,
    pub path: StorePath,
    pub notifications: mpsc::UnboundedReceiver<StoreNotification>,
}

/// Path-addressable hierarchical key-value store with change notifications.
#[async_trait]
pub trait RemoteStateStore: Send + Sync {
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError>;
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;
    /// Registers a listener; the current value is delivered as the first notification.
    async fn subscribe(&self, path: &StorePath) -> Result<StoreSubscription, StoreError>;
    /// Stops delivery for `id`. Unknown or already removed ids are ignored.
    async fn unsubscribe(&self, id: SubscriptionId);
}
