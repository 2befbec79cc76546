//! Live, typed view of one store path.

use std::{future::Future, sync::Arc};

use shared::{
    error::{StoreError, SyncError},
    path::StorePath,
    snapshot::Snapshot,
};
use store::{RemoteStateStore, StoreNotification, SubscriptionId};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Turns a raw snapshot into a typed value. Errors mean "absent" to subscribers.
pub type Decoder<T> = fn(&Snapshot) -> Result<T, SyncError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Cancelled,
}

/// What a channel reports for each notification of its subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent<T> {
    Present(T),
    /// The path has no data or only part of it.
    Absent,
    /// The store ended the subscription. Reported once; nothing follows.
    Cancelled(StoreError),
}

#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriptionId,
    path: StorePath,
    decode: Decoder<T>,
    state: SubscriptionState,
    notifications: Option<mpsc::UnboundedReceiver<StoreNotification>>,
}

impl<T> Subscription<T> {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    fn mark_cancelled(&mut self) {
        self.state = SubscriptionState::Cancelled;
        self.notifications = None;
    }
}

pub struct StateSyncChannel<T> {
    store: Arc<dyn RemoteStateStore>,
    subscription: Option<Subscription<T>>,
    latest: Option<T>,
}

impl<T> StateSyncChannel<T>
where
    T: Clone + Send + 'static,
{
    pub fn new(store: Arc<dyn RemoteStateStore>) -> Self {
        Self {
            store,
            subscription: None,
            latest: None,
        }
    }

    /// Register a persistent listener on `path`, replacing any listener this
    /// channel already holds.
    pub async fn subscribe(
        &mut self,
        path: StorePath,
        decode: Decoder<T>,
    ) -> Result<&Subscription<T>, SyncError> {
        self.unsubscribe().await;
        let live = self.store.subscribe(&path).await?;
        info!(path = %path, subscription = live.id.0, "subscribed to store path");
        Ok(self.subscription.insert(Subscription {
            id: live.id,
            path,
            decode,
            state: SubscriptionState::Active,
            notifications: Some(live.notifications),
        }))
    }

    /// One-shot read. The future owns everything it needs, so it can be
    /// spawned while the channel keeps serving its subscription.
    pub fn fetch_once(
        &self,
        path: StorePath,
        decode: Decoder<T>,
    ) -> impl Future<Output = Result<T, SyncError>> + Send + 'static {
        let store = Arc::clone(&self.store);
        async move {
            let snapshot = store.read(&path).await?;
            if !snapshot.exists() {
                return Err(SyncError::not_found(&path));
            }
            decode(&snapshot)
        }
    }

    /// Stop notifications. Safe to call any number of times.
    pub async fn unsubscribe(&mut self) {
        let Some(subscription) = self.subscription.take() else {
            return;
        };
        if subscription.state == SubscriptionState::Active {
            self.store.unsubscribe(subscription.id).await;
        }
        debug!(path = %subscription.path, subscription = subscription.id.0, "unsubscribed");
    }

    /// Wait for the next notification of the live subscription. Returns
    /// `None` straight away when there is none.
    pub async fn next_event(&mut self) -> Option<SyncEvent<T>> {
        let subscription = self.subscription.as_mut()?;
        let notifications = subscription.notifications.as_mut()?;

        match notifications.recv().await {
            Some(StoreNotification::Changed(snapshot)) => {
                match (subscription.decode)(&snapshot) {
                    Ok(value) => {
                        self.latest = Some(value.clone());
                        Some(SyncEvent::Present(value))
                    }
                    Err(err) => {
                        debug!(path = %subscription.path, "snapshot is absent: {err}");
                        Some(SyncEvent::Absent)
                    }
                }
            }
            Some(StoreNotification::Cancelled(err)) => {
                error!(path = %subscription.path, "subscription cancelled by store: {err}");
                subscription.mark_cancelled();
                Some(SyncEvent::Cancelled(err))
            }
            None => {
                warn!(path = %subscription.path, "store closed subscription without a reason");
                subscription.mark_cancelled();
                Some(SyncEvent::Cancelled(StoreError::Disconnected))
            }
        }
    }

    /// Last successfully decoded value; stale until a notification confirms it.
    pub fn latest(&self) -> Option<&T> {
        self.latest.as_ref()
    }

    /// Record a value obtained outside the subscription, e.g. by `fetch_once`.
    pub fn remember(&mut self, value: T) {
        self.latest = Some(value);
    }

    pub fn subscription(&self) -> Option<&Subscription<T>> {
        self.subscription.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.subscription
            .as_ref()
            .map(|s| s.state == SubscriptionState::Active)
            .unwrap_or(false)
    }
}

#[cfg(test)]
#[path = "tests/channel_tests.rs"]
mod tests;
