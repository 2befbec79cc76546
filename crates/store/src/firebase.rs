//! Firebase Realtime Database over its REST interface.
//!
//! `GET <db>/<path>.json` reads, `PUT` writes, and the same `GET` with
//! `Accept: text/event-stream` opens a change stream for the path.

use std::collections::HashMap;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{header::ACCEPT, Client, Response, StatusCode};
use serde_json::Value;
use shared::{error::StoreError, path::StorePath, snapshot::Snapshot};
use tokio::{
    sync::{mpsc, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::{
    next_subscription_id,
    sse::{apply_event, SseDecoder, StreamStep},
    RemoteStateStore, StoreNotification, StoreSubscription, SubscriptionId,
};

pub struct FirebaseStore {
    http: Client,
    database_url: Url,
    streams: Mutex<HashMap<SubscriptionId, JoinHandle<()>>>,
}

impl FirebaseStore {
    pub fn new(database_url: &str) -> Result<Self, StoreError> {
        Self::with_client(Client::new(), database_url)
    }

    pub fn with_client(http: Client, database_url: &str) -> Result<Self, StoreError> {
        let database_url = Url::parse(database_url.trim()).map_err(|err| {
            StoreError::Unavailable(format!("invalid database url '{database_url}': {err}"))
        })?;
        if database_url.cannot_be_a_base() {
            return Err(StoreError::Unavailable(format!(
                "database url '{database_url}' cannot address child paths"
            )));
        }
        Ok(Self {
            http,
            database_url,
            streams: Mutex::new(HashMap::new()),
        })
    }

    pub fn database_url(&self) -> &Url {
        &self.database_url
    }

    /// `<db>/GPS/Latitude.json`; the root maps to `<db>/.json`.
    pub fn node_url(&self, path: &StorePath) -> Result<Url, StoreError> {
        let mut url = self.database_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                StoreError::Unavailable("database url cannot address child paths".to_string())
            })?;
            segments.pop_if_empty();
            match path.segments().split_last() {
                None => {
                    segments.push(".json");
                }
                Some((last, parents)) => {
                    segments.extend(parents);
                    segments.push(&format!("{last}.json"));
                }
            }
        }
        Ok(url)
    }
}

fn transport_error(err: reqwest::Error) -> StoreError {
    StoreError::Network(err.to_string())
}

async fn check_status(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .unwrap_or_else(|| format!("http {status}"));
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied(detail),
        s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
            StoreError::Unavailable(detail)
        }
        _ => StoreError::Protocol(detail),
    })
}

async fn pump_stream(
    response: Response,
    path: StorePath,
    tx: mpsc::UnboundedSender<StoreNotification>,
) {
    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::default();
    let mut subtree = Value::Null;

    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(err) => {
                warn!(path = %path, "change stream failed: {err}");
                let _ = tx.send(StoreNotification::Cancelled(transport_error(err)));
                return;
            }
        };
        for event in decoder.feed(&chunk) {
            match apply_event(&mut subtree, &event) {
                StreamStep::Changed => {
                    let snapshot = Snapshot::new(path.clone(), subtree.clone());
                    if tx.send(StoreNotification::Changed(snapshot)).is_err() {
                        debug!(path = %path, "change stream receiver dropped");
                        return;
                    }
                }
                StreamStep::Ignored => {}
                StreamStep::Cancelled(err) => {
                    warn!(path = %path, "change stream cancelled by server: {err}");
                    let _ = tx.send(StoreNotification::Cancelled(err));
                    return;
                }
            }
        }
    }

    info!(path = %path, "change stream closed");
    let _ = tx.send(StoreNotification::Cancelled(StoreError::Disconnected));
}

#[async_trait]
impl RemoteStateStore for FirebaseStore {
    async fn read(&self, path: &StorePath) -> Result<Snapshot, StoreError> {
        let url = self.node_url(path)?;
        let response = self.http.get(url).send().await.map_err(transport_error)?;
        let value: Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(|err| StoreError::Protocol(err.to_string()))?;
        Ok(Snapshot::new(path.clone(), value))
    }

    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let url = self.node_url(path)?;
        let response = self
            .http
            .put(url)
            .json(&value)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(response).await?;
        Ok(())
    }

    async fn subscribe(&self, path: &StorePath) -> Result<StoreSubscription, StoreError> {
        let url = self.node_url(path)?;
        let response = self
            .http
            .get(url)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(transport_error)?;
        let response = check_status(response).await?;

        let (tx, notifications) = mpsc::unbounded_channel();
        let id = next_subscription_id();
        let task = tokio::spawn(pump_stream(response, path.clone(), tx));

        let mut streams = self.streams.lock().await;
        streams.retain(|_, handle| !handle.is_finished());
        streams.insert(id, task);
        info!(path = %path, subscription = id.0, "opened change stream");

        Ok(StoreSubscription {
            id,
            path: path.clone(),
            notifications,
        })
    }

    async fn unsubscribe(&self, id: SubscriptionId) {
        if let Some(task) = self.streams.lock().await.remove(&id) {
            task.abort();
            debug!(subscription = id.0, "closed change stream");
        }
    }
}

impl Drop for FirebaseStore {
    fn drop(&mut self) {
        for (_, task) in self.streams.get_mut().drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/firebase_tests.rs"]
mod tests;
