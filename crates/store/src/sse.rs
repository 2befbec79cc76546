//! Incremental decoding of the realtime database's server-sent event stream.

use serde::Deserialize;
use serde_json::Value;
use shared::{error::StoreError, path::StorePath};
use tracing::{debug, warn};

use crate::tree;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Splits a byte stream into events. Chunks may end anywhere, including in
/// the middle of a UTF-8 sequence.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    event: Option<String>,
    data: Vec<String>,
}

impl SseDecoder {
    pub(crate) fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some(end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(&['\n', '\r'][..]);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if event.is_none() && self.data.is_empty() {
            return None;
        }
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data: std::mem::take(&mut self.data).join("\n"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct StreamPayload {
    path: String,
    data: Value,
}

#[derive(Debug, PartialEq)]
pub(crate) enum StreamStep {
    Changed,
    Ignored,
    Cancelled(StoreError),
}

/// Apply one event to the subscription's local copy of its subtree.
pub(crate) fn apply_event(tree_root: &mut Value, event: &SseEvent) -> StreamStep {
    match event.event.as_str() {
        "put" | "patch" => {
            let payload: StreamPayload = match serde_json::from_str(&event.data) {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(event = %event.event, "ignoring malformed stream payload: {err}");
                    return StreamStep::Ignored;
                }
            };
            let relative = match StorePath::parse(&payload.path) {
                Ok(path) => path,
                Err(err) => {
                    warn!(event = %event.event, "ignoring stream payload with bad path: {err}");
                    return StreamStep::Ignored;
                }
            };
            if event.event == "put" {
                tree::set_at(tree_root, relative.segments(), payload.data);
            } else {
                match payload.data {
                    Value::Object(children) => {
                        tree::merge_at(tree_root, relative.segments(), children)
                    }
                    other => {
                        warn!("ignoring patch with non-object data: {other}");
                        return StreamStep::Ignored;
                    }
                }
            }
            StreamStep::Changed
        }
        "keep-alive" => StreamStep::Ignored,
        "cancel" => StreamStep::Cancelled(StoreError::PermissionDenied(
            cancel_reason(&event.data, "subscription cancelled by server"),
        )),
        "auth_revoked" => StreamStep::Cancelled(StoreError::PermissionDenied(
            cancel_reason(&event.data, "credential revoked"),
        )),
        other => {
            debug!(event = other, "ignoring unknown stream event");
            StreamStep::Ignored
        }
    }
}

fn cancel_reason(data: &str, fallback: &str) -> String {
    match serde_json::from_str::<Value>(data) {
        Ok(Value::String(reason)) => reason,
        _ if data.trim().is_empty() || data.trim() == "null" => fallback.to_string(),
        _ => data.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn event(name: &str, data: &str) -> SseEvent {
        SseEvent {
            event: name.to_string(),
            data: data.to_string(),
        }
    }

    #[test]
    fn decodes_events_split_across_chunks() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.feed(b"event: put\r\ndata: {\"path\":").is_empty());
        let events = decoder.feed(b"\"/\",\"data\":1}\r\n\r\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(
            events,
            vec![
                event("put", "{\"path\":\"/\",\"data\":1}"),
                event("keep-alive", "null"),
            ]
        );
    }

    #[test]
    fn joins_multi_line_data_and_skips_comments() {
        let mut decoder = SseDecoder::default();
        let events = decoder.feed(b": hello\ndata: a\ndata: b\n\n");
        assert_eq!(events, vec![event("message", "a\nb")]);
    }

    #[test]
    fn multibyte_characters_survive_chunk_boundaries() {
        let mut decoder = SseDecoder::default();
        let bytes = "event: cancel\ndata: \"izin yok ş\"\n\n".as_bytes();
        let split = bytes.len() - 4;
        assert!(decoder.feed(&bytes[..split]).is_empty());
        let events = decoder.feed(&bytes[split..]);
        assert_eq!(events, vec![event("cancel", "\"izin yok ş\"")]);
    }

    #[test]
    fn put_and_patch_update_local_tree() {
        let mut root = Value::Null;
        let step = apply_event(
            &mut root,
            &event("put", r#"{"path":"/","data":{"Latitude":1.0,"Longitude":2.0}}"#),
        );
        assert_eq!(step, StreamStep::Changed);

        apply_event(&mut root, &event("put", r#"{"path":"/Latitude","data":5.5}"#));
        apply_event(&mut root, &event("patch", r#"{"path":"/","data":{"Longitude":6.5}}"#));
        assert_eq!(root, json!({ "Latitude": 5.5, "Longitude": 6.5 }));

        apply_event(&mut root, &event("put", r#"{"path":"/","data":null}"#));
        assert_eq!(root, Value::Null);
    }

    #[test]
    fn cancel_and_auth_revoked_end_the_stream() {
        let mut root = Value::Null;
        assert_eq!(
            apply_event(&mut root, &event("cancel", "\"Permission denied\"")),
            StreamStep::Cancelled(StoreError::PermissionDenied("Permission denied".into()))
        );
        assert!(matches!(
            apply_event(&mut root, &event("auth_revoked", "null")),
            StreamStep::Cancelled(StoreError::PermissionDenied(_))
        ));
    }

    #[test]
    fn keep_alive_and_garbage_are_ignored() {
        let mut root = json!({ "LED": 1 });
        assert_eq!(
            apply_event(&mut root, &event("keep-alive", "null")),
            StreamStep::Ignored
        );
        assert_eq!(
            apply_event(&mut root, &event("put", "not json")),
            StreamStep::Ignored
        );
        assert_eq!(root, json!({ "LED": 1 }));
    }
}
