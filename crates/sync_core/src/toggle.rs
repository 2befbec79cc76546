//! Optimistic on/off control for one device flag.

use std::sync::Arc;

use shared::{
    domain::{FlagName, FlagState},
    error::{StoreError, SyncError},
    path::StorePath,
    protocol::{encode_flag, flag_path},
};
use store::RemoteStateStore;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

/// Outcome of one flag write, delivered back on the event queue.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteCompletion {
    pub flag: FlagName,
    pub seq: u64,
    pub value: FlagState,
    pub result: Result<(), StoreError>,
}

pub type CompletionSender = mpsc::UnboundedSender<WriteCompletion>;

/// Local state is flipped before the write is confirmed and never rolled
/// back on failure. Remote notifications always overwrite it.
pub struct ControlToggle {
    flag: FlagName,
    path: StorePath,
    local: FlagState,
    confirmed: Option<FlagState>,
    next_seq: u64,
    in_flight: usize,
    store: Arc<dyn RemoteStateStore>,
    completions: CompletionSender,
}

impl ControlToggle {
    pub fn new(flag: FlagName, store: Arc<dyn RemoteStateStore>, completions: CompletionSender) -> Self {
        Self {
            flag,
            path: flag_path(flag),
            local: FlagState::Off,
            confirmed: None,
            next_seq: 0,
            in_flight: 0,
            store,
            completions,
        }
    }

    /// Flip local state and start writing it. Must run inside a tokio runtime.
    pub fn toggle(&mut self) -> FlagState {
        self.local = self.local.toggled();
        self.next_seq += 1;
        self.in_flight += 1;

        let flag = self.flag;
        let seq = self.next_seq;
        let value = self.local;
        let path = self.path.clone();
        let store = Arc::clone(&self.store);
        let completions = self.completions.clone();
        info!(flag = %flag, state = %value, seq, "flag toggled");

        tokio::spawn(async move {
            let result = store.write(&path, encode_flag(value)).await;
            let completion = WriteCompletion {
                flag,
                seq,
                value,
                result,
            };
            if completions.send(completion).is_err() {
                debug!(flag = %flag, seq, "write finished after its event queue went away");
            }
        });

        value
    }

    /// Apply a value observed in the store. `None` means the flag has no data
    /// there; local state is kept.
    pub fn apply_remote(&mut self, observed: Option<FlagState>) {
        match observed {
            Some(state) => {
                if state != self.local {
                    info!(flag = %self.flag, from = %self.local, to = %state, "flag changed remotely");
                }
                self.local = state;
                self.confirmed = Some(state);
            }
            None => {
                debug!(flag = %self.flag, "flag absent in store");
                self.confirmed = None;
            }
        }
    }

    /// Record a write outcome. Failures come back as `SyncError::WriteFailed`
    /// with local state left untouched.
    pub fn on_write_complete(&mut self, completion: WriteCompletion) -> Result<(), SyncError> {
        self.in_flight = self.in_flight.saturating_sub(1);
        match completion.result {
            Ok(()) => {
                debug!(flag = %self.flag, seq = completion.seq, state = %completion.value, "flag write stored");
                Ok(())
            }
            Err(cause) => {
                error!(flag = %self.flag, seq = completion.seq, "flag write failed: {cause}");
                Err(SyncError::WriteFailed {
                    flag: self.flag,
                    cause,
                })
            }
        }
    }

    pub fn flag(&self) -> FlagName {
        self.flag
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn local(&self) -> FlagState {
        self.local
    }

    pub fn confirmed(&self) -> Option<FlagState> {
        self.confirmed
    }

    /// Writes started by `toggle` whose completion has not been recorded yet.
    pub fn writes_in_flight(&self) -> usize {
        self.in_flight
    }
}

#[cfg(test)]
#[path = "tests/toggle_tests.rs"]
mod tests;
