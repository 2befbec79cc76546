//! Single event queue that owns every channel, the position sink and the
//! flag toggles. Inputs are handled one at a time, so none of the
//! components need locks.

use std::sync::Arc;

use shared::{
    domain::{FlagName, FlagState, Position},
    error::{StoreError, SyncError},
    path::StorePath,
    protocol::{decode_flag, decode_position, flag_path, gps_path},
};
use store::RemoteStateStore;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{
    channel::{StateSyncChannel, SyncEvent},
    position::{status_text, MapRenderer, PositionSink},
    toggle::{ControlToggle, WriteCompletion},
};

const EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeCommand {
    Toggle(FlagName),
    FetchPosition,
    MapReady,
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    PositionChanged(Position),
    StatusText(String),
    FlagChanged { flag: FlagName, state: FlagState },
    WriteFailed { flag: FlagName, cause: StoreError },
    SubscriptionLost { path: StorePath, cause: StoreError },
}

#[derive(Debug, Error)]
#[error("sync runtime has stopped")]
pub struct RuntimeStopped;

/// Front-end side of a running [`SyncRuntime`].
#[derive(Clone)]
pub struct RuntimeHandle {
    commands: mpsc::UnboundedSender<RuntimeCommand>,
    events: broadcast::Sender<RuntimeEvent>,
}

impl RuntimeHandle {
    pub fn send(&self, command: RuntimeCommand) -> Result<(), RuntimeStopped> {
        self.commands.send(command).map_err(|_| RuntimeStopped)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<RuntimeEvent> {
        self.events.subscribe()
    }
}

struct FlagControl {
    toggle: ControlToggle,
    channel: StateSyncChannel<FlagState>,
}

pub struct SyncRuntime<R> {
    gps: StateSyncChannel<Position>,
    sink: PositionSink<R>,
    led: FlagControl,
    buzzer: FlagControl,
    commands: mpsc::UnboundedReceiver<RuntimeCommand>,
    completions: mpsc::UnboundedReceiver<WriteCompletion>,
    fetch_tx: mpsc::UnboundedSender<Result<Position, SyncError>>,
    fetches: mpsc::UnboundedReceiver<Result<Position, SyncError>>,
    events: broadcast::Sender<RuntimeEvent>,
}

impl<R: MapRenderer> SyncRuntime<R> {
    pub fn new(store: Arc<dyn RemoteStateStore>, renderer: R) -> (Self, RuntimeHandle) {
        Self::with_sink(store, PositionSink::new(renderer))
    }

    pub fn with_sink(store: Arc<dyn RemoteStateStore>, sink: PositionSink<R>) -> (Self, RuntimeHandle) {
        let (command_tx, commands) = mpsc::unbounded_channel();
        let (completion_tx, completions) = mpsc::unbounded_channel();
        let (fetch_tx, fetches) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        let flag_control = |flag| FlagControl {
            toggle: ControlToggle::new(flag, Arc::clone(&store), completion_tx.clone()),
            channel: StateSyncChannel::new(Arc::clone(&store)),
        };
        let led = flag_control(FlagName::Led);
        let buzzer = flag_control(FlagName::Buzzer);

        let runtime = Self {
            gps: StateSyncChannel::new(Arc::clone(&store)),
            sink,
            led,
            buzzer,
            commands,
            completions,
            fetch_tx,
            fetches,
            events: events.clone(),
        };
        let handle = RuntimeHandle {
            commands: command_tx,
            events,
        };
        (runtime, handle)
    }

    /// Subscribe to the GPS node and both flags.
    pub async fn start(&mut self) -> Result<(), SyncError> {
        self.gps.subscribe(gps_path(), decode_position).await?;
        for flag in FlagName::ALL {
            self.control_mut(flag)
                .channel
                .subscribe(flag_path(flag), decode_flag)
                .await?;
        }
        info!("sync runtime started");
        Ok(())
    }

    /// Handle inputs until `Shutdown` arrives or every handle is dropped.
    pub async fn run(&mut self) {
        while self.step().await {}
    }

    /// Handle exactly one input. Returns `false` once the runtime has shut down.
    pub async fn step(&mut self) -> bool {
        tokio::select! {
            command = self.commands.recv() => match command {
                Some(RuntimeCommand::Shutdown) | None => {
                    self.shutdown().await;
                    return false;
                }
                Some(command) => self.handle_command(command),
            },
            Some(event) = self.gps.next_event() => self.handle_gps_event(event),
            Some(event) = self.led.channel.next_event() => {
                self.handle_flag_event(FlagName::Led, event)
            }
            Some(event) = self.buzzer.channel.next_event() => {
                self.handle_flag_event(FlagName::Buzzer, event)
            }
            Some(completion) = self.completions.recv() => self.handle_completion(completion),
            Some(fetched) = self.fetches.recv() => self.handle_fetch(fetched),
        }
        true
    }

    async fn shutdown(&mut self) {
        self.gps.unsubscribe().await;
        self.led.channel.unsubscribe().await;
        self.buzzer.channel.unsubscribe().await;
        info!("sync runtime stopped");
    }

    fn handle_command(&mut self, command: RuntimeCommand) {
        debug!(?command, "handling command");
        match command {
            RuntimeCommand::Toggle(flag) => {
                let state = self.control_mut(flag).toggle.toggle();
                self.emit(RuntimeEvent::FlagChanged { flag, state });
            }
            RuntimeCommand::FetchPosition => {
                let fetch = self.gps.fetch_once(gps_path(), decode_position);
                let results = self.fetch_tx.clone();
                tokio::spawn(async move {
                    let _ = results.send(fetch.await);
                });
            }
            RuntimeCommand::MapReady => self.sink.on_map_ready(),
            RuntimeCommand::Shutdown => {}
        }
    }

    fn handle_gps_event(&mut self, event: SyncEvent<Position>) {
        match event {
            SyncEvent::Present(position) => self.show_position(position),
            SyncEvent::Absent => self.sink.on_position(None),
            SyncEvent::Cancelled(cause) => self.emit(RuntimeEvent::SubscriptionLost {
                path: gps_path(),
                cause,
            }),
        }
    }

    fn handle_fetch(&mut self, fetched: Result<Position, SyncError>) {
        self.emit(RuntimeEvent::StatusText(status_text(&fetched)));
        match fetched {
            Ok(position) => {
                self.gps.remember(position);
                self.sink.on_position(Some(position));
                self.emit(RuntimeEvent::PositionChanged(position));
            }
            Err(err) if err.is_absent() => debug!("gps fetch found no usable fix: {err}"),
            Err(err) => warn!("gps fetch failed: {err}"),
        }
    }

    fn handle_flag_event(&mut self, flag: FlagName, event: SyncEvent<FlagState>) {
        let control = self.control_mut(flag);
        match event {
            SyncEvent::Present(state) => {
                control.toggle.apply_remote(Some(state));
                let state = control.toggle.local();
                self.emit(RuntimeEvent::FlagChanged { flag, state });
            }
            SyncEvent::Absent => control.toggle.apply_remote(None),
            SyncEvent::Cancelled(cause) => self.emit(RuntimeEvent::SubscriptionLost {
                path: flag_path(flag),
                cause,
            }),
        }
    }

    fn handle_completion(&mut self, completion: WriteCompletion) {
        let control = self.control_mut(completion.flag);
        if let Err(SyncError::WriteFailed { flag, cause }) =
            control.toggle.on_write_complete(completion)
        {
            self.emit(RuntimeEvent::WriteFailed { flag, cause });
        }
    }

    fn show_position(&mut self, position: Position) {
        self.sink.on_position(Some(position));
        self.emit(RuntimeEvent::PositionChanged(position));
        self.emit(RuntimeEvent::StatusText(status_text(&Ok(position))));
    }

    fn emit(&self, event: RuntimeEvent) {
        // No receivers is fine; the front end may not be listening yet.
        let _ = self.events.send(event);
    }

    fn control_mut(&mut self, flag: FlagName) -> &mut FlagControl {
        match flag {
            FlagName::Led => &mut self.led,
            FlagName::Buzzer => &mut self.buzzer,
        }
    }

    pub fn position(&self) -> Option<&Position> {
        self.gps.latest()
    }

    pub fn flag_state(&self, flag: FlagName) -> FlagState {
        match flag {
            FlagName::Led => self.led.toggle.local(),
            FlagName::Buzzer => self.buzzer.toggle.local(),
        }
    }

    pub fn sink(&self) -> &PositionSink<R> {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut PositionSink<R> {
        &mut self.sink
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
