//! Keeps a local view of remote device state in sync: a GPS marker fed by
//! store notifications and two optimistic on/off controls written back to
//! the same store.

pub mod channel;
pub mod position;
pub mod runtime;
pub mod toggle;

pub use channel::{Decoder, StateSyncChannel, Subscription, SubscriptionState, SyncEvent};
pub use position::{status_text, MapRenderer, PositionSink, DEFAULT_MARKER_LABEL, DEFAULT_ZOOM};
pub use runtime::{RuntimeCommand, RuntimeEvent, RuntimeHandle, RuntimeStopped, SyncRuntime};
pub use toggle::{ControlToggle, WriteCompletion};
