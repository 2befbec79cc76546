//! Logical store schema shared by the device, the tracker and the tools:
//!
//! ```text
//! GPS/Latitude     f64
//! GPS/Longitude    f64
//! Controls/LED     0 | 1
//! Controls/Buzzer  0 | 1
//! ```

use serde_json::Value;

use crate::{
    domain::{FlagName, FlagState, Position},
    error::SyncError,
    path::StorePath,
    snapshot::Snapshot,
};

pub const GPS_NODE: &str = "GPS";
pub const LATITUDE_KEY: &str = "Latitude";
pub const LONGITUDE_KEY: &str = "Longitude";
pub const CONTROLS_NODE: &str = "Controls";

pub fn gps_path() -> StorePath {
    StorePath::from_static(&[GPS_NODE])
}

pub fn controls_path() -> StorePath {
    StorePath::from_static(&[CONTROLS_NODE])
}

pub fn flag_path(flag: FlagName) -> StorePath {
    StorePath::from_static(&[CONTROLS_NODE, flag.as_str()])
}

/// Decode the `GPS` node. Both coordinates must be present.
pub fn decode_position(snapshot: &Snapshot) -> Result<Position, SyncError> {
    if !snapshot.exists() {
        return Err(SyncError::not_found(snapshot.path()));
    }
    let latitude = snapshot.child(LATITUDE_KEY).require::<f64>()?;
    let longitude = snapshot.child(LONGITUDE_KEY).require::<f64>()?;
    if !latitude.is_finite() || !longitude.is_finite() {
        return Err(SyncError::decode(snapshot.path(), "coordinate is not finite"));
    }
    Ok(Position::new(latitude, longitude))
}

pub fn encode_position(position: &Position) -> Value {
    serde_json::json!({
        LATITUDE_KEY: position.latitude,
        LONGITUDE_KEY: position.longitude,
    })
}

/// Decode a `Controls/<flag>` value. Only a value equal to 1 means `On`.
pub fn decode_flag(snapshot: &Snapshot) -> Result<FlagState, SyncError> {
    let Some(raw) = snapshot.raw() else {
        return Err(SyncError::not_found(snapshot.path()));
    };
    match raw {
        Value::Number(n) => {
            let on = n.as_i64().map(|v| v == 1).unwrap_or(false)
                || n.as_f64().map(|v| v == 1.0).unwrap_or(false);
            Ok(FlagState::from(on))
        }
        other => Err(SyncError::decode(
            snapshot.path(),
            format!("expected 0 or 1, found {other}"),
        )),
    }
}

pub fn encode_flag(state: FlagState) -> Value {
    Value::from(if state.is_on() { 1 } else { 0 })
}
