use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{error::SyncError, path::StorePath};

/// Immutable read of the data at a store path. JSON `null` and a missing
/// node both mean the snapshot does not exist.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    path: StorePath,
    value: Option<Value>,
}

impl Snapshot {
    pub fn new(path: StorePath, value: Value) -> Self {
        let value = match value {
            Value::Null => None,
            other => Some(other),
        };
        Self { path, value }
    }

    pub fn empty(path: StorePath) -> Self {
        Self { path, value: None }
    }

    pub fn path(&self) -> &StorePath {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.value.is_some()
    }

    pub fn raw(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn into_raw(self) -> Value {
        self.value.unwrap_or(Value::Null)
    }

    /// Snapshot of a named child. Children of scalars or of a missing node are empty.
    pub fn child(&self, key: &str) -> Snapshot {
        let path = self
            .path
            .child(key)
            .unwrap_or_else(|_| self.path.clone());
        let value = self
            .value
            .as_ref()
            .and_then(|v| v.get(key))
            .filter(|v| !v.is_null())
            .cloned();
        Snapshot { path, value }
    }

    pub fn has_child(&self, key: &str) -> bool {
        self.child(key).exists()
    }

    /// Typed access. `Ok(None)` when the snapshot does not exist, a decode
    /// error when it exists with an incompatible shape.
    pub fn value<T: DeserializeOwned>(&self) -> Result<Option<T>, SyncError> {
        match &self.value {
            None => Ok(None),
            Some(raw) => serde_json::from_value(raw.clone())
                .map(Some)
                .map_err(|err| SyncError::decode(&self.path, err.to_string())),
        }
    }

    /// Typed access to a field that must be present.
    pub fn require<T: DeserializeOwned>(&self) -> Result<T, SyncError> {
        self.value()?
            .ok_or_else(|| SyncError::decode(&self.path, "required field is missing or null"))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn gps() -> StorePath {
        StorePath::parse("GPS").expect("path")
    }

    #[test]
    fn null_value_does_not_exist() {
        let snapshot = Snapshot::new(gps(), Value::Null);
        assert!(!snapshot.exists());
        assert_eq!(snapshot.value::<f64>().expect("value"), None);
    }

    #[test]
    fn child_access_and_typed_values() {
        let snapshot = Snapshot::new(gps(), json!({ "Latitude": 39.92, "Longitude": 32 }));
        assert!(snapshot.has_child("Latitude"));
        assert_eq!(snapshot.child("Latitude").path().to_string(), "GPS/Latitude");
        assert_eq!(snapshot.child("Longitude").require::<f64>().expect("lng"), 32.0);
        assert!(!snapshot.child("Altitude").exists());
    }

    #[test]
    fn wrong_type_is_a_decode_error() {
        let snapshot = Snapshot::new(gps(), json!({ "Latitude": "north" }));
        let err = snapshot.child("Latitude").require::<f64>().unwrap_err();
        assert!(matches!(err, SyncError::Decode { .. }));
    }

    #[test]
    fn into_raw_yields_null_for_missing_data() {
        assert_eq!(Snapshot::empty(gps()).into_raw(), Value::Null);
        assert_eq!(Snapshot::new(gps(), json!(7)).into_raw(), json!(7));
    }

    #[test]
    fn children_of_scalars_are_empty() {
        let snapshot = Snapshot::new(gps(), json!(5));
        assert!(!snapshot.child("Latitude").exists());
    }
}
