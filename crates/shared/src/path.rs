//! Slash-separated store paths such as `GPS/Latitude` or `Controls/LED`.
//!
//! Segments follow the key rules of the realtime database: non-empty and
//! free of `.`, `$`, `#`, `[`, `]` and control characters. The root path
//! has no segments and renders as the empty string.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::StoreError;

const FORBIDDEN_KEY_CHARS: [char; 5] = ['.', '$', '#', '[', ']'];

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a path; leading, trailing and repeated slashes are ignored.
    pub fn parse(raw: &str) -> Result<Self, StoreError> {
        let mut segments = Vec::new();
        for segment in raw.split('/').filter(|s| !s.is_empty()) {
            validate_segment(raw, segment)?;
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Paths built from compile-time keys known to be valid.
    pub(crate) fn from_static(keys: &[&'static str]) -> Self {
        Self {
            segments: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn child(&self, key: &str) -> Result<Self, StoreError> {
        let mut child = self.clone();
        for segment in key.split('/').filter(|s| !s.is_empty()) {
            validate_segment(key, segment)?;
            child.segments.push(segment.to_string());
        }
        Ok(child)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.segments.is_empty() {
            return None;
        }
        let mut parent = self.clone();
        parent.segments.pop();
        Some(parent)
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when `self` equals `other` or lies above it.
    pub fn is_ancestor_of(&self, other: &StorePath) -> bool {
        other.segments.len() >= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    /// Two paths are related when either contains the other.
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }

    /// Segments of `other` below `self`, if `self` is an ancestor of it.
    pub fn relative_segments<'a>(&self, other: &'a StorePath) -> Option<&'a [String]> {
        if self.is_ancestor_of(other) {
            Some(&other.segments[self.segments.len()..])
        } else {
            None
        }
    }
}

fn validate_segment(raw: &str, segment: &str) -> Result<(), StoreError> {
    if let Some(bad) = segment
        .chars()
        .find(|c| FORBIDDEN_KEY_CHARS.contains(c) || c.is_control())
    {
        return Err(StoreError::InvalidPath {
            path: raw.to_string(),
            reason: format!("segment '{segment}' contains forbidden character {bad:?}"),
        });
    }
    Ok(())
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("/"))
    }
}

impl FromStr for StorePath {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for StorePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for StorePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        StorePath::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_renders_nested_path() {
        let path = StorePath::parse("/GPS//Latitude/").expect("path");
        assert_eq!(path.segments(), ["GPS", "Latitude"]);
        assert_eq!(path.to_string(), "GPS/Latitude");
        assert_eq!(path.key(), Some("Latitude"));
    }

    #[test]
    fn root_is_empty() {
        let root = StorePath::parse("/").expect("root");
        assert!(root.is_root());
        assert_eq!(root.to_string(), "");
        assert_eq!(root.parent(), None);
    }

    #[test]
    fn rejects_forbidden_characters() {
        let err = StorePath::parse("GPS/Lat.itude").unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
        assert!(StorePath::root().child("a#b").is_err());
    }

    #[test]
    fn ancestry_and_relative_segments() {
        let gps = StorePath::parse("GPS").expect("gps");
        let lat = gps.child("Latitude").expect("lat");
        let controls = StorePath::parse("Controls").expect("controls");

        assert!(gps.is_ancestor_of(&lat));
        assert!(gps.is_ancestor_of(&gps));
        assert!(!lat.is_ancestor_of(&gps));
        assert!(lat.overlaps(&gps));
        assert!(!controls.overlaps(&lat));
        assert_eq!(gps.relative_segments(&lat), Some(&lat.segments()[1..]));
        assert_eq!(lat.parent(), Some(gps));
    }
}
