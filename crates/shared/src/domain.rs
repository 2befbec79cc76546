use std::fmt;

use serde::{Deserialize, Serialize};

/// A fully populated GPS coordinate. Partial coordinates never reach this type.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

impl Position {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.latitude, self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlagName {
    #[serde(rename = "LED")]
    Led,
    #[serde(rename = "Buzzer")]
    Buzzer,
}

impl FlagName {
    pub const ALL: [FlagName; 2] = [FlagName::Led, FlagName::Buzzer];

    /// Key of the flag under the `Controls` node.
    pub fn as_str(&self) -> &'static str {
        match self {
            FlagName::Led => "LED",
            FlagName::Buzzer => "Buzzer",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_str().eq_ignore_ascii_case(raw.trim()))
    }
}

impl fmt::Display for FlagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagState {
    #[default]
    Off,
    On,
}

impl FlagState {
    pub fn toggled(self) -> Self {
        match self {
            FlagState::Off => FlagState::On,
            FlagState::On => FlagState::Off,
        }
    }

    pub fn is_on(self) -> bool {
        self == FlagState::On
    }
}

impl From<bool> for FlagState {
    fn from(value: bool) -> Self {
        if value {
            FlagState::On
        } else {
            FlagState::Off
        }
    }
}

impl fmt::Display for FlagState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagState::Off => f.write_str("off"),
            FlagState::On => f.write_str("on"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFlag {
    pub name: FlagName,
    pub value: bool,
}

impl ControlFlag {
    pub fn new(name: FlagName, state: FlagState) -> Self {
        Self {
            name,
            value: state.is_on(),
        }
    }

    pub fn state(&self) -> FlagState {
        FlagState::from(self.value)
    }
}
