use shared::domain::{FlagName, FlagState};
use sync_core::{MapRenderer, RuntimeCommand, RuntimeEvent};
use tracing::info;

/// Map stand-in for a terminal: keeps the single marker and camera and
/// logs every change.
#[derive(Debug, Default)]
pub struct ConsoleMap {
    marker: Option<(f64, f64, String)>,
    camera: Option<(f64, f64, f32)>,
}

#[cfg(test)]
impl ConsoleMap {
    pub fn marker(&self) -> Option<&(f64, f64, String)> {
        self.marker.as_ref()
    }

    pub fn camera(&self) -> Option<(f64, f64, f32)> {
        self.camera
    }
}

impl MapRenderer for ConsoleMap {
    fn ready(&self) -> bool {
        true
    }

    fn clear_markers(&mut self) {
        self.marker = None;
    }

    fn add_marker(&mut self, latitude: f64, longitude: f64, label: &str) {
        info!(latitude, longitude, label, "marker placed");
        self.marker = Some((latitude, longitude, label.to_string()));
    }

    fn center_on(&mut self, latitude: f64, longitude: f64, zoom: f32) {
        info!(latitude, longitude, zoom, "camera moved");
        self.camera = Some((latitude, longitude, zoom));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleInput {
    Command(RuntimeCommand),
    Help,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Option<ConsoleInput> {
    let word = line.trim();
    if word.is_empty() {
        return None;
    }

    let input = match word.to_ascii_lowercase().as_str() {
        "fetch" | "gps" => ConsoleInput::Command(RuntimeCommand::FetchPosition),
        "quit" | "exit" => ConsoleInput::Command(RuntimeCommand::Shutdown),
        "help" | "?" => ConsoleInput::Help,
        other => match FlagName::parse(other) {
            Some(flag) => ConsoleInput::Command(RuntimeCommand::Toggle(flag)),
            None => ConsoleInput::Unknown(word.to_string()),
        },
    };
    Some(input)
}

/// Action offered for a flag given its current state.
pub fn button_label(flag: FlagName, state: FlagState) -> &'static str {
    match (flag, state) {
        (FlagName::Led, FlagState::Off) => "Turn LED on",
        (FlagName::Led, FlagState::On) => "Turn LED off",
        (FlagName::Buzzer, FlagState::Off) => "Sound buzzer",
        (FlagName::Buzzer, FlagState::On) => "Silence buzzer",
    }
}

pub const HELP: &str = "commands: led | buzzer | fetch | help | quit";

pub fn describe_event(event: &RuntimeEvent) -> String {
    match event {
        RuntimeEvent::PositionChanged(position) => format!("position {position}"),
        RuntimeEvent::StatusText(text) => text.clone(),
        RuntimeEvent::FlagChanged { flag, state } => {
            format!("{flag} is {state} [{}]", button_label(*flag, *state))
        }
        RuntimeEvent::WriteFailed { flag, cause } => {
            format!("could not update {flag}: {cause}")
        }
        RuntimeEvent::SubscriptionLost { path, cause } => {
            format!("stopped listening to {path}: {cause}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{domain::Position, error::StoreError, protocol::gps_path};

    #[test]
    fn parses_known_commands_case_insensitively() {
        assert_eq!(
            parse_command(" LED \n"),
            Some(ConsoleInput::Command(RuntimeCommand::Toggle(FlagName::Led)))
        );
        assert_eq!(
            parse_command("buzzer"),
            Some(ConsoleInput::Command(RuntimeCommand::Toggle(
                FlagName::Buzzer
            )))
        );
        assert_eq!(
            parse_command("fetch"),
            Some(ConsoleInput::Command(RuntimeCommand::FetchPosition))
        );
        assert_eq!(
            parse_command("Exit"),
            Some(ConsoleInput::Command(RuntimeCommand::Shutdown))
        );
        assert_eq!(parse_command("?"), Some(ConsoleInput::Help));
    }

    #[test]
    fn blank_lines_are_skipped_and_unknown_words_kept() {
        assert_eq!(parse_command("   "), None);
        assert_eq!(
            parse_command("siren"),
            Some(ConsoleInput::Unknown("siren".to_string()))
        );
    }

    #[test]
    fn button_label_offers_the_opposite_action() {
        assert_eq!(button_label(FlagName::Led, FlagState::Off), "Turn LED on");
        assert_eq!(button_label(FlagName::Led, FlagState::On), "Turn LED off");
        assert_eq!(
            button_label(FlagName::Buzzer, FlagState::Off),
            "Sound buzzer"
        );
        assert_eq!(
            button_label(FlagName::Buzzer, FlagState::On),
            "Silence buzzer"
        );
    }

    #[test]
    fn console_map_keeps_only_the_latest_marker() {
        let mut map = ConsoleMap::default();
        map.clear_markers();
        map.add_marker(1.0, 2.0, "Location");
        map.center_on(1.0, 2.0, 12.0);
        map.clear_markers();
        map.add_marker(3.0, 4.0, "Location");

        assert_eq!(map.marker(), Some(&(3.0, 4.0, "Location".to_string())));
        assert_eq!(map.camera(), Some((1.0, 2.0, 12.0)));
    }

    #[test]
    fn events_are_described_for_the_terminal() {
        assert_eq!(
            describe_event(&RuntimeEvent::FlagChanged {
                flag: FlagName::Led,
                state: FlagState::On
            }),
            "LED is on [Turn LED off]"
        );
        assert_eq!(
            describe_event(&RuntimeEvent::PositionChanged(Position::new(1.5, 2.5))),
            format!("position {}", Position::new(1.5, 2.5))
        );
        assert!(describe_event(&RuntimeEvent::SubscriptionLost {
            path: gps_path(),
            cause: StoreError::Disconnected,
        })
        .starts_with("stopped listening to GPS"));
    }
}
